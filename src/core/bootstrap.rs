use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;

const FIRST_ADMIN_NAME: &str = "Administrator";

/// Creates the configured first admin, or restores its role, active flag and
/// password when the account already exists.
pub(crate) async fn ensure_first_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping first admin creation");
        return Ok(());
    }

    let email = &admin.first_admin_email;
    let now = primitive_now_utc();

    if let Some(user) = repositories::users::find_by_email(state.db(), email).await? {
        let password_matches =
            security::verify_password(&admin.first_admin_password, &user.hashed_password)
                .unwrap_or(false);

        if password_matches && user.role == UserRole::Admin && user.is_active {
            tracing::info!(email = %email, "First admin already up to date");
            return Ok(());
        }

        let hashed_password = if password_matches {
            user.hashed_password.clone()
        } else {
            security::hash_password(&admin.first_admin_password)?
        };
        repositories::users::set_admin_credentials(state.db(), &user.id, &hashed_password, now)
            .await?;

        tracing::info!(email = %email, "Updated first admin");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_admin_password)?;
    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            email,
            hashed_password,
            name: FIRST_ADMIN_NAME,
            role: UserRole::Admin,
            is_active: true,
            enrollment_date: None,
            major: None,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!(email = %email, "Created first admin");
    Ok(())
}
