use serde::Serialize;

use crate::schemas::user::UserResponse;

pub(crate) const TOKEN_TYPE: &str = "bearer";

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: &'static str,
    pub(crate) user: UserResponse,
}

impl TokenResponse {
    pub(crate) fn bearer(access_token: String, user: UserResponse) -> Self {
        Self { access_token, token_type: TOKEN_TYPE, user }
    }
}
