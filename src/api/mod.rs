pub(crate) mod absences;
pub(crate) mod attendance;
pub(crate) mod auth;
pub(crate) mod classes;
pub(crate) mod errors;
pub(crate) mod extract;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod profile;
pub(crate) mod router;
pub(crate) mod stats;
pub(crate) mod students;
pub(crate) mod users;
pub(crate) mod validation;
