pub(crate) mod absences;
pub(crate) mod attendance;
pub(crate) mod classes;
pub(crate) mod health;
pub(crate) mod users;
