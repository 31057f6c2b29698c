pub mod accounts;
pub mod attendance;
pub mod core;
pub mod marks;
pub mod reports;
pub mod session;
pub mod students;
pub mod teachers;
