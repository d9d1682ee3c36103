pub mod forms;
pub mod place;
pub mod session;
pub mod user;
