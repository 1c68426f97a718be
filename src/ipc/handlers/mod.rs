pub mod academic;
pub mod auth;
pub mod core;
pub mod messages;
pub mod reports;
pub mod storage;
pub mod users;
