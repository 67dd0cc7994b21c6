pub mod feeds;
pub mod notify;
pub mod sqlite;
