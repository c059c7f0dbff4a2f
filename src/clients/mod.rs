pub mod broker;
pub mod database;
pub mod email;
pub mod http;
