pub mod clients;
pub mod config;
pub mod emitter;
pub mod error;
pub mod gateway;
pub mod models;
pub mod pipeline;
pub mod services;
