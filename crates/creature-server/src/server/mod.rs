pub mod config;
pub mod serve;
pub mod service;
pub mod store;
pub mod streaming;
