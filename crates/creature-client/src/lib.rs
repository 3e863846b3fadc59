#![doc = include_str!("../README.md")]

pub mod config;
pub mod driver;
pub mod error;

pub use error::CallError;
