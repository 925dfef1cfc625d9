pub mod api;
pub mod assignment;
pub mod config;
pub mod database;
pub mod error;
pub mod service;

pub use error::{Result, ReviewError};
