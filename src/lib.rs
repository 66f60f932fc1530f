pub mod actor;
pub mod common;
pub mod engine;
pub mod error;
pub mod model;
