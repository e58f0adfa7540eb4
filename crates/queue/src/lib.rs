#![forbid(unsafe_code)]

pub mod batch;
mod catalog;
mod collab;
mod config;
mod error;
pub mod logs;
mod queue;
pub mod rules;
mod schema;

pub use catalog::*;
pub use collab::*;
pub use config::*;
pub use error::QueueError;
pub use queue::*;
pub use schema::validate_config;
