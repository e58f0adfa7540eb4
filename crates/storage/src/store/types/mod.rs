#![forbid(unsafe_code)]

mod batches;
mod jobs;
mod logs;
mod rules;

pub use batches::*;
pub use jobs::*;
pub use logs::*;
pub use rules::*;
