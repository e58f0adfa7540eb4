#![forbid(unsafe_code)]

mod batch;
mod gear;
mod ids;
mod job;
mod refs;
mod request;
mod rules;
mod state;
mod tags;
pub mod time;

pub use batch::*;
pub use gear::*;
pub use ids::*;
pub use job::*;
pub use refs::*;
pub use request::*;
pub use rules::*;
pub use state::*;
pub use tags::*;

#[cfg(test)]
mod tests;
