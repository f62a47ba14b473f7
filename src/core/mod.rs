pub mod engine;
pub mod registry;
pub mod scanner;

pub use crate::domain::model::{ProbePolicy, ProbeResult, ResultSet};
pub use crate::domain::ports::Probe;
pub use crate::utils::error::Result;
