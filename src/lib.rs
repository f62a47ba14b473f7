pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::http::{HttpClient, HttpResponse, RateLimiter, RequestBody};
pub use app::report::ScanReport;
pub use config::DigConfig;
pub use core::{
    engine::ScanEngine,
    registry::{ProbeRegistry, Resolution},
    scanner::{ScanOutcome, Scanner},
};
pub use domain::model::{ProbeError, ProbePolicy, ProbeResult, ResultSet};
pub use domain::ports::Probe;
pub use utils::error::{DigError, Result};
