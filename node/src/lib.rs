// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod pipeline;
pub mod storage;
pub mod telemetry;
pub mod upload;

pub use config::NodeConfig;
pub use errors::{NodeError, Result};
pub use pipeline::Pipeline;
