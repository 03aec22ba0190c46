//! Handlers 模块

pub mod executions;
pub mod metrics;
pub mod monitoring;
pub mod tags;
pub mod valves;

pub use executions::*;
pub use metrics::*;
pub use monitoring::*;
pub use tags::*;
pub use valves::*;
