//! 中间件模块

pub mod context;

pub use context::request_context;
