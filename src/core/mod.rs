//! Core module - Fundamental traits and types for CodeRelay
//!
//! - Request/result types shared by every component
//! - The `ExecutionProvider` trait implemented by all execution back-ends

pub mod provider;
pub mod types;

pub use provider::{Capability, ExecutionProvider, ProviderDescriptor};
pub use types::{ExecutionRequest, ExecutionResult, ExecutionStatus};
