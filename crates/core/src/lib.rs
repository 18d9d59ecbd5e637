//! # SmartDay Core
//!
//! Domain types, traits, and error definitions for the SmartDay
//! conversational planner. This crate has **no HTTP dependencies**; it
//! defines the dialogue model that the provider, tool, and agent crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! The two external seams are traits defined here:
//! - [`Provider`]: a chat-completion backend
//! - [`Tool`]: an external data fetcher (weather, web search)
//!
//! Implementations live in their respective crates, which keeps the
//! orchestration logic testable with scripted providers and stub tools.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ContextError, Error, ProviderError, Result, ToolError};
pub use message::{CapabilityTag, SessionId, ToolCallRequest, Transcript, Turn};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, SamplingParams, ToolChoice, ToolDefinition, Usage,
};
pub use tool::{
    CurrentWeather, Forecast, ParameterSpec, Tool, ToolArguments, ToolDescriptor, ToolKind,
    ToolOutput, ToolRegistry,
};
