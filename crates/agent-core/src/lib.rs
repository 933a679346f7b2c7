//! # agent-core
//!
//! Backend-agnostic tool-calling agent loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Agent                               │
//! │  ┌────────────┐   ┌────────────────┐   ┌──────────────────┐  │
//! │  │ MessageLog │──▶│ProviderAdapter │──▶│  ToolDispatcher  │  │
//! │  │ (per run)  │◀──│ (per backend)  │   │ ──▶ ToolRegistry │  │
//! │  └────────────┘   └────────────────┘   └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ProviderAdapter` trait hides each backend's wire schema, so the same
//! loop drives OpenAI-style and Anthropic-style tool calling.

pub mod builtin;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod tool;

pub use config::{AgentConfig, Backend};
pub use dispatch::ToolDispatcher;
pub use error::{AgentError, Result};
pub use message::{Content, Message, MessageLog, Role};
pub use provider::{BackendRequest, BackendResponse, NormalizedResponse, ProviderAdapter};
pub use reasoning::{Agent, AgentBuilder, RunOutcome, RunStatus};
pub use tool::{Tool, ToolCall, ToolOutcome, ToolRegistry, ToolResult, ToolSpec};
