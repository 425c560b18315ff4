//! Assistant Assembly: prompts, function schemas and assistants, kept in the
//! key-value tables and mirrored to the hosted assistants API.

pub mod assistants;
pub mod functions;
pub mod prompts;

pub use assistants::{AssistantConfig, ResponseFormat};
