pub mod assistants;
pub mod client;
pub mod threads;
pub mod types;

pub use assistants::AssistantApi;
pub use client::LlmClient;
pub use threads::code_interpreter_reply;
pub use types::{
    ChatMessage, LlmConfig, LlmError, LlmResponse, RemoteAssistant, ToolCall, ToolFunction,
};
