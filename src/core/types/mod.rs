//! Request types shared across the routing core

pub mod chat;
pub mod message;

pub use chat::{ChatMessage, ChatRequest, JsonSchemaFormat, ResponseFormat};
pub use message::{ContentPart, ImageUrl, MessageContent, MessageRole};
