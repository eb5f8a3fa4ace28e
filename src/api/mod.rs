//! OpenAI-compatible chat-completion wire types and the streaming transport.
mod transport;
mod types;


pub use transport::{ChatEventStream, ChatTransport, HttpChatTransport};
pub use types::{
    ChatMessage, ChatRequest, ChatStreamChunk, Delta, DeltaFunction, DeltaToolCall, FunctionDef,
    StreamChoice, Tool,
};
