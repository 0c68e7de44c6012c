// Public modules
pub mod chat_completion;
pub mod chat_completion_chunk;
pub mod completion_params;
pub mod message_role;
pub mod model;
pub mod query_message;
pub mod usage;

// Re-exports
pub use chat_completion::{ChatCompletion, CompletionChoice, CompletionMessage};
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use completion_params::CompletionParams;
pub use message_role::MessageRole;
pub use model::{KnownModel, Model};
pub use query_message::QueryMessage;
pub use usage::Usage;
