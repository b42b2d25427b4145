pub mod embeddings;
pub mod prompt;
pub mod token_stream;
