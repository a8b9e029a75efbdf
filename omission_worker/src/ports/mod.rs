pub mod chat_completion;
pub mod descriptor_storage;
pub mod embeddings_generator;
