pub mod chat_completion_openai_repository;
pub mod descriptor_qdrant_repository;
pub mod embeddings_inference_repository;
