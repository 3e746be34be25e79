pub mod content;
pub mod image_provider;
pub mod lesson_service;
pub mod llm_provider;
pub mod speech_provider;
