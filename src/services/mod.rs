pub mod extraction_service;
pub mod generation_session;
pub mod grading_service;
pub mod history_service;
pub mod llm_service;
pub mod quiz_generator;
pub mod shuffle;
pub mod word_assignment;
