pub mod config;
pub mod data;
pub mod export;
pub mod format;
pub mod llm;
pub mod normalizer;
