pub mod config;
pub mod embedding;
pub mod file_types;
pub mod template_engine;
