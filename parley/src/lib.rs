pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod models;
pub mod services;
