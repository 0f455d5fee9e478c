// Library modules for integration tests

// Pipeline modules.
pub mod chat;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod content;
pub mod db;
pub mod diacritize;
pub mod domain;
pub mod error;
pub mod llm;
pub mod logging;
pub mod queue;
pub mod script;
pub mod storage;
pub mod tracker;
pub mod tts;
pub mod voice;
pub mod workers;
