//! HMO Chat — two-phase medical-services chatbot for Israeli health funds.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod profile;
pub mod retrieval;
pub mod server;
