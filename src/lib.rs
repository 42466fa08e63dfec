//! Mail Responder: answers inbound email with a language-model reply.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
