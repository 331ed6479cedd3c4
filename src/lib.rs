//! mail-digest — email subscription aggregation core.
//!
//! Inbound emails are normalized, scored and summarized through an external
//! chat-completion model, then rolled up into per-day digest documents.

pub mod api;
pub mod config;
pub mod error;
pub mod intake;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod summary;
