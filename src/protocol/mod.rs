//! Data model and operation messages.

pub mod messages;
pub mod models;
