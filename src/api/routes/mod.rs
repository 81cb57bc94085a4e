//! API route modules.

pub mod call;
pub mod chat;
