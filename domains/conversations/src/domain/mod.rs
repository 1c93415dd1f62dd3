//! Domain layer for Conversations

pub mod entities;
pub mod sections;
pub mod state;
