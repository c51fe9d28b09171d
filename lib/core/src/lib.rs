//! Core domain types and utilities for lingochat.
//!
//! This crate provides the identifiers, language/topic tags and error
//! handling shared by the conversation core, the capability crates and the
//! server.

pub mod error;
pub mod id;
pub mod lang;

pub use error::Result;
pub use id::{ConversationId, ParseIdError, SessionKey, TurnId};
pub use lang::{LanguageTag, ParseTagError, TopicTag};
