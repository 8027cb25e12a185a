//! AI Integration Module for Nebula
//!
//! Drafts requirements and suggests subsystems using Claude Code CLI
//! integration. Callers that only need drafts depend on [`DraftGenerator`].

pub mod client;
pub mod prompts;
pub mod responses;

pub use client::{AiClient, AiError, AiMode, DraftGenerator};
pub use prompts::{build_feature_request, DraftRequest};
pub use responses::{RequirementDraft, SubsystemSuggestion};
