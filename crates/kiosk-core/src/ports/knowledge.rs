//! Local knowledge-base port.

use serde::{Deserialize, Serialize};

use crate::domain::KioskAction;

/// A direct answer from the local knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeReply {
    pub text: String,
    pub action: KioskAction,
}

/// Port trait for instantaneous, deterministic transcript lookup.
///
/// Implementations must not block or perform I/O.
pub trait KnowledgeBase: Send + Sync {
    fn lookup(&self, transcript: &str, language: &str) -> Option<KnowledgeReply>;
}

/// A knowledge base that never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyKnowledgeBase;

impl KnowledgeBase for EmptyKnowledgeBase {
    fn lookup(&self, _transcript: &str, _language: &str) -> Option<KnowledgeReply> {
        None
    }
}
