use thiserror::Error;

use crate::entity::EntityKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: EntityKind, key: String },

    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: EntityKind, key: String },

    #[error("{kind} key must be non-empty")]
    EmptyKey { kind: EntityKind },

    #[error("store backend error: {0}")]
    Backend(String),
}
