//! Storyline Context - Errors

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
pub enum StorylineError {
    #[error(
        "connection #{connection} references node {from} -> {to}, but storyline `{storyline}` has only {node_count} nodes"
    )]
    DanglingConnection {
        storyline: String,
        connection: usize,
        from: i64,
        to: i64,
        node_count: usize,
    },

    #[error("connection cannot point a node to itself: {0}")]
    SelfLoop(String),

    #[error("connection weight must be within [1, 10], got {0}")]
    InvalidWeight(i64),

    #[error("invalid chapter range: {start}..{end}")]
    InvalidChapterRange { start: u32, end: u32 },

    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("storyline `{0}` has no nodes")]
    NoNodes(String),

    #[error("node {node} does not belong to storyline {storyline}")]
    ForeignNode { node: Uuid, storyline: Uuid },
}
