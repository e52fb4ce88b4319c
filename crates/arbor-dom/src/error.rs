//! DOM errors

use crate::NodeId;
use arbor_net::NetError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Unknown node, non-child reference, or wrong node kind
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Structurally disallowed operation
    #[error("Invalid modification: {0}")]
    InvalidModification(String),

    #[error("Not supported: {0}")]
    Unsupported(&'static str),

    #[error("Failed to load {url}: {source}")]
    ResourceLoadFailure {
        url: String,
        #[source]
        source: NetError,
    },
}

impl DomError {
    pub(crate) fn missing(id: NodeId) -> Self {
        DomError::ReferenceNotFound(format!("node {id}"))
    }

    pub(crate) fn not_element(id: NodeId) -> Self {
        DomError::ReferenceNotFound(format!("node {id} is not an element"))
    }

    pub(crate) fn not_child(child: NodeId, parent: NodeId) -> Self {
        DomError::ReferenceNotFound(format!("node {child} is not a child of {parent}"))
    }
}

pub type Result<T> = std::result::Result<T, DomError>;
