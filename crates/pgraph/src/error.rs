//! Error types for scene graph operations

/// Recoverable failures of graph edits
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Stash edits are only allowed on the application stage
    #[error("stash edits must run at pipeline stage 0, not stage {stage}")]
    NotBaseStage {
        /// Stage the caller was on
        stage: usize,
    },

    /// Index past the end of a child list
    #[error("child index {index} out of range ({len} children)")]
    ChildIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Length of the list
        len: usize,
    },

    /// The child is already an instance under the requested parent
    #[error("{child} is already a child of {parent}")]
    DuplicateInstance {
        /// The child node
        child: String,
        /// The requested parent node
        parent: String,
    },

    /// A node still lists parents
    #[error("{node} still has {parents} parent(s) at stage {stage}")]
    StillParented {
        /// The node
        node: String,
        /// First stage found with a parent
        stage: usize,
        /// Number of parents at that stage
        parents: usize,
    },
}

/// Result type for graph edits
pub type GraphResult<T> = Result<T, GraphError>;
