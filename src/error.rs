use thiserror::Error;

/// Errors surfaced by the lazy tree engine.
///
/// `NotFound` and `IndexOutOfRange` indicate a caller or merge-ordering bug;
/// `FetchFailed` comes from the [`NodeSource`](crate::NodeSource) and puts the
/// list into its error state until the root is registered again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A node or its metadata was expected but has never been observed.
    #[error("node not found: {0}")]
    NotFound(String),

    /// The node source rejected a fetch.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// The requested row lies outside the flattened list.
    #[error("index {index} out of range (item count {count})")]
    IndexOutOfRange { index: usize, count: usize },
}

impl TreeError {
    pub(crate) fn not_found<Id: std::fmt::Debug>(id: Id) -> Self {
        Self::NotFound(format!("{id:?}"))
    }

    /// Returns `true` for errors raised by the node source.
    pub const fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailed(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_include_context() {
        let err = TreeError::IndexOutOfRange { index: 7, count: 3 };
        assert_eq!(err.to_string(), "index 7 out of range (item count 3)");

        let err = TreeError::not_found(42_u32);
        assert_eq!(err, TreeError::NotFound("42".to_string()));
        assert!(!err.is_fetch_failure());
        assert!(TreeError::FetchFailed("offline".into()).is_fetch_failure());
    }
}
