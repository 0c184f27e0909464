//! Error types for the `ops-types` crate.

/// Errors returned when parsing a handle path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleParseError {
    /// The path string was empty.
    #[error("handle path is empty")]
    Empty,

    /// A segment had no kind (e.g. `a//b` or `[key]`).
    #[error("handle path {path:?} contains a segment without a kind")]
    EmptyKind {
        /// The offending path.
        path: String,
    },

    /// A `[` opened a key that was never closed.
    #[error("handle path {path:?} has an unterminated key")]
    UnterminatedKey {
        /// The offending path.
        path: String,
    },

    /// Characters followed a closed key inside the same segment.
    #[error("handle path {path:?} has characters after a key")]
    TrailingCharacters {
        /// The offending path.
        path: String,
    },

    /// A kind was empty or contained `/`, `[` or `]`, so its path would not
    /// parse back to the same handle.
    #[error("invalid handle kind {kind:?}")]
    InvalidKind {
        /// The rejected kind.
        kind: String,
    },

    /// A `]` appeared outside of a key.
    #[error("handle path {path:?} has an unexpected ']'")]
    UnexpectedBracket {
        /// The offending path.
        path: String,
    },
}
