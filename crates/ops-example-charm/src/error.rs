//! Error types for the example charm's options.

/// Errors raised while reading charm options from the environment.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// A feature switch held something other than `true` or `false`.
    #[error("invalid {name}: expected true or false, got {value:?}")]
    InvalidFlag {
        /// Environment variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        #[source]
        source: std::str::ParseBoolError,
    },
}
