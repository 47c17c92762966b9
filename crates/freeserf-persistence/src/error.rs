//! Error types for snapshot save/load.

/// Errors that can occur while writing or reading a simulation snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The underlying stream failed to read or write.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot body could not be serialized or deserialized.
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The snapshot's state is self-inconsistent in a way that indicates
    /// a corrupt file rather than a version skew — fatal per the core's
    /// error-handling policy (`Invariant`/"corrupt state during load is
    /// fatal").
    #[error("corrupt snapshot: {0}")]
    Corrupt(&'static str),

    /// The snapshot's format version does not match what this build of
    /// the persistence crate knows how to read.
    #[error("snapshot version mismatch: file is v{found}, expected v{expected}")]
    VersionMismatch {
        /// The version stamped in the file.
        found: u32,
        /// The version this build supports.
        expected: u32,
    },
}
