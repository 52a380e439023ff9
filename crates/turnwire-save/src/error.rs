//! Error types for save-game serialization.

use crate::EngineVersion;

/// Errors that can occur while writing or reading a save stream.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Underlying file or stream failure (includes decompression).
    #[error("save I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The save was written by an engine version this loader does not
    /// handle. Loading stops before any state is constructed.
    #[error("incompatible save version {found} (this engine loads {supported})")]
    IncompatibleVersion {
        found: EngineVersion,
        supported: String,
    },

    /// The stream decompressed but its structure is wrong — an
    /// unexpected marker, a section that overruns its bounds, or a
    /// stream that ends mid-record.
    #[error("corrupt save: {0}")]
    CorruptSave(String),

    /// A delegate record names a kind with no registered factory. The
    /// whole load fails; there is no partial recovery.
    #[error("save references unknown delegate kind '{0}'")]
    UnknownDelegate(String),

    /// A payload section failed to encode or decode.
    #[error("save codec failed: {0}")]
    Codec(#[from] bincode::Error),
}
