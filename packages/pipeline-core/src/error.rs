//! Error taxonomy for the pipeline core (spec.md §7).
//!
//! Errors never cross element boundaries as typed `Result`s — an element
//! that hits one of these converts it into a `Halt`/`Flush` message and
//! keeps running. This type exists for the boundary APIs that *do* need
//! to report failure directly: the track database, codec registration,
//! and protocol-facing stream handlers.

use thiserror::Error;

/// Errors surfaced at the pipeline's external boundaries.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The track database already holds its maximum number of tracks.
    #[error("track database is full (max {max} tracks)")]
    TrackDatabaseFull { max: usize },

    /// No track with the given id exists in the database.
    #[error("track id {0} not found")]
    TrackDatabaseIdNotFound(u32),

    /// No registered codec recognised the stream.
    #[error("no codec recognised stream {stream_id} ({uri})")]
    StreamUnrecognised { stream_id: u32, uri: String },

    /// A codec recognised the stream but could not make sense of its
    /// contents (malformed container/frame data).
    #[error("stream {stream_id} is corrupt: {reason}")]
    StreamCorrupt { stream_id: u32, reason: String },

    /// A protocol-facing producer hit an error it can recover from by
    /// re-fetching or resuming.
    #[error("recoverable protocol error on stream {stream_id}: {reason}")]
    ProtocolRecoverableError { stream_id: u32, reason: String },

    /// A protocol-facing producer hit an error it cannot recover from;
    /// the stream must be abandoned.
    #[error("unrecoverable protocol error on stream {stream_id}: {reason}")]
    ProtocolUnrecoverableError { stream_id: u32, reason: String },

    /// A requested seek could not be carried out.
    #[error("seek failed on stream {stream_id}")]
    SeekFailed { stream_id: u32 },

    /// `PipelineConfig::load` could not read or parse the given file.
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `PipelineConfig::load` read the file but its YAML was invalid.
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
