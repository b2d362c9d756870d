use thiserror::Error;

/// `Result` type returned by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The returned error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Generic(String),

    /// A box declares a size its payload cannot satisfy.
    #[error("malformed '{name}' box: {reason}")]
    MalformedBox { name: String, reason: String },

    /// A versioned box carries a version this crate does not decode.
    #[error("unsupported version {version} in '{name}' box")]
    UnsupportedVersion { name: String, version: u8 },

    /// The source file cannot be packaged (wrong codec, multiple tracks, ...).
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// The requested (kind, name, bandwidth) triple is absent from the index.
    #[error("unknown track {name}={bandwidth}")]
    UnknownTrack { name: String, bandwidth: u64 },

    /// The first sample of the requested segment lies past the sample table.
    #[error("segment {segment} starts at sample {sample_start} but the track has {sample_count} samples")]
    SampleStartOutOfRange {
        segment: u32,
        sample_start: u64,
        sample_count: u32,
    },

    /// The requested segment lies entirely beyond the end of the track.
    #[error("segment {segment} is past the end of the track")]
    SegmentPastEnd { segment: u32 },

    /// A video track without a usable sync-sample table cannot be segmented.
    #[error("video track has an empty sync-sample table")]
    MissingSyncTable,

    /// Segment generation was asked for a track kind it does not handle.
    #[error("expected an audio or video track, got {0}")]
    TypeMismatch(String),

    /// The package holds neither audio nor video tracks.
    #[error("package holds no audio or video tracks")]
    NoTracks,

    #[error("failed to read data: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to decode json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Creates an `Error::Generic` from a format string (like `anyhow::anyhow!`).
/// Use in `.map_err(|_| err!("message"))`.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::Error::Generic(format!($($arg)*))
    };
}

/// Creates an `Error::Generic` and returns early (like `anyhow::bail!`).
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::err!($($arg)*))
    };
}
