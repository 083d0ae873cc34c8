use thiserror::Error;

/// Main error type for the reel-composer library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Audio processing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Suggestion service error: {0}")]
    Suggestion(#[from] SuggestionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Timeline model and session validation errors.
///
/// These are raised at the point of mutation; the rejected edit leaves the
/// session untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("Invalid time range: start {start:.3}s must be before end {end:.3}s")]
    InvalidTimeRange { start: f64, end: f64 },

    #[error("Cut {start:.3}s-{end:.3}s lies outside source {source_index} (duration {duration:.3}s)")]
    OutOfSourceRange {
        source_index: usize,
        start: f64,
        end: f64,
        duration: f64,
    },

    #[error("Source index {index} is invalid ({source_count} sources loaded)")]
    InvalidSourceIndex { index: usize, source_count: usize },

    #[error("Composite clip must contain at least one cut")]
    EmptyComposite,

    #[error("Filter set is invalid: {details}")]
    InvalidFilters { details: String },

    #[error("Unknown {kind} identifier: {value}")]
    UnknownIdentifier { kind: &'static str, value: String },

    #[error("No source is long enough for {required:.2}s cuts (evaluated durations: {})", format_durations(.durations))]
    UnsupportedSource { required: f64, durations: Vec<f64> },

    #[error("Clip not found: {id}")]
    ClipNotFound { id: u64 },

    #[error("Overlay audio not found: {id}")]
    OverlayNotFound { id: u64 },
}

/// Video source and frame errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to load video file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to probe {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("Frame at {time:.3}s could not be decoded: {reason}")]
    DecodeFailure { time: f64, reason: String },

    #[error("Source {source_index} did not become ready within {timeout_ms} ms")]
    SourceNotReady { source_index: usize, timeout_ms: u64 },

    #[error("Frame processing failed: {reason}")]
    FrameProcessingFailed { reason: String },

    #[error("Invalid video parameters: {details}")]
    InvalidParameters { details: String },
}

/// Audio-specific errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("Invalid audio parameters: {details}")]
    InvalidParameters { details: String },
}

/// Preview playback errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Seeking is not supported while a composite clip is playing")]
    SeekUnsupported,

    #[error("No media handle registered for source {source_index}")]
    MissingHandle { source_index: usize },

    #[error("Seek target {target:.3}s is outside the clip (duration {duration:.3}s)")]
    SeekOutOfRange { target: f64, duration: f64 },
}

/// Export and encode/mux errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Encoder initialization failed: {reason}")]
    EncoderInitFailure { reason: String },

    #[error("Mux finalize failed: {reason}")]
    MuxFinalizeFailure { reason: String },

    #[error("Encoder rejected submission: {reason}")]
    SubmissionFailed { reason: String },

    #[error("Export failed: {cause}")]
    ExportFailed {
        #[source]
        cause: Box<CompositorError>,
    },

    #[error("Another {activity} is already running")]
    Busy { activity: &'static str },

    #[error("Export was cancelled")]
    Cancelled,
}

/// Errors reported by the scene/caption suggestion collaborator
#[derive(Error, Debug)]
pub enum SuggestionError {
    #[error("Suggestion service failed: {reason}")]
    SuggestionServiceFailure { reason: String },

    #[error("Suggestion service returned an unusable response: {details}")]
    InvalidResponse { details: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

fn format_durations(durations: &[f64]) -> String {
    durations
        .iter()
        .map(|d| format!("{d:.2}s"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Wrap a fatal pipeline error as a terminal export failure.
    ///
    /// Errors that already describe the end of an export (cancellation,
    /// a busy session, a previous wrap) are passed through unchanged.
    pub fn into_export_failure(self) -> Self {
        match self {
            Self::Export(ExportError::Cancelled)
            | Self::Export(ExportError::Busy { .. })
            | Self::Export(ExportError::ExportFailed { .. }) => self,
            other => ExportError::ExportFailed {
                cause: Box::new(other),
            }
            .into(),
        }
    }

    /// Check if this error is recoverable (the operation can continue or be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // IO errors might be temporary
            Self::Io(_) => true,
            // Single frames are skipped, never fatal
            Self::Video(VideoError::DecodeFailure { .. }) => true,
            Self::Video(VideoError::SourceNotReady { .. }) => true,
            // Suggestions fall back to defaults
            Self::Suggestion(_) => true,
            Self::Export(ExportError::Busy { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::LoadFailed { path }) => {
                format!("Could not load video file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Audio(AudioError::LoadFailed { path }) => {
                format!("Could not load audio file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Timeline(TimelineError::UnknownIdentifier { kind: "filter", value }) => {
                format!("Filter '{}' not found. Available filters: none, grayscale, nightVision, vhs", value)
            }
            Self::Export(ExportError::ExportFailed { cause }) => {
                format!("Export failed and no file was written: {}", cause)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_source_lists_every_duration() {
        let err = TimelineError::UnsupportedSource {
            required: 3.0,
            durations: vec![1.5, 2.25],
        };
        let message = err.to_string();
        assert!(message.contains("1.50s"));
        assert!(message.contains("2.25s"));
    }

    #[test]
    fn test_export_failure_wraps_cause_once() {
        let err: CompositorError = ExportError::EncoderInitFailure {
            reason: "ffmpeg missing".to_string(),
        }
        .into();

        let wrapped = err.into_export_failure().into_export_failure();
        match wrapped {
            CompositorError::Export(ExportError::ExportFailed { cause }) => {
                assert!(matches!(
                    *cause,
                    CompositorError::Export(ExportError::EncoderInitFailure { .. })
                ));
            }
            other => panic!("Expected ExportFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_cancellation_is_not_wrapped() {
        let err: CompositorError = ExportError::Cancelled.into();
        assert!(matches!(
            err.into_export_failure(),
            CompositorError::Export(ExportError::Cancelled)
        ));
    }

    #[test]
    fn test_decode_failures_are_recoverable() {
        let err: CompositorError = VideoError::DecodeFailure {
            time: 1.0,
            reason: "corrupt packet".to_string(),
        }
        .into();
        assert!(err.is_recoverable());

        let fatal: CompositorError = ExportError::MuxFinalizeFailure {
            reason: "disk full".to_string(),
        }
        .into();
        assert!(!fatal.is_recoverable());
    }
}
