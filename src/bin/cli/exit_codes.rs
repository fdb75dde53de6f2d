//! Exit codes for the CLI tool.

use resfork::Error;

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Some resources could not be read
pub const WARNING: i32 = 1;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Resource file or compressed data is malformed
pub const BAD_FILE: i32 = 3;
/// Compressed with an unsupported codec
pub const UNSUPPORTED: i32 = 4;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Invalid command line arguments
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Warning,
    FatalError,
    BadFile,
    Unsupported,
    IoError,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::Warning => WARNING,
            Self::FatalError => FATAL_ERROR,
            Self::BadFile => BAD_FILE,
            Self::Unsupported => UNSUPPORTED,
            Self::IoError => IO_ERROR,
            Self::BadArgs => BAD_ARGS,
        }
    }
}

/// Converts a resfork error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::Io(_) | Error::OutOfOrderRead { .. } => ExitCode::IoError,
        Error::MalformedHeader { .. }
        | Error::MalformedMap { .. }
        | Error::OffsetOutOfRange { .. }
        | Error::TruncatedData { .. }
        | Error::LengthMismatch { .. }
        | Error::NotActuallyCompressed
        | Error::MalformedCompressionHeader { .. }
        | Error::Decompress { .. }
        | Error::ForkSelectionFailed { .. } => ExitCode::BadFile,
        Error::UnsupportedCodec { .. } => ExitCode::Unsupported,
        Error::ForkUnavailable { .. } => ExitCode::IoError,
        Error::ResourceNotFound(_) => ExitCode::BadArgs,
        Error::ResourceLimitExceeded(_) => ExitCode::FatalError,
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::FatalError,
    }
}
