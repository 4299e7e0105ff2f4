// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the viewer
//!
//! Setup failures and frame source call failures are fatal and bubble up to
//! `main`. Per-frame problems (no frame yet for a stream, a wait timeout)
//! never become errors; the display loop handles them in place.

use std::fmt;
use std::path::PathBuf;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for frame source calls
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for display operations
pub type DisplayResult<T> = Result<T, DisplayError>;

/// Main application error type
#[derive(Debug)]
pub enum AppError {
    /// Device or stream setup failed before streaming started
    Setup(SetupError),
    /// A frame source call failed
    Source(SourceError),
    /// The display surface failed
    Display(DisplayError),
    /// Configuration could not be loaded or is invalid
    Config(ConfigError),
    /// Snapshot could not be written
    Storage(String),
}

/// Failures while selecting a device and its streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// No devices connected
    NoDevices,
    /// Requested device index does not exist
    DeviceIndexOutOfRange { index: usize, count: usize },
    /// Configuration names no streams to open
    NoStreamsConfigured,
}

/// Category of a frame source failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Stream negotiation rejected the requested configuration
    StreamRejected,
    /// Operation not supported in the current state
    Unsupported,
    /// Device is already streaming or owned by someone else
    DeviceBusy,
    /// Device I/O failed
    Io,
    /// Anything else reported by the source
    Other,
}

/// A failed frame source call
///
/// Carries the failed operation and its arguments as separate fields so
/// callers can branch on them instead of parsing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub operation: &'static str,
    pub args: String,
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(
        operation: &'static str,
        args: impl Into<String>,
        kind: SourceErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            args: args.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn rejected(
        operation: &'static str,
        args: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, args, SourceErrorKind::StreamRejected, message)
    }

    pub fn io(operation: &'static str, args: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(operation, args, SourceErrorKind::Io, err.to_string())
    }
}

/// Display surface failures
#[derive(Debug)]
pub enum DisplayError {
    /// Terminal or window I/O failed
    Io(std::io::Error),
    /// Raster image does not match its declared geometry
    InvalidImage(String),
}

/// Configuration failures
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read or written
    Io { path: PathBuf, source: std::io::Error },
    /// Config file is not valid JSON for the schema
    Parse { path: PathBuf, message: String },
    /// Values are out of range
    Invalid(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Setup(e) => write!(f, "Setup failed: {}", e),
            AppError::Source(e) => write!(f, "{}", e),
            AppError::Display(e) => write!(f, "Display error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::NoDevices => write!(f, "No devices connected"),
            SetupError::DeviceIndexOutOfRange { index, count } => {
                write!(f, "Device index {} out of range ({} connected)", index, count)
            }
            SetupError::NoStreamsConfigured => write!(f, "No streams configured"),
        }
    }
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceErrorKind::StreamRejected => write!(f, "stream rejected"),
            SourceErrorKind::Unsupported => write!(f, "unsupported"),
            SourceErrorKind::DeviceBusy => write!(f, "device busy"),
            SourceErrorKind::Io => write!(f, "i/o"),
            SourceErrorKind::Other => write!(f, "other"),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error calling {}({}): {}",
            self.operation, self.args, self.message
        )
    }
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::Io(e) => write!(f, "I/O error: {}", e),
            DisplayError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            ConfigError::Parse { path, message } => {
                write!(f, "{}: {}", path.display(), message)
            }
            ConfigError::Invalid(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Setup(e) => Some(e),
            AppError::Source(e) => Some(e),
            AppError::Display(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Storage(_) => None,
        }
    }
}
impl std::error::Error for SetupError {}
impl std::error::Error for SourceError {}
impl std::error::Error for DisplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DisplayError::Io(e) => Some(e),
            DisplayError::InvalidImage(_) => None,
        }
    }
}
impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Conversions from sub-errors to AppError
impl From<SetupError> for AppError {
    fn from(err: SetupError) -> Self {
        AppError::Setup(err)
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::Source(err)
    }
}

impl From<DisplayError> for AppError {
    fn from(err: DisplayError) -> Self {
        AppError::Display(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<std::io::Error> for DisplayError {
    fn from(err: std::io::Error) -> Self {
        DisplayError::Io(err)
    }
}
