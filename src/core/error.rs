//! Error handling for selfswap
//!
//! Two layers, the same way the rest of the crate is split:
//! - [`SelfswapError`] - strongly-typed failures returned by every library operation
//! - [`ErrorContext`] - a wrapper with a suggestion and details for operator-facing output
//!
//! # Error Categories
//!
//! - **Network**: [`SelfswapError::Fetch`], [`SelfswapError::HttpStatus`]
//! - **Payload**: [`SelfswapError::Decode`]
//! - **Replacement transaction**: [`SelfswapError::Stage`], [`SelfswapError::Evacuate`],
//!   [`SelfswapError::Swap`], [`SelfswapError::FatalSwap`]
//! - **Environment**: [`SelfswapError::Executable`], [`SelfswapError::NotWritable`],
//!   [`SelfswapError::Config`], [`SelfswapError::Io`]
//!
//! Only [`SelfswapError::FatalSwap`] means the executable may be missing from its
//! canonical path. It carries both underlying causes as separate fields so callers can
//! match on it instead of parsing a message.
//!
//! # Examples
//!
//! ```rust,no_run
//! use selfswap::core::{SelfswapError, user_friendly_error};
//!
//! fn report(error: SelfswapError) {
//!     if error.is_fatal() {
//!         // The binary may be gone; page someone instead of retrying.
//!     }
//!     user_friendly_error(anyhow::Error::from(error)).display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, SelfswapError>;

/// Every failure an update cycle can surface.
///
/// Variants map one-to-one onto the stages of an update so callers can tell how far
/// a cycle got. Nothing in the library retries; each error bubbles to the caller of
/// the public [`Updater`](crate::updater::Updater) operations.
#[derive(Error, Debug)]
pub enum SelfswapError {
    /// Transport failure while fetching a manifest or artifact.
    #[error("Failed to fetch {url}: {reason}")]
    Fetch {
        /// URL that was requested
        url: String,
        /// Transport error description
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("Bad HTTP status from {url}: {status}")]
    HttpStatus {
        /// URL that was requested
        url: String,
        /// Status code returned by the server
        status: u16,
    },

    /// Manifest JSON was malformed or the compressed artifact was corrupt.
    #[error("Failed to decode {what}: {reason}")]
    Decode {
        /// What was being decoded (e.g. "manifest", "artifact")
        what: String,
        /// Decoder error description
        reason: String,
    },

    /// The replacement binary could not be written beside the executable.
    ///
    /// The original executable has not been touched.
    #[error("Failed to stage replacement binary at {}", .path.display())]
    Stage {
        /// Staging path that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The running executable could not be renamed to its backup path.
    ///
    /// The original executable is still at its canonical path.
    #[error("Failed to move executable {} aside", .path.display())]
    Evacuate {
        /// Canonical executable path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Promoting the staged binary failed, but the original was restored.
    #[error("Failed to install new binary at {}; the previous executable was restored", .path.display())]
    Swap {
        /// Canonical executable path
        path: PathBuf,
        /// Error from the promote rename
        #[source]
        source: io::Error,
    },

    /// Promoting failed and restoring the original failed too.
    ///
    /// The canonical path may be empty. Requires manual intervention.
    #[error(
        "Failed to install new binary at {} and failed to restore the previous executable \
         (update error: {swap_error}; recovery error: {recovery_error})",
        .path.display()
    )]
    FatalSwap {
        /// Canonical executable path
        path: PathBuf,
        /// Error from the promote rename
        swap_error: io::Error,
        /// Error from the recovery rename
        recovery_error: io::Error,
    },

    /// The path of the running executable could not be determined.
    #[error("Cannot determine the running executable: {reason}")]
    Executable {
        /// Why resolution failed
        reason: String,
    },

    /// The executable's directory rejected the pre-flight write probe.
    #[error("Cannot write beside {}", .path.display())]
    NotWritable {
        /// Probe file that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Any other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Catch-all used when rendering foreign errors for display.
    #[error("{message}")]
    Other {
        /// Rendered error message
        message: String,
    },
}

impl SelfswapError {
    /// True when the executable may have been left missing from its canonical path.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalSwap { .. })
    }

    /// True for transport and status failures.
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::HttpStatus { .. })
    }

    pub(crate) fn decode(what: &str, reason: impl fmt::Display) -> Self {
        Self::Decode {
            what: what.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A [`SelfswapError`] plus optional operator guidance.
///
/// Suggestions are actionable steps; details explain what happened. Both are optional
/// and rendered after the error by [`ErrorContext::display`].
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SelfswapError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error with no guidance attached.
    #[must_use]
    pub const fn new(error: SelfswapError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach an actionable suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions where one is known.
///
/// [`SelfswapError`] values get variant-specific guidance. Bare I/O errors are mapped
/// by kind. Anything else is rendered with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<SelfswapError>() {
        Ok(selfswap_error) => return create_error_context(selfswap_error),
        Err(error) => error,
    };

    if let Some(io_error) = error.downcast_ref::<io::Error>() {
        match io_error.kind() {
            io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(SelfswapError::Other {
                    message: error.to_string(),
                })
                .with_suggestion(permission_suggestion())
                .with_details("A file or directory could not be read or written");
            }
            io::ErrorKind::NotFound => {
                return ErrorContext::new(SelfswapError::Other {
                    message: error.to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(SelfswapError::Config {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the configuration file");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(SelfswapError::Other {
        message,
    })
}

fn permission_suggestion() -> &'static str {
    if cfg!(windows) {
        "Run as Administrator or check the permissions of the install directory"
    } else {
        "Check ownership of the install directory with 'ls -la' or rerun with sudo"
    }
}

fn create_error_context(error: SelfswapError) -> ErrorContext {
    match error {
        error @ (SelfswapError::Fetch { .. } | SelfswapError::HttpStatus { .. }) => {
            ErrorContext::new(error)
                .with_suggestion("Check network connectivity and the configured base URL")
                .with_details("The update server could not be reached or did not return the file")
        }
        error @ SelfswapError::Decode { .. } => ErrorContext::new(error)
            .with_suggestion("Republish the release; the manifest or artifact on the server is damaged")
            .with_details("The downloaded payload did not decode; nothing on disk was changed"),
        error @ (SelfswapError::Stage { .. } | SelfswapError::NotWritable { .. }) => {
            ErrorContext::new(error)
                .with_suggestion(permission_suggestion())
                .with_details("The install directory must be writable to stage a new binary")
        }
        error @ SelfswapError::Evacuate { .. } => ErrorContext::new(error)
            .with_suggestion("Make sure no other process is locking the executable, then retry")
            .with_details("The current executable was left in place"),
        error @ SelfswapError::Swap { .. } => ErrorContext::new(error)
            .with_suggestion("Retry the update once the underlying problem is fixed")
            .with_details("The update did not happen; the previous executable is intact"),
        SelfswapError::FatalSwap {
            path,
            swap_error,
            recovery_error,
        } => {
            let backup = crate::replace::ReplacementPaths::new(&path)
                .map(|paths| paths.backup.display().to_string())
                .unwrap_or_else(|_| "the .old file beside it".to_string());
            let details = format!(
                "Manual intervention required: {} may be missing. The previous binary should be at {}",
                path.display(),
                backup
            );
            ErrorContext::new(SelfswapError::FatalSwap {
                path,
                swap_error,
                recovery_error,
            })
            .with_suggestion("Rename the backup file back to the executable name, or reinstall")
            .with_details(details)
        }
        error => ErrorContext::new(error),
    }
}
