//! Error types for wsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=warehouse, 3=source, 4=validation, etc.)
//! - Retryability flags for schedulers deciding whether to re-run
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Page Token ────────────────────────────────────────────────

/// Position of a page within a paginated source.
///
/// Carried by [`Error::Fetch`] so a failed drain names the page it died on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PageToken {
    /// 1-based page number (`?page=N`).
    PageNumber(u32),
    /// 0-based row offset (`startRow`).
    RowOffset(usize),
}

impl PageToken {
    /// The page number or row offset as a request parameter value.
    #[must_use]
    pub const fn value(self) -> usize {
        match self {
            Self::PageNumber(n) => n as usize,
            Self::RowOffset(n) => n,
        }
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageNumber(n) => write!(f, "page {n}"),
            Self::RowOffset(n) => write!(f, "row offset {n}"),
        }
    }
}

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Warehouse (exit 2)
    DatabaseError,
    TableNotFound,
    WriteFailure,

    // Source (exit 3)
    SourceUnavailable,
    FetchFailed,

    // Validation (exit 4)
    InvalidRecord,
    InvalidArgument,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::TableNotFound => "TABLE_NOT_FOUND",
            Self::WriteFailure => "WRITE_FAILURE",
            Self::SourceUnavailable => "SOURCE_UNAVAILABLE",
            Self::FetchFailed => "FETCH_FAILED",
            Self::InvalidRecord => "INVALID_RECORD",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError | Self::TableNotFound | Self::WriteFailure => 2,
            Self::SourceUnavailable | Self::FetchFailed => 3,
            Self::InvalidRecord | Self::InvalidArgument => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the next scheduled invocation can be expected to succeed
    /// without operator action.
    ///
    /// Source outages and write failures are transient; the resume protocol
    /// makes a plain re-run safe. Config and validation errors are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable | Self::FetchFailed | Self::WriteFailure | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in wsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source unavailable ({source_name}): {message}")]
    SourceUnavailable { source_name: String, message: String },

    #[error("Page fetch failed at {token}: {cause}")]
    Fetch { token: PageToken, cause: Box<Error> },

    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Write failed on {table} ({operation}): {message}")]
    Write {
        table: String,
        operation: &'static str,
        message: String,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a `SourceUnavailable` error for the named source.
    pub fn source_unavailable(source_name: &str, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SourceUnavailable { .. } => ErrorCode::SourceUnavailable,
            Self::Fetch { .. } => ErrorCode::FetchFailed,
            Self::TableNotFound { .. } => ErrorCode::TableNotFound,
            Self::Write { .. } => ErrorCode::WriteFailure,
            Self::InvalidRecord(_) => ErrorCode::InvalidRecord,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) | Self::ConfigNotFound { .. } => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for operators.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::SourceUnavailable { source_name, .. } => Some(format!(
                "The {source_name} API did not answer cleanly. Check credentials and \
                 network access; the next run resumes from the last committed date."
            )),
            Self::Fetch { cause, .. } => cause.hint(),
            Self::Write { table, .. } => Some(format!(
                "Nothing past the last committed date was kept for {table}. \
                 Re-running is safe: the window is recomputed from the table contents."
            )),
            Self::ConfigNotFound { path } => Some(format!(
                "Create {} or pass --config <path>.",
                path.display()
            )),
            Self::Config(msg) => {
                if msg.contains("api key") || msg.contains("token") {
                    Some(
                        "Set STACKADAPT_API_KEY / GOOGLE_ACCESS_TOKEN or add the credential \
                         to the config file."
                            .to_string(),
                    )
                } else {
                    None
                }
            }
            Self::TableNotFound { .. }
            | Self::InvalidRecord(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Self::Fetch { token, .. } = self {
            obj["error"]["page_token"] = serde_json::json!(token);
        }

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::InvalidRecord("x".into()).exit_code(), 4);
        assert_eq!(Error::source_unavailable("stackadapt", "boom").exit_code(), 3);
        assert_eq!(
            Error::Write {
                table: "t".into(),
                operation: "append",
                message: "disk full".into(),
            }
            .exit_code(),
            2
        );
        assert_eq!(Error::Config("bad".into()).exit_code(), 7);
    }

    #[test]
    fn test_fetch_error_carries_page_token() {
        let err = Error::Fetch {
            token: PageToken::RowOffset(25_000),
            cause: Box::new(Error::source_unavailable("search_console", "HTTP 500")),
        };
        assert_eq!(
            err.to_string(),
            "Page fetch failed at row offset 25000: Source unavailable (search_console): HTTP 500"
        );

        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "FETCH_FAILED");
        assert_eq!(json["error"]["retryable"], true);
        assert_eq!(json["error"]["page_token"]["kind"], "row_offset");
        assert_eq!(json["error"]["page_token"]["value"], 25_000);
        assert!(json["error"]["hint"].is_string());
    }

    #[test]
    fn test_config_errors_not_retryable() {
        let err = Error::Config("missing api key".into());
        assert!(!err.error_code().is_retryable());
        assert!(err.hint().unwrap().contains("STACKADAPT_API_KEY"));
    }
}
