//! Error types for scan processing and export with rich diagnostics.
//!
//! Errors carry:
//! - Machine-readable error codes for programmatic handling
//! - The offending path or section where one exists
//! - Recovery suggestions for common issues
//! - Terminal-friendly rendering via miette
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `MESH-XXXX`:
//! - `MESH-1xxx`: I/O errors (reading, writing, importing)
//! - `MESH-2xxx`: Input errors (empty meshes, bad parameters)
//! - `MESH-3xxx`: Processing errors (cancelled runs, texture handling)
//! - `MESH-4xxx`: Format errors (unsupported or malformed data)
//!
//! Degenerate geometry is never reported through [`MeshError`]. Zero-area
//! triangles, out-of-range indices and over-large holes are filtered or
//! reported as diagnostics by the stage that meets them.
//!
//! # Example
//!
//! ```rust,ignore
//! use scan_mesh::{MeshError, ErrorCode};
//!
//! let err = MeshError::malformed("vertex section", 48, 12);
//! assert_eq!(err.code(), ErrorCode::MalformedData);
//! println!("Recovery: {}", err.recovery_suggestion());
//! ```

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Machine-readable error codes for mesh operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // I/O errors (1xxx)
    /// MESH-1001: Failed to read file
    IoRead = 1001,
    /// MESH-1002: Failed to write file
    IoWrite = 1002,
    /// MESH-1003: Failed to parse an imported file
    ParseError = 1003,

    // Input errors (2xxx)
    /// MESH-2003: Mesh has no vertices or faces
    EmptyMesh = 2003,
    /// MESH-2005: A stage or export parameter is out of range
    InvalidParameter = 2005,

    // Processing errors (3xxx)
    /// MESH-3001: Processing was cancelled between stages
    Cancelled = 3001,
    /// MESH-3007: Texture image could not be encoded or decoded
    Texture = 3007,

    // Format errors (4xxx)
    /// MESH-4001: Unsupported file format
    UnsupportedFormat = 4001,
    /// MESH-4002: Malformed or truncated data
    MalformedData = 4002,
    /// MESH-4003: Archive could not be assembled
    Archive = 4003,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `MESH-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "MESH-1001",
            ErrorCode::IoWrite => "MESH-1002",
            ErrorCode::ParseError => "MESH-1003",
            ErrorCode::EmptyMesh => "MESH-2003",
            ErrorCode::InvalidParameter => "MESH-2005",
            ErrorCode::Cancelled => "MESH-3001",
            ErrorCode::Texture => "MESH-3007",
            ErrorCode::UnsupportedFormat => "MESH-4001",
            ErrorCode::MalformedData => "MESH-4002",
            ErrorCode::Archive => "MESH-4003",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for mesh errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Capture or export the data again.
    RecaptureData { reason: String },
    /// Use a different export format.
    UseDifferentFormat { suggested: Vec<String> },
    /// Check the file system.
    CheckFileSystem { checks: Vec<String> },
    /// Adjust parameters for the operation.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Run the operation again.
    Retry,
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::RecaptureData { reason } => {
                write!(f, "Capture the scan again ({})", reason)
            }
            RecoverySuggestion::UseDifferentFormat { suggested } => {
                write!(f, "Try using a different format: {}", suggested.join(", "))
            }
            RecoverySuggestion::CheckFileSystem { checks } => {
                write!(f, "Check the file system for: {}", checks.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::Retry => write!(f, "Run the operation again"),
            RecoverySuggestion::None => write!(f, "No automatic recovery available"),
        }
    }
}

/// Errors that can occur while processing, persisting or exporting a scan.
#[derive(Debug, Error, Diagnostic)]
pub enum MeshError {
    /// Error reading from a file.
    #[error("failed to read mesh from {path}")]
    #[diagnostic(
        code(mesh::io::read),
        help("Check that the file exists and is readable")
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file. Any partial output has been removed.
    #[error("failed to write {path}")]
    #[diagnostic(
        code(mesh::io::write),
        help("Check that the directory exists, is writable and has free space")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing an imported mesh file.
    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(mesh::parse::error),
        help("The file may be corrupted or in an unsupported format variant")
    )]
    ParseError { path: PathBuf, details: String },

    /// Mesh has no vertices or faces.
    #[error("mesh is empty: {details}")]
    #[diagnostic(
        code(mesh::input::empty),
        help("The capture produced no usable geometry. Scan the object again.")
    )]
    EmptyMesh { details: String },

    /// Parameter outside its accepted range.
    #[error("invalid parameter {name} = {value}: {reason}")]
    #[diagnostic(code(mesh::input::parameter))]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Processing was cancelled between stages.
    #[error("processing cancelled before {stage}")]
    #[diagnostic(code(mesh::pipeline::cancelled))]
    Cancelled { stage: &'static str },

    /// Texture image could not be encoded or decoded.
    #[error("texture processing failed: {details}")]
    #[diagnostic(
        code(mesh::texture::failed),
        help("Export without a texture or with a smaller texture size")
    )]
    Texture { details: String },

    /// Unsupported file format.
    #[error("unsupported mesh format: {format}")]
    #[diagnostic(
        code(mesh::format::unsupported),
        help("Supported formats: STL, OBJ, PLY and the .scanmesh snapshot")
    )]
    UnsupportedFormat { format: String },

    /// Malformed or truncated data.
    #[error("malformed {section}: need {needed} bytes, have {available}")]
    #[diagnostic(
        code(mesh::format::malformed),
        help("The snapshot is truncated or corrupted and cannot be restored")
    )]
    MalformedData {
        section: String,
        needed: usize,
        available: usize,
    },

    /// A stored element count is larger than any real capture produces.
    #[error("{section} count {count} exceeds the limit of {limit}")]
    #[diagnostic(
        code(mesh::format::limit),
        help("The snapshot header is corrupted")
    )]
    CountLimit {
        section: &'static str,
        count: usize,
        limit: usize,
    },

    /// Archive could not be assembled.
    #[error("failed to build archive {path}: {details}")]
    #[diagnostic(code(mesh::format::archive))]
    Archive { path: PathBuf, details: String },
}

impl MeshError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MeshError::IoRead { .. } => ErrorCode::IoRead,
            MeshError::IoWrite { .. } => ErrorCode::IoWrite,
            MeshError::ParseError { .. } => ErrorCode::ParseError,
            MeshError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            MeshError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            MeshError::Cancelled { .. } => ErrorCode::Cancelled,
            MeshError::Texture { .. } => ErrorCode::Texture,
            MeshError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            MeshError::MalformedData { .. } | MeshError::CountLimit { .. } => {
                ErrorCode::MalformedData
            }
            MeshError::Archive { .. } => ErrorCode::Archive,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            MeshError::IoRead { .. } => RecoverySuggestion::CheckFileSystem {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            MeshError::IoWrite { .. } | MeshError::Archive { .. } => {
                RecoverySuggestion::CheckFileSystem {
                    checks: vec![
                        "directory exists".into(),
                        "write permissions".into(),
                        "free space".into(),
                    ],
                }
            }
            MeshError::ParseError { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["binary STL".into(), "OBJ".into()],
            },
            MeshError::EmptyMesh { .. } => RecoverySuggestion::RecaptureData {
                reason: "no geometry was captured".into(),
            },
            MeshError::InvalidParameter { name, .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![(
                    (*name).into(),
                    "use a value inside the documented range".into(),
                )],
            },
            MeshError::Cancelled { .. } => RecoverySuggestion::Retry,
            MeshError::Texture { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("texture_max_dimension".into(), "try a smaller value".into())],
            },
            MeshError::UnsupportedFormat { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["STL".into(), "OBJ".into(), "PLY".into()],
            },
            MeshError::MalformedData { .. } | MeshError::CountLimit { .. } => {
                RecoverySuggestion::RecaptureData {
                    reason: "the stored snapshot is unreadable".into(),
                }
            }
        }
    }

    /// Returns the file involved in the error, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            MeshError::IoRead { path, .. }
            | MeshError::IoWrite { path, .. }
            | MeshError::ParseError { path, .. }
            | MeshError::Archive { path, .. } => Some(path),
            _ => None,
        }
    }

    // Constructor helpers for common error patterns

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an EmptyMesh error.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        MeshError::EmptyMesh {
            details: details.into(),
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(
        name: &'static str,
        value: impl std::fmt::Display,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a Cancelled error.
    pub fn cancelled(stage: &'static str) -> Self {
        MeshError::Cancelled { stage }
    }

    /// Create a Texture error.
    pub fn texture(details: impl Into<String>) -> Self {
        MeshError::Texture {
            details: details.into(),
        }
    }

    /// Create an UnsupportedFormat error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        MeshError::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a MalformedData error.
    pub fn malformed(section: impl Into<String>, needed: usize, available: usize) -> Self {
        MeshError::MalformedData {
            section: section.into(),
            needed,
            available,
        }
    }

    /// Create a CountLimit error.
    pub fn count_limit(section: &'static str, count: usize, limit: usize) -> Self {
        MeshError::CountLimit {
            section,
            count,
            limit,
        }
    }

    /// Create an Archive error.
    pub fn archive(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::Archive {
            path: path.into(),
            details: details.into(),
        }
    }
}
