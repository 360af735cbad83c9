//! Error types for contractr

use std::path::PathBuf;

use crate::dtype::DType;
use crate::engine::Status;
use thiserror::Error;

/// Result type alias using contractr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, selecting, or launching a contraction
#[derive(Error, Debug)]
pub enum Error {
    /// A logical dtype has no entry in the compute-type table
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// The (input, output, compute) triple is not a supported GEMM pairing
    #[error("Unsupported type pairing: input {input}, output {output}, compute {compute}")]
    UnsupportedTypes {
        /// Element type of A and B
        input: DType,
        /// Element type of C and D
        output: DType,
        /// Accumulation type
        compute: DType,
    },

    /// Host scalar does not match the compute type of the request
    #[error("Scalar '{arg}' has dtype {got}, expected {expected}")]
    ScalarTypeMismatch {
        /// Which scalar (alpha or beta)
        arg: &'static str,
        /// Dtype required by the type pairing
        expected: DType,
        /// Dtype supplied by the caller
        got: DType,
    },

    /// Index roles do not agree with the tensor descriptors
    #[error("Invalid contraction problem: {reason}")]
    InvalidProblem {
        /// Description of the violated invariant
        reason: String,
    },

    /// No compiled solution applies to the problem on this hardware
    #[error("No solution found for {problem}")]
    NoSolution {
        /// Rendered problem description
        problem: String,
    },

    /// The solution metadata file is missing or unreadable
    #[error("Cannot read solution metadata {}: {source}", path.display())]
    MetadataUnreadable {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The solution metadata file is not a valid catalog
    #[error("Malformed solution metadata {origin}: {source}")]
    MetadataParse {
        /// Where the metadata came from
        origin: String,
        /// Underlying YAML error
        source: serde_yaml::Error,
    },

    /// The catalog parsed but violates a structural rule
    #[error("Invalid solution catalog: {0}")]
    InvalidCatalog(String),

    /// The library directory could not be listed
    #[error("Failed to list kernel library {}: {source}", path.display())]
    LibraryDir {
        /// Directory being listed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A kernel module file could not be loaded
    #[error("Failed to load kernel module {}: {reason}", path.display())]
    ModuleLoad {
        /// Module file path
        path: PathBuf,
        /// Description of the failure
        reason: String,
    },

    /// The selected kernel is not present in any loaded module
    #[error("Kernel '{kernel}' not found in loaded modules")]
    KernelNotFound {
        /// Kernel function name
        kernel: String,
    },

    /// Kernel submission failed
    #[error("Kernel launch failed: {0}")]
    Launch(String),

    /// Device detection failed
    #[error("Device error: {0}")]
    Device(String),

    /// CUDA-specific error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid problem error
    pub fn invalid_problem(reason: impl Into<String>) -> Self {
        Self::InvalidProblem {
            reason: reason.into(),
        }
    }

    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }

    /// Create a metadata error naming the path that could not be read
    pub fn metadata_unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::MetadataUnreadable {
            path: path.into(),
            source,
        }
    }

    /// Create a module load error
    pub fn module_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ModuleLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Map this error onto the closed status set reported to callers.
    ///
    /// Missing solutions and type pairings the table does not know are
    /// "not implemented"; everything else is an internal error.
    pub fn status(&self) -> Status {
        match self {
            Self::NoSolution { .. }
            | Self::UnsupportedTypes { .. }
            | Self::UnsupportedDType { .. } => Status::NotImplemented,
            _ => Status::InternalError,
        }
    }

    /// Returns true for errors that must stop the process at initialization.
    pub fn is_fatal_init(&self) -> bool {
        matches!(
            self,
            Self::MetadataUnreadable { .. } | Self::MetadataParse { .. } | Self::InvalidCatalog(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let miss = Error::NoSolution {
            problem: "gemm".into(),
        };
        assert_eq!(miss.status(), Status::NotImplemented);

        let types = Error::UnsupportedTypes {
            input: DType::F64,
            output: DType::F32,
            compute: DType::F32,
        };
        assert_eq!(types.status(), Status::NotImplemented);

        assert_eq!(Error::Launch("boom".into()).status(), Status::InternalError);
        assert_eq!(
            Error::KernelNotFound {
                kernel: "k".into()
            }
            .status(),
            Status::InternalError
        );
    }

    #[test]
    fn test_metadata_error_names_path() {
        let err = Error::metadata_unreadable(
            "/opt/lib/SolutionLibrary.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.is_fatal_init());
        assert!(err.to_string().contains("/opt/lib/SolutionLibrary.yaml"));
    }
}
