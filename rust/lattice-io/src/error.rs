// rust/lattice-io/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LatticeError {

    #[error("Allocation failed: {message}")]
    Alloc {
        message: String,
    },

    #[error("Unknown volume format code {code}")]
    BadVolumeFormat {
        code: i32,
    },

    #[error("Sitelist mismatch: {message}")]
    BadSitelist {
        message: String,
    },

    #[error("Read {actual} bytes, expected {expected}")]
    BadReadBytes {
        expected: u64,
        actual: u64,
    },

    #[error("Wrote {actual} bytes, expected {expected}")]
    BadWriteBytes {
        expected: u64,
        actual: u64,
    },

    #[error("File info mismatch: {message}")]
    BadFileInfo {
        message: String,
    },

    #[error("Record info mismatch: {message}")]
    BadRecordInfo {
        message: String,
    },

    #[error("Checksum mismatch: file has {expected:?}, computed {computed:?}")]
    ChecksumMismatch {
        expected: (u32, u32),
        computed: (u32, u32),
    },

    #[error("Failed to open '{path}'")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Master node {master} is not its own I/O node (found {io_node})")]
    BadIoNode {
        master: usize,
        io_node: usize,
    },

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Transport error on node {node}: {message}")]
    Transport {
        node: usize,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid call: {message}")]
    Usage {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LatticeError>;

// Convenience constructors
impl LatticeError {

    pub fn alloc(message: impl Into<String>) -> Self {
        Self::Alloc {
            message: message.into(),
        }
    }

    pub fn bad_sitelist(message: impl Into<String>) -> Self {
        Self::BadSitelist {
            message: message.into(),
        }
    }

    pub fn bad_file_info(message: impl Into<String>) -> Self {
        Self::BadFileInfo {
            message: message.into(),
        }
    }

    pub fn bad_record_info(message: impl Into<String>) -> Self {
        Self::BadRecordInfo {
            message: message.into(),
        }
    }

    pub fn open_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OpenFailed {
            path: path.into(),
            source: Some(source),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn transport(node: usize, message: impl Into<String>) -> Self {
        Self::Transport {
            node,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}
