// src/fetch/mod.rs

use std::io::{self, Cursor};
use thiserror::Error;

pub mod sftp;

pub use sftp::SftpSource;

/// Why a remote export could not be downloaded.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The export for the requested date has not been published.
    #[error("No se encontró {0}")]
    NotFound(String),

    #[error(transparent)]
    Ssh(#[from] ssh2::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Somewhere a named export file can be read from.
///
/// Implementations block; async callers should run them on the blocking pool.
pub trait RemoteSource {
    /// Download `remote` fully into memory. The returned cursor is positioned
    /// at the start of the file.
    fn fetch(&self, remote: &str) -> Result<Cursor<Vec<u8>>, FetchError>;
}
