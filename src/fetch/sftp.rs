// src/fetch/sftp.rs

use ssh2::{ErrorCode, Session};
use std::{
    io::{Cursor, Read},
    net::TcpStream,
    path::Path,
    time::Instant,
};
use tracing::{debug, info, warn};

use super::{FetchError, RemoteSource};
use crate::config::SftpConfig;

/// libssh2 `LIBSSH2_FX_NO_SUCH_FILE`.
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Upper bound on the buffer reserved up front from the server-reported size.
const MAX_PREALLOC: u64 = 64 << 20;

/// Downloads exports over SFTP, one session per file.
#[derive(Debug, Clone)]
pub struct SftpSource {
    config: SftpConfig,
}

impl SftpSource {
    pub fn new(config: SftpConfig) -> Self {
        Self { config }
    }

    fn connect(&self) -> Result<Session, FetchError> {
        let tcp = TcpStream::connect((self.config.host.as_str(), self.config.port))?;
        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.userauth_password(&self.config.username, &self.config.password)?;
        debug!(host = %self.config.host, port = self.config.port, "sftp session authenticated");
        Ok(session)
    }
}

impl RemoteSource for SftpSource {
    #[tracing::instrument(level = "info", skip(self), fields(host = %self.config.host))]
    fn fetch(&self, remote: &str) -> Result<Cursor<Vec<u8>>, FetchError> {
        let start = Instant::now();
        let session = self.connect()?;

        // the session is torn down whatever the download did
        let result = download(&session, remote);
        if let Err(e) = session.disconnect(None, "download finished", None) {
            warn!("sftp disconnect failed: {}", e);
        }

        let buf = result?;
        info!(bytes = buf.len(), elapsed = ?start.elapsed(), "downloaded");
        Ok(Cursor::new(buf))
    }
}

fn download(session: &Session, remote: &str) -> Result<Vec<u8>, FetchError> {
    let sftp = session.sftp()?;
    let mut file = sftp.open(Path::new(remote)).map_err(|e| {
        if is_missing_file(&e) {
            FetchError::NotFound(remote.to_string())
        } else {
            FetchError::Ssh(e)
        }
    })?;

    let size_hint = file.stat().ok().and_then(|s| s.size);
    let mut buf = Vec::with_capacity(prealloc_len(size_hint));
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// The stat size is only a hint; a bogus value must not reserve gigabytes.
fn prealloc_len(size_hint: Option<u64>) -> usize {
    size_hint.unwrap_or(0).min(MAX_PREALLOC) as usize
}

fn is_missing_file(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prealloc_is_capped() {
        assert_eq!(prealloc_len(None), 0);
        assert_eq!(prealloc_len(Some(4_096)), 4_096);
        assert_eq!(prealloc_len(Some(MAX_PREALLOC)), MAX_PREALLOC as usize);
        assert_eq!(prealloc_len(Some(u64::MAX)), MAX_PREALLOC as usize);
    }

    #[test]
    fn test_missing_file_detection() {
        let missing = ssh2::Error::new(ErrorCode::SFTP(SFTP_NO_SUCH_FILE), "no such file");
        assert!(is_missing_file(&missing));

        let denied = ssh2::Error::new(ErrorCode::SFTP(3), "permission denied");
        assert!(!is_missing_file(&denied));

        let session = ssh2::Error::new(ErrorCode::Session(-18), "authentication failed");
        assert!(!is_missing_file(&session));
    }

    #[test]
    fn test_not_found_message() {
        let err = FetchError::NotFound("orders_2024-01-31.csv".into());
        assert_eq!(err.to_string(), "No se encontró orders_2024-01-31.csv");
    }

    #[test]
    fn test_transport_error_keeps_raw_message() {
        let err: FetchError = ssh2::Error::new(ErrorCode::Session(-18), "authentication failed").into();
        assert!(err.to_string().contains("authentication failed"));
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        // port 1 on localhost is closed on any sane test box
        let source = SftpSource::new(SftpConfig {
            host: "127.0.0.1".into(),
            port: 1,
            username: "nobody".into(),
            password: "nothing".into(),
        });
        let err = source.fetch("orders_2024-01-31.csv").unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
    }
}
