//! Plain-FTP transport backed by `suppaftp`'s tokio stream.
//!
//! Handles the dial timeout from `FtpConnectionConfig`, login, binary mode,
//! LIST, and chunked RETR with cancellation between chunks.

use crate::ftpsync::error::{FtpError, FtpResult};
use crate::ftpsync::transport::{CancelFlag, FtpTransport, ProgressSink};
use crate::ftpsync::types::FtpConnectionConfig;
use async_trait::async_trait;
use std::time::Duration;
use suppaftp::tokio::AsyncFtpStream;
use suppaftp::types::FileType;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

pub struct SuppaFtpTransport {
    stream: Option<AsyncFtpStream>,
    chunk_size: usize,
    last_error: Option<String>,
}

impl SuppaFtpTransport {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            stream: None,
            chunk_size: chunk_size.max(1),
            last_error: None,
        }
    }

    fn stream_mut(&mut self) -> FtpResult<&mut AsyncFtpStream> {
        self.stream.as_mut().ok_or_else(FtpError::not_connected)
    }

    /// Remember `err` for `last_error` and hand it back.
    fn record(&mut self, err: FtpError) -> FtpError {
        self.last_error = Some(err.to_string());
        err
    }
}

impl Default for SuppaFtpTransport {
    fn default() -> Self {
        Self::new(65_536)
    }
}

#[async_trait]
impl FtpTransport for SuppaFtpTransport {
    async fn connect(&mut self, config: &FtpConnectionConfig) -> FtpResult<()> {
        if self.stream.is_some() {
            self.disconnect().await;
        }

        let (host, port) = config.endpoint()?;
        let addr = format!("{}:{}", host, port);
        let dur = Duration::from_secs(config.connect_timeout_sec.max(1));

        let mut stream = match timeout(dur, AsyncFtpStream::connect(addr.as_str())).await {
            Err(_) => {
                return Err(self.record(FtpError::timeout(format!("Connect to {} timed out", addr))))
            }
            Ok(Err(e)) => {
                let err = FtpError::connection_failed(format!("Connect to {}: {}", addr, e));
                return Err(self.record(err));
            }
            Ok(Ok(s)) => s,
        };

        if let Err(e) = stream.login(config.username.as_str(), config.password.as_str()).await {
            let _ = stream.quit().await;
            let err = FtpError::auth_failed(format!("Login as '{}' failed: {}", config.username, e));
            return Err(self.record(err));
        }

        if let Err(e) = stream.transfer_type(FileType::Binary).await {
            let _ = stream.quit().await;
            return Err(self.record(FtpError::from(e)));
        }

        log::debug!("FTP control connection to {} established", addr);
        self.stream = Some(stream);
        self.last_error = None;
        Ok(())
    }

    async fn list_directory(&mut self, path: &str) -> FtpResult<String> {
        let result = self.stream_mut()?.list(Some(path)).await;
        match result {
            Ok(lines) => Ok(lines.join("\n")),
            Err(e) => {
                let err = FtpError::listing_failed(format!("LIST {} failed: {}", path, e))
                    .with_path(path);
                Err(self.record(err))
            }
        }
    }

    async fn retrieve_file(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> FtpResult<u64> {
        let chunk_size = self.chunk_size;
        let stream = self.stream_mut()?;

        // Not every server implements SIZE.
        let total = stream.size(path).await.map(|s| s as u64).unwrap_or(0);

        let mut data_stream = match stream.retr_as_stream(path).await {
            Ok(ds) => ds,
            Err(e) => {
                let err = FtpError::from(e).with_path(path);
                return Err(self.record(err));
            }
        };

        let mut buf = vec![0u8; chunk_size];
        let mut received: u64 = 0;
        let outcome: FtpResult<()> = loop {
            if cancel.is_cancelled() {
                break Err(FtpError::cancelled(format!("Download of {} cancelled", path)));
            }
            let n = match data_stream.read(&mut buf).await {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(FtpError::transfer_failed(format!("Read {}: {}", path, e))),
            };
            if let Err(e) = sink.write_all(&buf[..n]).await {
                break Err(FtpError::io_error(format!("Write for {}: {}", path, e)));
            }
            received += n as u64;
            progress.on_progress(received, total);
        };

        let stream = self.stream_mut()?;
        match outcome {
            Ok(()) => {
                if let Err(e) = stream.finalize_retr_stream(data_stream).await {
                    let err = FtpError::from(e).with_path(path);
                    return Err(self.record(err));
                }
                Ok(received)
            }
            Err(err) => {
                // ABOR may itself fail on servers that already closed the data channel.
                let _ = stream.abort(data_stream).await;
                Err(self.record(err.with_path(path)))
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.quit().await;
            log::debug!("FTP control connection closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_without_connection_is_rejected() {
        let mut t = SuppaFtpTransport::default();
        let err = t.list_directory("/").await.unwrap_err();
        assert_eq!(err.kind, crate::ftpsync::error::FtpErrorKind::NotConnected);
        assert!(!t.is_connected());
    }

    #[tokio::test]
    async fn connect_rejects_empty_host() {
        let mut t = SuppaFtpTransport::default();
        let cfg = FtpConnectionConfig::new("", 21, "u", "p");
        assert!(t.connect(&cfg).await.is_err());
    }
}
