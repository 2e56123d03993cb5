//! The network seam. Everything above this trait is testable without a
//! server; [`crate::ftpsync::connection::SuppaFtpTransport`] is the real
//! implementation.

use crate::ftpsync::error::FtpResult;
use crate::ftpsync::types::FtpConnectionConfig;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;

/// Receives `(bytes_received, bytes_total)` after every chunk. `bytes_total`
/// is 0 when the server did not report a size.
pub trait ProgressSink: Send {
    fn on_progress(&mut self, bytes_received: u64, bytes_total: u64);
}

impl<F> ProgressSink for F
where
    F: FnMut(u64, u64) + Send,
{
    fn on_progress(&mut self, bytes_received: u64, bytes_total: u64) {
        self(bytes_received, bytes_total)
    }
}

/// Shared cancellation signal checked between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One FTP control connection.
///
/// Implementations serve one request at a time; callers share a transport
/// through [`SharedTransport`] so browsing, planning and downloading never
/// interleave on the wire.
#[async_trait]
pub trait FtpTransport: Send {
    /// Dial, log in and switch to binary mode.
    async fn connect(&mut self, config: &FtpConnectionConfig) -> FtpResult<()>;

    /// Raw LIST body for `path`.
    async fn list_directory(&mut self, path: &str) -> FtpResult<String>;

    /// Stream `path` into `sink`, returning the byte count.
    ///
    /// Must stop with a `Cancelled` error once `cancel` is raised.
    async fn retrieve_file(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> FtpResult<u64>;

    /// Tear down the control connection. Never fails.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Text of the most recent failure, for log lines.
    fn last_error(&self) -> Option<String>;
}

pub type SharedTransport = Arc<Mutex<Box<dyn FtpTransport>>>;

pub fn shared(transport: Box<dyn FtpTransport>) -> SharedTransport {
    Arc::new(Mutex::new(transport))
}
