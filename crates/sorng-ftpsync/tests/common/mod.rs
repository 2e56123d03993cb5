#![allow(dead_code)]

use async_trait::async_trait;
use sorng_ftpsync::transport::{CancelFlag, FtpTransport, ProgressSink};
use sorng_ftpsync::{CoreEvent, FtpConnectionConfig, FtpError, FtpResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

/// Bytes handed to the sink per simulated chunk.
pub const CHUNK: usize = 4;

#[derive(Default)]
struct FakeState {
    listings: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    blocking: HashSet<String>,
    reject_login: bool,
    calls: Vec<String>,
}

/// In-memory FTP server shared between a test and the transports it hands out.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<FakeState>>,
    started: Arc<Notify>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Serve `lines` as the LIST body of directory `path`.
    pub fn dir(self, path: &str, lines: &[String]) -> Self {
        self.with(|s| s.listings.insert(path.to_string(), lines.join("\r\n")));
        self
    }

    pub fn file(self, path: &str, body: &[u8]) -> Self {
        self.with(|s| s.files.insert(path.to_string(), body.to_vec()));
        self
    }

    /// LIST or RETR of `path` fails.
    pub fn fail(self, path: &str) -> Self {
        self.with(|s| s.failing.insert(path.to_string()));
        self
    }

    /// RETR of `path` sends one chunk, then stalls until cancelled.
    pub fn block(self, path: &str) -> Self {
        self.with(|s| s.blocking.insert(path.to_string()));
        self
    }

    pub fn reject_login(self) -> Self {
        self.with(|s| s.reject_login = true);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn retrievals(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("retr ").map(str::to_string))
            .collect()
    }

    /// Fires once a blocking transfer has written its first chunk.
    pub fn transfer_started(&self) -> Arc<Notify> {
        self.started.clone()
    }

    pub fn transport(&self) -> Box<dyn FtpTransport> {
        Box::new(FakeTransport {
            server: self.clone(),
            connected: false,
            last_error: None,
        })
    }

    pub async fn connected_transport(&self) -> Box<dyn FtpTransport> {
        let mut transport = self.transport();
        transport
            .connect(&FtpConnectionConfig::new("fake.local", 21, "u", "p"))
            .await
            .unwrap();
        transport
    }
}

pub struct FakeTransport {
    server: FakeServer,
    connected: bool,
    last_error: Option<String>,
}

impl FakeTransport {
    fn fail(&mut self, err: FtpError) -> FtpError {
        self.last_error = Some(err.to_string());
        err
    }
}

#[async_trait]
impl FtpTransport for FakeTransport {
    async fn connect(&mut self, config: &FtpConnectionConfig) -> FtpResult<()> {
        let rejected = self.server.with(|s| {
            s.calls.push(format!("connect {}", config.host));
            s.reject_login
        });
        if rejected {
            return Err(self.fail(FtpError::from_reply(530, "530 Login incorrect")));
        }
        self.connected = true;
        Ok(())
    }

    async fn list_directory(&mut self, path: &str) -> FtpResult<String> {
        if !self.connected {
            return Err(FtpError::not_connected());
        }
        let result = self.server.with(|s| {
            s.calls.push(format!("list {}", path));
            if s.failing.contains(path) {
                return Err(FtpError::from_reply(550, "550 Permission denied").with_path(path));
            }
            s.listings
                .get(path)
                .cloned()
                .ok_or_else(|| FtpError::from_reply(550, "550 No such file or directory"))
        });
        result.map_err(|e| self.fail(e))
    }

    async fn retrieve_file(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> FtpResult<u64> {
        if !self.connected {
            return Err(FtpError::not_connected());
        }
        let lookup = self.server.with(|s| {
            s.calls.push(format!("retr {}", path));
            if s.failing.contains(path) {
                return Err(FtpError::transfer_failed("426 Connection closed; transfer aborted"));
            }
            let body = s
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| FtpError::from_reply(550, "550 No such file or directory"))?;
            Ok((body, s.blocking.contains(path)))
        });
        let (body, blocking) = lookup.map_err(|e| self.fail(e))?;

        let total = body.len() as u64;
        let mut received = 0u64;
        for chunk in body.chunks(CHUNK) {
            if cancel.is_cancelled() {
                return Err(FtpError::cancelled("transfer cancelled"));
            }
            sink.write_all(chunk).await?;
            received += chunk.len() as u64;
            progress.on_progress(received, total);

            if blocking {
                sink.flush().await?;
                self.server.started.notify_one();
                while !cancel.is_cancelled() {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
                return Err(FtpError::cancelled("transfer cancelled"));
            }
        }
        Ok(received)
    }

    async fn disconnect(&mut self) {
        if self.connected {
            self.server.with(|s| s.calls.push("disconnect".to_string()));
        }
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

// ─── Listing line builders ───────────────────────────────────────────

pub fn unix_dir(name: &str) -> String {
    format!("drwxr-xr-x   2 ftp      ftp          4096 Jun 12 12:00 {}", name)
}

pub fn unix_file(name: &str, size: u64) -> String {
    format!("-rw-r--r--   1 ftp      ftp      {:>8} Jun 12 12:00 {}", size, name)
}

/// Everything currently buffered in the event channel.
pub fn drain_events(rx: &mut UnboundedReceiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
