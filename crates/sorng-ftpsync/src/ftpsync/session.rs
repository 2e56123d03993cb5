//! Session orchestrator: connection state, navigation, and download
//! requests.
//!
//! The session owns the transport (shared with its download queue), the
//! current remote path and the navigation history. Every successful listing
//! replaces the stored entries wholesale and is published as a
//! [`CoreEvent::Listing`].

use crate::ftpsync::connection::SuppaFtpTransport;
use crate::ftpsync::directory::DirectoryWalker;
use crate::ftpsync::error::{FtpError, FtpResult};
use crate::ftpsync::events::EventSink;
use crate::ftpsync::parser::ListingParser;
use crate::ftpsync::path;
use crate::ftpsync::queue::DownloadQueue;
use crate::ftpsync::transport::{shared, FtpTransport, SharedTransport};
use crate::ftpsync::types::*;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct FtpSession {
    transport: SharedTransport,
    parser: ListingParser,
    config: CoreConfig,
    state: ConnectionState,
    current_path: String,
    history: Vec<String>,
    entries: Vec<ListingEntry>,
    queue: DownloadQueue,
    worker: Option<JoinHandle<()>>,
    events: Arc<dyn EventSink>,
}

impl FtpSession {
    pub fn new(transport: Box<dyn FtpTransport>, config: CoreConfig, events: Arc<dyn EventSink>) -> Self {
        let transport = shared(transport);
        let queue = DownloadQueue::new(transport.clone(), events.clone(), config.queue.clone());
        Self {
            transport,
            parser: ListingParser::new(config.fallback_policy),
            config,
            state: ConnectionState::Disconnected,
            current_path: "/".into(),
            history: Vec::new(),
            entries: Vec::new(),
            queue,
            worker: None,
            events,
        }
    }

    /// A session over a real `suppaftp` connection.
    pub fn with_suppaftp(config: CoreConfig, events: Arc<dyn EventSink>) -> Self {
        let transport = SuppaFtpTransport::new(config.queue.chunk_size);
        Self::new(Box::new(transport), config, events)
    }

    // ─── Connection lifecycle ────────────────────────────────────────

    /// Connect with explicit credentials, keeping the configured timeout.
    pub async fn connect(&mut self, host: &str, port: u16, username: &str, password: &str) -> FtpResult<()> {
        let config = FtpConnectionConfig {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            ..self.config.connection.clone()
        };
        self.connect_with(config).await
    }

    /// Connect and validate the login by listing `/`.
    ///
    /// On success the session is `Connected` at `/` with empty history and
    /// the root listing has been published. On failure the transport is
    /// torn down and the session stays `Disconnected`.
    pub async fn connect_with(&mut self, config: FtpConnectionConfig) -> FtpResult<()> {
        let (host, port) = config.endpoint()?;

        if self.state == ConnectionState::Connected {
            self.disconnect().await;
        }

        self.log(format!("Connecting to {}:{} as {}", host, port, config.username));
        let result = {
            let mut transport = self.transport.lock().await;
            match transport.connect(&config).await {
                Ok(()) => transport.list_directory("/").await,
                Err(e) => Err(e),
            }
        };

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                self.transport.lock().await.disconnect().await;
                self.log(format!("Connection to {} failed: {}", host, e));
                return Err(e);
            }
        };

        self.config.connection = config;
        self.state = ConnectionState::Connected;
        self.current_path = "/".into();
        self.history.clear();
        self.log(format!("Connected to {}:{}", host, port));

        let entries = self.parser.parse_text(&raw);
        self.publish(entries);
        Ok(())
    }

    /// Tear down the connection. Safe to call when already disconnected.
    ///
    /// A running download queue is cancelled first; an in-flight transfer
    /// releases the transport before the connection is closed.
    pub async fn disconnect(&mut self) {
        if self.queue.state() == QueueState::Running {
            // Only fails when the queue is not running.
            let _ = self.queue.cancel();
        }

        self.transport.lock().await.disconnect().await;

        let was_connected = self.state == ConnectionState::Connected;
        self.state = ConnectionState::Disconnected;
        self.current_path = "/".into();
        self.history.clear();
        self.entries.clear();
        self.events.emit(CoreEvent::Listing {
            current_path: self.current_path.clone(),
            entries: Vec::new(),
        });
        if was_connected {
            self.log("Disconnected");
        }
    }

    // ─── Navigation ──────────────────────────────────────────────────

    /// List `path` and make it the current directory.
    ///
    /// A different path pushes the old one onto the history. A failed
    /// listing leaves path, history and entries untouched.
    pub async fn list(&mut self, path: &str) -> FtpResult<Vec<ListingEntry>> {
        self.show(path, true).await
    }

    /// Re-list the current directory.
    pub async fn refresh(&mut self) -> FtpResult<Vec<ListingEntry>> {
        let current = self.current_path.clone();
        self.show(&current, false).await
    }

    /// List the child directory `name` of the current directory.
    pub async fn enter(&mut self, name: &str) -> FtpResult<Vec<ListingEntry>> {
        if name == ".." {
            return self.go_up().await;
        }
        let target = path::join_dir(&self.current_path, name);
        self.list(&target).await
    }

    /// List the lexical parent of the current directory.
    pub async fn go_up(&mut self) -> FtpResult<Vec<ListingEntry>> {
        let parent = path::parent_directory(&self.current_path);
        self.list(&parent).await
    }

    /// Return to the previously visited directory.
    ///
    /// With an empty history this falls back to the lexical parent. Returns
    /// `None` when there is nowhere to go (empty history at `/`).
    pub async fn go_back(&mut self) -> FtpResult<Option<Vec<ListingEntry>>> {
        if let Some(previous) = self.history.last().cloned() {
            let entries = self.show(&previous, false).await?;
            self.history.pop();
            return Ok(Some(entries));
        }

        let parent = path::parent_directory(&self.current_path);
        if parent == self.current_path {
            return Ok(None);
        }
        self.show(&parent, false).await.map(Some)
    }

    /// Act on a selected entry: `..` goes back, a directory is entered, a
    /// file is described in the log.
    pub async fn open(&mut self, entry: &ListingEntry) -> FtpResult<Option<Vec<ListingEntry>>> {
        if entry.is_parent_link() || entry.name == ".." {
            return self.go_back().await;
        }
        if entry.is_directory {
            return self.enter(&entry.name).await.map(Some);
        }
        self.log(format!(
            "{}  {}  {}",
            entry.name,
            entry.display_size(),
            entry.raw_date
        ));
        Ok(None)
    }

    async fn show(&mut self, path: &str, record_history: bool) -> FtpResult<Vec<ListingEntry>> {
        self.ensure_connected()?;
        let target = path::normalize_dir(path);

        let result = self.transport.lock().await.list_directory(&target).await;
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                self.log(format!("Listing {} failed: {}", target, e));
                return Err(e);
            }
        };

        if target != self.current_path {
            let previous = std::mem::replace(&mut self.current_path, target);
            if record_history {
                self.history.push(previous);
            }
        }

        let entries = self.parser.parse_text(&raw);
        Ok(self.publish(entries))
    }

    /// Store and broadcast a listing, prepending `..` below the root.
    fn publish(&mut self, parsed: Vec<ListingEntry>) -> Vec<ListingEntry> {
        let mut entries = Vec::with_capacity(parsed.len() + 1);
        if self.current_path != "/" {
            entries.push(ListingEntry::parent_link());
        }
        entries.extend(parsed);

        self.entries = entries.clone();
        self.log(format!("Listed {} ({} entries)", self.current_path, entries.len()));
        self.events.emit(CoreEvent::Listing {
            current_path: self.current_path.clone(),
            entries: entries.clone(),
        });
        entries
    }

    // ─── Downloads ───────────────────────────────────────────────────

    /// Queue `entry` (from the current directory) for download.
    ///
    /// A directory is planned recursively into `local_destination/<name>`;
    /// a file is saved to `local_destination` exactly.
    pub async fn request_download(
        &mut self,
        entry: &ListingEntry,
        local_destination: impl AsRef<Path>,
    ) -> FtpResult<DownloadReport> {
        self.ensure_connected()?;
        if entry.is_parent_link() || entry.name == "." || entry.name == ".." {
            return Err(FtpError::invalid_state("Navigation entries cannot be downloaded"));
        }
        if !path::is_safe_component(&entry.name) {
            return Err(FtpError::invalid_config(format!("Unsafe entry name '{}'", entry.name)));
        }
        let local_destination = local_destination.as_ref();

        let report = if entry.is_directory {
            let remote = path::join_dir(&self.current_path, &entry.name);
            let local_root = local_destination.join(&entry.name);
            self.log(format!("Preparing directory download: {} -> {}", remote, local_root.display()));

            let plan = {
                let mut transport = self.transport.lock().await;
                let mut walker = DirectoryWalker::new(&mut **transport, &self.parser, &self.config.walker);
                walker.plan_download(&remote, &local_root).await
            };
            for branch in &plan.abandoned {
                self.log(format!("Skipped {}: {}", branch.remote_path, branch.reason));
            }

            let report = DownloadReport {
                enqueued: plan.tasks.len(),
                total_bytes: plan.total_bytes(),
                abandoned: plan.abandoned,
            };
            self.queue.enqueue_all(plan.tasks);
            report
        } else {
            let remote = path::join(&self.current_path, &entry.name);
            self.log(format!("Preparing file download: {} -> {}", remote, local_destination.display()));
            let task = DownloadTask::file(&remote, local_destination, entry.size_bytes, Some(entry.name.clone()));
            self.queue.enqueue(task);
            DownloadReport {
                enqueued: 1,
                total_bytes: entry.size_bytes,
                abandoned: Vec::new(),
            }
        };

        self.ensure_worker();
        Ok(report)
    }

    fn ensure_worker(&mut self) {
        if let Some(worker) = self.queue.ensure_worker() {
            self.worker = Some(worker);
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Entries of the last successful listing, including any `..`.
    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn ensure_connected(&self) -> FtpResult<()> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Disconnected => Err(FtpError::not_connected()),
        }
    }

    fn log(&self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{}", message);
        self.events.emit(CoreEvent::Log { message });
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
