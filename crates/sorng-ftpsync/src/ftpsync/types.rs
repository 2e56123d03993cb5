//! Shared types for the FTP-sync crate.

use crate::ftpsync::error::{FtpError, FtpResult};
use crate::ftpsync::path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

// ─── Connection / Session ────────────────────────────────────────────

/// Connection state of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Configuration for a single FTP connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConnectionConfig {
    /// Host name, address, or `ftp://host[:port]/` URL.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Friendly label shown in the UI.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_port() -> u16 {
    21
}
fn default_username() -> String {
    "anonymous".into()
}
fn default_password() -> String {
    "anonymous@".into()
}
fn default_connect_timeout() -> u64 {
    15
}

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            connect_timeout_sec: default_connect_timeout(),
            label: None,
        }
    }
}

impl FtpConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Resolve the `(host, port)` pair to dial.
    ///
    /// Accepts a bare host (`ftp.example.com`) or an `ftp://` URL. A port
    /// embedded in the URL wins over `self.port`.
    pub fn endpoint(&self) -> FtpResult<(String, u16)> {
        let raw = self.host.trim();
        if raw.is_empty() {
            return Err(FtpError::invalid_config("Host must not be empty"));
        }

        if raw.contains("://") {
            let url = url::Url::parse(raw)
                .map_err(|e| FtpError::invalid_config(format!("Invalid host URL '{}': {}", raw, e)))?;
            if url.scheme() != "ftp" {
                return Err(FtpError::invalid_config(format!(
                    "Unsupported scheme '{}' (only ftp:// is supported)",
                    url.scheme()
                )));
            }
            let host = url
                .host_str()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| FtpError::invalid_config(format!("No host in '{}'", raw)))?;
            return Ok((host.to_string(), url.port().unwrap_or(self.port)));
        }

        Ok((raw.trim_end_matches('/').to_string(), self.port))
    }
}

// ─── Directory Listing ───────────────────────────────────────────────

/// Which recogniser produced an entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ListingFormat {
    /// Full `ls -l` line.
    Unix,
    /// Windows / IIS `MM-DD-YY HH:MMAM <DIR>|size name`.
    Windows,
    /// Leading type marker plus trailing name, nothing else recognised.
    Minimal,
    /// Whitespace split; directory-ness guessed by `FallbackPolicy`.
    Fallback,
    /// Synthetic `..` navigation entry, never reported by the server.
    ParentLink,
}

impl ListingFormat {
    /// Whether the directory flag is a guess rather than a parsed field.
    pub fn is_heuristic(&self) -> bool {
        matches!(self, ListingFormat::Fallback)
    }
}

/// How the fallback rule decides whether an unrecognised line is a directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum FallbackPolicy {
    /// First whitespace token starts with `d`.
    #[default]
    LeadingMarker,
    /// Name contains no `.`.
    NoExtension,
    /// Never a directory.
    AlwaysFile,
}

/// One entry decoded from a listing line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub name: String,
    pub is_directory: bool,
    /// 0 for directories or when unknown.
    pub size_bytes: u64,
    /// Date text exactly as the server sent it.
    pub raw_date: String,
    pub format: ListingFormat,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub link_target: Option<String>,
}

impl ListingEntry {
    /// The `..` entry prepended to non-root listings.
    pub fn parent_link() -> Self {
        Self {
            name: "..".into(),
            is_directory: true,
            size_bytes: 0,
            raw_date: String::new(),
            format: ListingFormat::ParentLink,
            permissions: None,
            link_target: None,
        }
    }

    pub fn is_parent_link(&self) -> bool {
        self.format == ListingFormat::ParentLink
    }

    /// Human-readable size; empty for directories.
    pub fn display_size(&self) -> String {
        if self.is_directory {
            String::new()
        } else {
            format_size(self.size_bytes)
        }
    }
}

/// Render a byte count as `B`, `KB`, `MB` or `GB`.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b < KB => format!("{} B", b),
        b if b < MB => format!("{:.2} KB", b as f64 / KB as f64),
        b if b < GB => format!("{:.2} MB", b as f64 / MB as f64),
        b => format!("{:.2} GB", b as f64 / GB as f64),
    }
}

// ─── Download tasks ──────────────────────────────────────────────────

/// A unit of work for the download queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTask {
    pub id: String,
    /// Absolute remote path; ends in `/` iff `is_directory`.
    pub remote_path: String,
    pub local_path: PathBuf,
    pub is_directory: bool,
    pub display_name: String,
    /// Advisory, used for progress when the transport reports no total.
    pub size_bytes: u64,
}

impl DownloadTask {
    /// A file transfer task. `display_name` defaults to the remote basename.
    pub fn file(
        remote_path: &str,
        local_path: impl Into<PathBuf>,
        size_bytes: u64,
        display_name: Option<String>,
    ) -> Self {
        let remote_path = path::normalize_file(remote_path);
        let display_name = display_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| path::basename(&remote_path).to_string());
        Self {
            id: Uuid::new_v4().to_string(),
            remote_path,
            local_path: local_path.into(),
            is_directory: false,
            display_name,
            size_bytes,
        }
    }

    /// A "make sure this local directory exists" task.
    pub fn directory(remote_path: &str, local_path: impl Into<PathBuf>) -> Self {
        let remote_path = path::normalize_dir(remote_path);
        let display_name = path::basename(&remote_path).to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            remote_path,
            local_path: local_path.into(),
            is_directory: true,
            display_name,
            size_bytes: 0,
        }
    }
}

/// A subtree the walker could not plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedBranch {
    pub remote_path: String,
    pub local_path: PathBuf,
    pub reason: String,
}

/// Ordered result of planning a recursive download.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPlan {
    pub tasks: Vec<DownloadTask>,
    pub abandoned: Vec<AbandonedBranch>,
}

impl DownloadPlan {
    pub fn total_bytes(&self) -> u64 {
        self.tasks.iter().map(|t| t.size_bytes).sum()
    }

    pub fn file_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_directory).count()
    }
}

/// What `request_download` put on the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    pub enqueued: usize,
    pub total_bytes: u64,
    pub abandoned: Vec<AbandonedBranch>,
}

// ─── Queue ───────────────────────────────────────────────────────────

/// Executor state of the download queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum QueueState {
    #[default]
    Idle,
    Running,
    Cancelling,
}

/// Terminal state of an executed task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Completed,
    Failed,
    Cancelled,
}

/// Bookkeeping for one executed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task: DownloadTask,
    pub state: TaskState,
    pub bytes: u64,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Live progress snapshot for the in-flight file task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub task_id: String,
    pub display_name: String,
    pub bytes_received: u64,
    /// 0 when neither the transport nor the task knows the size.
    pub bytes_total: u64,
    pub percent: u8,
}

impl TransferProgress {
    pub fn new(task: &DownloadTask, bytes_received: u64, transport_total: u64) -> Self {
        let bytes_total = if transport_total > 0 {
            transport_total
        } else {
            task.size_bytes
        };
        Self {
            task_id: task.id.clone(),
            display_name: task.display_name.clone(),
            bytes_received,
            bytes_total,
            percent: progress_percent(bytes_received, bytes_total),
        }
    }
}

/// Percentage for a progress bar. With an unknown total the bar creeps
/// one point per KiB and never claims completion.
pub fn progress_percent(received: u64, total: u64) -> u8 {
    if total > 0 {
        (received.saturating_mul(100) / total).min(100) as u8
    } else {
        (received / 1024).min(99) as u8
    }
}

/// Counters returned by `DownloadQueue::status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub state: QueueState,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub bytes_downloaded: u64,
}

/// Configuration for the download queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    /// Period of the worker tick; one unit of work per tick.
    #[serde(default = "default_tick")]
    pub tick_interval_ms: u64,
    /// Read size used by transports when streaming a file.
    #[serde(default = "default_chunk")]
    pub chunk_size: usize,
    /// Delete the partial local file when a transfer fails (cancellation
    /// always deletes it).
    #[serde(default = "default_true")]
    pub discard_partial_on_failure: bool,
}

fn default_tick() -> u64 {
    100
}
fn default_chunk() -> usize {
    65_536
}
fn default_true() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick(),
            chunk_size: default_chunk(),
            discard_partial_on_failure: default_true(),
        }
    }
}

/// Configuration for the recursive download planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkerConfig {
    /// Deepest directory level to descend into below the requested root
    /// (`None` = unlimited, `Some(0)` = root only).
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Top-level configuration for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    #[serde(default)]
    pub connection: FtpConnectionConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub walker: WalkerConfig,
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,
}

impl CoreConfig {
    pub fn from_json(text: &str) -> FtpResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| FtpError::invalid_config(format!("Invalid configuration: {}", e)))
    }
}

// ─── Events ──────────────────────────────────────────────────────────

/// Notifications delivered to the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CoreEvent {
    #[serde(rename_all = "camelCase")]
    Listing {
        current_path: String,
        entries: Vec<ListingEntry>,
    },
    #[serde(rename_all = "camelCase")]
    Log { message: String },
    #[serde(rename_all = "camelCase")]
    TaskStarted { task_id: String, display_name: String },
    Progress(TransferProgress),
    #[serde(rename_all = "camelCase")]
    TaskCompleted {
        task_id: String,
        display_name: String,
        bytes: u64,
    },
    #[serde(rename_all = "camelCase")]
    TaskFailed {
        task_id: String,
        display_name: String,
        error: String,
    },
    QueueDrained,
    QueueCancelled,
}
