//! # sorng-ftpsync: FTP directory retrieval core
//!
//! Browse a remote FTP tree and pull files or whole directories down to the
//! local disk, one transfer at a time.
//!
//! Architecture:
//! - `types`: data model, config, events, progress snapshots
//! - `error`: FTP-specific error type
//! - `path`: remote path normalisation and parent computation
//! - `parser`: Unix/Windows/minimal/fallback LIST response parsing
//! - `transport`: `FtpTransport` seam, progress sink, cancel flag
//! - `connection`: `suppaftp`-backed transport
//! - `events`: event sinks (channel, log, null)
//! - `directory`: recursive download planner
//! - `queue`: sequential download queue + tick worker
//! - `session`: orchestrator (connection state, navigation, downloads)

pub mod types;
pub mod error;
pub mod path;
pub mod parser;
pub mod transport;
pub mod connection;
pub mod events;
pub mod directory;
pub mod queue;
pub mod session;

// Re-exports for lib.rs consumers
pub use types::*;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use parser::{parse_listing, ListingParser};
pub use transport::{CancelFlag, FtpTransport, ProgressSink, SharedTransport};
pub use connection::SuppaFtpTransport;
pub use events::{ChannelSink, EventSink, LogSink, NullSink};
pub use directory::DirectoryWalker;
pub use queue::{DownloadQueue, StepOutcome};
pub use session::FtpSession;
