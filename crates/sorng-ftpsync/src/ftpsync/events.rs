//! Event delivery to the embedding application.

use crate::ftpsync::types::CoreEvent;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Receiver of session and queue notifications. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CoreEvent);
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<CoreEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<CoreEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: CoreEvent) {
        // A dropped receiver only means nobody is watching any more.
        let _ = self.tx.send(event);
    }
}

/// Writes events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: CoreEvent) {
        match event {
            CoreEvent::Listing { current_path, entries } => {
                log::info!("listing {} ({} entries)", current_path, entries.len())
            }
            CoreEvent::Log { message } => log::info!("{}", message),
            CoreEvent::TaskStarted { display_name, .. } => log::info!("downloading {}", display_name),
            CoreEvent::Progress(p) => log::trace!(
                "{}: {}/{} bytes ({}%)",
                p.display_name,
                p.bytes_received,
                p.bytes_total,
                p.percent
            ),
            CoreEvent::TaskCompleted { display_name, bytes, .. } => {
                log::info!("downloaded {} ({} bytes)", display_name, bytes)
            }
            CoreEvent::TaskFailed { display_name, error, .. } => {
                log::warn!("download of {} failed: {}", display_name, error)
            }
            CoreEvent::QueueDrained => log::info!("download queue drained"),
            CoreEvent::QueueCancelled => log::info!("download queue cancelled"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: CoreEvent) {}
}
