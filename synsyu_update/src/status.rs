/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::status
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Deliver batch progress to callers: per-file errors, per-file
    successes, and batch completion.

  Security / Safety Notes:
    Sinks receive identities and error summaries only.

  Dependencies:
    tokio::sync::mpsc for the channel-backed sink.

  Operational Scope:
    Invoked by the batch coordinator as it collects task
    results; never from inside worker tasks.

  Revision History:
    2025-11-12 COD  Introduced status sinks and update events.
  ------------------------------------------------------------
  SSE Principles Observed:
    - No silent failure paths
    - Structured events over ad-hoc callbacks
============================================================*/

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::BatchError;
use crate::logger::Logger;

/// Receiver of batch notifications.
pub trait StatusSink: Send + Sync {
    /// A file failed, timed out, or the batch was interrupted.
    fn handle_error(&self, error: &BatchError);

    /// `id` was installed at `newest_version`.
    fn file_update(&self, id: &str, newest_version: &str);

    /// `id` was removed because it should no longer exist.
    fn file_removed(&self, _id: &str) {}

    /// The batch finished; `changed` is true if any file changed.
    fn handle_complete(&self, changed: bool);
}

/// Sink used when the caller supplies none. Errors still reach stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn handle_error(&self, error: &BatchError) {
        eprintln!("[Syn-Syu-Update] {error}");
    }

    fn file_update(&self, _id: &str, _newest_version: &str) {}

    fn handle_complete(&self, _changed: bool) {}
}

/// Sink that records every notification in the session log.
pub struct LogSink {
    logger: Arc<Logger>,
}

impl LogSink {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }
}

impl StatusSink for LogSink {
    fn handle_error(&self, error: &BatchError) {
        self.logger.error("FAIL", error.to_string());
    }

    fn file_update(&self, id: &str, newest_version: &str) {
        self.logger
            .info("UPDATED", format!("{id} now at {newest_version}"));
    }

    fn file_removed(&self, id: &str) {
        self.logger.info("REMOVED", format!("{id} removed"));
    }

    fn handle_complete(&self, changed: bool) {
        self.logger
            .info("BATCH", format!("Batch complete; changed={changed}"));
    }
}

/// Structured form of every sink notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Error(BatchError),
    FileUpdated { id: String, version: String },
    FileRemoved { id: String },
    Completed { changed: bool },
}

/// Sink that forwards notifications to a channel for the caller to consume.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<UpdateEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UpdateEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: UpdateEvent) {
        // A dropped receiver means the caller stopped listening.
        let _ = self.sender.send(event);
    }
}

impl StatusSink for ChannelSink {
    fn handle_error(&self, error: &BatchError) {
        self.send(UpdateEvent::Error(error.clone()));
    }

    fn file_update(&self, id: &str, newest_version: &str) {
        self.send(UpdateEvent::FileUpdated {
            id: id.to_string(),
            version: newest_version.to_string(),
        });
    }

    fn file_removed(&self, id: &str) {
        self.send(UpdateEvent::FileRemoved { id: id.to_string() });
    }

    fn handle_complete(&self, changed: bool) {
        self.send(UpdateEvent::Completed { changed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_events_in_order() {
        let (sink, mut events) = ChannelSink::new();
        sink.file_update("app.exe", "1.2");
        sink.file_removed("old.dll");
        sink.handle_error(&BatchError::Interrupted);
        sink.handle_complete(true);

        assert_eq!(
            events.try_recv().unwrap(),
            UpdateEvent::FileUpdated {
                id: "app.exe".into(),
                version: "1.2".into()
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            UpdateEvent::FileRemoved {
                id: "old.dll".into()
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            UpdateEvent::Error(BatchError::Interrupted)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            UpdateEvent::Completed { changed: true }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn channel_sink_tolerates_dropped_receiver() {
        let (sink, events) = ChannelSink::new();
        drop(events);
        sink.handle_complete(false);
    }

    #[test]
    fn log_sink_writes_to_session_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.log");
        let logger = Arc::new(Logger::new(Some(path.clone()), false).unwrap());
        let sink = LogSink::new(logger);
        sink.file_update("app.exe", "1.2");
        sink.handle_complete(true);

        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("[UPDATED] app.exe now at 1.2"));
        assert!(contents.contains("changed=true"));
    }
}
