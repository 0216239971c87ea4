//! Progress events for the presentation layer
//!
//! The engine emits one event per file per pass. How (or whether) they are
//! rendered is up to the sink.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Inventory,
    Analysis,
    Report,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Completed fraction of the phase, clamped to 0..=1
    pub fraction: f32,
    /// Display path of the file this event refers to
    pub file: Option<String>,
    /// Opaque (transferred, total) byte counters from a remote fetch
    pub transfer: Option<(u64, u64)>,
}

impl ProgressEvent {
    pub fn new(phase: Phase, fraction: f32, file: Option<String>) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            phase,
            fraction,
            file,
            transfer: None,
        }
    }

    /// Fraction for `done` of `total` items; an empty phase counts as complete.
    pub fn of(phase: Phase, done: usize, total: usize, file: Option<String>) -> Self {
        let fraction = if total == 0 {
            1.0
        } else {
            done as f32 / total as f32
        };
        Self::new(phase, fraction, file)
    }

    pub fn with_transfer(mut self, transfer: Option<(u64, u64)>) -> Self {
        self.transfer = transfer;
        self
    }
}

/// Receives progress events. Implementations must be cheap and non-blocking.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // Receiver gone means nobody is watching.
        let _ = self.send(event);
    }
}

/// Adapts a closure into a sink.
pub struct FnProgress<F>(pub F);

impl<F> ProgressSink for FnProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        (self.0)(event)
    }
}

/// Byte counters updated by remote adapters while a download runs.
///
/// The engine never interprets these; it only forwards a snapshot.
#[derive(Debug, Default)]
pub struct TransferProgress {
    transferred: AtomicU64,
    total: AtomicU64,
}

impl TransferProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, transferred: u64, total: u64) {
        self.transferred.store(transferred, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    /// `None` until an adapter reports anything.
    pub fn snapshot(&self) -> Option<(u64, u64)> {
        let transferred = self.transferred.load(Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed);
        if transferred == 0 && total == 0 {
            None
        } else {
            Some((transferred, total))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_fraction_is_clamped() {
        assert_eq!(ProgressEvent::new(Phase::Analysis, 1.7, None).fraction, 1.0);
        assert_eq!(ProgressEvent::new(Phase::Analysis, -0.2, None).fraction, 0.0);
        assert_eq!(ProgressEvent::new(Phase::Analysis, f32::NAN, None).fraction, 0.0);
    }

    #[test]
    fn test_of_handles_empty_phase() {
        assert_eq!(ProgressEvent::of(Phase::Inventory, 0, 0, None).fraction, 1.0);
        assert_eq!(ProgressEvent::of(Phase::Inventory, 1, 4, None).fraction, 0.25);
    }

    #[test]
    fn test_fn_sink_receives_events() {
        let seen = Mutex::new(Vec::new());
        let sink = FnProgress(|e: ProgressEvent| seen.lock().unwrap().push(e.phase));
        sink.emit(ProgressEvent::new(Phase::Report, 1.0, None));
        assert_eq!(*seen.lock().unwrap(), vec![Phase::Report]);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.emit(ProgressEvent::new(Phase::Inventory, 0.5, Some("a.pdf".to_string())));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.file.as_deref(), Some("a.pdf"));
    }

    #[test]
    fn test_transfer_snapshot() {
        let progress = TransferProgress::new();
        assert_eq!(progress.snapshot(), None);
        progress.update(512, 1024);
        assert_eq!(progress.snapshot(), Some((512, 1024)));
    }
}
