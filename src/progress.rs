// src/progress.rs

//! Progress reporting for object hashing and transfers
//!
//! Hashing, uploading and downloading objects report one event per chunk
//! read, so a front-end can size a bar from the total chunk count of the
//! operation. Implementations:
//! - `SilentProgress`: counts events, prints nothing
//! - `LogProgress`: logs roughly every tenth of the way through tracing
//! - `CliProgress`: an indicatif progress bar
//! - `CallbackProgress`: forwards events to a closure
//!
//! Callbacks are invoked synchronously from the thread doing the I/O.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Receiver of chunk-level progress events
pub trait TransferProgress: Send + Sync {
    /// A new operation of `total` chunks begins
    fn start(&self, message: &str, total: u64);

    /// One chunk was read (hashed, uploaded or skipped as already stored)
    fn object_read(&self);

    /// The current operation ended
    fn finish(&self, message: &str);
}

/// Silent progress tracker (no-op apart from counting)
#[derive(Debug, Default)]
pub struct SilentProgress {
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks reported since the last `start`
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    pub fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

impl TransferProgress for SilentProgress {
    fn start(&self, _message: &str, total: u64) {
        self.position.store(0, Ordering::Relaxed);
        self.length.store(total, Ordering::Relaxed);
        self.finished.store(false, Ordering::Relaxed);
    }

    fn object_read(&self) {
        self.position.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

/// Logging progress tracker
///
/// Logs progress updates to tracing at info level, about ten times per
/// operation.
#[derive(Debug, Default)]
pub struct LogProgress {
    name: std::sync::Mutex<String>,
    position: AtomicU64,
    length: AtomicU64,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferProgress for LogProgress {
    fn start(&self, message: &str, total: u64) {
        if let Ok(mut name) = self.name.lock() {
            *name = message.to_string();
        }
        self.position.store(0, Ordering::Relaxed);
        self.length.store(total, Ordering::Relaxed);
        info!("{}: {} chunks", message, total);
    }

    fn object_read(&self) {
        let new_pos = self.position.fetch_add(1, Ordering::Relaxed) + 1;
        let length = self.length.load(Ordering::Relaxed);
        let interval = std::cmp::max(1, length / 10);
        if length > 0 && new_pos % interval == 0 {
            let name = self.name.lock().map(|n| n.clone()).unwrap_or_default();
            info!("{}: {}% ({}/{})", name, (new_pos * 100) / length, new_pos, length);
        }
    }

    fn finish(&self, message: &str) {
        info!("{}", message);
    }
}

/// Terminal progress bar
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template("{msg:24} [{bar:40.cyan/blue}] {pos}/{len} chunks")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress for CliProgress {
    fn start(&self, message: &str, total: u64) {
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_message(message.to_string());
    }

    fn object_read(&self) {
        self.bar.inc(1);
    }

    fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Events emitted by [`CallbackProgress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { message: String, total: u64 },
    ObjectRead,
    Finished(String),
}

/// Callback-based progress tracker
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> TransferProgress for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn start(&self, message: &str, total: u64) {
        (self.callback)(ProgressEvent::Started {
            message: message.to_string(),
            total,
        });
    }

    fn object_read(&self) {
        (self.callback)(ProgressEvent::ObjectRead);
    }

    fn finish(&self, message: &str) {
        (self.callback)(ProgressEvent::Finished(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_silent_progress() {
        let progress = SilentProgress::new();
        progress.start("hashing", 3);
        progress.object_read();
        progress.object_read();
        assert_eq!(progress.position(), 2);
        assert_eq!(progress.length(), 3);
        assert!(!progress.is_finished());

        progress.finish("done");
        assert!(progress.is_finished());

        progress.start("uploading", 5);
        assert_eq!(progress.position(), 0);
    }

    #[test]
    fn test_log_progress() {
        let progress = LogProgress::new();
        progress.start("test", 100);
        for _ in 0..25 {
            progress.object_read();
        }
        assert_eq!(progress.position.load(Ordering::Relaxed), 25);
        progress.finish("complete");
    }

    #[test]
    fn test_callback_progress() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let progress = CallbackProgress::new(move |event| {
            events_clone.lock().unwrap().push(event);
        });

        progress.start("uploading", 1);
        progress.object_read();
        progress.finish("done");

        let captured = events.lock().unwrap();
        assert_eq!(
            *captured,
            vec![
                ProgressEvent::Started {
                    message: "uploading".to_string(),
                    total: 1
                },
                ProgressEvent::ObjectRead,
                ProgressEvent::Finished("done".to_string()),
            ]
        );
    }
}
