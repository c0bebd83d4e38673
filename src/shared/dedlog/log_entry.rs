use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use super::sanitizer::{Sanitizer, WithCollapseSpaces};
use super::COMPONENT;

/// How often accumulated entries are flushed to the log.
pub const FLUSH_EVERY: Duration = Duration::from_secs(5);

/// One dedup bucket: identical reasons within a flush window are counted.
#[derive(Debug)]
pub struct LogEntry {
    err: Option<String>,
    reason: String,
    extra: Option<String>,
    count: usize,
}

impl LogEntry {
    fn new(err: Option<String>, extra: Option<String>, reason: String) -> Self {
        Self {
            err,
            reason,
            extra,
            count: 1,
        }
    }
}

static ERR_CH: Mutex<Option<mpsc::Sender<LogEntry>>> = parking_lot::const_mutex(None);

fn err_ch() -> Option<mpsc::Sender<LogEntry>> {
    ERR_CH.try_lock().and_then(|guard| guard.clone())
}

/// Records an error without blocking; entries are dropped when the logger
/// is not running or its queue is full.
pub fn err(err: Option<&dyn std::error::Error>, extra: Option<&str>, msg: &str) {
    if let Some(tx) = err_ch() {
        let entry = LogEntry::new(
            err.map(|e| e.to_string()),
            extra.map(|s| s.to_string()),
            msg.to_string(),
        );
        let _ = tx.try_send(entry);
    }
}

/// Runs the dedup logger until the token is cancelled, flushing every
/// [`FLUSH_EVERY`].
pub async fn start_dedup_logger(shutdown_token: CancellationToken) {
    let (tx, mut rx) = mpsc::channel(1024);
    *ERR_CH.lock() = Some(tx);

    let sanitizer = Sanitizer::new(WithCollapseSpaces(true));
    let mut window: DashMap<String, LogEntry> = DashMap::new();

    let mut ticker = tokio::time::interval(FLUSH_EVERY);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                flush(&sanitizer, std::mem::take(&mut window));
                *ERR_CH.lock() = None;
                return;
            }
            Some(entry) = rx.recv() => {
                let key = bucket_key(&sanitizer, &entry);
                window
                    .entry(key)
                    .and_modify(|e| e.count += 1)
                    .or_insert(entry);
            }
            _ = ticker.tick() => {
                flush(&sanitizer, std::mem::take(&mut window));
            }
        }
    }
}

/// Entries with the same reason, the same extra context and the same
/// sanitized error share a bucket. Only the error text is sanitized, so
/// failures on different workers are counted apart.
pub(crate) fn bucket_key(sanitizer: &Sanitizer, entry: &LogEntry) -> String {
    let err = entry
        .err
        .as_deref()
        .map(|e| sanitizer.sanitize(e))
        .unwrap_or_default();
    format!(
        "{}|{}|{}",
        entry.reason,
        entry.extra.as_deref().unwrap_or(""),
        err
    )
}

fn flush(sanitizer: &Sanitizer, window: DashMap<String, LogEntry>) {
    for (_, entry) in window {
        let err = entry.err.as_deref().map(|e| sanitizer.sanitize(e));
        error!(
            component = COMPONENT,
            count = entry.count,
            err = err.as_deref().unwrap_or(""),
            extra = entry.extra.as_deref().unwrap_or(""),
            "{}",
            entry.reason
        );
    }
}

#[cfg(test)]
pub(crate) fn entry_for_test(err: Option<&str>, extra: Option<&str>, reason: &str) -> LogEntry {
    LogEntry::new(
        err.map(str::to_string),
        extra.map(str::to_string),
        reason.to_string(),
    )
}
