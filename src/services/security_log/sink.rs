//! Security log sinks.
//!
//! - `TracingSink`: one `warn` event on target `security` (default)
//! - `StderrSink`: one JSON line on stderr
//! - `MemorySink`: in-process capture
//! - `NonBlockingSink`: bounded queue in front of any sink; full queue drops entries

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::SecurityLogEntry;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to serialize security log entry: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write security log entry: {0}")]
    Io(#[from] std::io::Error),
    #[error("security log queue is full")]
    QueueFull,
    #[error("security log queue is closed")]
    Closed,
}

pub trait SecuritySink: Send + Sync {
    fn emit(&self, entry: &SecurityLogEntry) -> Result<(), SinkError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SecuritySink for TracingSink {
    fn emit(&self, entry: &SecurityLogEntry) -> Result<(), SinkError> {
        let json = entry.to_json()?;
        tracing::warn!(target: "security", event = ?entry.event, entry = %json, "security event");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl SecuritySink for StderrSink {
    fn emit(&self, entry: &SecurityLogEntry) -> Result<(), SinkError> {
        let json = entry.to_json()?;
        let mut err = std::io::stderr().lock();
        writeln!(err, "{json}")?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<SecurityLogEntry>>,
}

impl MemorySink {
    pub fn entries(&self) -> Vec<SecurityLogEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecuritySink for MemorySink {
    fn emit(&self, entry: &SecurityLogEntry) -> Result<(), SinkError> {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(entry.clone());
        Ok(())
    }
}

/// Decouples the request path from the real sink.
///
/// Must be created inside a tokio runtime (spawns the drain task).
#[derive(Debug)]
pub struct NonBlockingSink {
    tx: mpsc::Sender<SecurityLogEntry>,
    dropped: AtomicU64,
}

impl NonBlockingSink {
    pub fn spawn(inner: Arc<dyn SecuritySink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<SecurityLogEntry>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                // A panicking sink must not end the drain loop.
                match panic::catch_unwind(AssertUnwindSafe(|| inner.emit(&entry))) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::debug!(error = %err, "security log sink failed");
                    }
                    Err(_) => {
                        tracing::debug!(event = ?entry.event, "security log sink panicked");
                    }
                }
            }
        });

        Self {
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SecuritySink for NonBlockingSink {
    fn emit(&self, entry: &SecurityLogEntry) -> Result<(), SinkError> {
        self.tx.try_send(entry.clone()).map_err(|err| {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            match err {
                TrySendError::Full(_) => SinkError::QueueFull,
                TrySendError::Closed(_) => SinkError::Closed,
            }
        })
    }
}
