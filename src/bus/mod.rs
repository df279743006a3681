//! Lifecycle event bus.
//!
//! The orchestrator publishes a [`LifecycleEvent`] for every service it
//! brings up and for every traffic phase change. Consumers (a router, an
//! audit log, a dashboard) read from it while startup runs; the
//! orchestrator never reads from it. Initialization events wait for buffer
//! space, so a graph larger than the buffer needs a concurrent consumer.
//!
//! # Example
//!
//! ```rust
//! use startgate::bus::{LifecycleBus, LifecycleEvent};
//!
//! # tokio_test::block_on(async {
//! let bus = LifecycleBus::new();
//! bus.publish(LifecycleEvent::initialized("db", 100)).await.unwrap();
//!
//! let event = bus.consume().await.unwrap();
//! assert_eq!(event.service_id, "db");
//! # });
//! ```

pub mod event;

pub use event::{LifecycleEvent, LifecycleEventKind};

use crate::error::{Result, StartupError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Default buffer size for the event channel
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Multi-producer event channel shared by clones.
pub struct LifecycleBus {
    tx: mpsc::Sender<LifecycleEvent>,
    rx: Arc<Mutex<mpsc::Receiver<LifecycleEvent>>>,
}

impl LifecycleBus {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Publish, waiting for buffer space.
    ///
    /// # Errors
    /// Returns `StartupError::BusClosed` if the receiver has been dropped.
    pub async fn publish(&self, event: LifecycleEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| StartupError::BusClosed)
    }

    /// Publish without waiting.
    ///
    /// # Returns
    /// - `Err(StartupError::BusClosed)` if the channel is closed
    /// - `Err(StartupError::Channel)` if the buffer is full
    pub fn try_publish(&self, event: LifecycleEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                StartupError::Channel("lifecycle event buffer full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => StartupError::BusClosed,
        })
    }

    /// Next event, or `None` once every sender is gone.
    pub async fn consume(&self) -> Option<LifecycleEvent> {
        self.rx.lock().await.recv().await
    }

    /// Everything currently buffered, without waiting for more.
    pub async fn drain(&self) -> Vec<LifecycleEvent> {
        let mut rx = self.rx.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// A sender that can be moved into another task.
    pub fn sender(&self) -> mpsc::Sender<LifecycleEvent> {
        self.tx.clone()
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LifecycleBus {
    /// Clones share the same underlying channel.
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
        }
    }
}
