//! Bounded per-conversation event channels
//!
//! Each conversation gets one channel: a small bounded FIFO of [`TurnEvent`]s
//! plus a one-shot completion flag. The pipeline task is the only producer
//! and the audio streamer the only consumer; the registry mapping
//! conversation id to channel is the only process-wide mutable state.
//!
//! Lifecycle: `open` → producer `publish`es and finally `complete`s →
//! consumer `attach`es and drains until the end sentinel → `close`. Channels
//! nobody drains are reclaimed by the abandonment sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::Mutex;

use crate::turn::Mood;
use crate::{Error, Result};

/// Default FIFO capacity per conversation
///
/// Small on purpose: the producer should suspend once the streamer falls a
/// few sentences behind, bounding memory per conversation.
pub const CHANNEL_CAPACITY: usize = 3;

/// Bounded wait between completion re-checks while the FIFO is empty
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long an unfinished channel may sit in the registry before the
/// sweeper reclaims it
pub const ABANDON_TTL: Duration = Duration::from_secs(120);

/// One event on a conversation's stream channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Display metadata, published once before the first sentence
    Metadata { mood: Mood },
    /// One reply fragment, in emission order
    Sentence { text: String },
}

struct ChannelSlot {
    tx: mpsc::Sender<TurnEvent>,
    /// Taken by the first (only) consumer to attach
    rx: Option<mpsc::Receiver<TurnEvent>>,
    done: Arc<AtomicBool>,
    opened_at: Instant,
}

/// Producer handle for one conversation's channel
pub struct StreamPublisher {
    id: String,
    tx: mpsc::Sender<TurnEvent>,
    done: Arc<AtomicBool>,
}

impl StreamPublisher {
    /// Append an event, suspending while the FIFO is full (backpressure)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] once the consumer side is gone, so a
    /// cancelled turn's producer unwinds instead of publishing into the void.
    pub async fn publish(&self, event: TurnEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Channel(format!("channel closed for {}", self.id)))
    }

    /// Signal that no further events will arrive
    ///
    /// One-shot and idempotent; called by the producer after success or
    /// failure alike.
    pub fn complete(&self) {
        self.done.store(true, Ordering::SeqCst);
    }
}

/// Consumer handle for one conversation's channel
pub struct StreamConsumer {
    rx: mpsc::Receiver<TurnEvent>,
    done: Arc<AtomicBool>,
}

impl StreamConsumer {
    /// Next event in FIFO order, or `None` once the channel is complete
    /// and fully drained
    ///
    /// Suspends with a bounded poll interval while the FIFO is empty and
    /// completion has not been signaled. The `None` sentinel is never
    /// returned while buffered events remain.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        loop {
            match tokio::time::timeout(POLL_INTERVAL, self.rx.recv()).await {
                Ok(Some(event)) => return Some(event),
                // All senders dropped and the buffer is drained; the
                // producer is gone, so nothing further can arrive.
                Ok(None) => return None,
                Err(_) => {
                    if self.done.load(Ordering::SeqCst) {
                        // Completion observed; drain anything that was
                        // buffered before the flag, then end.
                        match self.rx.try_recv() {
                            Ok(event) => return Some(event),
                            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
                        }
                    }
                }
            }
        }
    }
}

/// Registry of live stream channels keyed by conversation id
///
/// Safe for concurrent open/close across unrelated conversations; each
/// channel itself is single-producer/single-consumer.
#[derive(Default)]
pub struct StreamRegistry {
    channels: Mutex<HashMap<String, ChannelSlot>>,
}

impl StreamRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a channel for a new conversation
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] if the id already has a live channel;
    /// two turns are never silently merged.
    pub async fn open(&self, id: &str) -> Result<()> {
        self.open_with_capacity(id, CHANNEL_CAPACITY).await
    }

    /// Allocate a channel with an explicit FIFO capacity
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] if the id already has a live channel
    pub async fn open_with_capacity(&self, id: &str, capacity: usize) -> Result<()> {
        let mut channels = self.channels.lock().await;
        if channels.contains_key(id) {
            return Err(Error::Channel(format!("channel already open for {id}")));
        }

        let (tx, rx) = mpsc::channel(capacity);
        channels.insert(
            id.to_string(),
            ChannelSlot {
                tx,
                rx: Some(rx),
                done: Arc::new(AtomicBool::new(false)),
                opened_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Producer handle for an open channel
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id
    pub async fn publisher(&self, id: &str) -> Result<StreamPublisher> {
        let channels = self.channels.lock().await;
        let slot = channels
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("stream channel {id}")))?;
        Ok(StreamPublisher {
            id: id.to_string(),
            tx: slot.tx.clone(),
            done: Arc::clone(&slot.done),
        })
    }

    /// Attach the (single) consumer to an open channel
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown or expired id, and
    /// [`Error::Channel`] if a consumer already attached.
    pub async fn attach(&self, id: &str) -> Result<StreamConsumer> {
        let mut channels = self.channels.lock().await;
        let slot = channels
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("stream channel {id}")))?;
        let rx = slot
            .rx
            .take()
            .ok_or_else(|| Error::Channel(format!("consumer already attached to {id}")))?;
        Ok(StreamConsumer {
            rx,
            done: Arc::clone(&slot.done),
        })
    }

    /// Whether the registry currently holds a channel for `id`
    pub async fn contains(&self, id: &str) -> bool {
        self.channels.lock().await.contains_key(id)
    }

    /// Release all registry state for a conversation
    ///
    /// Idempotent: closing an unknown or already-closed id is a no-op.
    /// If the consumer never attached, dropping the buffered receiver makes
    /// any suspended `publish` fail, cancelling the producer.
    pub async fn close(&self, id: &str) {
        let removed = self.channels.lock().await.remove(id);
        if removed.is_some() {
            tracing::debug!(conversation = id, "stream channel closed");
        }
    }

    /// Reclaim channels that have outlived `ttl`
    ///
    /// Covers consumers that never connected and producers that died
    /// without `complete`; returns the number of channels reclaimed.
    pub async fn sweep_abandoned(&self, ttl: Duration) -> usize {
        let mut channels = self.channels.lock().await;
        let before = channels.len();
        channels.retain(|id, slot| {
            let keep = slot.opened_at.elapsed() <= ttl;
            if !keep {
                tracing::warn!(conversation = %id, "reclaiming abandoned stream channel");
            }
            keep
        });
        before - channels.len()
    }

    /// Spawn the periodic abandonment sweeper
    pub fn spawn_sweeper(registry: Arc<Self>, interval: Duration, ttl: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reclaimed = registry.sweep_abandoned(ttl).await;
                if reclaimed > 0 {
                    tracing::info!(reclaimed, "stream channel sweep");
                }
            }
        });
    }
}
