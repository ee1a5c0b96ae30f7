//! Progressive audio delivery for one conversation
//!
//! The streamer drains a conversation's event channel, synthesizes each
//! sentence fragment, and emits one continuous MP3 byte-stream in paced
//! chunks. Delivery walks a small state machine:
//!
//! ```text
//! Idle → WarmStart → Streaming{Synthesizing → Emitting}* → Draining → Closed
//! ```
//!
//! Closed is reached on the channel sentinel, on client disconnect, or on
//! an unrecoverable transport error; a failed fragment is skipped, never
//! fatal.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::audio::mp3;
use crate::stream::{StreamConsumer, TurnEvent};
use crate::voice::SpeechSynthesizer;

/// Short filler phrases synthesized before the first real fragment
///
/// Priming the decoder with a tiny segment keeps time-to-first-audible-byte
/// low while the pipeline is still thinking.
const BACKCHANNEL_PHRASES: [&str; 4] = ["Hmm...", "Let me see...", "One moment...", "Interesting..."];

/// Rotates through the backchannel phrases across conversations
static BACKCHANNEL_CURSOR: AtomicUsize = AtomicUsize::new(0);

/// Chunking and timing knobs for stream delivery
#[derive(Debug, Clone, Copy)]
pub struct PacingConfig {
    /// Bytes per emitted chunk
    pub chunk_bytes: usize,
    /// Delay between chunks, matched to the pot's drain rate
    pub chunk_delay: Duration,
    /// Extra pause after each sentence so the decoder can resynchronize
    pub sentence_gap: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: 1024,
            chunk_delay: Duration::from_millis(20),
            sentence_gap: Duration::from_millis(120),
        }
    }
}

impl PacingConfig {
    /// Zero-delay pacing for tests
    #[must_use]
    pub const fn instant(chunk_bytes: usize) -> Self {
        Self {
            chunk_bytes,
            chunk_delay: Duration::ZERO,
            sentence_gap: Duration::ZERO,
        }
    }
}

/// How a delivery run reached the Closed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Channel sentinel observed and everything emitted
    Completed,
    /// Client went away; outstanding synthesis was cancelled
    Disconnected,
}

/// Assembles synthesized segments into one paced byte-stream
pub struct AudioStreamer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    pacing: PacingConfig,
}

/// Emission-side result: `Err` means the receiving body was dropped
type EmitResult = std::result::Result<(), ()>;

impl AudioStreamer {
    #[must_use]
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, pacing: PacingConfig) -> Self {
        Self {
            synthesizer,
            pacing,
        }
    }

    /// Drain `consumer` and emit the assembled stream into `out`
    ///
    /// Returns how the stream closed. Dropping the receiving end of `out`
    /// cancels the run, including any synthesis still in flight.
    pub async fn run(
        &self,
        conversation_id: &str,
        mut consumer: StreamConsumer,
        out: mpsc::Sender<Bytes>,
    ) -> StreamEnd {
        let mut header_emitted = false;

        // Warm start: prime the decoder before any real fragment is ready
        let phrase = BACKCHANNEL_PHRASES
            [BACKCHANNEL_CURSOR.fetch_add(1, Ordering::Relaxed) % BACKCHANNEL_PHRASES.len()];
        match self.synthesize_cancellable(phrase, &out).await {
            Some(Ok(segment)) => {
                if self.emit_segment(&segment, true, &out).await.is_err() {
                    return closed(conversation_id, StreamEnd::Disconnected);
                }
                header_emitted = true;
            }
            Some(Err(e)) => {
                tracing::warn!(conversation = conversation_id, error = %e, "warm start synthesis failed");
            }
            None => return closed(conversation_id, StreamEnd::Disconnected),
        }

        // Streaming: synthesize and emit fragments in arrival order
        while let Some(event) = consumer.next_event().await {
            match event {
                TurnEvent::Metadata { mood } => {
                    tracing::debug!(conversation = conversation_id, mood = mood.as_str(), "stream metadata");
                }
                TurnEvent::Sentence { text } => {
                    let segment = match self.synthesize_cancellable(&text, &out).await {
                        Some(Ok(segment)) => segment,
                        Some(Err(e)) => {
                            // Partial failure: drop this fragment, keep going
                            tracing::warn!(
                                conversation = conversation_id,
                                error = %e,
                                "fragment synthesis failed, skipping"
                            );
                            continue;
                        }
                        None => return closed(conversation_id, StreamEnd::Disconnected),
                    };

                    if self
                        .emit_segment(&segment, !header_emitted, &out)
                        .await
                        .is_err()
                    {
                        return closed(conversation_id, StreamEnd::Disconnected);
                    }
                    header_emitted = true;

                    if !self.pacing.sentence_gap.is_zero() {
                        tokio::time::sleep(self.pacing.sentence_gap).await;
                    }
                }
            }
        }

        // Draining: sentinel observed, nothing left to emit
        closed(conversation_id, StreamEnd::Completed)
    }

    /// Synthesize `text`, aborting early if the output side goes away
    ///
    /// `None` means the client disconnected while synthesis was in flight.
    async fn synthesize_cancellable(
        &self,
        text: &str,
        out: &mpsc::Sender<Bytes>,
    ) -> Option<crate::Result<Vec<u8>>> {
        tokio::select! {
            result = self.synthesizer.synthesize(text) => Some(result),
            () = out.closed() => None,
        }
    }

    /// Emit one segment in paced chunks
    ///
    /// The first segment of a stream keeps its full container header; later
    /// segments are reduced to bare frames so the concatenation stays
    /// decodable.
    async fn emit_segment(&self, segment: &[u8], first: bool, out: &mpsc::Sender<Bytes>) -> EmitResult {
        let payload: &[u8] = if first {
            segment
        } else {
            match mp3::continuation_frames(segment) {
                Some(frames) => frames,
                None => {
                    tracing::warn!("segment without frame sync, dropping");
                    return Ok(());
                }
            }
        };

        for chunk in payload.chunks(self.pacing.chunk_bytes.max(1)) {
            if out.send(Bytes::copy_from_slice(chunk)).await.is_err() {
                return Err(());
            }
            if !self.pacing.chunk_delay.is_zero() {
                tokio::time::sleep(self.pacing.chunk_delay).await;
            }
        }
        Ok(())
    }

}

fn closed(conversation_id: &str, end: StreamEnd) -> StreamEnd {
    tracing::info!(conversation = conversation_id, ?end, "stream closed");
    end
}
