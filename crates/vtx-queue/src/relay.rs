//! Transcode events via Redis Pub/Sub.
//!
//! Workers publish [`TranscodeEvent`]s on one well-known channel; all jobs
//! interleave on it and the subscriber fans out by job id. Pub/sub has no
//! persistence, so a missed event is gone. The job store remains the record
//! of truth; this channel only feeds live views.

use tracing::{debug, warn};

use vtx_models::TranscodeEvent;

use crate::error::QueueResult;

/// Channel carrying all transcode events.
pub const EVENT_CHANNEL: &str = "transcode:events";

/// Publisher/subscriber for transcode events.
#[derive(Clone)]
pub struct EventRelay {
    client: redis::Client,
}

impl EventRelay {
    /// Create a new relay.
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Publish an event.
    ///
    /// Terminal events get one retry on failure; progress events do not,
    /// since the next one supersedes them anyway.
    pub async fn publish(&self, event: &TranscodeEvent) -> QueueResult<()> {
        let payload = serde_json::to_string(event)?;

        match self.publish_payload(&payload).await {
            Ok(()) => Ok(()),
            Err(e) if event.is_terminal() => {
                warn!(
                    "Publish failed for terminal event on job {}, retrying: {}",
                    event.job_id, e
                );
                self.publish_payload(&payload).await
            }
            Err(e) => Err(e),
        }
    }

    async fn publish_payload(&self, payload: &str) -> QueueResult<()> {
        use redis::AsyncCommands;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        debug!("Publishing event to {}", EVENT_CHANNEL);
        conn.publish::<_, _, ()>(EVENT_CHANNEL, payload).await?;
        Ok(())
    }

    /// Subscribe to the event channel.
    ///
    /// Returns a pinned stream that can be polled with `.next()`. Payloads
    /// that fail to decode are logged and skipped.
    pub async fn subscribe(
        &self,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = TranscodeEvent> + Send>>>
    {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(EVENT_CHANNEL).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            match serde_json::from_str(&payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Skipping undecodable event payload: {}", e);
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
