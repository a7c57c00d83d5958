//! Upload notification queue over Redis Streams.
//!
//! Notifications ride a single stream consumed by a dispatcher consumer
//! group. Delivery is at-least-once: a message stays in the group's pending
//! list until acked, and entries idle past the claim threshold can be taken
//! over by another consumer.

use std::time::Duration;

use tracing::{debug, info, warn};

use vtx_models::StorageEventEnvelope;

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream key for upload notifications
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// How long a receive call blocks waiting for messages
    pub block: Duration,
    /// Max messages fetched per receive call
    pub batch: usize,
    /// Idle threshold after which pending messages may be claimed
    pub claim_min_idle: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vtx:uploads".to_string(),
            consumer_group: "dispatchers".to_string(),
            block: Duration::from_secs(20),
            batch: 5,
            claim_min_idle: Duration::from_secs(300),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "vtx:uploads".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "dispatchers".to_string()),
            block: Duration::from_millis(
                std::env::var("QUEUE_BLOCK_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20_000),
            ),
            batch: std::env::var("QUEUE_BATCH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            claim_min_idle: Duration::from_millis(
                std::env::var("QUEUE_CLAIM_IDLE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300_000),
            ),
        }
    }
}

/// Durable queue client for upload notifications.
///
/// Bodies are opaque JSON strings at this layer. The dispatcher parses them,
/// so a malformed body can still be acked away instead of wedging the group.
pub struct UploadQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl UploadQueue {
    /// Create a new queue client.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Queue configuration in effect.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Publish a raw notification body.
    pub async fn publish_raw(&self, body: &str) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("body")
            .arg(body)
            .query_async(&mut conn)
            .await?;

        debug!("Published notification {}", message_id);
        Ok(message_id)
    }

    /// Publish a storage event envelope.
    pub async fn publish(&self, envelope: &StorageEventEnvelope) -> QueueResult<String> {
        let body = serde_json::to_string(envelope)?;
        self.publish_raw(&body).await
    }

    /// Receive new messages for this consumer.
    ///
    /// Blocks up to the configured block duration and returns
    /// `(message_id, raw_body)` pairs. Entries without a `body` field are
    /// acked and dropped.
    pub async fn receive(&self, consumer_name: &str) -> QueueResult<Vec<(String, String)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(self.config.batch)
            .arg("BLOCK")
            .arg(self.config.block.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let mut messages = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                match entry.map.get("body") {
                    Some(redis::Value::BulkString(body)) => {
                        let body = String::from_utf8_lossy(body).into_owned();
                        messages.push((message_id, body));
                    }
                    _ => {
                        warn!("Entry {} has no body field, dropping", message_id);
                        self.ack(&message_id).await.ok();
                    }
                }
            }
        }

        Ok(messages)
    }

    /// Acknowledge a message and delete it from the stream.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acked message {}", message_id);
        Ok(())
    }

    /// Claim pending messages idle past the given threshold.
    ///
    /// Takes over deliveries from consumers that stopped acking, so a crashed
    /// dispatcher's messages come back into rotation.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<(String, String)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut messages = Vec::new();

        for entry in result.claimed {
            let message_id = entry.id.clone();

            match entry.map.get("body") {
                Some(redis::Value::BulkString(body)) => {
                    let body = String::from_utf8_lossy(body).into_owned();
                    info!("Claimed pending message {}", message_id);
                    messages.push((message_id, body));
                }
                _ => {
                    warn!("Claimed entry {} has no body field, dropping", message_id);
                    self.ack(&message_id).await.ok();
                }
            }
        }

        Ok(messages)
    }

    /// Number of delivered-but-unacked messages in the group.
    pub async fn pending_count(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        Ok(pending.count() as u64)
    }
}
