//! Redis integration tests for the upload queue and event relay.

use std::time::Duration;

use vtx_queue::{QueueConfig, UploadQueue};

fn test_queue(label: &str) -> UploadQueue {
    use vtx_models::JobId;

    let config = QueueConfig {
        redis_url: std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        stream_name: format!("vtx:test:{}:{}", label, JobId::new()),
        consumer_group: "test-dispatchers".to_string(),
        block: Duration::from_millis(500),
        batch: 5,
        claim_min_idle: Duration::from_secs(300),
    };

    UploadQueue::new(config).expect("Failed to create queue")
}

/// Test Redis connection and group bootstrap.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    dotenvy::dotenv().ok();

    let queue = UploadQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let pending = queue.pending_count().await.expect("Failed to read pending count");
    println!("Pending messages: {}", pending);
}

/// Test notification publish, receive, and ack cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_notification_publish_receive_ack() {
    use vtx_models::StorageEventEnvelope;

    dotenvy::dotenv().ok();

    let queue = test_queue("uploads");
    queue.init().await.expect("Failed to initialize queue");

    let envelope =
        StorageEventEnvelope::object_created("vtx-uploads", "uploads/u1/j1/video.mp4");
    let message_id = queue.publish(&envelope).await.expect("Failed to publish");
    println!("Published notification {}", message_id);

    let messages = queue
        .receive("test-consumer")
        .await
        .expect("Failed to receive");

    assert_eq!(messages.len(), 1);
    let (received_id, body) = &messages[0];
    assert_eq!(received_id, &message_id);

    let parsed: StorageEventEnvelope =
        serde_json::from_str(body).expect("Body should round-trip through the stream");
    assert_eq!(parsed.records.len(), 1);
    assert_eq!(parsed.records[0].key(), "uploads/u1/j1/video.mp4");

    queue.ack(received_id).await.expect("Failed to ack");

    let pending = queue.pending_count().await.expect("Failed to read pending count");
    assert_eq!(pending, 0);
}

/// Test that an unacked delivery can be claimed by another consumer.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_claim_pending_from_stalled_consumer() {
    dotenvy::dotenv().ok();

    let queue = test_queue("claims");
    queue.init().await.expect("Failed to initialize queue");

    let message_id = queue
        .publish_raw(r#"{"Records": []}"#)
        .await
        .expect("Failed to publish");

    // First consumer receives but never acks.
    let messages = queue
        .receive("stalled-consumer")
        .await
        .expect("Failed to receive");
    assert_eq!(messages.len(), 1);

    let claimed = queue
        .claim_pending("rescue-consumer", Duration::from_millis(0), 10)
        .await
        .expect("Failed to claim");

    assert!(claimed.iter().any(|(id, _)| id == &message_id));

    for (id, _) in &claimed {
        queue.ack(id).await.expect("Failed to ack claimed message");
    }
}

/// Test event relay publish/subscribe round trip.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_event_relay_round_trip() {
    use futures_util::StreamExt;
    use vtx_models::{EventStatus, JobId, TranscodeEvent};
    use vtx_queue::EventRelay;

    dotenvy::dotenv().ok();

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let relay = EventRelay::new(&redis_url).expect("Failed to create relay");

    let job_id = JobId::new();

    let relay_clone = relay.clone();
    let wanted = job_id.clone();
    let subscriber = tokio::spawn(async move {
        let mut stream = relay_clone.subscribe().await.expect("Failed to subscribe");
        let mut events = Vec::new();

        // All jobs interleave on the channel, keep only ours.
        let timeout = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(event) = stream.next().await {
                if event.job_id == wanted {
                    events.push(event);
                    if events.len() >= 2 {
                        break;
                    }
                }
            }
        });

        let _ = timeout.await;
        events
    });

    // Give the subscriber time to connect.
    tokio::time::sleep(Duration::from_millis(100)).await;

    relay
        .publish(&TranscodeEvent::info(job_id.clone(), "Downloading source"))
        .await
        .expect("Failed to publish progress event");
    relay
        .publish(&TranscodeEvent::completed(
            job_id.clone(),
            vec![format!("videos/{}/720p.mp4", job_id)],
            12.5,
        ))
        .await
        .expect("Failed to publish terminal event");

    let events = subscriber.await.expect("Subscriber task failed");
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].status, Some(EventStatus::Completed));
    assert_eq!(
        events[1].output_keys.as_deref(),
        Some(&[format!("videos/{}/720p.mp4", job_id)][..])
    );
}
