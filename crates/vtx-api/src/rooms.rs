//! Per-job broadcast rooms for live event fan-out.
//!
//! The relay subscriber publishes every transcode event into its job's
//! room; each WebSocket subscription holds a broadcast receiver. Rooms
//! are created on first subscribe and pruned once the last receiver is
//! gone, so the map only ever holds jobs someone is watching.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use vtx_models::{JobId, TranscodeEvent};

/// Buffered events per room before slow receivers start lagging.
pub const ROOM_CAPACITY: usize = 64;

#[derive(Clone, Default)]
pub struct JobRooms {
    inner: Arc<RwLock<HashMap<JobId, broadcast::Sender<TranscodeEvent>>>>,
}

impl JobRooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a job's room, creating it if nobody is watching yet.
    pub async fn subscribe(&self, job_id: &JobId) -> broadcast::Receiver<TranscodeEvent> {
        {
            let rooms = self.inner.read().await;
            if let Some(sender) = rooms.get(job_id) {
                return sender.subscribe();
            }
        }

        let mut rooms = self.inner.write().await;
        // Another subscriber may have created the room between locks.
        if let Some(sender) = rooms.get(job_id) {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(ROOM_CAPACITY);
        rooms.insert(job_id.clone(), sender);
        receiver
    }

    /// Deliver an event to a job's room. Returns the number of receivers
    /// reached; zero when nobody is watching.
    pub async fn publish(&self, job_id: &JobId, event: TranscodeEvent) -> usize {
        let delivered = {
            let rooms = self.inner.read().await;
            match rooms.get(job_id) {
                Some(sender) => sender.send(event).unwrap_or(0),
                None => 0,
            }
        };

        if delivered == 0 {
            self.prune(job_id).await;
        }
        delivered
    }

    /// Drop a job's room if its last receiver is gone.
    pub async fn prune(&self, job_id: &JobId) {
        let mut rooms = self.inner.write().await;
        if let Some(sender) = rooms.get(job_id) {
            if sender.receiver_count() == 0 {
                rooms.remove(job_id);
            }
        }
    }

    /// Number of rooms with at least one watcher.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_then_publish_delivers() {
        let rooms = JobRooms::new();
        let job_id = JobId::from_string("j1");

        let mut rx = rooms.subscribe(&job_id).await;
        let event = TranscodeEvent::started(job_id.clone());
        let delivered = rooms.publish(&job_id, event.clone()).await;

        assert_eq!(delivered, 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id, job_id);
    }

    #[tokio::test]
    async fn test_publish_without_watchers_is_dropped() {
        let rooms = JobRooms::new();
        let job_id = JobId::from_string("j1");

        let delivered = rooms
            .publish(&job_id, TranscodeEvent::started(job_id.clone()))
            .await;

        assert_eq!(delivered, 0);
        assert!(rooms.is_empty().await);
    }

    #[tokio::test]
    async fn test_two_watchers_share_a_room() {
        let rooms = JobRooms::new();
        let job_id = JobId::from_string("j1");

        let mut rx1 = rooms.subscribe(&job_id).await;
        let mut rx2 = rooms.subscribe(&job_id).await;
        assert_eq!(rooms.len().await, 1);

        rooms
            .publish(&job_id, TranscodeEvent::info(job_id.clone(), "hello"))
            .await;

        assert_eq!(rx1.recv().await.unwrap().log_message, "hello");
        assert_eq!(rx2.recv().await.unwrap().log_message, "hello");
    }

    #[tokio::test]
    async fn test_room_pruned_after_last_receiver_drops() {
        let rooms = JobRooms::new();
        let job_id = JobId::from_string("j1");

        let rx = rooms.subscribe(&job_id).await;
        assert_eq!(rooms.len().await, 1);

        drop(rx);
        rooms
            .publish(&job_id, TranscodeEvent::info(job_id.clone(), "late"))
            .await;

        assert!(rooms.is_empty().await);
    }

    #[tokio::test]
    async fn test_rooms_are_isolated_per_job() {
        let rooms = JobRooms::new();
        let a = JobId::from_string("a");
        let b = JobId::from_string("b");

        let mut rx_a = rooms.subscribe(&a).await;
        let _rx_b = rooms.subscribe(&b).await;

        rooms.publish(&a, TranscodeEvent::info(a.clone(), "only a")).await;

        assert_eq!(rx_a.recv().await.unwrap().log_message, "only a");
        assert_eq!(rooms.len().await, 2);
    }
}
