use crate::error::BusError;
use crate::meta::CameraMeta;
use crate::topics::{camera_meta_topic, events_topic, frames_topic, latest_frame_topic};
use crate::{Bus, EventStream, FrameStream};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use pvs_types::{CameraId, OrganizationId};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const SUBSCRIBER_COUNT_CACHE_TTL: Duration = Duration::from_secs(1);

/// Redis-backed implementation of [`Bus`], matching the channel/key shape
/// of the original `app/shared/redis/pubsub.py` (`FramePublisher`,
/// `FrameSubscriber`, `EventPublisher`, `EventSubscriber`).
pub struct RedisBus {
    client: redis::Client,
    conn: redis::aio::ConnectionManager,
    subscriber_count_cache: Mutex<HashMap<String, (usize, Instant)>>,
}

impl RedisBus {
    pub async fn connect(redis_url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            client,
            conn,
            subscriber_count_cache: Mutex::new(HashMap::new()),
        })
    }
}

impl Bus for RedisBus {
    async fn publish_frame(
        &self,
        camera_id: CameraId,
        frame: Bytes,
        latest_frame_ttl: Duration,
    ) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let latest_key = latest_frame_topic(camera_id);
        let channel = frames_topic(camera_id);
        let () = conn
            .set_ex(&latest_key, frame.as_ref(), latest_frame_ttl.as_secs().max(1))
            .await?;
        let _subscriber_count: i64 = conn.publish(&channel, frame.as_ref()).await?;
        Ok(())
    }

    async fn latest_frame(&self, camera_id: CameraId) -> Result<Option<Bytes>, BusError> {
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = conn.get(latest_frame_topic(camera_id)).await?;
        Ok(raw.map(Bytes::from))
    }

    async fn subscribe_frames(&self, camera_id: CameraId) -> Result<FrameStream, BusError> {
        let channel = frames_topic(camera_id);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;
        let stream = pubsub
            .into_on_message()
            .map(|msg| Ok(Bytes::from(msg.get_payload_bytes().to_vec())));
        Ok(Box::pin(stream))
    }

    async fn set_camera_meta(
        &self,
        camera_id: CameraId,
        meta: CameraMeta,
        ttl: Duration,
    ) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let key = camera_meta_topic(camera_id);
        let () = conn.hset_multiple(&key, &meta.to_redis_fields()).await?;
        let _: bool = conn.expire(&key, ttl.as_secs().max(1) as i64).await?;
        Ok(())
    }

    async fn camera_meta(&self, camera_id: CameraId) -> Result<Option<CameraMeta>, BusError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(camera_meta_topic(camera_id)).await?;
        Ok(CameraMeta::from_redis_hash(fields))
    }

    async fn publish_event(
        &self,
        organization_id: OrganizationId,
        payload: Bytes,
    ) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let _subscriber_count: i64 = conn
            .publish(events_topic(organization_id), payload.as_ref())
            .await?;
        Ok(())
    }

    async fn subscribe_events(
        &self,
        organization_id: OrganizationId,
    ) -> Result<EventStream, BusError> {
        let channel = events_topic(organization_id);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;
        let stream = pubsub
            .into_on_message()
            .map(|msg| Ok(Bytes::from(msg.get_payload_bytes().to_vec())));
        Ok(Box::pin(stream))
    }

    async fn subscriber_count(&self, topic: &str) -> Result<usize, BusError> {
        if let Some((count, cached_at)) = self.subscriber_count_cache.lock().get(topic).copied() {
            if cached_at.elapsed() < SUBSCRIBER_COUNT_CACHE_TTL {
                return Ok(count);
            }
        }

        let mut conn = self.conn.clone();
        let (_channel, count): (String, i64) = redis::cmd("PUBSUB")
            .arg("NUMSUB")
            .arg(topic)
            .query_async(&mut conn)
            .await?;
        let count = count.max(0) as usize;
        self.subscriber_count_cache
            .lock()
            .insert(topic.to_string(), (count, Instant::now()));
        Ok(count)
    }
}
