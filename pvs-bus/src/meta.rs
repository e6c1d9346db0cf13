use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The `camera_meta/<camera-id>` hash (spec.md §4.4, §6.4): stream FPS,
/// inference FPS, and detection count, refreshed alongside every frame
/// publish with a 30s TTL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraMeta {
    pub stream_fps: f32,
    pub inference_fps: f32,
    pub detection_count: u32,
}

impl CameraMeta {
    pub fn to_redis_fields(self) -> Vec<(&'static str, String)> {
        vec![
            ("fps", self.stream_fps.to_string()),
            ("infer_fps", self.inference_fps.to_string()),
            ("detection_count", self.detection_count.to_string()),
        ]
    }

    pub fn from_redis_hash(fields: HashMap<String, String>) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        Some(Self {
            stream_fps: fields.get("fps").and_then(|v| v.parse().ok()).unwrap_or(0.0),
            inference_fps: fields
                .get("infer_fps")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            detection_count: fields
                .get("detection_count")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_redis_field_shape() {
        let meta = CameraMeta {
            stream_fps: 14.9,
            inference_fps: 0.48,
            detection_count: 3,
        };
        let fields: HashMap<String, String> = meta
            .to_redis_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let back = CameraMeta::from_redis_hash(fields).unwrap();
        assert!((back.stream_fps - 14.9).abs() < 1e-3);
        assert_eq!(back.detection_count, 3);
    }

    #[test]
    fn empty_hash_is_none() {
        assert!(CameraMeta::from_redis_hash(HashMap::new()).is_none());
    }
}
