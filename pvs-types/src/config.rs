use clap::Parser;
use std::time::Duration;

/// Exponential backoff delay for attempt `n` (0-indexed), spec.md §4.1.3:
/// `min(base * 2^attempt, max_delay)`. Shared by the initial RTSP candidate
/// resolution in `pvs-frame-source` and the steady-state reconnect loop in
/// `pvs-worker`, both of which implement the same retry contract.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let scale = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    base.checked_mul(scale as u32).unwrap_or(max).min(max)
}

/// Process-wide configuration for the worker binary, assembled from CLI
/// flags falling back to environment variables (spec.md §6.6), in the
/// dotenv+clap style of the teacher's `cli_app.rs` bootstrap.
#[derive(Debug, Clone, Parser)]
#[command(name = "pvs-worker", about = "multi-tenant camera ingestion and inference worker")]
pub struct WorkerConfig {
    /// Postgres connection string holding camera/event/org tables.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Redis connection string backing the frame/event bus.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Name of the environment variable holding the 32-byte base64
    /// credential encryption key (spec.md §6.1). Kept as a name, not the
    /// key itself, so the key never appears in process arguments/logs.
    #[arg(long, env = "PVS_CREDENTIAL_KEY_ENV", default_value = "PVS_CREDENTIAL_KEY")]
    pub credential_key_env: String,

    /// Directory event thumbnails are written under.
    #[arg(long, env = "PVS_THUMBNAIL_DIR", default_value = "./thumbnails")]
    pub thumbnail_dir: String,

    /// Hard upper bound on configured inference width/height, spec.md §9
    /// Open Question (a).
    #[arg(long, env = "PVS_INFERENCE_SIZE_CAP", default_value_t = 400)]
    pub inference_size_cap_px: u32,

    /// Default inference side length when a camera leaves it unset.
    #[arg(long, env = "PVS_INFERENCE_SIZE_DEFAULT", default_value_t = 320)]
    pub inference_size_default_px: u32,

    /// Seconds between CameraSupervisor reconciliation passes (spec.md §4.5).
    #[arg(long, env = "PVS_SUPERVISOR_REFRESH_SECS", default_value_t = 60)]
    pub supervisor_refresh_secs: u64,

    /// Grace period allowed for a model warmup call before a camera is
    /// spawned without a pre-warmed model (spec.md §4.2 supplement).
    #[arg(long, env = "PVS_MODEL_WARMUP_TIMEOUT_SECS", default_value_t = 10)]
    pub model_warmup_timeout_s: u64,

    /// Deduplication grid dimension G, spec.md §4.3.
    #[arg(long, env = "PVS_DEDUP_GRID", default_value_t = 3)]
    pub dedup_grid: u32,

    /// Deduplication cooldown window, spec.md §4.3.
    #[arg(long, env = "PVS_DEDUP_COOLDOWN_SECS", default_value_t = 30)]
    pub dedup_cooldown_secs: u64,

    /// Per-subscriber bounded queue depth for the frame broadcaster,
    /// spec.md §9 Open Question (c) / §4.4.
    #[arg(long, env = "PVS_BROADCASTER_QUEUE_DEPTH", default_value_t = 5)]
    pub broadcaster_queue_depth: usize,

    /// Upper bound on the stream fan-out FPS surfaced to frontend clients,
    /// spec.md §9 Open Question (c).
    #[arg(long, env = "PVS_STREAM_FPS_MAX", default_value_t = 15.0)]
    pub stream_fps_max: f32,

    /// TTL in seconds for the `latest_frame:{camera_id}` bus key.
    #[arg(long, env = "PVS_LATEST_FRAME_TTL_SECS", default_value_t = 10)]
    pub latest_frame_ttl_secs: u64,

    /// TTL in seconds for the `camera_meta:{camera_id}` bus hash.
    #[arg(long, env = "PVS_CAMERA_META_TTL_SECS", default_value_t = 30)]
    pub camera_meta_ttl_secs: u64,

    /// RTSP connect attempts before a camera moves to `error` (spec.md
    /// §4.1.3).
    #[arg(long, env = "PVS_RTSP_MAX_RETRIES", default_value_t = 5)]
    pub rtsp_max_retries: u32,

    /// Exponential backoff base delay in seconds (spec.md §4.1.3).
    #[arg(long, env = "PVS_RTSP_BASE_DELAY_SECS", default_value_t = 1)]
    pub rtsp_base_delay_secs: u64,

    /// Exponential backoff cap in seconds (spec.md §4.1.3).
    #[arg(long, env = "PVS_RTSP_MAX_DELAY_SECS", default_value_t = 60)]
    pub rtsp_max_delay_secs: u64,

    /// Default detection confidence threshold when a camera leaves it
    /// unset (spec.md §6.6 `default_conf`).
    #[arg(long, env = "PVS_DEFAULT_CONFIDENCE", default_value_t = 0.25)]
    pub default_confidence: f32,

    /// Default inference target rate in Hz (spec.md §6.6
    /// `default_target_fps`).
    #[arg(long, env = "PVS_DEFAULT_TARGET_FPS", default_value_t = 0.5)]
    pub default_target_fps: f32,

    /// JPEG quality for published stream frames (spec.md §4.1 step 5).
    #[arg(long, env = "PVS_STREAM_JPEG_QUALITY", default_value_t = 65)]
    pub stream_jpeg_quality: u8,

    /// JPEG quality for event thumbnails (spec.md §4.3 step 3).
    #[arg(long, env = "PVS_THUMBNAIL_JPEG_QUALITY", default_value_t = 70)]
    pub thumbnail_jpeg_quality: u8,

    /// Age after which a dedup entry is purged as stale (spec.md §4.3
    /// `cleanup_stale`).
    #[arg(long, env = "PVS_DEDUP_STALE_AGE_SECS", default_value_t = 300)]
    pub dedup_stale_age_secs: u64,

    /// Bounded wait for in-flight workers to reach a terminal state during
    /// shutdown (spec.md §4.5).
    #[arg(long, env = "PVS_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_only_required_fields() {
        let cfg = WorkerConfig::parse_from([
            "pvs-worker",
            "--database-url",
            "postgres://localhost/pvs",
        ]);
        assert_eq!(cfg.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(cfg.inference_size_cap_px, 400);
        assert_eq!(cfg.inference_size_default_px, 320);
        assert_eq!(cfg.dedup_grid, 3);
        assert_eq!(cfg.broadcaster_queue_depth, 5);
    }
}
