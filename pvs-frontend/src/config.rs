use clap::Parser;

/// Process-wide configuration for the frontend binary (spec.md §1: "serves
/// the dashboard, REST reads ... relays frames (MJPEG) and events
/// (server-push)"). CLI flags falling back to environment variables, in
/// the same dotenv+clap style as `pvs_types::WorkerConfig`.
#[derive(Debug, Clone, Parser)]
#[command(name = "pvs-frontend", about = "browser-facing relay for the camera bus")]
pub struct FrontendConfig {
    /// Postgres connection string, shared with the worker (spec.md §6.2).
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Redis connection string backing the frame/event bus.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Address the HTTP server binds to.
    #[arg(long, env = "PVS_FRONTEND_BIND", default_value = "0.0.0.0:8000")]
    pub bind_addr: String,

    /// Per-client bounded queue depth for the MJPEG broadcaster, spec.md
    /// §9 Open Question (c) / §4.4.
    #[arg(long, env = "PVS_BROADCASTER_QUEUE_DEPTH", default_value_t = 5)]
    pub broadcaster_queue_depth: usize,

    /// Default page size for REST event reads.
    #[arg(long, env = "PVS_DEFAULT_EVENT_PAGE_SIZE", default_value_t = 50)]
    pub default_event_page_size: i64,

    /// How long an MJPEG client waits for a real frame before a placeholder
    /// frame is substituted (spec.md §7 "User-visible failure behavior").
    #[arg(long, env = "PVS_LATEST_FRAME_TTL_SECS", default_value_t = 10)]
    pub latest_frame_ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_only_required_fields() {
        let cfg = FrontendConfig::parse_from([
            "pvs-frontend",
            "--database-url",
            "postgres://localhost/pvs",
        ]);
        assert_eq!(cfg.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert_eq!(cfg.broadcaster_queue_depth, 5);
    }
}
