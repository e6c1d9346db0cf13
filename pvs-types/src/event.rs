use crate::detection::BBox;
use crate::ids::{CameraId, EventId, OrganizationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PpeViolation,
    ZoneViolation,
    SystemAlert,
}

impl EventKind {
    /// Matches the `event_kind` Postgres enum's labels (spec.md §6.2).
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::PpeViolation => "ppe_violation",
            Self::ZoneViolation => "zone_violation",
            Self::SystemAlert => "system_alert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    NoHardhat,
    NoVest,
    NoMask,
    ZoneBreach,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl ViolationKind {
    /// Default severity before the confidence>0.8 escalation override
    /// (spec.md §4.3 step 4).
    pub fn default_severity(self) -> Severity {
        match self {
            Self::NoHardhat => Severity::High,
            Self::NoVest => Severity::Medium,
            Self::NoMask => Severity::Medium,
            Self::ZoneBreach => Severity::Critical,
            Self::Other => Severity::Low,
        }
    }

    /// Matches the `violation_kind` Postgres enum's labels (spec.md §6.2).
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::NoHardhat => "no_hardhat",
            Self::NoVest => "no_vest",
            Self::NoMask => "no_mask",
            Self::ZoneBreach => "zone_breach",
            Self::Other => "other",
        }
    }
}

impl Severity {
    /// Matches the `severity` Postgres enum's labels (spec.md §6.2).
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Computes the materialized severity for a violation, applying the
/// confidence>0.8 override to Critical (spec.md §4.3 step 4).
pub fn severity_for(kind: ViolationKind, confidence: f32) -> Severity {
    if confidence > 0.8 {
        Severity::Critical
    } else {
        kind.default_severity()
    }
}

/// A materialized, persisted violation or system event (spec.md §3, §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub organization_id: OrganizationId,
    pub camera_id: CameraId,
    pub event_type: EventKind,
    pub violation_type: Option<ViolationKind>,
    pub severity: Severity,
    pub confidence: f32,
    pub bbox: Option<BBox>,
    pub thumbnail_path: Option<String>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<UserId>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new_violation(
        organization_id: OrganizationId,
        camera_id: CameraId,
        event_type: EventKind,
        violation_type: ViolationKind,
        confidence: f32,
        bbox: Option<BBox>,
        thumbnail_path: Option<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            organization_id,
            camera_id,
            event_type,
            violation_type: Some(violation_type),
            severity: severity_for(violation_type, confidence),
            confidence,
            bbox,
            thumbnail_path,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Per-(organization, camera, day) rollup, refreshed as events materialize
/// (spec.md §4.3 "DailyCounters" supplement; mirrors `daily_stats`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyCounters {
    pub total_violations: u64,
    pub no_hardhat_count: u64,
    pub no_vest_count: u64,
    pub zone_breach_count: u64,
    pub frames_processed: u64,
}

impl DailyCounters {
    pub fn record(&mut self, violation: ViolationKind) {
        self.total_violations += 1;
        match violation {
            ViolationKind::NoHardhat => self.no_hardhat_count += 1,
            ViolationKind::NoVest => self.no_vest_count += 1,
            ViolationKind::ZoneBreach => self.zone_breach_count += 1,
            ViolationKind::NoMask | ViolationKind::Other => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_defaults_match_table() {
        assert_eq!(severity_for(ViolationKind::NoHardhat, 0.5), Severity::High);
        assert_eq!(severity_for(ViolationKind::NoVest, 0.5), Severity::Medium);
        assert_eq!(severity_for(ViolationKind::ZoneBreach, 0.5), Severity::Critical);
    }

    #[test]
    fn high_confidence_escalates_to_critical() {
        assert_eq!(severity_for(ViolationKind::NoVest, 0.81), Severity::Critical);
        assert_eq!(severity_for(ViolationKind::NoVest, 0.80), Severity::Medium);
    }

    #[test]
    fn daily_counters_tally_by_kind() {
        let mut counters = DailyCounters::default();
        counters.record(ViolationKind::NoHardhat);
        counters.record(ViolationKind::NoHardhat);
        counters.record(ViolationKind::ZoneBreach);
        assert_eq!(counters.total_violations, 3);
        assert_eq!(counters.no_hardhat_count, 2);
        assert_eq!(counters.zone_breach_count, 1);
    }
}
