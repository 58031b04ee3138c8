//! Primary recorder selection

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::coordination::scoring::{score_and_store, score_metric};
use crate::storage::{CoordinationDecision, Database, Meeting, Participant};

const ADMIN_ONLY_VERSION: &str = "2.0-admin-only";
const BEST_QUALITY_VERSION: &str = "1.0-best-quality";

/// Which participants are allowed to record a meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingPolicy {
    /// Only the meeting host records; everyone else is a viewer
    AdminOnly,
    /// Any recording participant is eligible; quality scores decide
    BestQuality,
}

impl RecordingPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin-only" => Some(Self::AdminOnly),
            "best-quality" => Some(Self::BestQuality),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdminOnly => "admin-only",
            Self::BestQuality => "best-quality",
        }
    }

    fn algorithm_version(&self) -> &'static str {
        match self {
            Self::AdminOnly => ADMIN_ONLY_VERSION,
            Self::BestQuality => BEST_QUALITY_VERSION,
        }
    }
}

/// Selects the authoritative recording participant for a meeting
pub struct RecorderSelector {
    policy: RecordingPolicy,
}

impl RecorderSelector {
    pub fn new(policy: RecordingPolicy) -> Self {
        Self { policy }
    }

    /// Select the primary recorder under the policy in force.
    ///
    /// Returns None when no eligible recording participant exists.
    pub fn select_primary(&self, db: &Database, meeting: &Meeting) -> Result<Option<Participant>> {
        let participants = db.list_participants(meeting.id)?;
        let recording: Vec<Participant> =
            participants.into_iter().filter(|p| p.is_recording).collect();

        match self.policy {
            RecordingPolicy::AdminOnly => {
                // Only the host may record; the host participant is unique
                Ok(recording
                    .into_iter()
                    .find(|p| p.user.is_some() && p.user == meeting.host))
            }
            RecordingPolicy::BestQuality => {
                let mut best: Option<(Participant, f64)> = None;
                // Join order breaks ties: a later participant must strictly
                // beat the current best to replace it.
                for participant in recording {
                    let score = match db.latest_quality_metric(participant.id)? {
                        Some(mut metric) => score_and_store(db, &mut metric)?,
                        None => 0.0,
                    };
                    match &best {
                        Some((_, best_score)) if score <= *best_score => {}
                        _ => best = Some((participant, score)),
                    }
                }
                Ok(best.map(|(p, _)| p))
            }
        }
    }

    /// Run selection and persist an audit record of the outcome.
    ///
    /// Returns None (and records nothing) when no primary could be selected.
    pub fn create_decision(
        &self,
        db: &Database,
        meeting: &Meeting,
    ) -> Result<Option<CoordinationDecision>> {
        let Some(primary) = self.select_primary(db, meeting)? else {
            return Ok(None);
        };

        let backups: Vec<i64> = match self.policy {
            // No backups: everyone but the host is a viewer
            RecordingPolicy::AdminOnly => Vec::new(),
            RecordingPolicy::BestQuality => db
                .list_participants(meeting.id)?
                .into_iter()
                .filter(|p| p.is_recording && p.id != primary.id)
                .map(|p| p.id)
                .collect(),
        };

        let primary_score = db
            .latest_quality_metric(primary.id)?
            .map(|m| score_metric(&m));

        let decision_factors = match self.policy {
            RecordingPolicy::AdminOnly => json!({
                "recording_mode": "admin_only",
                "primary_is_host": true,
                "backup_count": 0,
            }),
            RecordingPolicy::BestQuality => json!({
                "recording_mode": "best_quality",
                "primary_score": primary_score,
                "alternates_considered": backups.len(),
            }),
        };

        let mut decision = CoordinationDecision {
            id: 0,
            meeting_id: meeting.id,
            primary_recorder_id: primary.id,
            backup_recorder_ids: backups,
            algorithm_version: self.policy.algorithm_version().to_string(),
            decision_factors,
            created_at: Utc::now(),
        };
        decision.id = db.insert_coordination_decision(&decision)?;

        info!(
            "Coordination decision for meeting {}: primary participant {} ({})",
            meeting.code, primary.id, decision.algorithm_version
        );

        Ok(Some(decision))
    }
}
