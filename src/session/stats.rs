use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::{JoinConfidence, JoinState};

/// Statistics about a meeting session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub meeting_id: String,

    pub display_name: String,

    pub join_state: JoinState,

    /// Set once the join click went through
    pub confidence: Option<JoinConfidence>,

    pub joined_at: Option<DateTime<Utc>>,

    /// Time spent in the meeting so far, in seconds
    pub duration_secs: f64,
}
