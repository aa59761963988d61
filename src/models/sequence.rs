use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One templated email within a sequence. `delay_days` is the wait before
/// this step is attempted, counted from the previous step's send.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct SequenceStep {
    pub id: Uuid,
    pub sequence_id: Uuid,
    pub step_number: i32,
    pub delay_days: i32,
    pub template_key: String,
    pub is_active: bool,
}
