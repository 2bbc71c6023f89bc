use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scan_result", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScanResult {
    Valid,
    Used,
    Invalid,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scan_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    #[default]
    Camera,
    Manual,
}

/// One row of the append-only scan audit trail. `ticket_id` is absent when
/// the scanned token never authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ScanLogEntry {
    pub id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub scanner_id: Uuid,
    pub scan_result: ScanResult,
    pub scan_source: ScanSource,
    pub scan_time: DateTime<Utc>,
}

impl ScanLogEntry {
    pub fn record(
        ticket_id: Option<Uuid>,
        scanner_id: Uuid,
        scan_result: ScanResult,
        scan_source: ScanSource,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            scanner_id,
            scan_result,
            scan_source,
            scan_time: Utc::now(),
        }
    }
}
