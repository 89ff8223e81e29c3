//! Gói kết quả theo từng kết nối và theo từng bệnh nhân.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Claim, Condition, DuplicateGroup, Encounter, LabResult, Medication, Patient};

/// Phiên bản cấu trúc bản ghi chuẩn, ghi trong mọi gói kết quả.
pub const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecordCounts {
    pub patients: usize,
    pub labs: usize,
    pub medications: usize,
    pub conditions: usize,
    pub encounters: usize,
    pub claims: usize,
}

impl RecordCounts {
    pub fn total(&self) -> usize {
        self.patients
            + self.labs
            + self.medications
            + self.conditions
            + self.encounters
            + self.claims
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationMeta {
    pub normalized_at: DateTime<Utc>,
    pub source: String,
    pub version: String,
    /// `true` khi có ít nhất một bản ghi được bổ sung từ dịch vụ tra cứu ngoài.
    pub api_enriched: bool,
    pub counts: RecordCounts,
}

/// Các mảng bản ghi chuẩn sinh ra từ bundle thô của một kết nối.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedBundle {
    pub patient: Option<Patient>,
    pub labs: Vec<LabResult>,
    pub medications: Vec<Medication>,
    pub conditions: Vec<Condition>,
    pub encounters: Vec<Encounter>,
    pub claims: Vec<Claim>,
    #[serde(rename = "_meta")]
    pub meta: NormalizationMeta,
}

impl NormalizedBundle {
    pub fn counts(&self) -> RecordCounts {
        RecordCounts {
            patients: usize::from(self.patient.is_some()),
            labs: self.labs.len(),
            medications: self.medications.len(),
            conditions: self.conditions.len(),
            encounters: self.encounters.len(),
            claims: self.claims.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationMeta {
    pub reconciled_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub version: String,
    pub api_enriched: bool,
    pub records_in: RecordCounts,
    pub groups_out: RecordCounts,
}

/// Hồ sơ đã khử trùng lặp của một bệnh nhân qua nhiều kết nối.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconciledRecord {
    pub patients: Vec<DuplicateGroup<Patient>>,
    pub labs: Vec<DuplicateGroup<LabResult>>,
    pub medications: Vec<DuplicateGroup<Medication>>,
    pub conditions: Vec<DuplicateGroup<Condition>>,
    pub encounters: Vec<DuplicateGroup<Encounter>>,
    pub claims: Vec<Claim>,
    #[serde(rename = "_meta")]
    pub meta: ReconciliationMeta,
}
