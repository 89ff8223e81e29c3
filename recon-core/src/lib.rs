//! Mô hình dữ liệu chuẩn dùng chung cho bộ chuẩn hoá và bộ khử trùng lặp.

mod bundle;
mod config;
mod group;
mod records;

pub use bundle::{
    NormalizationMeta, NormalizedBundle, ReconciledRecord, ReconciliationMeta, RecordCounts,
    SCHEMA_VERSION,
};
pub use config::{Clustering, DedupConfig};
pub use group::{DuplicateGroup, Provenance};
pub use records::{
    Address, AdjudicationAmounts, Claim, ClaimDiagnosis, ClaimItem, ClaimProcedure, ClaimStatus,
    ClaimType, ClinicalStatus, CodeSystem, Condition, Dosage, Encounter, EncounterClass,
    EncounterStatus, Gender, LabResult, LabStatus, Medication, MedicationStatus, ObservationValue,
    Participant, Patient, ReferenceRange, ValueType, VerificationStatus,
};

/// Lỗi tại biên JSON. Bản thân bước chuẩn hoá không bao giờ lỗi.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Dữ liệu đầu vào thiếu thông tin tối thiểu: {0}")]
    MissingData(String),
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        ReconcileError::Parse(err.to_string())
    }
}
