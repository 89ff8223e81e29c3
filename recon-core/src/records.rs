//! Cấu trúc bản ghi chuẩn do các bộ chuẩn hoá sinh ra.
//!
//! Mỗi bản ghi giữ mã định danh của nguồn, nhãn `source` của kết nối và bản
//! sao payload gốc để đối soát.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Các hệ mã mà engine nhận diện được.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CodeSystem {
    #[serde(rename = "LOINC")]
    Loinc,
    #[serde(rename = "RxNorm")]
    RxNorm,
    #[serde(rename = "ICD-10")]
    Icd10,
    #[serde(rename = "SNOMED")]
    Snomed,
    #[serde(rename = "NDC")]
    Ndc,
    #[serde(rename = "CPT")]
    Cpt,
}

impl CodeSystem {
    /// Nhãn ngắn lưu trong trường `code_system`.
    pub fn tag(self) -> &'static str {
        match self {
            CodeSystem::Loinc => "LOINC",
            CodeSystem::RxNorm => "RxNorm",
            CodeSystem::Icd10 => "ICD-10",
            CodeSystem::Snomed => "SNOMED",
            CodeSystem::Ndc => "NDC",
            CodeSystem::Cpt => "CPT",
        }
    }

    /// Chuỗi con nhận diện hệ mã trong URI `system` của FHIR.
    pub fn needle(self) -> &'static str {
        match self {
            CodeSystem::Loinc => "loinc",
            CodeSystem::RxNorm => "rxnorm",
            CodeSystem::Icd10 => "icd-10",
            CodeSystem::Snomed => "snomed",
            CodeSystem::Ndc => "ndc",
            CodeSystem::Cpt => "cpt",
        }
    }

    /// Nhận diện URI `system` của FHIR, ví dụ `http://loinc.org`.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let lower = uri.to_lowercase();
        if lower.contains("loinc") {
            Some(CodeSystem::Loinc)
        } else if lower.contains("rxnorm") {
            Some(CodeSystem::RxNorm)
        } else if lower.contains("icd-10") || lower.contains("icd10") {
            Some(CodeSystem::Icd10)
        } else if lower.contains("snomed") {
            Some(CodeSystem::Snomed)
        } else if lower.contains("ndc") {
            Some(CodeSystem::Ndc)
        } else if lower.contains("cpt") {
            Some(CodeSystem::Cpt)
        } else {
            None
        }
    }

    /// Đoạn đường dẫn dùng cho dịch vụ tra cứu ngoài.
    pub fn slug(self) -> &'static str {
        match self {
            CodeSystem::Loinc => "loinc",
            CodeSystem::RxNorm => "rxnorm",
            CodeSystem::Icd10 => "icd10",
            CodeSystem::Snomed => "snomed",
            CodeSystem::Ndc => "ndc",
            CodeSystem::Cpt => "cpt",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    pub fn from_fhir(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "male" | "m" => Gender::Male,
            "female" | "f" => Gender::Female,
            "other" | "o" => Gender::Other,
            _ => Gender::Unknown,
        }
    }
}

/// Địa chỉ liên lạc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Address {
    pub lines: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub text: Option<String>,
}

/// Thông tin nhân khẩu của bệnh nhân.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Option<String>,
    pub source: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Gender,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub raw: Value,
}

/// Trạng thái Observation, theo value set của FHIR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabStatus {
    Registered,
    Preliminary,
    Final,
    Amended,
    Corrected,
    Cancelled,
    Error,
    #[default]
    Unknown,
}

impl LabStatus {
    pub fn from_fhir(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "registered" => LabStatus::Registered,
            "preliminary" => LabStatus::Preliminary,
            "final" => LabStatus::Final,
            "amended" => LabStatus::Amended,
            "corrected" => LabStatus::Corrected,
            "cancelled" => LabStatus::Cancelled,
            "entered-in-error" => LabStatus::Error,
            _ => LabStatus::Unknown,
        }
    }
}

/// Phần tử `value[x]` chứa kết quả quan sát.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Quantity,
    String,
    CodeableConcept,
    Boolean,
    Integer,
    #[default]
    #[serde(rename = "none")]
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ObservationValue {
    Numeric(f64),
    Boolean(bool),
    Text(String),
    Coded {
        code: Option<String>,
        display: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReferenceRange {
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub unit: Option<String>,
    pub text: Option<String>,
}

/// Kết quả xét nghiệm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabResult {
    pub id: Option<String>,
    pub source: String,
    pub name: String,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub value: Option<ObservationValue>,
    pub unit: Option<String>,
    pub value_type: ValueType,
    pub observed_at: Option<DateTime<Utc>>,
    pub status: LabStatus,
    pub reference_range: Option<ReferenceRange>,
    pub interpretation: Option<String>,
    pub abnormal: bool,
    pub category: Option<String>,
    pub enriched: bool,
    pub raw: Value,
}

impl LabResult {
    /// Mã LOINC, khi mã đã phân giải thuộc LOINC.
    pub fn loinc(&self) -> Option<&str> {
        code_in(&self.code, &self.code_system, CodeSystem::Loinc)
    }

    pub fn numeric_value(&self) -> Option<f64> {
        match &self.value {
            Some(ObservationValue::Numeric(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn text_value(&self) -> Option<&str> {
        match &self.value {
            Some(ObservationValue::Text(text)) => Some(text.as_str()),
            Some(ObservationValue::Coded { display, code }) => {
                display.as_deref().or(code.as_deref())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MedicationStatus {
    Active,
    Completed,
    Stopped,
    OnHold,
    Cancelled,
    Error,
    Draft,
    #[default]
    Unknown,
}

impl MedicationStatus {
    /// Bao gồm cả bộ giá trị của MedicationRequest và MedicationStatement.
    pub fn from_fhir(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "active" => MedicationStatus::Active,
            "completed" => MedicationStatus::Completed,
            "stopped" | "not-taken" => MedicationStatus::Stopped,
            "on-hold" | "suspended" => MedicationStatus::OnHold,
            "cancelled" => MedicationStatus::Cancelled,
            "entered-in-error" => MedicationStatus::Error,
            "draft" | "intended" => MedicationStatus::Draft,
            _ => MedicationStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Dosage {
    pub text: Option<String>,
    pub dose: Option<f64>,
    pub unit: Option<String>,
    pub frequency: Option<String>,
    pub route: Option<String>,
}

/// Thuốc được kê hoặc được báo cáo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: Option<String>,
    pub source: String,
    pub name: String,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub ndc: Option<String>,
    pub status: MedicationStatus,
    pub dosage: Option<Dosage>,
    pub prescribed_at: Option<DateTime<Utc>>,
    pub prescriber: Option<String>,
    pub refills: Option<u32>,
    pub quantity: Option<f64>,
    pub days_supply: Option<u32>,
    pub category: Option<String>,
    pub enriched: bool,
    pub raw: Value,
}

impl Medication {
    pub fn rxnorm(&self) -> Option<&str> {
        code_in(&self.code, &self.code_system, CodeSystem::RxNorm)
    }

    pub fn dosage_text(&self) -> Option<&str> {
        self.dosage.as_ref().and_then(|dosage| dosage.text.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalStatus {
    Active,
    Inactive,
    Resolved,
    #[default]
    Unknown,
}

impl ClinicalStatus {
    pub fn from_fhir(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "active" | "recurrence" | "relapse" => ClinicalStatus::Active,
            "inactive" | "remission" => ClinicalStatus::Inactive,
            "resolved" => ClinicalStatus::Resolved,
            _ => ClinicalStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Confirmed,
    Provisional,
    Unconfirmed,
    Refuted,
    Error,
    #[default]
    Unknown,
}

impl VerificationStatus {
    pub fn from_fhir(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "confirmed" => VerificationStatus::Confirmed,
            "provisional" | "differential" => VerificationStatus::Provisional,
            "unconfirmed" => VerificationStatus::Unconfirmed,
            "refuted" => VerificationStatus::Refuted,
            "entered-in-error" => VerificationStatus::Error,
            _ => VerificationStatus::Unknown,
        }
    }
}

/// Chẩn đoán hoặc mục trong danh sách vấn đề.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub id: Option<String>,
    pub source: String,
    pub name: String,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub icd10: Option<String>,
    pub snomed: Option<String>,
    pub clinical_status: ClinicalStatus,
    pub verification_status: VerificationStatus,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub onset_date: Option<DateTime<Utc>>,
    pub recorded_date: Option<DateTime<Utc>>,
    pub enriched: bool,
    pub raw: Value,
}

impl Condition {
    pub fn has_code(&self) -> bool {
        self.code.is_some() || self.icd10.is_some() || self.snomed.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterClass {
    Outpatient,
    Inpatient,
    Emergency,
    Virtual,
    HomeHealth,
    Observation,
    ShortStay,
    #[default]
    Unknown,
}

impl EncounterClass {
    /// Ánh xạ lớp ActCode HL7 v3 cùng nhãn hiển thị của chúng.
    pub fn from_fhir(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "amb" | "ambulatory" | "outpatient" | "fld" | "field" => EncounterClass::Outpatient,
            "imp" | "inpatient" | "inpatient encounter" | "acute" | "nonac"
            | "inpatient acute" | "inpatient non-acute" => EncounterClass::Inpatient,
            "emer" | "emergency" => EncounterClass::Emergency,
            "vr" | "virtual" => EncounterClass::Virtual,
            "hh" | "home health" => EncounterClass::HomeHealth,
            "obsenc" | "observation encounter" | "observation" => EncounterClass::Observation,
            "ss" | "short stay" => EncounterClass::ShortStay,
            _ => EncounterClass::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Error,
    #[default]
    Unknown,
}

impl EncounterStatus {
    pub fn from_fhir(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "planned" | "arrived" | "triaged" | "booked" => EncounterStatus::Scheduled,
            "in-progress" | "onleave" => EncounterStatus::InProgress,
            "finished" | "completed" => EncounterStatus::Completed,
            "cancelled" => EncounterStatus::Cancelled,
            "entered-in-error" => EncounterStatus::Error,
            _ => EncounterStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Participant {
    pub role: Option<String>,
    pub name: Option<String>,
}

/// Lần khám, nhập viện hoặc khám từ xa.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Encounter {
    pub id: Option<String>,
    pub source: String,
    pub type_name: String,
    pub type_code: Option<String>,
    pub class: EncounterClass,
    pub status: EncounterStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub participants: Vec<Participant>,
    pub reasons: Vec<String>,
    pub service_provider: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Professional,
    Institutional,
    Dental,
    Pharmacy,
    Vision,
    #[default]
    Unknown,
}

impl ClaimType {
    pub fn from_fhir(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "professional" => ClaimType::Professional,
            "institutional" | "inpatient-facility" | "outpatient-facility" => {
                ClaimType::Institutional
            }
            "oral" | "dental" => ClaimType::Dental,
            "pharmacy" => ClaimType::Pharmacy,
            "vision" => ClaimType::Vision,
            _ => ClaimType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Active,
    Cancelled,
    Draft,
    Error,
    #[default]
    Unknown,
}

impl ClaimStatus {
    pub fn from_fhir(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "active" => ClaimStatus::Active,
            "cancelled" => ClaimStatus::Cancelled,
            "draft" => ClaimStatus::Draft,
            "entered-in-error" => ClaimStatus::Error,
            _ => ClaimStatus::Unknown,
        }
    }
}

/// Số tiền chia theo bốn nhóm xét duyệt chuẩn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct AdjudicationAmounts {
    pub billed: f64,
    pub allowed: f64,
    pub paid: f64,
    pub patient_responsibility: f64,
}

impl AdjudicationAmounts {
    pub fn add(&mut self, other: &AdjudicationAmounts) {
        self.billed += other.billed;
        self.allowed += other.allowed;
        self.paid += other.paid;
        self.patient_responsibility += other.patient_responsibility;
    }

    pub fn is_zero(&self) -> bool {
        self.billed == 0.0
            && self.allowed == 0.0
            && self.paid == 0.0
            && self.patient_responsibility == 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClaimDiagnosis {
    pub sequence: Option<u32>,
    pub code: Option<String>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClaimProcedure {
    pub sequence: Option<u32>,
    pub code: Option<String>,
    pub display: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClaimItem {
    pub sequence: Option<u32>,
    pub service_code: Option<String>,
    pub service_name: Option<String>,
    pub serviced_date: Option<DateTime<Utc>>,
    pub quantity: Option<f64>,
    pub adjudication: AdjudicationAmounts,
}

/// Yêu cầu bồi hoàn bảo hiểm hoặc giải trình quyền lợi.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claim {
    pub id: Option<String>,
    pub source: String,
    pub claim_type: ClaimType,
    pub status: ClaimStatus,
    pub outcome: Option<String>,
    pub service_start: Option<DateTime<Utc>>,
    pub service_end: Option<DateTime<Utc>>,
    pub provider: Option<String>,
    pub facility: Option<String>,
    pub diagnoses: Vec<ClaimDiagnosis>,
    pub procedures: Vec<ClaimProcedure>,
    pub totals: AdjudicationAmounts,
    pub items: Vec<ClaimItem>,
    pub raw: Value,
}

fn code_in<'a>(
    code: &'a Option<String>,
    code_system: &Option<String>,
    system: CodeSystem,
) -> Option<&'a str> {
    match code_system.as_deref() {
        Some(tag) if tag == system.tag() => code.as_deref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tables_fall_back_to_unknown() {
        assert_eq!(MedicationStatus::from_fhir("on-hold"), MedicationStatus::OnHold);
        assert_eq!(MedicationStatus::from_fhir("whatever"), MedicationStatus::Unknown);
        assert_eq!(LabStatus::from_fhir("entered-in-error"), LabStatus::Error);
        assert_eq!(EncounterStatus::from_fhir("finished"), EncounterStatus::Completed);
        assert_eq!(ClaimType::from_fhir("oral"), ClaimType::Dental);
        assert_eq!(ClinicalStatus::from_fhir("remission"), ClinicalStatus::Inactive);
        assert_eq!(VerificationStatus::from_fhir(""), VerificationStatus::Unknown);
    }

    #[test]
    fn encounter_class_reads_act_codes() {
        assert_eq!(EncounterClass::from_fhir("AMB"), EncounterClass::Outpatient);
        assert_eq!(EncounterClass::from_fhir("IMP"), EncounterClass::Inpatient);
        assert_eq!(EncounterClass::from_fhir("EMER"), EncounterClass::Emergency);
        assert_eq!(EncounterClass::from_fhir("HH"), EncounterClass::HomeHealth);
    }

    #[test]
    fn code_system_from_uri() {
        assert_eq!(CodeSystem::from_uri("http://loinc.org"), Some(CodeSystem::Loinc));
        assert_eq!(
            CodeSystem::from_uri("http://www.nlm.nih.gov/research/umls/rxnorm"),
            Some(CodeSystem::RxNorm)
        );
        assert_eq!(
            CodeSystem::from_uri("http://hl7.org/fhir/sid/icd-10-cm"),
            Some(CodeSystem::Icd10)
        );
        assert_eq!(CodeSystem::from_uri("urn:oid:1.2.3"), None);
    }

    #[test]
    fn enums_serialize_to_canonical_vocabulary() {
        assert_eq!(
            serde_json::to_value(MedicationStatus::OnHold).unwrap(),
            serde_json::json!("on-hold")
        );
        assert_eq!(
            serde_json::to_value(EncounterStatus::InProgress).unwrap(),
            serde_json::json!("in-progress")
        );
        assert_eq!(
            serde_json::to_value(ValueType::Empty).unwrap(),
            serde_json::json!("none")
        );
        assert_eq!(
            serde_json::to_value(CodeSystem::Icd10).unwrap(),
            serde_json::json!("ICD-10")
        );
    }
}
