//! Condition → `Condition`.

use recon_core::{ClinicalStatus, CodeSystem, Condition, VerificationStatus};
use serde_json::Value;

use crate::codes::{code_in_system, local_info, snomed_to_icd10, system_tag, CodeInfo};
use crate::fhir::{
    array, codings, concept_label, concept_text, extract_datetime, parse_datetime, status_code,
    str_field,
};

use super::resource_id;

const UNKNOWN_NAME: &str = "Unknown Condition";

struct ConditionCodes {
    icd10: Option<String>,
    snomed: Option<String>,
    /// First code of any other system, used when neither is present.
    other: Option<(String, Option<String>)>,
}

fn read_codes(resource: &Value) -> ConditionCodes {
    let codings = resource.get("code").map(codings).unwrap_or_default();
    let snomed = code_in_system(codings, CodeSystem::Snomed);
    let icd10 = code_in_system(codings, CodeSystem::Icd10)
        .or_else(|| snomed.as_deref().and_then(snomed_to_icd10).map(str::to_string));
    let other = codings.iter().find_map(|coding| {
        str_field(coding, "code").map(|code| {
            let system = str_field(coding, "system").map(|uri| system_tag(&uri));
            (code, system)
        })
    });

    ConditionCodes {
        icd10,
        snomed,
        other,
    }
}

pub(super) fn enrichment_code(resource: &Value) -> Option<String> {
    read_codes(resource).icd10
}

pub(super) fn build(resource: &Value, source: &str, enrichment: Option<CodeInfo>) -> Condition {
    let ConditionCodes {
        icd10,
        snomed,
        other,
    } = read_codes(resource);

    let (code, code_system) = match (&icd10, &snomed) {
        (Some(icd10), _) => (Some(icd10.clone()), Some(CodeSystem::Icd10.tag().to_string())),
        (None, Some(snomed)) => (Some(snomed.clone()), Some(CodeSystem::Snomed.tag().to_string())),
        (None, None) => match other {
            Some((code, system)) => (Some(code), system),
            None => (None, None),
        },
    };

    let local = icd10
        .as_deref()
        .and_then(|code| local_info(CodeSystem::Icd10, code));

    let name = resource
        .get("code")
        .and_then(concept_label)
        .or_else(|| local.map(|info| info.name.clone()))
        .or_else(|| enrichment.as_ref().map(|info| info.name.clone()))
        .or_else(|| code.clone())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let category = array(resource, "category")
        .first()
        .and_then(concept_text)
        .or_else(|| local.and_then(|info| info.category.clone()))
        .or_else(|| enrichment.as_ref().and_then(|info| info.category.clone()));

    let onset_date = extract_datetime(resource, &["onsetDateTime", "onsetPeriod"]).or_else(|| {
        resource
            .get("onsetString")
            .and_then(Value::as_str)
            .and_then(parse_datetime)
    });

    Condition {
        id: resource_id(resource),
        source: source.to_string(),
        name,
        code,
        code_system,
        icd10,
        snomed,
        clinical_status: status_code(resource.get("clinicalStatus"))
            .map(|status| ClinicalStatus::from_fhir(&status))
            .unwrap_or_default(),
        verification_status: status_code(resource.get("verificationStatus"))
            .map(|status| VerificationStatus::from_fhir(&status))
            .unwrap_or_default(),
        category,
        severity: resource.get("severity").and_then(concept_text),
        onset_date,
        recorded_date: extract_datetime(resource, &["recordedDate", "assertedDate"]),
        enriched: enrichment.is_some(),
        raw: resource.clone(),
    }
}
