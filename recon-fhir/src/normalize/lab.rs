//! Observation → `LabResult`.

use recon_core::{CodeSystem, LabResult, LabStatus, ObservationValue, ReferenceRange, ValueType};
use serde_json::Value;

use crate::codes::{local_info, resolve_coding, CodeInfo, ResolvedCode};
use crate::fhir::{
    array, codings, concept_label, concept_text, extract_datetime, number, str_field,
};

use super::resource_id;

const UNKNOWN_NAME: &str = "Unknown Lab";

const ABNORMAL_FLAGS: [&str; 10] = ["h", "l", "hh", "ll", "hu", "lu", "a", "aa", ">", "<"];
const ABNORMAL_WORDS: [&str; 5] = ["abnormal", "critical", "high", "low", "panic"];

fn resolved_code(resource: &Value) -> Option<ResolvedCode> {
    let codings = resource.get("code").map(codings).unwrap_or_default();
    resolve_coding(codings, CodeSystem::Loinc)
}

/// LOINC (or unlabelled) code worth sending to the lookup service.
pub(super) fn enrichment_code(resource: &Value) -> Option<String> {
    resolved_code(resource)
        .filter(|resolved| resolved.is(CodeSystem::Loinc) || resolved.system.is_none())
        .map(|resolved| resolved.code)
}

pub(super) fn build(resource: &Value, source: &str, enrichment: Option<CodeInfo>) -> LabResult {
    let concept = resource.get("code");
    let resolved = resolved_code(resource);
    let local = resolved
        .as_ref()
        .filter(|resolved| resolved.is(CodeSystem::Loinc) || resolved.system.is_none())
        .and_then(|resolved| local_info(CodeSystem::Loinc, &resolved.code));

    let name = concept
        .and_then(concept_label)
        .or_else(|| local.map(|info| info.name.clone()))
        .or_else(|| enrichment.as_ref().map(|info| info.name.clone()))
        .or_else(|| resolved.as_ref().map(|resolved| resolved.code.clone()))
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let category = local
        .and_then(|info| info.category.clone())
        .or_else(|| enrichment.as_ref().and_then(|info| info.category.clone()))
        .or_else(|| array(resource, "category").first().and_then(concept_text));

    let (value, value_type, unit) = read_value(resource);
    let reference_range = array(resource, "referenceRange").first().map(read_range);
    let interpretation = interpretation_text(resource);
    let abnormal = match interpretation_codes(resource) {
        codes if !codes.is_empty() => codes.iter().any(|code| is_abnormal_flag(code)),
        _ => out_of_range(&value, reference_range.as_ref()),
    };

    LabResult {
        id: resource_id(resource),
        source: source.to_string(),
        name,
        code: resolved.as_ref().map(|resolved| resolved.code.clone()),
        code_system: resolved.and_then(|resolved| resolved.system),
        value,
        unit,
        value_type,
        observed_at: extract_datetime(
            resource,
            &[
                "effectiveDateTime",
                "effectiveInstant",
                "effectivePeriod",
                "issued",
            ],
        ),
        status: resource
            .get("status")
            .and_then(Value::as_str)
            .map(LabStatus::from_fhir)
            .unwrap_or_default(),
        reference_range,
        interpretation,
        abnormal,
        category,
        enriched: enrichment.is_some(),
        raw: resource.clone(),
    }
}

fn read_value(resource: &Value) -> (Option<ObservationValue>, ValueType, Option<String>) {
    if let Some(quantity) = resource.get("valueQuantity") {
        let unit = str_field(quantity, "unit").or_else(|| str_field(quantity, "code"));
        return (
            number(quantity, "value").map(ObservationValue::Numeric),
            ValueType::Quantity,
            unit,
        );
    }

    if let Some(integer) = resource.get("valueInteger").and_then(Value::as_f64) {
        return (Some(ObservationValue::Numeric(integer)), ValueType::Integer, None);
    }

    if let Some(text) = resource.get("valueString").and_then(Value::as_str) {
        return (
            Some(ObservationValue::Text(text.trim().to_string())),
            ValueType::String,
            None,
        );
    }

    if let Some(concept) = resource.get("valueCodeableConcept") {
        let code = codings(concept)
            .iter()
            .find_map(|coding| str_field(coding, "code"));
        return (
            Some(ObservationValue::Coded {
                code,
                display: concept_label(concept),
            }),
            ValueType::CodeableConcept,
            None,
        );
    }

    if let Some(flag) = resource.get("valueBoolean").and_then(Value::as_bool) {
        return (Some(ObservationValue::Boolean(flag)), ValueType::Boolean, None);
    }

    (None, ValueType::Empty, None)
}

fn read_range(range: &Value) -> ReferenceRange {
    let low = range.get("low");
    let high = range.get("high");
    ReferenceRange {
        low: low.and_then(|q| number(q, "value")),
        high: high.and_then(|q| number(q, "value")),
        unit: low
            .and_then(|q| str_field(q, "unit"))
            .or_else(|| high.and_then(|q| str_field(q, "unit"))),
        text: str_field(range, "text"),
    }
}

/// `interpretation` is an array in R4 and a single concept in STU3.
fn interpretation_concepts(resource: &Value) -> Vec<&Value> {
    match resource.get("interpretation") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(concept @ Value::Object(_)) => vec![concept],
        _ => Vec::new(),
    }
}

fn interpretation_text(resource: &Value) -> Option<String> {
    interpretation_concepts(resource)
        .into_iter()
        .find_map(concept_text)
}

fn interpretation_codes(resource: &Value) -> Vec<String> {
    interpretation_concepts(resource)
        .into_iter()
        .flat_map(|concept| {
            codings(concept)
                .iter()
                .filter_map(|coding| str_field(coding, "code"))
                .chain(str_field(concept, "text"))
                .collect::<Vec<_>>()
        })
        .map(|code| code.to_lowercase())
        .collect()
}

/// Whole interpretation codes, or free text containing an abnormal label as a
/// whole word. "Normal, follow up" stays normal.
fn is_abnormal_flag(code: &str) -> bool {
    ABNORMAL_FLAGS.contains(&code)
        || code
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| ABNORMAL_WORDS.contains(&word))
}

fn out_of_range(value: &Option<ObservationValue>, range: Option<&ReferenceRange>) -> bool {
    let (Some(ObservationValue::Numeric(value)), Some(range)) = (value, range) else {
        return false;
    };
    range.low.is_some_and(|low| *value < low) || range.high.is_some_and(|high| *value > high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn a1c() -> Value {
        json!({
            "resourceType": "Observation",
            "id": "obs-1",
            "status": "final",
            "category": [{ "coding": [{ "code": "laboratory", "display": "Laboratory" }] }],
            "code": { "coding": [{ "system": "http://loinc.org", "code": "4548-4" }] },
            "valueQuantity": { "value": 7.2, "unit": "%" },
            "referenceRange": [{
                "low": { "value": 4.0, "unit": "%" },
                "high": { "value": 5.6, "unit": "%" }
            }],
            "effectiveDateTime": "2024-12-15T08:00:00Z"
        })
    }

    #[test]
    fn builds_from_loinc_table() {
        let lab = build(&a1c(), "epic", None);
        assert_eq!(lab.name, "Hemoglobin A1c");
        assert_eq!(lab.code.as_deref(), Some("4548-4"));
        assert_eq!(lab.code_system.as_deref(), Some("LOINC"));
        assert_eq!(lab.numeric_value(), Some(7.2));
        assert_eq!(lab.unit.as_deref(), Some("%"));
        assert_eq!(lab.value_type, ValueType::Quantity);
        assert_eq!(lab.status, LabStatus::Final);
        assert_eq!(lab.category.as_deref(), Some("Chemistry"));
        assert!(lab.abnormal);
        assert!(!lab.enriched);
        assert_eq!(lab.source, "epic");
    }

    #[test]
    fn interpretation_overrides_range() {
        let mut resource = a1c();
        resource["interpretation"] = json!([{ "coding": [{ "code": "N", "display": "Normal" }] }]);
        let lab = build(&resource, "epic", None);
        assert!(!lab.abnormal);
        assert_eq!(lab.interpretation.as_deref(), Some("Normal"));
    }

    #[test]
    fn interpretation_text_matches_whole_words() {
        let mut resource = a1c();
        resource["valueQuantity"] = json!({ "value": 5.1, "unit": "%" });
        resource["interpretation"] = json!([{ "text": "Normal, follow up in 1 year" }]);
        assert!(!build(&resource, "epic", None).abnormal);

        resource["interpretation"] = json!([{ "text": "Yellow, allowed range" }]);
        assert!(!build(&resource, "epic", None).abnormal);

        resource["interpretation"] = json!([{ "text": "Critical high" }]);
        assert!(build(&resource, "epic", None).abnormal);

        resource["interpretation"] = json!([{ "coding": [{ "code": "HH" }] }]);
        assert!(build(&resource, "epic", None).abnormal);
    }

    #[test]
    fn name_chain_ends_in_unknown() {
        let lab = build(&json!({ "status": "weird" }), "epic", None);
        assert_eq!(lab.name, UNKNOWN_NAME);
        assert_eq!(lab.status, LabStatus::Unknown);
        assert_eq!(lab.value_type, ValueType::Empty);

        let coded = json!({
            "code": { "coding": [{ "system": "http://loinc.org", "code": "99999-9" }] }
        });
        assert_eq!(build(&coded, "epic", None).name, "99999-9");
    }

    #[test]
    fn enrichment_names_unmapped_codes() {
        let resource = json!({
            "code": { "coding": [{ "system": "http://loinc.org", "code": "99999-9" }] },
            "valueString": "positive"
        });
        let info = CodeInfo {
            name: "Rare antibody panel".into(),
            category: Some("Serology".into()),
        };
        let lab = build(&resource, "epic", Some(info));
        assert_eq!(lab.name, "Rare antibody panel");
        assert_eq!(lab.category.as_deref(), Some("Serology"));
        assert!(lab.enriched);
        assert_eq!(lab.text_value(), Some("positive"));
        assert_eq!(enrichment_code(&resource).as_deref(), Some("99999-9"));
    }

    #[test]
    fn local_codes_are_not_enriched() {
        let resource = json!({
            "code": { "coding": [{ "system": "urn:acme:lab", "code": "A1C" }] }
        });
        assert_eq!(enrichment_code(&resource), None);
        let lab = build(&resource, "acme", None);
        assert_eq!(lab.code_system.as_deref(), Some("urn:acme:lab"));
    }

    #[test]
    fn coded_values() {
        let resource = json!({
            "code": { "text": "Blood type" },
            "valueCodeableConcept": { "coding": [{ "code": "A+", "display": "A positive" }] }
        });
        let lab = build(&resource, "epic", None);
        assert_eq!(lab.value_type, ValueType::CodeableConcept);
        assert_eq!(lab.text_value(), Some("A positive"));
        assert_eq!(lab.name, "Blood type");
    }
}
