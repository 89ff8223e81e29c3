//! MedicationRequest / MedicationStatement → `Medication`.

use recon_core::{CodeSystem, Dosage, Medication, MedicationStatus};
use serde_json::Value;

use crate::codes::{code_in_system, local_info, resolve_coding, CodeInfo, ResolvedCode};
use crate::fhir::{
    array, codings, concept_label, concept_text, extract_datetime, number, reference_display,
    str_field, unsigned,
};

use super::resource_id;

const UNKNOWN_NAME: &str = "Unknown Medication";

/// The medication concept: R4 `medicationCodeableConcept`, R5
/// `medication.concept`, or the code of a contained Medication.
fn medication_concept(resource: &Value) -> Option<&Value> {
    resource
        .get("medicationCodeableConcept")
        .or_else(|| resource.get("medication").and_then(|m| m.get("concept")))
        .or_else(|| {
            array(resource, "contained")
                .iter()
                .find(|contained| {
                    contained.get("resourceType").and_then(Value::as_str) == Some("Medication")
                })
                .and_then(|contained| contained.get("code"))
        })
}

fn resolved_code(resource: &Value) -> Option<ResolvedCode> {
    let codings = medication_concept(resource).map(codings).unwrap_or_default();
    resolve_coding(codings, CodeSystem::RxNorm)
}

pub(super) fn enrichment_code(resource: &Value) -> Option<String> {
    resolved_code(resource)
        .filter(|resolved| resolved.is(CodeSystem::RxNorm) || resolved.system.is_none())
        .map(|resolved| resolved.code)
}

pub(super) fn build(resource: &Value, source: &str, enrichment: Option<CodeInfo>) -> Medication {
    let concept = medication_concept(resource);
    let codings = concept.map(codings).unwrap_or_default();
    let resolved = resolved_code(resource);
    let local = resolved
        .as_ref()
        .filter(|resolved| resolved.is(CodeSystem::RxNorm) || resolved.system.is_none())
        .and_then(|resolved| local_info(CodeSystem::RxNorm, &resolved.code));

    let name = concept
        .and_then(concept_label)
        .or_else(|| {
            resource
                .get("medicationReference")
                .and_then(|reference| str_field(reference, "display"))
        })
        .or_else(|| local.map(|info| info.name.clone()))
        .or_else(|| enrichment.as_ref().map(|info| info.name.clone()))
        .or_else(|| resolved.as_ref().map(|resolved| resolved.code.clone()))
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let category = local
        .and_then(|info| info.category.clone())
        .or_else(|| enrichment.as_ref().and_then(|info| info.category.clone()))
        .or_else(|| category_text(resource));

    let dispense = resource.get("dispenseRequest");

    Medication {
        id: resource_id(resource),
        source: source.to_string(),
        name,
        code: resolved.as_ref().map(|resolved| resolved.code.clone()),
        code_system: resolved.and_then(|resolved| resolved.system),
        ndc: code_in_system(codings, CodeSystem::Ndc),
        status: resource
            .get("status")
            .and_then(Value::as_str)
            .map(MedicationStatus::from_fhir)
            .unwrap_or_default(),
        dosage: read_dosage(resource),
        prescribed_at: extract_datetime(
            resource,
            &[
                "authoredOn",
                "dateAsserted",
                "effectiveDateTime",
                "effectivePeriod",
            ],
        ),
        prescriber: ["requester", "informationSource", "recorder"]
            .iter()
            .filter_map(|key| resource.get(*key))
            .find_map(reference_display),
        refills: dispense.and_then(|d| unsigned(d, "numberOfRepeatsAllowed")),
        quantity: dispense
            .and_then(|d| d.get("quantity"))
            .and_then(|q| number(q, "value")),
        days_supply: dispense
            .and_then(|d| d.get("expectedSupplyDuration"))
            .and_then(supply_days),
        category,
        enriched: enrichment.is_some(),
        raw: resource.clone(),
    }
}

/// `category` is an array on MedicationRequest and a single concept on
/// MedicationStatement.
fn category_text(resource: &Value) -> Option<String> {
    match resource.get("category")? {
        Value::Array(items) => items.iter().find_map(concept_text),
        concept => concept_text(concept),
    }
}

fn read_dosage(resource: &Value) -> Option<Dosage> {
    let dosage = array(resource, "dosageInstruction")
        .first()
        .or_else(|| array(resource, "dosage").first())?;

    let dose_quantity = array(dosage, "doseAndRate")
        .first()
        .and_then(|dose| dose.get("doseQuantity"))
        .or_else(|| dosage.get("doseQuantity"));

    let result = Dosage {
        text: str_field(dosage, "text").or_else(|| str_field(dosage, "patientInstruction")),
        dose: dose_quantity.and_then(|q| number(q, "value")),
        unit: dose_quantity.and_then(|q| str_field(q, "unit").or_else(|| str_field(q, "code"))),
        frequency: dosage.get("timing").and_then(describe_frequency),
        route: dosage.get("route").and_then(concept_text),
    };

    if result == Dosage::default() {
        None
    } else {
        Some(result)
    }
}

fn describe_frequency(timing: &Value) -> Option<String> {
    if let Some(repeat) = timing.get("repeat") {
        if let (Some(period), Some(unit)) =
            (number(repeat, "period"), str_field(repeat, "periodUnit"))
        {
            let frequency = unsigned(repeat, "frequency").unwrap_or(1);
            let times = match frequency {
                1 => "once".to_string(),
                2 => "twice".to_string(),
                n => format!("{n} times"),
            };
            let unit_word = period_unit_word(&unit);
            return Some(if period == 1.0 {
                format!("{times} per {unit_word}")
            } else {
                format!("{times} every {} {unit_word}s", format_numeric(period))
            });
        }
    }
    timing.get("code").and_then(concept_text)
}

fn period_unit_word(unit: &str) -> &str {
    match unit {
        "s" => "second",
        "min" => "minute",
        "h" => "hour",
        "d" => "day",
        "wk" => "week",
        "mo" => "month",
        "a" => "year",
        other => other,
    }
}

fn supply_days(duration: &Value) -> Option<u32> {
    let value = number(duration, "value")?;
    let unit = str_field(duration, "code")
        .or_else(|| str_field(duration, "unit"))
        .unwrap_or_else(|| "d".to_string());
    let days = match unit.to_lowercase().as_str() {
        "wk" | "week" | "weeks" => value * 7.0,
        "mo" | "month" | "months" => value * 30.0,
        _ => value,
    };
    (days >= 0.0).then(|| days.round() as u32)
}

fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}
