//! Claim / ExplanationOfBenefit → `Claim`.

use recon_core::{
    AdjudicationAmounts, Claim, ClaimDiagnosis, ClaimItem, ClaimProcedure, ClaimStatus, ClaimType,
};
use serde_json::Value;

use crate::fhir::{
    array, codings, concept_label, concept_text, extract_datetime, first_code, money, number,
    period, reference_display, str_field, unsigned,
};

use super::resource_id;

pub(super) fn build(resource: &Value, source: &str) -> Claim {
    let items: Vec<ClaimItem> = array(resource, "item").iter().map(read_item).collect();

    let mut totals = AdjudicationAmounts::default();
    for item in &items {
        totals.add(&item.adjudication);
    }
    if totals.is_zero() {
        totals = claim_level_total(resource);
    }

    let (mut service_start, mut service_end) = period(resource.get("billablePeriod"));
    if service_start.is_none() {
        service_start = items.iter().filter_map(|item| item.serviced_date).min();
    }
    if service_end.is_none() {
        service_end = items.iter().filter_map(|item| item.serviced_date).max();
    }

    Claim {
        id: resource_id(resource),
        source: source.to_string(),
        claim_type: resource
            .get("type")
            .and_then(first_code)
            .map(|code| ClaimType::from_fhir(&code))
            .unwrap_or_default(),
        status: resource
            .get("status")
            .and_then(Value::as_str)
            .map(ClaimStatus::from_fhir)
            .unwrap_or_default(),
        outcome: str_field(resource, "outcome"),
        service_start,
        service_end,
        provider: resource.get("provider").and_then(reference_display),
        facility: resource.get("facility").and_then(reference_display),
        diagnoses: array(resource, "diagnosis").iter().map(read_diagnosis).collect(),
        procedures: array(resource, "procedure").iter().map(read_procedure).collect(),
        totals,
        items,
        raw: resource.clone(),
    }
}

fn read_diagnosis(diagnosis: &Value) -> ClaimDiagnosis {
    let concept = diagnosis.get("diagnosisCodeableConcept");
    ClaimDiagnosis {
        sequence: unsigned(diagnosis, "sequence"),
        code: concept.and_then(first_code),
        display: concept
            .and_then(concept_label)
            .or_else(|| diagnosis.get("diagnosisReference").and_then(reference_display)),
    }
}

fn read_procedure(procedure: &Value) -> ClaimProcedure {
    let concept = procedure.get("procedureCodeableConcept");
    ClaimProcedure {
        sequence: unsigned(procedure, "sequence"),
        code: concept.and_then(first_code),
        display: concept
            .and_then(concept_label)
            .or_else(|| procedure.get("procedureReference").and_then(reference_display)),
        date: extract_datetime(procedure, &["date"]),
    }
}

fn read_item(item: &Value) -> ClaimItem {
    // `service` before R4.
    let service = item
        .get("productOrService")
        .or_else(|| item.get("service"));

    let mut adjudication = AdjudicationAmounts::default();
    for entry in array(item, "adjudication") {
        categorize(&mut adjudication, entry);
    }

    ClaimItem {
        sequence: unsigned(item, "sequence"),
        service_code: service.and_then(first_code),
        service_name: service.and_then(concept_label),
        serviced_date: extract_datetime(item, &["servicedDate", "servicedPeriod"]),
        quantity: item.get("quantity").and_then(|q| number(q, "value")),
        adjudication,
    }
}

/// Adds one adjudication (or total) entry into its canonical bucket.
/// Unrecognised categories are ignored.
fn categorize(amounts: &mut AdjudicationAmounts, entry: &Value) {
    let Some(amount) = money(entry.get("amount")).or_else(|| number(entry, "value")) else {
        return;
    };
    let Some(category) = entry.get("category").and_then(category_code) else {
        return;
    };

    match category.as_str() {
        "submitted" | "billed" => amounts.billed += amount,
        "eligible" | "allowed" => amounts.allowed += amount,
        "benefit" | "paid" | "paidtoprovider" => amounts.paid += amount,
        "patientpay" | "copay" | "deductible" => amounts.patient_responsibility += amount,
        other => tracing::trace!(category = other, "ignoring adjudication category"),
    }
}

fn category_code(concept: &Value) -> Option<String> {
    codings(concept)
        .iter()
        .find_map(|coding| str_field(coding, "code"))
        .or_else(|| concept_text(concept))
        .map(|code| code.to_lowercase().replace([' ', '-', '_'], ""))
}

/// Claim-level `total`: a categorized array on ExplanationOfBenefit, a bare
/// Money (the billed amount) on Claim.
fn claim_level_total(resource: &Value) -> AdjudicationAmounts {
    let mut amounts = AdjudicationAmounts::default();
    match resource.get("total") {
        Some(Value::Array(entries)) => {
            for entry in entries {
                categorize(&mut amounts, entry);
            }
        }
        total @ Some(Value::Object(_)) => {
            if let Some(billed) = money(total) {
                amounts.billed = billed;
            }
        }
        _ => {}
    }
    amounts
}
