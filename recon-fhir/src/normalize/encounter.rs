//! Encounter → `Encounter`.

use chrono::{DateTime, Utc};
use recon_core::{Encounter, EncounterClass, EncounterStatus, Participant};
use serde_json::Value;

use crate::fhir::{
    array, codings, concept_label, concept_text, first_code, period, reference_display, str_field,
};

use super::resource_id;

const UNKNOWN_NAME: &str = "Unknown Encounter";

pub(super) fn build(resource: &Value, source: &str) -> Encounter {
    let type_concept = array(resource, "type").first();
    let type_code = type_concept.and_then(first_code);
    let type_name = type_concept
        .and_then(concept_label)
        .or_else(|| type_code.clone())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let (start, end) = period(
        resource
            .get("period")
            .or_else(|| resource.get("actualPeriod")),
    );

    Encounter {
        id: resource_id(resource),
        source: source.to_string(),
        type_name,
        type_code,
        class: read_class(resource),
        status: resource
            .get("status")
            .and_then(Value::as_str)
            .map(EncounterStatus::from_fhir)
            .unwrap_or_default(),
        start,
        end,
        duration: describe_duration(start, end),
        location: array(resource, "location")
            .iter()
            .find_map(|entry| entry.get("location").and_then(reference_display)),
        participants: array(resource, "participant")
            .iter()
            .filter_map(read_participant)
            .collect(),
        reasons: read_reasons(resource),
        service_provider: resource.get("serviceProvider").and_then(reference_display),
        raw: resource.clone(),
    }
}

/// `class` is a Coding in R4 and an array of CodeableConcepts in R5.
fn read_class(resource: &Value) -> EncounterClass {
    let candidates: Vec<&Value> = match resource.get("class") {
        Some(Value::Array(concepts)) => concepts.iter().flat_map(codings).collect(),
        Some(coding @ Value::Object(_)) if coding.get("coding").is_some() => {
            codings(coding).iter().collect()
        }
        Some(coding @ Value::Object(_)) => vec![coding],
        _ => Vec::new(),
    };

    candidates
        .into_iter()
        .flat_map(|coding| [str_field(coding, "code"), str_field(coding, "display")])
        .flatten()
        .map(|value| EncounterClass::from_fhir(&value))
        .find(|class| *class != EncounterClass::Unknown)
        .unwrap_or_default()
}

fn read_participant(participant: &Value) -> Option<Participant> {
    let role = array(participant, "type").first().and_then(concept_text);
    let name = ["individual", "actor"]
        .iter()
        .filter_map(|key| participant.get(*key))
        .find_map(reference_display);

    if role.is_none() && name.is_none() {
        None
    } else {
        Some(Participant { role, name })
    }
}

/// R4 `reasonCode` / `reasonReference`, or R5 `reason[].use` concepts.
fn read_reasons(resource: &Value) -> Vec<String> {
    let coded = array(resource, "reasonCode").iter().filter_map(concept_text);
    let referenced = array(resource, "reasonReference")
        .iter()
        .filter_map(reference_display);
    let r5 = array(resource, "reason")
        .iter()
        .flat_map(|reason| array(reason, "value"))
        .filter_map(|value| {
            value
                .get("concept")
                .and_then(concept_text)
                .or_else(|| value.get("reference").and_then(reference_display))
        });

    let mut reasons: Vec<String> = coded.chain(referenced).chain(r5).collect();
    reasons.dedup();
    reasons
}

/// Human-readable length of a visit: minutes under an hour, hours under a
/// day, days otherwise. `None` when a bound is missing or the range is
/// inverted.
pub fn describe_duration(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<String> {
    let (start, end) = (start?, end?);
    let minutes = (end - start).num_seconds() as f64 / 60.0;
    if minutes < 0.0 {
        return None;
    }

    let (amount, unit) = if minutes < 60.0 {
        (minutes.round(), "minute")
    } else if minutes < 1440.0 {
        ((minutes / 60.0).round(), "hour")
    } else {
        ((minutes / 1440.0).round(), "day")
    };
    let plural = if amount == 1.0 { "" } else { "s" };
    Some(format!("{amount:.0} {unit}{plural}"))
}
