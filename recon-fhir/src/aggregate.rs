//! Bundle-level entry points: one connection's raw data to a
//! [`NormalizedBundle`], and several normalized bundles to a
//! [`ReconciledRecord`].

use chrono::Utc;
use recon_core::{
    Condition, DedupConfig, LabResult, Medication, NormalizationMeta, NormalizedBundle,
    ReconcileError, ReconciledRecord, ReconciliationMeta, RecordCounts, SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codes::CodeLookup;
use crate::dedup::{
    deduplicate_conditions, deduplicate_encounters, deduplicate_labs, deduplicate_medications,
    deduplicate_patients,
};
use crate::normalize::{
    normalize_claims, normalize_conditions, normalize_encounters, normalize_labs,
    normalize_medications, normalize_patient, Normalizer,
};

/// Raw FHIR resources pulled from one connection, sorted by kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawBundle {
    pub patient: Option<Value>,
    pub observations: Option<Vec<Value>>,
    pub medications: Option<Vec<Value>>,
    pub conditions: Option<Vec<Value>>,
    pub encounters: Option<Vec<Value>>,
    pub claims: Option<Vec<Value>>,
}

impl RawBundle {
    /// Sorts the entries of a FHIR `Bundle` into per-kind arrays.
    pub fn from_fhir_bundle(bundle: &Value) -> Result<Self, ReconcileError> {
        let bundle_type = bundle
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| ReconcileError::MissingData("resourceType".into()))?;

        if bundle_type != "Bundle" {
            return Err(ReconcileError::Parse(format!(
                "expected resourceType Bundle, received {bundle_type}"
            )));
        }

        let entries = bundle
            .get("entry")
            .and_then(Value::as_array)
            .ok_or_else(|| ReconcileError::MissingData("Bundle.entry".into()))?;

        let mut raw = RawBundle::default();
        for resource in entries.iter().filter_map(|entry| entry.get("resource")) {
            let target = match resource
                .get("resourceType")
                .and_then(Value::as_str)
                .unwrap_or_default()
            {
                "Patient" => {
                    if raw.patient.is_none() {
                        raw.patient = Some(resource.clone());
                    } else {
                        tracing::debug!("bundle carries more than one Patient; keeping the first");
                    }
                    continue;
                }
                "Observation" => &mut raw.observations,
                "MedicationRequest" | "MedicationStatement" => &mut raw.medications,
                "Condition" => &mut raw.conditions,
                "Encounter" => &mut raw.encounters,
                "Claim" | "ExplanationOfBenefit" => &mut raw.claims,
                _ => continue,
            };
            target.get_or_insert_with(Vec::new).push(resource.clone());
        }
        Ok(raw)
    }

    /// Accepts either a FHIR `Bundle` or the per-kind object shape.
    pub fn from_value(value: Value) -> Result<Self, ReconcileError> {
        if value.get("resourceType").and_then(Value::as_str) == Some("Bundle") {
            return Self::from_fhir_bundle(&value);
        }
        if !value.is_object() {
            return Err(ReconcileError::Parse("raw bundle must be a JSON object".into()));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ReconcileError> {
        Self::from_value(serde_json::from_str(json)?)
    }
}

/// Normalizes every kind, looking up unmapped lab, medication and condition
/// codes through `lookup` when one is given.
pub async fn normalize_bundle(
    raw: &RawBundle,
    source: &str,
    lookup: Option<&dyn CodeLookup>,
) -> NormalizedBundle {
    let normalizer = Normalizer::new(lookup);
    let (labs, medications, conditions) = futures::join!(
        normalizer.labs(raw.observations.as_deref(), source),
        normalizer.medications(raw.medications.as_deref(), source),
        normalizer.conditions(raw.conditions.as_deref(), source),
    );

    let api_enriched = labs.iter().any(|lab| lab.enriched)
        || medications.iter().any(|med| med.enriched)
        || conditions.iter().any(|condition| condition.enriched);

    assemble(raw, source, labs, medications, conditions, api_enriched)
}

/// Local-tables-only normalization; `apiEnriched` is always false.
pub fn normalize_bundle_sync(raw: &RawBundle, source: &str) -> NormalizedBundle {
    assemble(
        raw,
        source,
        normalize_labs(raw.observations.as_deref(), source),
        normalize_medications(raw.medications.as_deref(), source),
        normalize_conditions(raw.conditions.as_deref(), source),
        false,
    )
}

pub fn normalize_bundle_str(json: &str, source: &str) -> Result<NormalizedBundle, ReconcileError> {
    let raw = RawBundle::from_json_str(json)?;
    Ok(normalize_bundle_sync(&raw, source))
}

fn assemble(
    raw: &RawBundle,
    source: &str,
    labs: Vec<LabResult>,
    medications: Vec<Medication>,
    conditions: Vec<Condition>,
    api_enriched: bool,
) -> NormalizedBundle {
    let mut bundle = NormalizedBundle {
        patient: normalize_patient(raw.patient.as_ref(), source),
        labs,
        medications,
        conditions,
        encounters: normalize_encounters(raw.encounters.as_deref(), source),
        claims: normalize_claims(raw.claims.as_deref(), source),
        meta: NormalizationMeta {
            normalized_at: Utc::now(),
            source: source.to_string(),
            version: SCHEMA_VERSION.to_string(),
            api_enriched,
            counts: RecordCounts::default(),
        },
    };
    bundle.meta.counts = bundle.counts();

    tracing::info!(
        source,
        records = bundle.meta.counts.total(),
        api_enriched,
        "normalized bundle"
    );
    bundle
}

/// Merges the normalized bundles of one patient into a single deduplicated
/// record. Claims are concatenated as-is.
pub fn reconcile(bundles: &[NormalizedBundle], config: &DedupConfig) -> ReconciledRecord {
    let mut sources: Vec<String> = Vec::new();
    for bundle in bundles {
        if !sources.contains(&bundle.meta.source) {
            sources.push(bundle.meta.source.clone());
        }
    }

    let patients: Vec<_> = bundles.iter().filter_map(|b| b.patient.clone()).collect();
    let labs: Vec<_> = bundles.iter().flat_map(|b| b.labs.iter().cloned()).collect();
    let medications: Vec<_> = bundles
        .iter()
        .flat_map(|b| b.medications.iter().cloned())
        .collect();
    let conditions: Vec<_> = bundles
        .iter()
        .flat_map(|b| b.conditions.iter().cloned())
        .collect();
    let encounters: Vec<_> = bundles
        .iter()
        .flat_map(|b| b.encounters.iter().cloned())
        .collect();
    let claims: Vec<_> = bundles.iter().flat_map(|b| b.claims.iter().cloned()).collect();

    let records_in = RecordCounts {
        patients: patients.len(),
        labs: labs.len(),
        medications: medications.len(),
        conditions: conditions.len(),
        encounters: encounters.len(),
        claims: claims.len(),
    };

    let patients = deduplicate_patients(&patients, config);
    let labs = deduplicate_labs(&labs, config);
    let medications = deduplicate_medications(&medications, config);
    let conditions = deduplicate_conditions(&conditions, config);
    let encounters = deduplicate_encounters(&encounters, config);
    let groups_out = RecordCounts {
        patients: patients.len(),
        labs: labs.len(),
        medications: medications.len(),
        conditions: conditions.len(),
        encounters: encounters.len(),
        claims: claims.len(),
    };

    let record = ReconciledRecord {
        patients,
        labs,
        medications,
        conditions,
        encounters,
        claims,
        meta: ReconciliationMeta {
            reconciled_at: Utc::now(),
            sources,
            version: SCHEMA_VERSION.to_string(),
            api_enriched: bundles.iter().any(|b| b.meta.api_enriched),
            records_in,
            groups_out,
        },
    };

    tracing::info!(
        bundles = bundles.len(),
        records_in = records_in.total(),
        groups_out = groups_out.total(),
        "reconciled"
    );
    record
}

/// Reconciles a JSON array of normalized bundles.
pub fn reconcile_str(json: &str, config: &DedupConfig) -> Result<ReconciledRecord, ReconcileError> {
    let bundles: Vec<NormalizedBundle> = serde_json::from_str(json)?;
    Ok(reconcile(&bundles, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fhir_bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                { "resource": { "resourceType": "Patient", "id": "p1", "name": [{ "text": "Doe, Jane" }], "birthDate": "1980-01-02" } },
                { "resource": { "resourceType": "Observation", "id": "o1", "code": { "coding": [{ "system": "http://loinc.org", "code": "4548-4" }] }, "status": "final", "effectiveDateTime": "2024-12-15T08:00:00Z" } },
                { "resource": { "resourceType": "MedicationStatement", "id": "m1", "status": "active" } },
                { "resource": { "resourceType": "ExplanationOfBenefit", "id": "e1" } },
                { "resource": { "resourceType": "Procedure", "id": "x1" } },
                { "fullUrl": "urn:uuid:no-resource" }
            ]
        })
    }

    #[test]
    fn sorts_bundle_entries_by_kind() {
        let raw = RawBundle::from_fhir_bundle(&fhir_bundle()).unwrap();
        assert!(raw.patient.is_some());
        assert_eq!(raw.observations.as_ref().map(Vec::len), Some(1));
        assert_eq!(raw.medications.as_ref().map(Vec::len), Some(1));
        assert_eq!(raw.claims.as_ref().map(Vec::len), Some(1));
        assert_eq!(raw.conditions, None);
    }

    #[test]
    fn rejects_non_bundles() {
        let err = RawBundle::from_fhir_bundle(&json!({ "resourceType": "Patient" })).unwrap_err();
        assert!(matches!(err, ReconcileError::Parse(_)));
        let err = RawBundle::from_fhir_bundle(&json!({})).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingData(_)));
        assert!(matches!(
            RawBundle::from_json_str("[1, 2]"),
            Err(ReconcileError::Parse(_))
        ));
        assert!(matches!(
            normalize_bundle_str("{not json", "epic"),
            Err(ReconcileError::Parse(_))
        ));
    }

    #[test]
    fn per_kind_shape_tolerates_nulls() {
        let raw = RawBundle::from_json_str(r#"{"patient": null, "observations": null}"#).unwrap();
        let bundle = normalize_bundle_sync(&raw, "epic");
        assert_eq!(bundle.meta.counts.total(), 0);
        assert_eq!(bundle.meta.version, SCHEMA_VERSION);
        assert!(!bundle.meta.api_enriched);
    }

    #[test]
    fn meta_is_camel_case() {
        let raw = RawBundle::from_fhir_bundle(&fhir_bundle()).unwrap();
        let bundle = normalize_bundle_sync(&raw, "epic");
        let value = serde_json::to_value(&bundle).unwrap();
        let meta = &value["_meta"];
        assert_eq!(meta["source"], "epic");
        assert_eq!(meta["apiEnriched"], false);
        assert!(meta["normalizedAt"].is_string());
        assert_eq!(meta["counts"]["labs"], 1);
        assert_eq!(meta["counts"]["patients"], 1);
    }

    #[tokio::test]
    async fn async_path_without_lookup_matches_sync() {
        let raw = RawBundle::from_fhir_bundle(&fhir_bundle()).unwrap();
        let mut from_async = normalize_bundle(&raw, "epic", None).await;
        let from_sync = normalize_bundle_sync(&raw, "epic");
        from_async.meta.normalized_at = from_sync.meta.normalized_at;
        assert_eq!(from_async, from_sync);
    }

    #[test]
    fn reconcile_counts_and_sources() {
        let raw = RawBundle::from_fhir_bundle(&fhir_bundle()).unwrap();
        let epic = normalize_bundle_sync(&raw, "epic");
        let humana = normalize_bundle_sync(&raw, "humana");
        let record = reconcile(&[epic, humana], &DedupConfig::default());

        assert_eq!(record.meta.sources, vec!["epic".to_string(), "humana".to_string()]);
        assert_eq!(record.meta.records_in.labs, 2);
        assert_eq!(record.meta.groups_out.labs, 1);
        assert_eq!(record.meta.groups_out.patients, 1);
        assert_eq!(record.claims.len(), 2);
        assert_eq!(record.meta.groups_out.claims, 2);
    }
}
