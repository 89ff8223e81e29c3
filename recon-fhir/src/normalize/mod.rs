//! Raw FHIR resources to canonical records, one module per record kind.
//!
//! Each kind has a synchronous, local-tables-only entry point
//! (`normalize_labs`, ...). Kinds that can be enriched are also reachable
//! through [`Normalizer`], which carries an optional [`CodeLookup`]. Both
//! paths share the same record builders, so the output shape is identical and
//! `enriched` stays `false` whenever no lookup contributed.

mod claim;
mod condition;
mod encounter;
mod lab;
mod medication;
mod patient;

use futures::future::join_all;
use recon_core::{Claim, CodeSystem, Condition, Encounter, LabResult, Medication, Patient};
use serde_json::Value;

use crate::codes::{enrich, CodeInfo, CodeLookup};

pub use encounter::describe_duration;

/// Normalizer for the kinds that support code enrichment.
#[derive(Clone, Copy, Default)]
pub struct Normalizer<'a> {
    lookup: Option<&'a dyn CodeLookup>,
}

impl<'a> Normalizer<'a> {
    pub fn new(lookup: Option<&'a dyn CodeLookup>) -> Self {
        Self { lookup }
    }

    /// Normalizer that never leaves the process.
    pub fn local() -> Self {
        Self { lookup: None }
    }

    pub fn with_lookup(lookup: &'a dyn CodeLookup) -> Self {
        Self {
            lookup: Some(lookup),
        }
    }

    pub fn is_enriching(&self) -> bool {
        self.lookup.is_some()
    }

    pub async fn labs(&self, raw: Option<&[Value]>, source: &str) -> Vec<LabResult> {
        self.enriched(
            raw,
            source,
            CodeSystem::Loinc,
            lab::enrichment_code,
            lab::build,
        )
        .await
    }

    pub async fn medications(&self, raw: Option<&[Value]>, source: &str) -> Vec<Medication> {
        self.enriched(
            raw,
            source,
            CodeSystem::RxNorm,
            medication::enrichment_code,
            medication::build,
        )
        .await
    }

    pub async fn conditions(&self, raw: Option<&[Value]>, source: &str) -> Vec<Condition> {
        self.enriched(
            raw,
            source,
            CodeSystem::Icd10,
            condition::enrichment_code,
            condition::build,
        )
        .await
    }

    /// Looks up every record's code concurrently, then builds the records in
    /// input order.
    async fn enriched<T>(
        &self,
        raw: Option<&[Value]>,
        source: &str,
        system: CodeSystem,
        code_of: fn(&Value) -> Option<String>,
        build: fn(&Value, &str, Option<CodeInfo>) -> T,
    ) -> Vec<T> {
        let resources = resources(raw);
        let Some(lookup) = self.lookup else {
            return resources
                .into_iter()
                .map(|resource| build(resource, source, None))
                .collect();
        };

        let enrichments = join_all(resources.iter().map(|resource| async move {
            let code = code_of(resource);
            enrich(Some(lookup), system, code.as_deref()).await
        }))
        .await;

        let hits = enrichments.iter().filter(|info| info.is_some()).count();
        tracing::debug!(
            system = system.tag(),
            records = resources.len(),
            enriched = hits,
            source,
            "code enrichment finished"
        );

        resources
            .into_iter()
            .zip(enrichments)
            .map(|(resource, info)| build(resource, source, info))
            .collect()
    }
}

pub fn normalize_patient(raw: Option<&Value>, source: &str) -> Option<Patient> {
    raw.filter(|value| value.is_object())
        .map(|resource| patient::build(resource, source))
}

pub fn normalize_patients(raw: Option<&[Value]>, source: &str) -> Vec<Patient> {
    resources(raw)
        .into_iter()
        .map(|resource| patient::build(resource, source))
        .collect()
}

pub fn normalize_labs(raw: Option<&[Value]>, source: &str) -> Vec<LabResult> {
    resources(raw)
        .into_iter()
        .map(|resource| lab::build(resource, source, None))
        .collect()
}

pub fn normalize_medications(raw: Option<&[Value]>, source: &str) -> Vec<Medication> {
    resources(raw)
        .into_iter()
        .map(|resource| medication::build(resource, source, None))
        .collect()
}

pub fn normalize_conditions(raw: Option<&[Value]>, source: &str) -> Vec<Condition> {
    resources(raw)
        .into_iter()
        .map(|resource| condition::build(resource, source, None))
        .collect()
}

pub fn normalize_encounters(raw: Option<&[Value]>, source: &str) -> Vec<Encounter> {
    resources(raw)
        .into_iter()
        .map(|resource| encounter::build(resource, source))
        .collect()
}

pub fn normalize_claims(raw: Option<&[Value]>, source: &str) -> Vec<Claim> {
    resources(raw)
        .into_iter()
        .map(|resource| claim::build(resource, source))
        .collect()
}

/// Object entries of a raw array; anything else is ignored.
fn resources(raw: Option<&[Value]>) -> Vec<&Value> {
    raw.unwrap_or_default()
        .iter()
        .filter(|value| value.is_object())
        .collect()
}

pub(crate) fn resource_id(resource: &Value) -> Option<String> {
    crate::fhir::str_field(resource, "id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_and_missing_input_yield_nothing() {
        assert!(normalize_labs(None, "epic").is_empty());
        assert!(normalize_labs(Some(&[]), "epic").is_empty());
        assert!(normalize_medications(None, "epic").is_empty());
        assert!(normalize_conditions(None, "epic").is_empty());
        assert!(normalize_encounters(None, "epic").is_empty());
        assert!(normalize_claims(None, "epic").is_empty());
        assert!(normalize_patients(None, "epic").is_empty());
        assert!(normalize_patient(None, "epic").is_none());
        assert!(normalize_patient(Some(&Value::Null), "epic").is_none());
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let raw = vec![Value::Null, json!("text"), json!({ "resourceType": "Observation" })];
        assert_eq!(normalize_labs(Some(&raw), "epic").len(), 1);
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = vec![json!({
            "id": "obs-1",
            "status": "final",
            "code": { "coding": [{ "system": "http://loinc.org", "code": "4548-4" }] },
            "valueQuantity": { "value": 7.2, "unit": "%" },
            "effectiveDateTime": "2024-12-15T08:00:00Z"
        })];
        let first = serde_json::to_string(&normalize_labs(Some(&raw), "epic")).unwrap();
        let second = serde_json::to_string(&normalize_labs(Some(&raw), "epic")).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn local_normalizer_matches_sync_output() {
        let raw = vec![json!({
            "id": "med-1",
            "status": "active",
            "medicationCodeableConcept": {
                "coding": [{ "system": "http://www.nlm.nih.gov/research/umls/rxnorm", "code": "860975" }]
            }
        })];
        let normalizer = Normalizer::local();
        assert!(!normalizer.is_enriching());
        assert_eq!(
            normalizer.medications(Some(&raw), "epic").await,
            normalize_medications(Some(&raw), "epic")
        );
    }
}
