use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use recon_core::CodeSystem;
use recon_fhir::{
    normalize_bundle, normalize_bundle_sync, CodeInfo, CodeLookup, LookupError, RawBundle,
};
use serde_json::json;

/// In-memory terminology service that counts its calls.
#[derive(Default)]
struct StubLookup {
    known: HashMap<String, CodeInfo>,
    calls: AtomicUsize,
}

impl StubLookup {
    fn with(mut self, code: &str, name: &str, category: &str) -> Self {
        self.known.insert(
            code.to_string(),
            CodeInfo {
                name: name.to_string(),
                category: Some(category.to_string()),
            },
        );
        self
    }
}

#[async_trait]
impl CodeLookup for StubLookup {
    async fn lookup(&self, _system: CodeSystem, code: &str) -> Result<CodeInfo, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.known
            .get(code)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(code.to_string()))
    }
}

struct DownLookup;

#[async_trait]
impl CodeLookup for DownLookup {
    async fn lookup(&self, _system: CodeSystem, _code: &str) -> Result<CodeInfo, LookupError> {
        Err(LookupError::Transport("connection refused".into()))
    }
}

fn raw_bundle() -> RawBundle {
    RawBundle {
        observations: Some(vec![
            json!({
                "id": "obs-known",
                "status": "final",
                "code": { "coding": [{ "system": "http://loinc.org", "code": "4548-4" }] },
                "effectiveDateTime": "2024-12-15"
            }),
            json!({
                "id": "obs-rare",
                "status": "final",
                "code": { "coding": [{ "system": "http://loinc.org", "code": "94500-6" }] },
                "effectiveDateTime": "2024-12-15"
            }),
        ]),
        medications: Some(vec![json!({
            "id": "med-rare",
            "status": "active",
            "medicationCodeableConcept": {
                "coding": [{ "system": "http://www.nlm.nih.gov/research/umls/rxnorm", "code": "2599543" }]
            }
        })]),
        conditions: Some(vec![json!({
            "id": "cond-rare",
            "code": { "coding": [{ "system": "http://hl7.org/fhir/sid/icd-10-cm", "code": "U07.1" }] }
        })]),
        ..RawBundle::default()
    }
}

#[tokio::test]
async fn lookup_names_unmapped_codes() {
    let lookup = StubLookup::default()
        .with("94500-6", "SARS-CoV-2 RNA panel", "Microbiology")
        .with("2599543", "nirmatrelvir 150 MG / ritonavir 100 MG", "Antiviral")
        .with("U07.1", "COVID-19", "Infectious");

    let bundle = normalize_bundle(&raw_bundle(), "epic", Some(&lookup)).await;

    assert!(bundle.meta.api_enriched);
    // The locally mapped LOINC code never reaches the service.
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);

    assert_eq!(bundle.labs[0].name, "Hemoglobin A1c");
    assert!(!bundle.labs[0].enriched);
    assert_eq!(bundle.labs[1].name, "SARS-CoV-2 RNA panel");
    assert_eq!(bundle.labs[1].category.as_deref(), Some("Microbiology"));
    assert!(bundle.labs[1].enriched);
    assert_eq!(bundle.medications[0].name, "nirmatrelvir 150 MG / ritonavir 100 MG");
    assert_eq!(bundle.conditions[0].name, "COVID-19");
}

#[tokio::test]
async fn failing_lookup_degrades_to_local_output() {
    let raw = raw_bundle();
    let mut enriched = normalize_bundle(&raw, "epic", Some(&DownLookup)).await;
    let local = normalize_bundle_sync(&raw, "epic");

    assert!(!enriched.meta.api_enriched);
    assert_eq!(enriched.labs[1].name, "94500-6");
    enriched.meta.normalized_at = local.meta.normalized_at;
    assert_eq!(enriched, local);
}
