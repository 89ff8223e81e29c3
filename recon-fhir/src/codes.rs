//! Code resolution against local terminology tables, with optional
//! enrichment from an external lookup service.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use recon_core::CodeSystem;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fhir::str_field;

/// Display name and category of a code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeInfo {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("code {0} not found")]
    NotFound(String),
    #[error("lookup request failed: {0}")]
    Transport(String),
    #[error("malformed lookup response: {0}")]
    Malformed(String),
}

/// External terminology service used to name codes missing from the local
/// tables.
#[async_trait]
pub trait CodeLookup: Send + Sync {
    async fn lookup(&self, system: CodeSystem, code: &str) -> Result<CodeInfo, LookupError>;
}

/// A code together with the tag of the system it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCode {
    pub code: String,
    /// Canonical tag (`LOINC`, `RxNorm`, ...) or the raw system string.
    pub system: Option<String>,
}

impl ResolvedCode {
    pub fn is(&self, system: CodeSystem) -> bool {
        self.system.as_deref() == Some(system.tag())
    }
}

/// Picks the code whose `system` contains `preferred` (case-insensitive);
/// otherwise the first coding's code.
pub fn resolve_code(codings: &[Value], preferred: Option<&str>) -> Option<String> {
    pick_coding(codings, preferred).and_then(|coding| str_field(coding, "code"))
}

/// Like [`resolve_code`], keeping the system tag of the chosen coding.
pub fn resolve_coding(codings: &[Value], preferred: CodeSystem) -> Option<ResolvedCode> {
    let coding = pick_coding(codings, Some(preferred.needle()))?;
    let code = str_field(coding, "code")?;
    Some(ResolvedCode {
        code,
        system: str_field(coding, "system").map(|system| system_tag(&system)),
    })
}

/// Code from a coding of exactly `system`, without falling back.
pub fn code_in_system(codings: &[Value], system: CodeSystem) -> Option<String> {
    codings
        .iter()
        .filter(|coding| {
            str_field(coding, "system")
                .and_then(|uri| CodeSystem::from_uri(&uri))
                .is_some_and(|found| found == system)
        })
        .find_map(|coding| str_field(coding, "code"))
}

/// Canonical tag for a FHIR system URI, or the URI itself when unrecognised.
pub fn system_tag(uri: &str) -> String {
    CodeSystem::from_uri(uri)
        .map(|system| system.tag().to_string())
        .unwrap_or_else(|| uri.to_string())
}

fn pick_coding<'a>(codings: &'a [Value], preferred: Option<&str>) -> Option<&'a Value> {
    if let Some(preferred) = preferred {
        let needle = preferred.to_lowercase();
        let hit = codings.iter().find(|coding| {
            coding
                .get("system")
                .and_then(Value::as_str)
                .is_some_and(|system| system.to_lowercase().contains(&needle))
                && str_field(coding, "code").is_some()
        });
        if hit.is_some() {
            return hit;
        }
    }
    codings.first()
}

struct TerminologyTables {
    loinc: HashMap<String, CodeInfo>,
    rxnorm: HashMap<String, CodeInfo>,
    icd10: HashMap<String, CodeInfo>,
    snomed_to_icd10: HashMap<String, String>,
}

static TABLES: LazyLock<TerminologyTables> = LazyLock::new(|| TerminologyTables {
    loinc: load_table("loinc", include_str!("../data/loinc.json")),
    rxnorm: load_table("rxnorm", include_str!("../data/rxnorm.json")),
    icd10: load_table("icd10", include_str!("../data/icd10.json")),
    snomed_to_icd10: load_table("snomed_icd10", include_str!("../data/snomed_icd10.json")),
});

fn load_table<T: serde::de::DeserializeOwned>(name: &str, json: &str) -> HashMap<String, T> {
    serde_json::from_str(json).unwrap_or_else(|err| {
        tracing::error!(table = name, error = %err, "embedded terminology table is invalid");
        HashMap::new()
    })
}

/// Entry from the embedded tables, if the system has one.
pub fn local_info(system: CodeSystem, code: &str) -> Option<&'static CodeInfo> {
    let tables = &*TABLES;
    let table = match system {
        CodeSystem::Loinc => &tables.loinc,
        CodeSystem::RxNorm => &tables.rxnorm,
        CodeSystem::Icd10 => &tables.icd10,
        _ => return None,
    };
    table.get(code.trim())
}

/// ICD-10 equivalent of a SNOMED CT concept.
pub fn snomed_to_icd10(code: &str) -> Option<&'static str> {
    TABLES.snomed_to_icd10.get(code.trim()).map(String::as_str)
}

/// Best-effort enrichment of a code the local tables do not know.
///
/// Returns `None` when there is no lookup, no code, the code is already
/// mapped locally, or the lookup fails in any way. Failures are never
/// propagated.
pub async fn enrich(
    lookup: Option<&dyn CodeLookup>,
    system: CodeSystem,
    code: Option<&str>,
) -> Option<CodeInfo> {
    let lookup = lookup?;
    let code = code?;
    if local_info(system, code).is_some() {
        return None;
    }

    match lookup.lookup(system, code).await {
        Ok(info) if !info.name.trim().is_empty() => Some(info),
        Ok(_) => {
            tracing::debug!(system = system.tag(), code, "lookup returned an empty name");
            None
        }
        Err(err) => {
            tracing::debug!(system = system.tag(), code, error = %err, "code enrichment skipped");
            None
        }
    }
}
