//! FHIR JSON to canonical health records, with cross-source deduplication.
//!
//! Raw resources from each connection go through [`normalize`] into fixed
//! record shapes, [`dedup`] folds records that describe the same clinical
//! fact, and [`aggregate`] wires both into bundle-level entry points.

pub mod aggregate;
pub mod codes;
pub mod dedup;
mod fhir;
#[cfg(feature = "http")]
pub mod lookup;
pub mod normalize;
pub mod similarity;

pub use aggregate::{
    normalize_bundle, normalize_bundle_str, normalize_bundle_sync, reconcile, reconcile_str,
    RawBundle,
};
pub use codes::{CodeInfo, CodeLookup, LookupError};
pub use dedup::{
    deduplicate, deduplicate_conditions, deduplicate_encounters, deduplicate_labs,
    deduplicate_medications, deduplicate_patients, Reconcilable,
};
#[cfg(feature = "http")]
pub use lookup::HttpCodeLookup;
pub use normalize::{
    normalize_claims, normalize_conditions, normalize_encounters, normalize_labs,
    normalize_medications, normalize_patient, normalize_patients, Normalizer,
};
pub use similarity::similarity;
