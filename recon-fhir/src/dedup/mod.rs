//! Duplicate detection and merging across sources.
//!
//! Every record kind implements [`Reconcilable`]: a match predicate plus a
//! merge policy. [`deduplicate`] clusters a slice according to
//! [`DedupConfig::clustering`] and emits one [`DuplicateGroup`] per cluster,
//! in the order the clusters' first members appear in the input.

mod condition;
mod encounter;
mod lab;
mod medication;
mod patient;

use chrono::{DateTime, Utc};
use recon_core::{
    Clustering, Condition, DedupConfig, DuplicateGroup, Encounter, LabResult, Medication, Patient,
    Provenance,
};

/// A canonical record that can be matched against its peers and merged.
pub trait Reconcilable: Clone {
    fn source(&self) -> &str;
    fn record_id(&self) -> Option<&str>;
    /// The date recorded in provenance.
    fn primary_date(&self) -> Option<DateTime<Utc>>;
    fn is_duplicate(&self, other: &Self, config: &DedupConfig) -> bool;
    /// Folds a cluster into one record. `first` is `members[0]`.
    fn merge(first: &Self, members: &[Self]) -> Self;
}

pub fn deduplicate<T: Reconcilable>(records: &[T], config: &DedupConfig) -> Vec<DuplicateGroup<T>> {
    let clusters = match config.clustering {
        Clustering::Seed => seed_clusters(records, config),
        Clustering::ConnectedComponents => connected_components(records, config),
    };

    let groups: Vec<DuplicateGroup<T>> = clusters
        .into_iter()
        .filter_map(|indices| {
            let members: Vec<T> = indices.iter().map(|&i| records[i].clone()).collect();
            build_group(members)
        })
        .collect();

    tracing::debug!(
        records = records.len(),
        groups = groups.len(),
        clustering = ?config.clustering,
        "deduplicated"
    );
    groups
}

pub fn deduplicate_medications(
    records: &[Medication],
    config: &DedupConfig,
) -> Vec<DuplicateGroup<Medication>> {
    deduplicate(records, config)
}

pub fn deduplicate_labs(
    records: &[LabResult],
    config: &DedupConfig,
) -> Vec<DuplicateGroup<LabResult>> {
    deduplicate(records, config)
}

pub fn deduplicate_conditions(
    records: &[Condition],
    config: &DedupConfig,
) -> Vec<DuplicateGroup<Condition>> {
    deduplicate(records, config)
}

pub fn deduplicate_encounters(
    records: &[Encounter],
    config: &DedupConfig,
) -> Vec<DuplicateGroup<Encounter>> {
    deduplicate(records, config)
}

pub fn deduplicate_patients(
    records: &[Patient],
    config: &DedupConfig,
) -> Vec<DuplicateGroup<Patient>> {
    deduplicate(records, config)
}

/// Greedy single pass: each unassigned record seeds a cluster and absorbs
/// every later unassigned record that matches the seed.
fn seed_clusters<T: Reconcilable>(records: &[T], config: &DedupConfig) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; records.len()];
    let mut clusters = Vec::new();

    for seed in 0..records.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut cluster = vec![seed];
        for candidate in seed + 1..records.len() {
            if !assigned[candidate] && records[seed].is_duplicate(&records[candidate], config) {
                assigned[candidate] = true;
                cluster.push(candidate);
            }
        }
        clusters.push(cluster);
    }
    clusters
}

fn connected_components<T: Reconcilable>(records: &[T], config: &DedupConfig) -> Vec<Vec<usize>> {
    let mut sets = DisjointSet::new(records.len());
    for a in 0..records.len() {
        for b in a + 1..records.len() {
            if records[a].is_duplicate(&records[b], config) {
                sets.union(a, b);
            }
        }
    }

    let mut slot_of_root: Vec<Option<usize>> = vec![None; records.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for index in 0..records.len() {
        let root = sets.find(index);
        match slot_of_root[root] {
            Some(slot) => clusters[slot].push(index),
            None => {
                slot_of_root[root] = Some(clusters.len());
                clusters.push(vec![index]);
            }
        }
    }
    clusters
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    /// Lower index becomes the root so cluster order stays input order.
    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[a.max(b)] = a.min(b);
        }
    }
}

fn build_group<T: Reconcilable>(members: Vec<T>) -> Option<DuplicateGroup<T>> {
    let first = members.first()?;
    let merged = T::merge(first, &members);

    let mut sources: Vec<String> = Vec::new();
    for member in &members {
        if !sources.iter().any(|source| source == member.source()) {
            sources.push(member.source().to_string());
        }
    }

    let provenance = members
        .iter()
        .map(|member| Provenance {
            source: member.source().to_string(),
            record_id: member.record_id().map(str::to_string),
            recorded_at: member.primary_date(),
        })
        .collect();

    Some(DuplicateGroup {
        merged,
        sources,
        provenance,
        originals: members,
    })
}

/// First present value of a field, in group order.
pub(crate) fn first_some<'a, T, U: Clone + 'a>(
    members: &'a [T],
    field: impl Fn(&'a T) -> Option<&'a U>,
) -> Option<U> {
    members.iter().find_map(field).cloned()
}

/// Latest present timestamp of a field.
pub(crate) fn latest<T>(
    members: &[T],
    field: impl Fn(&T) -> Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    members.iter().filter_map(field).max()
}

/// Name labels produced by the normalizers' last-resort fallback.
pub(crate) fn is_unknown_name(name: &str) -> bool {
    name.trim().is_empty() || name.starts_with("Unknown ")
}

/// First name that is not a fallback label, else the first member's.
pub(crate) fn best_name<T>(first: &T, members: &[T], name: impl Fn(&T) -> &str) -> String {
    members
        .iter()
        .map(&name)
        .find(|candidate| !is_unknown_name(candidate))
        .unwrap_or_else(|| name(first))
        .to_string()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn single_record_forms_one_group() {
        let record = medication("epic", "Metformin", Some("860975"));
        let groups =
            deduplicate_medications(std::slice::from_ref(&record), &DedupConfig::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].merged, record);
        assert_eq!(groups[0].sources, vec!["epic".to_string()]);
        assert_eq!(groups[0].provenance.len(), 1);
        assert!(!groups[0].has_duplicates());
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(deduplicate_labs(&[], &DedupConfig::default()).is_empty());
    }

    #[test]
    fn every_record_lands_in_exactly_one_group() {
        let records = vec![
            medication("epic", "Metformin", Some("860975")),
            medication("humana", "Lisinopril", Some("314076")),
            medication("humana", "Metformin 500", Some("860975")),
            medication("cigna", "Atorvastatin", None),
        ];
        let groups = deduplicate_medications(&records, &DedupConfig::default());
        let total: usize = groups.iter().map(DuplicateGroup::len).sum();
        assert_eq!(total, records.len());
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].sources, vec!["epic".to_string(), "humana".to_string()]);
    }

    #[test]
    fn connected_components_is_transitive() {
        // a~b and b~c by name, but a and c are too far apart in time.
        let mut a = medication("epic", "Zolpidem", None);
        let mut b = medication("humana", "Zolpidem", None);
        let mut c = medication("cigna", "Zolpidem", None);
        a.prescribed_at = day(6, 1);
        b.prescribed_at = day(6, 12);
        c.prescribed_at = day(6, 23);
        a.status = recon_core::MedicationStatus::Active;
        c.status = recon_core::MedicationStatus::Stopped;
        let records = vec![a, b, c];

        let seeded = deduplicate_medications(&records, &DedupConfig::default());
        assert_eq!(seeded.len(), 2);

        let config = DedupConfig {
            clustering: Clustering::ConnectedComponents,
            ..DedupConfig::default()
        };
        let components = deduplicate_medications(&records, &config);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 3);
    }

    #[test]
    fn merge_helpers() {
        let members = vec![
            (None, day(1, 1)),
            (Some("x".to_string()), day(3, 1)),
            (Some("y".to_string()), None),
        ];
        assert_eq!(first_some(&members, |m| m.0.as_ref()), Some("x".to_string()));
        assert_eq!(latest(&members, |m| m.1), day(3, 1));
        assert!(is_unknown_name("Unknown Lab"));
        assert!(!is_unknown_name("Hemoglobin A1c"));
    }
}
