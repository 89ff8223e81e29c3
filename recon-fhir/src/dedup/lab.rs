use chrono::{DateTime, Utc};
use recon_core::{DedupConfig, LabResult, LabStatus};

use super::{best_name, first_some, is_unknown_name, latest, Reconcilable};
use crate::similarity::{same_day, similarity, within_relative};

impl Reconcilable for LabResult {
    fn source(&self) -> &str {
        &self.source
    }

    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn primary_date(&self) -> Option<DateTime<Utc>> {
        self.observed_at
    }

    fn is_duplicate(&self, other: &Self, config: &DedupConfig) -> bool {
        if is_unknown_name(&self.name) || is_unknown_name(&other.name) {
            return false;
        }
        if !same_day(self.observed_at, other.observed_at) {
            return false;
        }

        if let (Some(a), Some(b)) = (self.loinc(), other.loinc()) {
            if a == b {
                return true;
            }
        }

        if similarity(&self.name, &other.name) < config.lab_name_similarity {
            return false;
        }

        let close_values = match (self.numeric_value(), other.numeric_value()) {
            (Some(a), Some(b)) => within_relative(a, b, config.lab_value_tolerance),
            _ => false,
        };
        let same_text = self.text_value().is_some() && self.text_value() == other.text_value();
        let both_final = self.status == LabStatus::Final && other.status == LabStatus::Final;

        close_values || same_text || both_final
    }

    /// Status, value and range come from the first `final` member.
    fn merge(first: &Self, members: &[Self]) -> Self {
        let preferred = members
            .iter()
            .find(|m| m.status == LabStatus::Final)
            .unwrap_or(first);

        LabResult {
            id: first.id.clone(),
            source: first.source.clone(),
            name: best_name(first, members, |m| m.name.as_str()),
            code: first_some(members, |m| m.code.as_ref()),
            code_system: first_some(members, |m| m.code_system.as_ref()),
            value: preferred.value.clone(),
            unit: preferred
                .unit
                .clone()
                .or_else(|| first_some(members, |m| m.unit.as_ref())),
            value_type: preferred.value_type,
            observed_at: latest(members, |m| m.observed_at),
            status: preferred.status,
            reference_range: preferred
                .reference_range
                .clone()
                .or_else(|| first_some(members, |m| m.reference_range.as_ref())),
            interpretation: preferred
                .interpretation
                .clone()
                .or_else(|| first_some(members, |m| m.interpretation.as_ref())),
            abnormal: preferred.abnormal,
            category: first_some(members, |m| m.category.as_ref()),
            enriched: members.iter().any(|m| m.enriched),
            raw: preferred.raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::deduplicate_labs;
    use super::super::fixtures::{day, lab};
    use super::*;

    #[test]
    fn same_loinc_same_day_prefers_final() {
        let epic = lab("epic", "Hemoglobin A1c", Some("4548-4"), 7.2);
        let mut quest = lab("quest", "HbA1c", Some("4548-4"), 7.3);
        quest.status = LabStatus::Final;

        let groups = deduplicate_labs(&[epic, quest], &DedupConfig::default());
        assert_eq!(groups.len(), 1);
        let merged = &groups[0].merged;
        assert_eq!(merged.status, LabStatus::Final);
        assert_eq!(merged.numeric_value(), Some(7.3));
        assert_eq!(merged.name, "Hemoglobin A1c");
    }

    #[test]
    fn different_days_never_match() {
        let a = lab("epic", "Hemoglobin A1c", Some("4548-4"), 7.2);
        let mut b = lab("quest", "Hemoglobin A1c", Some("4548-4"), 7.2);
        b.observed_at = day(12, 16);
        assert!(!a.is_duplicate(&b, &DedupConfig::default()));
    }

    #[test]
    fn names_and_values() {
        let a = lab("epic", "Glucose", None, 100.0);
        let b = lab("quest", "glucose", None, 103.0);
        let c = lab("cigna", "Glucose", None, 130.0);
        let config = DedupConfig::default();
        assert!(a.is_duplicate(&b, &config));
        assert!(!a.is_duplicate(&c, &config));

        let mut c_final = c.clone();
        let mut a_final = a.clone();
        c_final.status = LabStatus::Final;
        a_final.status = LabStatus::Final;
        assert!(a_final.is_duplicate(&c_final, &config));
    }

    #[test]
    fn unknown_names_are_never_merged() {
        let a = lab("epic", "Unknown Lab", None, 1.0);
        let b = lab("quest", "Unknown Lab", None, 1.0);
        assert!(!a.is_duplicate(&b, &DedupConfig::default()));
    }
}
