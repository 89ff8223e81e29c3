use chrono::{DateTime, Utc};
use recon_core::{Condition, DedupConfig, VerificationStatus};

use super::{best_name, first_some, is_unknown_name, latest, Reconcilable};
use crate::similarity::{similarity, within_days};

fn same_code(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

impl Reconcilable for Condition {
    fn source(&self) -> &str {
        &self.source
    }

    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn primary_date(&self) -> Option<DateTime<Utc>> {
        self.onset_date.or(self.recorded_date)
    }

    fn is_duplicate(&self, other: &Self, config: &DedupConfig) -> bool {
        if is_unknown_name(&self.name) || is_unknown_name(&other.name) {
            return false;
        }
        if same_code(&self.icd10, &other.icd10) || same_code(&self.snomed, &other.snomed) {
            return true;
        }

        let score = similarity(&self.name, &other.name);
        if self.has_code() || other.has_code() {
            return score >= config.condition_cross_system_similarity;
        }

        score >= config.condition_name_similarity
            && (self.clinical_status == other.clinical_status
                || within_days(
                    self.onset_date,
                    other.onset_date,
                    config.condition_onset_window_days,
                ))
    }

    /// Statuses come from the first `confirmed` member.
    fn merge(first: &Self, members: &[Self]) -> Self {
        let preferred = members
            .iter()
            .find(|m| m.verification_status == VerificationStatus::Confirmed)
            .unwrap_or(first);

        Condition {
            id: first.id.clone(),
            source: first.source.clone(),
            name: best_name(first, members, |m| m.name.as_str()),
            code: first_some(members, |m| m.code.as_ref()),
            code_system: first_some(members, |m| m.code_system.as_ref()),
            icd10: first_some(members, |m| m.icd10.as_ref()),
            snomed: first_some(members, |m| m.snomed.as_ref()),
            clinical_status: preferred.clinical_status,
            verification_status: preferred.verification_status,
            category: first_some(members, |m| m.category.as_ref()),
            severity: preferred
                .severity
                .clone()
                .or_else(|| first_some(members, |m| m.severity.as_ref())),
            onset_date: latest(members, |m| m.onset_date),
            recorded_date: latest(members, |m| m.recorded_date),
            enriched: members.iter().any(|m| m.enriched),
            raw: preferred.raw.clone(),
        }
    }
}
