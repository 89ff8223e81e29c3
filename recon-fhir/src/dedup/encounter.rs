use chrono::{DateTime, Utc};
use recon_core::{DedupConfig, Encounter, EncounterClass, EncounterStatus};

use super::{best_name, first_some, latest, Reconcilable};
use crate::normalize::describe_duration;
use crate::similarity::{ranges_overlap, same_day, similarity};

fn both_equal(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

impl Reconcilable for Encounter {
    fn source(&self) -> &str {
        &self.source
    }

    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn primary_date(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    fn is_duplicate(&self, other: &Self, config: &DedupConfig) -> bool {
        let same_start_day = same_day(self.start, other.start);

        if same_start_day && both_equal(&self.type_code, &other.type_code) {
            return true;
        }

        // Equal locations include both being absent.
        if same_start_day && self.class == other.class && self.location == other.location {
            return true;
        }

        if same_start_day
            && similarity(&self.type_name, &other.type_name) >= config.encounter_type_similarity
        {
            return true;
        }

        self.class == EncounterClass::Inpatient
            && other.class == EncounterClass::Inpatient
            && ranges_overlap(self.start, self.end, other.start, other.end)
            && (both_equal(&self.location, &other.location)
                || both_equal(&self.service_provider, &other.service_provider))
    }

    /// Status comes from the first completed member. Both bounds take the
    /// most recent member value.
    fn merge(first: &Self, members: &[Self]) -> Self {
        let preferred = members
            .iter()
            .find(|m| m.status == EncounterStatus::Completed)
            .unwrap_or(first);
        let start = latest(members, |m| m.start);
        let end = latest(members, |m| m.end);

        let mut participants = Vec::new();
        for participant in members.iter().flat_map(|m| &m.participants) {
            if !participants.contains(participant) {
                participants.push(participant.clone());
            }
        }
        let mut reasons: Vec<String> = Vec::new();
        for reason in members.iter().flat_map(|m| &m.reasons) {
            if !reasons.contains(reason) {
                reasons.push(reason.clone());
            }
        }

        Encounter {
            id: first.id.clone(),
            source: first.source.clone(),
            type_name: best_name(first, members, |m| m.type_name.as_str()),
            type_code: first_some(members, |m| m.type_code.as_ref()),
            class: members
                .iter()
                .map(|m| m.class)
                .find(|class| *class != EncounterClass::Unknown)
                .unwrap_or_default(),
            status: preferred.status,
            start,
            end,
            duration: describe_duration(start, end),
            location: first_some(members, |m| m.location.as_ref()),
            participants,
            reasons,
            service_provider: first_some(members, |m| m.service_provider.as_ref()),
            raw: preferred.raw.clone(),
        }
    }
}
