use chrono::{DateTime, Utc};
use recon_core::{DedupConfig, Gender, Patient};

use super::{first_some, Reconcilable};
use crate::similarity::similarity;

impl Reconcilable for Patient {
    fn source(&self) -> &str {
        &self.source
    }

    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn primary_date(&self) -> Option<DateTime<Utc>> {
        self.birth_date
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    fn is_duplicate(&self, other: &Self, config: &DedupConfig) -> bool {
        let (Some(a), Some(b)) = (self.birth_date, other.birth_date) else {
            return false;
        };
        a == b
            && similarity(&display_name(self), &display_name(other))
                >= config.patient_name_similarity
    }

    fn merge(first: &Self, members: &[Self]) -> Self {
        Patient {
            id: first.id.clone(),
            source: first.source.clone(),
            first_name: first_some(members, |m| m.first_name.as_ref()),
            last_name: first_some(members, |m| m.last_name.as_ref()),
            full_name: first_some(members, |m| m.full_name.as_ref()),
            birth_date: first_some(members, |m| m.birth_date.as_ref()),
            gender: members
                .iter()
                .map(|m| m.gender)
                .find(|gender| *gender != Gender::Unknown)
                .unwrap_or_default(),
            email: first_some(members, |m| m.email.as_ref()),
            phone: first_some(members, |m| m.phone.as_ref()),
            address: first_some(members, |m| m.address.as_ref()),
            raw: first.raw.clone(),
        }
    }
}

/// `First Last` regardless of how the source wrote the name.
fn display_name(patient: &Patient) -> String {
    match (&patient.first_name, &patient.last_name) {
        (Some(first), Some(last)) => format!("{first} {last}"),
        _ => patient.full_name.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::deduplicate_patients;
    use super::super::fixtures::patient;
    use super::*;

    #[test]
    fn same_birth_date_and_close_name() {
        let epic = patient("epic", "Jonathan Doe");
        let mut humana = patient("humana", "Jonathon Doe");
        humana.gender = Gender::Male;
        humana.email = Some("jdoe@example.com".into());

        let groups = deduplicate_patients(&[epic, humana], &DedupConfig::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].merged.gender, Gender::Male);
        assert_eq!(groups[0].merged.email.as_deref(), Some("jdoe@example.com"));
    }

    #[test]
    fn comma_and_space_conventions_compare_equal() {
        let mut a = patient("epic", "Doe, Jane");
        a.first_name = Some("Jane".into());
        a.last_name = Some("Doe".into());
        let mut b = patient("humana", "Jane Doe");
        b.first_name = Some("Jane".into());
        b.last_name = Some("Doe".into());
        assert!(a.is_duplicate(&b, &DedupConfig::default()));
    }

    #[test]
    fn different_birth_dates_never_match() {
        let a = patient("epic", "Jane Doe");
        let mut b = patient("humana", "Jane Doe");
        b.birth_date = chrono::NaiveDate::from_ymd_opt(1971, 5, 20);
        assert!(!a.is_duplicate(&b, &DedupConfig::default()));
    }
}
