use chrono::{DateTime, Utc};
use recon_core::{DedupConfig, Medication, MedicationStatus};

use super::{best_name, first_some, latest, Reconcilable};
use crate::similarity::{same_day, similarity, within_days};

impl Reconcilable for Medication {
    fn source(&self) -> &str {
        &self.source
    }

    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn primary_date(&self) -> Option<DateTime<Utc>> {
        self.prescribed_at
    }

    fn is_duplicate(&self, other: &Self, config: &DedupConfig) -> bool {
        if let (Some(a), Some(b)) = (self.rxnorm(), other.rxnorm()) {
            if a == b {
                let same_quantity = self.quantity.is_some() && self.quantity == other.quantity;
                let both_active = self.status == other.status
                    && self.status == MedicationStatus::Active;
                if same_day(self.prescribed_at, other.prescribed_at)
                    || (same_quantity
                        && within_days(
                            self.prescribed_at,
                            other.prescribed_at,
                            config.medication_quantity_window_days,
                        ))
                    || both_active
                {
                    return true;
                }
            }
        }

        if let (Some(a), Some(b)) = (&self.ndc, &other.ndc) {
            if a == b
                && within_days(
                    self.prescribed_at,
                    other.prescribed_at,
                    config.medication_ndc_window_days,
                )
            {
                return true;
            }
        }

        if self.code.is_none() && other.code.is_none() {
            let same_instructions = self.status == other.status
                && self.dosage_text().is_some()
                && self.dosage_text() == other.dosage_text();
            return similarity(&self.name, &other.name) >= config.medication_name_similarity
                && (within_days(
                    self.prescribed_at,
                    other.prescribed_at,
                    config.medication_name_window_days,
                ) || same_instructions);
        }

        false
    }

    fn merge(first: &Self, members: &[Self]) -> Self {
        Medication {
            id: first.id.clone(),
            source: first.source.clone(),
            name: best_name(first, members, |m| m.name.as_str()),
            code: first_some(members, |m| m.code.as_ref()),
            code_system: first_some(members, |m| m.code_system.as_ref()),
            ndc: first_some(members, |m| m.ndc.as_ref()),
            status: first.status,
            dosage: first_some(members, |m| m.dosage.as_ref()),
            prescribed_at: latest(members, |m| m.prescribed_at),
            prescriber: first_some(members, |m| m.prescriber.as_ref()),
            refills: members.iter().filter_map(|m| m.refills).max(),
            quantity: first_some(members, |m| m.quantity.as_ref()),
            days_supply: first_some(members, |m| m.days_supply.as_ref()),
            category: first_some(members, |m| m.category.as_ref()),
            enriched: members.iter().any(|m| m.enriched),
            raw: first.raw.clone(),
        }
    }
}
