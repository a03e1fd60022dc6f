//! Control bundles — the unit every resolver produces.
//!
//! RULE: Bundles are values. They are never mutated once built;
//! merging returns a new bundle. Sets are ordered so serialized
//! output is deterministic.

use crate::types::Months;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Periodicity carried by a bundle that imposes no interval of its own.
/// Larger than any real value so it never wins a minimum.
pub const NO_PERIODICITY_MONTHS: Months = 999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlBundle {
    pub exam_codes: BTreeSet<String>,
    pub ppe: BTreeSet<String>,
    pub aptitudes: BTreeSet<String>,
    pub disqualifying_conditions: BTreeSet<String>,
    pub periodicity_months: Months,
    pub justification: String,
}

impl ControlBundle {
    pub fn empty(justification: impl Into<String>) -> Self {
        Self {
            exam_codes: BTreeSet::new(),
            ppe: BTreeSet::new(),
            aptitudes: BTreeSet::new(),
            disqualifying_conditions: BTreeSet::new(),
            periodicity_months: NO_PERIODICITY_MONTHS,
            justification: justification.into(),
        }
    }

    pub fn with_periodicity(mut self, months: Months) -> Self {
        self.periodicity_months = months;
        self
    }

    pub fn has_controls(&self) -> bool {
        !(self.exam_codes.is_empty()
            && self.ppe.is_empty()
            && self.aptitudes.is_empty()
            && self.disqualifying_conditions.is_empty())
    }

    /// Set-union of every list, shortest periodicity. Commutative and
    /// associative; the justification of `self` is kept.
    pub fn union(&self, other: &ControlBundle) -> ControlBundle {
        ControlBundle {
            exam_codes: self.exam_codes.union(&other.exam_codes).cloned().collect(),
            ppe: self.ppe.union(&other.ppe).cloned().collect(),
            aptitudes: self.aptitudes.union(&other.aptitudes).cloned().collect(),
            disqualifying_conditions: self
                .disqualifying_conditions
                .union(&other.disqualifying_conditions)
                .cloned()
                .collect(),
            periodicity_months: self.periodicity_months.min(other.periodicity_months),
            justification: self.justification.clone(),
        }
    }
}

pub(crate) fn string_set<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
