use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::calendar::DayToken;

/// Which of the two day sets a release targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaySet {
    Booked,
    Held,
}

/// Per-room record of booked and held days.
///
/// Invariant: `booked ∩ held = ∅`. The allocate operations refuse any token
/// already present in either set, and promotion moves tokens rather than
/// copying them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    booked: BTreeSet<DayToken>,
    held: BTreeSet<DayToken>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored sets. Tokens present in both are kept as booked.
    pub fn from_parts(booked: impl IntoIterator<Item = DayToken>, held: impl IntoIterator<Item = DayToken>) -> Self {
        let booked: BTreeSet<DayToken> = booked.into_iter().collect();
        let held = held.into_iter().filter(|d| !booked.contains(d)).collect();
        Self { booked, held }
    }

    pub fn booked(&self) -> impl Iterator<Item = &DayToken> {
        self.booked.iter()
    }

    pub fn held(&self) -> impl Iterator<Item = &DayToken> {
        self.held.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.booked.is_empty() && self.held.is_empty()
    }

    pub fn is_booked(&self, day: &DayToken) -> bool {
        self.booked.contains(day)
    }

    pub fn is_held(&self, day: &DayToken) -> bool {
        self.held.contains(day)
    }

    /// True iff none of `days` is booked or held.
    pub fn is_available(&self, days: &[DayToken]) -> bool {
        days.iter().all(|d| !self.booked.contains(d) && !self.held.contains(d))
    }

    /// The subset of `days` that is booked or held, in order.
    pub fn conflicts(&self, days: &[DayToken]) -> Vec<DayToken> {
        let mut hits: Vec<DayToken> = days
            .iter()
            .filter(|d| self.booked.contains(d) || self.held.contains(d))
            .copied()
            .collect();
        hits.sort();
        hits.dedup();
        hits
    }

    pub fn allocate_booked(&mut self, days: &[DayToken]) -> Result<(), Vec<DayToken>> {
        self.allocate(days, DaySet::Booked)
    }

    pub fn allocate_hold(&mut self, days: &[DayToken]) -> Result<(), Vec<DayToken>> {
        self.allocate(days, DaySet::Held)
    }

    fn allocate(&mut self, days: &[DayToken], into: DaySet) -> Result<(), Vec<DayToken>> {
        let conflicts = self.conflicts(days);
        if !conflicts.is_empty() {
            return Err(conflicts);
        }
        let set = match into {
            DaySet::Booked => &mut self.booked,
            DaySet::Held => &mut self.held,
        };
        set.extend(days.iter().copied());
        Ok(())
    }

    /// Remove `days` from one set. Absent tokens are ignored.
    pub fn release(&mut self, days: &[DayToken], from: DaySet) {
        let set = match from {
            DaySet::Booked => &mut self.booked,
            DaySet::Held => &mut self.held,
        };
        for day in days {
            set.remove(day);
        }
    }

    /// Move `days` from held to booked in one step. Every token must currently
    /// be held; otherwise nothing moves and the tokens that are not held are
    /// returned.
    pub fn promote_hold_to_booked(&mut self, days: &[DayToken]) -> Result<(), Vec<DayToken>> {
        let missing: Vec<DayToken> = days.iter().filter(|d| !self.held.contains(d)).copied().collect();
        if !missing.is_empty() {
            return Err(missing);
        }
        for day in days {
            self.held.remove(day);
            self.booked.insert(*day);
        }
        Ok(())
    }

    /// Drop every token strictly earlier than `today` from both sets.
    /// Returns how many tokens were removed.
    pub fn retire_past(&mut self, today: DayToken) -> usize {
        let before = self.booked.len() + self.held.len();
        self.booked = self.booked.split_off(&today);
        self.held = self.held.split_off(&today);
        before - (self.booked.len() + self.held.len())
    }

    /// Booked or held days in `[from, to)`.
    pub fn unavailable_in(&self, from: DayToken, to: DayToken) -> Vec<DayToken> {
        if from >= to {
            return Vec::new();
        }
        let mut days: Vec<DayToken> = self
            .booked
            .range(from..to)
            .chain(self.held.range(from..to))
            .copied()
            .collect();
        days.sort();
        days
    }

    pub fn has_past_days(&self, today: DayToken) -> bool {
        self.booked.first().is_some_and(|d| *d < today) || self.held.first().is_some_and(|d| *d < today)
    }

    #[cfg(test)]
    fn disjoint(&self) -> bool {
        self.booked.is_disjoint(&self.held)
    }
}
