//! Per-domain time accounting. A plain accumulator keyed by domain string,
//! unbounded over the process lifetime, reset once per calendar day.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The persisted breakdown of where time went today. Lives in
/// `breakdown.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainLedger {
    totals: HashMap<String, u64>,
    last_reset: NaiveDate,
}

impl DomainLedger {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            totals: HashMap::new(),
            last_reset: today,
        }
    }

    /// Attribute a slice of time to a domain.
    pub fn attribute(&mut self, domain: &str, duration_ms: u64) {
        if duration_ms == 0 {
            return;
        }
        *self.totals.entry(domain.to_string()).or_default() += duration_ms;
    }

    /// Clears the accumulator when the stored date differs from `today`.
    /// Returns whether a reset happened so callers know to persist.
    pub fn reset_if_new_day(&mut self, today: NaiveDate) -> bool {
        if self.last_reset != today {
            self.totals.clear();
            self.last_reset = today;
            true
        } else {
            false
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.totals.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Domains with their accumulated time, largest first. Ties broken by
    /// name so output is stable.
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self
            .totals
            .iter()
            .map(|(domain, ms)| (domain.as_str(), *ms))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::DomainLedger;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 7, d).unwrap()
    }

    #[test]
    fn test_attribution_accumulates() {
        let mut ledger = DomainLedger::new(day(4));
        ledger.attribute("reddit.com", 1000);
        ledger.attribute("docs.rs", 4000);
        ledger.attribute("reddit.com", 500);
        ledger.attribute("docs.rs", 0);

        assert_eq!(ledger.total_ms(), 5500);
        assert_eq!(
            ledger.sorted(),
            vec![("docs.rs", 4000), ("reddit.com", 1500)]
        );
    }

    #[test]
    fn test_sorted_breaks_ties_by_name() {
        let mut ledger = DomainLedger::new(day(4));
        ledger.attribute("b.example", 100);
        ledger.attribute("a.example", 100);
        assert_eq!(ledger.sorted(), vec![("a.example", 100), ("b.example", 100)]);
    }

    #[test]
    fn test_daily_reset() {
        let mut ledger = DomainLedger::new(day(4));
        ledger.attribute("reddit.com", 1000);

        assert!(!ledger.reset_if_new_day(day(4)));
        assert_eq!(ledger.total_ms(), 1000);

        assert!(ledger.reset_if_new_day(day(5)));
        assert!(ledger.is_empty());
        // Already reset for the new day.
        assert!(!ledger.reset_if_new_day(day(5)));
    }
}
