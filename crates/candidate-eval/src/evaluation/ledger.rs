use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

use super::domain::{Decision, DecisionResult};

/// Insertion-ordered decision history bounded by age and by count.
///
/// `adopted_ids` and `eureka_ids` hold candidate ids and are pruned together with the
/// entries they point at, so every listed id has at least one live decision behind it.
#[derive(Debug, Default)]
pub struct EvaluationLedger {
    entries: VecDeque<Decision>,
    adopted_ids: Vec<String>,
    eureka_ids: Vec<String>,
    last_cleanup: Option<DateTime<Utc>>,
    expired_count: u64,
    evicted_count: u64,
}

/// Counts reported by the ledger for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerCounts {
    pub size: usize,
    pub expired: u64,
    pub evicted: u64,
}

impl EvaluationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, decision: Decision) {
        let list = match decision.result {
            DecisionResult::Adopt => Some(&mut self.adopted_ids),
            DecisionResult::EurekaPromote => Some(&mut self.eureka_ids),
            DecisionResult::Reject | DecisionResult::FurtherTest => None,
        };
        if let Some(list) = list {
            if !list.contains(&decision.candidate_id) {
                list.push(decision.candidate_id.clone());
            }
        }
        self.entries.push_back(decision);
    }

    /// Run [`Self::cleanup_expired`] only if `interval` has passed since the last run.
    pub fn maybe_cleanup_expired(
        &mut self,
        now: DateTime<Utc>,
        ttl: Duration,
        interval: Duration,
    ) -> Option<usize> {
        let due = match self.last_cleanup {
            Some(last) => now - last >= interval,
            None => true,
        };
        if due {
            Some(self.cleanup_expired(now, ttl))
        } else {
            None
        }
    }

    /// Drop every entry older than `ttl`. Returns how many were removed.
    pub fn cleanup_expired(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        self.last_cleanup = Some(now);

        let before = self.entries.len();
        self.entries.retain(|entry| now - entry.timestamp <= ttl);
        let removed = before - self.entries.len();

        if removed > 0 {
            self.expired_count += removed as u64;
            self.prune_id_lists();
        }
        removed
    }

    /// Evict the oldest entries by timestamp until at most `max` remain.
    pub fn enforce_max_candidates(&mut self, max: usize) -> usize {
        let excess = self.entries.len().saturating_sub(max);
        if excess == 0 {
            return 0;
        }

        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by_key(|&index| (self.entries[index].timestamp, index));
        let doomed: HashSet<usize> = order.into_iter().take(excess).collect();

        let mut index = 0;
        self.entries.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });

        self.evicted_count += excess as u64;
        self.prune_id_lists();
        excess
    }

    /// The `limit` most recently appended decisions, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Decision> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn for_candidate(&self, candidate_id: &str) -> Vec<Decision> {
        self.entries
            .iter()
            .filter(|entry| entry.candidate_id == candidate_id)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decision> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn adopted_ids(&self) -> &[String] {
        &self.adopted_ids
    }

    pub fn eureka_ids(&self) -> &[String] {
        &self.eureka_ids
    }

    pub fn last_cleanup(&self) -> Option<DateTime<Utc>> {
        self.last_cleanup
    }

    pub fn counts(&self) -> LedgerCounts {
        LedgerCounts {
            size: self.entries.len(),
            expired: self.expired_count,
            evicted: self.evicted_count,
        }
    }

    fn prune_id_lists(&mut self) {
        let mut adopted = HashSet::new();
        let mut eureka = HashSet::new();
        for entry in &self.entries {
            match entry.result {
                DecisionResult::Adopt => {
                    adopted.insert(entry.candidate_id.as_str());
                }
                DecisionResult::EurekaPromote => {
                    eureka.insert(entry.candidate_id.as_str());
                }
                DecisionResult::Reject | DecisionResult::FurtherTest => {}
            }
        }

        self.adopted_ids.retain(|id| adopted.contains(id.as_str()));
        self.eureka_ids.retain(|id| eureka.contains(id.as_str()));
    }
}
