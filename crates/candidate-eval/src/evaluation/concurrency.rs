use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};
use serde::Serialize;

use super::domain::{DecisionResult, EvaluationId};

/// Per-evaluation-id mutual exclusion. Entries are dropped once no caller holds or
/// waits on them, so the registry only grows with concurrently busy ids.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("timed out after {waited:?} waiting for evaluation {key}")]
pub struct LockTimeout {
    pub key: EvaluationId,
    pub waited: Duration,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free. With a timeout, give up once it elapses.
    pub fn acquire(
        &self,
        key: &EvaluationId,
        timeout: Option<Duration>,
    ) -> Result<EvaluationPermit<'_>, LockTimeout> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(key.0.clone()).or_default())
        };

        let guard = match timeout {
            None => Some(lock.lock_arc()),
            Some(waited) => lock.try_lock_arc_for(waited),
        };
        drop(lock);

        match guard {
            Some(guard) => Ok(EvaluationPermit {
                key: key.clone(),
                guard: Some(guard),
                registry: self,
            }),
            None => {
                self.release(key);
                Err(LockTimeout {
                    key: key.clone(),
                    waited: timeout.unwrap_or_default(),
                })
            }
        }
    }

    /// Number of ids currently held or waited on.
    pub fn active(&self) -> usize {
        self.locks.lock().len()
    }

    fn release(&self, key: &EvaluationId) {
        let mut locks = self.locks.lock();
        if locks
            .get(&key.0)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&key.0);
        }
    }
}

/// Held for the duration of one evaluation; releases the id on drop, including unwinds.
pub struct EvaluationPermit<'a> {
    key: EvaluationId,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
    registry: &'a KeyedLocks,
}

impl EvaluationPermit<'_> {
    pub fn key(&self) -> &EvaluationId {
        &self.key
    }
}

impl Drop for EvaluationPermit<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.registry.release(&self.key);
    }
}

#[derive(Debug, Default)]
struct KindCounters {
    in_flight: AtomicU64,
    errors: AtomicU64,
}

/// Counters for one strategy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KindActivity {
    pub in_flight: u64,
    pub errors: u64,
}

/// Result tallies accumulated over the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TallySnapshot {
    pub adoptions: u64,
    pub rejections: u64,
    pub eureka_detections: u64,
    pub further_tests: u64,
    pub fallbacks: u64,
    pub error_decisions: u64,
}

impl TallySnapshot {
    pub fn total(&self) -> u64 {
        self.adoptions + self.rejections + self.eureka_detections + self.further_tests
    }
}

/// Process-wide activity counters, injected into the engine rather than held globally.
#[derive(Debug, Default)]
pub struct ConcurrencyState {
    kinds: RwLock<HashMap<String, Arc<KindCounters>>>,
    adoptions: AtomicU64,
    rejections: AtomicU64,
    eureka_detections: AtomicU64,
    further_tests: AtomicU64,
    fallbacks: AtomicU64,
    error_decisions: AtomicU64,
}

impl ConcurrencyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one evaluation of `kind` as in flight until the guard drops.
    pub fn enter(&self, kind: &str) -> InFlightGuard {
        let counters = self.counters(kind);
        counters.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard { counters }
    }

    pub fn record_error(&self, kind: &str) {
        self.counters(kind).errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result(&self, result: DecisionResult) {
        let counter = match result {
            DecisionResult::Adopt => &self.adoptions,
            DecisionResult::Reject => &self.rejections,
            DecisionResult::EurekaPromote => &self.eureka_detections,
            DecisionResult::FurtherTest => &self.further_tests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error_decision(&self) {
        self.error_decisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn activity(&self, kind: &str) -> KindActivity {
        self.kinds
            .read()
            .get(kind)
            .map(|counters| snapshot(counters))
            .unwrap_or_default()
    }

    pub fn activity_by_kind(&self) -> BTreeMap<String, KindActivity> {
        self.kinds
            .read()
            .iter()
            .map(|(kind, counters)| (kind.clone(), snapshot(counters)))
            .collect()
    }

    pub fn tallies(&self) -> TallySnapshot {
        TallySnapshot {
            adoptions: self.adoptions.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            eureka_detections: self.eureka_detections.load(Ordering::Relaxed),
            further_tests: self.further_tests.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            error_decisions: self.error_decisions.load(Ordering::Relaxed),
        }
    }

    fn counters(&self, kind: &str) -> Arc<KindCounters> {
        let existing = self.kinds.read().get(kind).cloned();
        if let Some(counters) = existing {
            return counters;
        }
        Arc::clone(self.kinds.write().entry(kind.to_string()).or_default())
    }
}

fn snapshot(counters: &KindCounters) -> KindActivity {
    KindActivity {
        in_flight: counters.in_flight.load(Ordering::Acquire),
        errors: counters.errors.load(Ordering::Relaxed),
    }
}

/// Decrements the kind's in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    counters: Arc<KindCounters>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
