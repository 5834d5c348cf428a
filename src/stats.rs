//! Run-scoped aggregation state
//!
//! Every counter is an atomic, and the keyed counters live in sharded
//! concurrent maps. Workers share one [`AggregatorState`] through an `Arc`
//! and update it without taking any lock of their own; all updates are
//! commutative, so the result does not depend on how chunks interleave.

use dashmap::DashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::event::{Field, LogEntry};

/// Response times are accumulated scaled by this factor so the reported
/// mean keeps three decimals without floating-point atomics.
pub const FIXED_POINT_SCALE: i64 = 1000;

type CounterMap = DashMap<String, AtomicU64>;

#[derive(Debug, Default)]
pub struct AggregatorState {
    total_requests: AtomicU64,
    error_count: AtomicU64,
    requests_by_ip: CounterMap,
    response_time_fixed: AtomicI64,
    top_values: DashMap<Field, CounterMap>,
}

/// Point-in-time copy of the request statistics
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub error_count: u64,
    pub average_response_ms: f64,
    pub requests_by_ip: Vec<(String, u64)>,
}

impl AggregatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one request for the stats task
    pub fn record_request(&self, entry: &LogEntry) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if entry.is_error() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        increment(&self.requests_by_ip, &entry.ip);
        self.add_response_time(entry.response_time);
    }

    fn add_response_time(&self, response_time_ms: i64) {
        let delta = response_time_ms.saturating_mul(FIXED_POINT_SCALE);
        let mut current = self.response_time_fixed.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(delta);
            match self.response_time_fixed.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Count one occurrence of `value` under `field` for the top task
    pub fn record_value(&self, field: Field, value: &str) {
        if let Some(values) = self.top_values.get(&field) {
            increment(&values, value);
            return;
        }
        let values = self.top_values.entry(field).or_default();
        increment(&values, value);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Acquire)
    }

    /// Mean response time in milliseconds, 0.0 before any request
    pub fn average_response_ms(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        let fixed_mean = self.response_time_fixed.load(Ordering::Acquire) / total as i64;
        fixed_mean as f64 / FIXED_POINT_SCALE as f64
    }

    pub fn requests_for_ip(&self, ip: &str) -> u64 {
        self.requests_by_ip
            .get(ip)
            .map(|counter| counter.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut requests_by_ip: Vec<(String, u64)> = self
            .requests_by_ip
            .iter()
            .map(|item| (item.key().clone(), item.value().load(Ordering::Acquire)))
            .collect();
        requests_by_ip.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        StatsSnapshot {
            total_requests: self.total_requests(),
            error_count: self.error_count(),
            average_response_ms: self.average_response_ms(),
            requests_by_ip,
        }
    }

    /// Number of distinct values seen for `field`, `None` if never touched
    pub fn distinct_values(&self, field: Field) -> Option<usize> {
        self.top_values.get(&field).map(|values| values.len())
    }

    /// The `limit` most frequent values of `field`, most frequent first.
    ///
    /// Among equal counts the value met first while walking the map wins;
    /// that walk order is unspecified, so ties may rank differently between
    /// runs. Returns `None` when no record ever touched `field`.
    pub fn top_values(&self, field: Field, limit: usize) -> Option<Vec<(String, u64)>> {
        let values = self.top_values.get(&field)?;
        if limit == 0 {
            return Some(Vec::new());
        }

        // Min-heap on (count, later-seen-first) keeps the best `limit` entries
        let mut heap: BinaryHeap<Reverse<(u64, Reverse<usize>, String)>> =
            BinaryHeap::with_capacity(limit + 1);
        for (seen, item) in values.iter().enumerate() {
            let count = item.value().load(Ordering::Acquire);
            if heap.len() < limit {
                heap.push(Reverse((count, Reverse(seen), item.key().clone())));
            } else if heap.peek().is_some_and(|Reverse((lowest, _, _))| count > *lowest) {
                heap.pop();
                heap.push(Reverse((count, Reverse(seen), item.key().clone())));
            }
        }

        let mut ranked: Vec<(u64, usize, String)> = heap
            .into_iter()
            .map(|Reverse((count, Reverse(seen), value))| (count, seen, value))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        Some(ranked.into_iter().map(|(count, _, value)| (value, count)).collect())
    }
}

/// Get-or-create the counter for `key` and bump it.
///
/// The read path takes only a shared shard lock; the first sighting of a key
/// goes through `entry`, which creates exactly one counter even when several
/// workers race on the same key.
fn increment(map: &CounterMap, key: &str) {
    if let Some(counter) = map.get(key) {
        counter.fetch_add(1, Ordering::Relaxed);
        return;
    }
    map.entry(key.to_string())
        .or_insert_with(|| AtomicU64::new(0))
        .fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entry(ip: &str, status: i64, response_time: i64) -> LogEntry {
        LogEntry {
            timestamp: "2024-01-15 10:30:00".into(),
            ip: ip.into(),
            method: "GET".into(),
            url: "/".into(),
            status,
            response_time,
        }
    }

    #[test]
    fn test_empty_state() {
        let state = AggregatorState::new();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.average_response_ms, 0.0);
        assert!(snapshot.requests_by_ip.is_empty());
        assert_eq!(state.top_values(Field::Ip, 3), None);
    }

    #[test]
    fn test_average_is_exact_for_any_order() {
        let orders = [
            [100, 200, 300],
            [300, 100, 200],
            [200, 300, 100],
            [300, 200, 100],
        ];
        for order in orders {
            let state = AggregatorState::new();
            for rt in order {
                state.record_request(&entry("1.1.1.1", 200, rt));
            }
            assert_eq!(state.average_response_ms(), 200.0);
        }
    }

    #[test]
    fn test_average_keeps_fractions() {
        let state = AggregatorState::new();
        for rt in [1, 2] {
            state.record_request(&entry("1.1.1.1", 200, rt));
        }
        assert_eq!(state.average_response_ms(), 1.5);
    }

    #[test]
    fn test_concurrent_updates_are_complete() {
        let state = Arc::new(AggregatorState::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for i in 0..1000 {
                        let ip = format!("10.0.0.{}", i % 5);
                        let status = if (worker + i) % 4 == 0 { 500 } else { 200 };
                        state.record_request(&entry(&ip, status, [100, 200, 300][i % 3]));
                        state.record_value(Field::Ip, &ip);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = state.snapshot();
        assert_eq!(snapshot.total_requests, 8000);
        assert_eq!(snapshot.error_count, 2000);
        assert_eq!(snapshot.requests_by_ip.len(), 5);
        let per_ip: u64 = snapshot.requests_by_ip.iter().map(|(_, n)| n).sum();
        assert_eq!(per_ip, 8000);
        assert_eq!(state.requests_for_ip("10.0.0.0"), 1600);
        assert_eq!(state.distinct_values(Field::Ip), Some(5));
    }

    #[test]
    fn test_top_values_with_ties() {
        let state = AggregatorState::new();
        for (value, n) in [("A", 5), ("B", 3), ("C", 3)] {
            for _ in 0..n {
                state.record_value(Field::Method, value);
            }
        }

        let top = state.top_values(Field::Method, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], ("A".to_string(), 5));
        assert!(top[1] == ("B".to_string(), 3) || top[1] == ("C".to_string(), 3));
    }

    #[test]
    fn test_top_values_shorter_than_limit() {
        let state = AggregatorState::new();
        state.record_value(Field::Status, "200");
        state.record_value(Field::Status, "404");
        state.record_value(Field::Status, "200");

        let top = state.top_values(Field::Status, 10).unwrap();
        assert_eq!(top, vec![("200".to_string(), 2), ("404".to_string(), 1)]);
        assert_eq!(state.top_values(Field::Status, 0), Some(Vec::new()));
    }
}
