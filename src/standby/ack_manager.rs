//! Outstanding-task bookkeeping for the queue processor.
//!
//! Tracks every task handed to the workers and computes the cluster ack
//! level: the highest task id such that every task at or below it has
//! reached a terminal outcome. The level never regresses and never jumps
//! over an in-flight task.

use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug)]
struct AckState {
    /// task id -> completed, ordered so the ack level scan walks the front.
    outstanding: BTreeMap<i64, bool>,
    read_level: i64,
    ack_level: i64,
}

/// Thread-safe ack bookkeeping shared by poller, workers, and the updater.
#[derive(Debug)]
pub struct AckManager {
    state: Mutex<AckState>,
}

impl AckManager {
    /// Start from the persisted cluster ack level.
    pub fn new(ack_level: i64) -> Self {
        Self {
            state: Mutex::new(AckState {
                outstanding: BTreeMap::new(),
                read_level: ack_level,
                ack_level,
            }),
        }
    }

    pub fn read_level(&self) -> i64 {
        self.state.lock().map(|s| s.read_level).unwrap_or(i64::MIN)
    }

    pub fn ack_level(&self) -> i64 {
        self.state.lock().map(|s| s.ack_level).unwrap_or(i64::MIN)
    }

    /// Record a task as in flight and advance the read level to it.
    pub fn register(&self, task_id: i64) {
        if let Ok(mut state) = self.state.lock() {
            state.outstanding.entry(task_id).or_insert(false);
            if task_id > state.read_level {
                state.read_level = task_id;
            }
        }
    }

    /// Record a terminal outcome for a task.
    pub fn complete(&self, task_id: i64) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(done) = state.outstanding.get_mut(&task_id) {
                *done = true;
            }
        }
    }

    /// Advance and return the ack level: the prefix of completed tasks is
    /// drained and the level moves to the last drained id.
    pub fn advance_ack_level(&self) -> i64 {
        let Ok(mut state) = self.state.lock() else {
            return i64::MIN;
        };
        loop {
            let Some((&task_id, &done)) = state.outstanding.iter().next() else {
                break;
            };
            if !done {
                break;
            }
            state.outstanding.remove(&task_id);
            state.ack_level = task_id;
        }
        state.ack_level
    }

    pub fn outstanding_count(&self) -> usize {
        self.state.lock().map(|s| s.outstanding.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_level_starts_at_initial_level() {
        let ack = AckManager::new(41);
        assert_eq!(ack.ack_level(), 41);
        assert_eq!(ack.read_level(), 41);
        assert_eq!(ack.advance_ack_level(), 41);
    }

    #[test]
    fn ack_level_stops_at_first_incomplete_task() {
        let ack = AckManager::new(0);
        for id in [1, 2, 3, 4] {
            ack.register(id);
        }
        ack.complete(1);
        ack.complete(3);

        assert_eq!(ack.advance_ack_level(), 1);
        ack.complete(2);
        assert_eq!(ack.advance_ack_level(), 3);
        ack.complete(4);
        assert_eq!(ack.advance_ack_level(), 4);
        assert_eq!(ack.outstanding_count(), 0);
    }

    #[test]
    fn ack_level_never_regresses() {
        let ack = AckManager::new(10);
        ack.register(11);
        ack.complete(11);
        assert_eq!(ack.advance_ack_level(), 11);
        assert_eq!(ack.advance_ack_level(), 11);
        assert!(ack.ack_level() >= 10);
    }

    #[test]
    fn read_level_tracks_highest_registered_task() {
        let ack = AckManager::new(0);
        ack.register(7);
        ack.register(3);
        assert_eq!(ack.read_level(), 7);
    }
}
