//! Tick-driven scheduled tasks
//!
//! Replaces free-running timers: every delayed action (respawns, reloads,
//! the boss countdown, the solo fallback) is an entry keyed by the tick it
//! fires on, so a role change or weapon switch can cancel it by token.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use super::constants::net::SCHEDULER_TICK_RATE;

/// Handle returned by [`Scheduler::schedule_in`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskToken(u64);

pub struct Scheduler<T> {
    /// (fire_at_tick, seq) -> task; seq keeps insertion order within a tick
    queue: BTreeMap<(u64, u64), (TaskToken, T)>,
    index: HashMap<TaskToken, (u64, u64)>,
    now_tick: u64,
    elapsed: f64,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            index: HashMap::new(),
            now_tick: 0,
            elapsed: 0.0,
            next_seq: 0,
        }
    }

    /// Seconds elapsed on the scheduler clock
    pub fn now_secs(&self) -> f64 {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue `task` to fire `delay_secs` from now (rounded to whole ticks)
    pub fn schedule_in(&mut self, delay_secs: f32, task: T) -> TaskToken {
        let ticks = (delay_secs.max(0.0) as f64 * SCHEDULER_TICK_RATE as f64).round() as u64;
        let key = (self.now_tick + ticks, self.next_seq);
        let token = TaskToken(self.next_seq);
        self.next_seq += 1;
        self.queue.insert(key, (token, task));
        self.index.insert(token, key);
        token
    }

    /// Remove a pending task. Unknown or already-fired tokens return `false`.
    pub fn cancel(&mut self, token: TaskToken) -> bool {
        match self.index.remove(&token) {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    /// Cancel every pending task matching `pred`; returns how many were removed
    pub fn cancel_where<F: FnMut(&T) -> bool>(&mut self, mut pred: F) -> usize {
        let doomed: Vec<((u64, u64), TaskToken)> = self
            .queue
            .iter()
            .filter(|(_, (_, task))| pred(task))
            .map(|(key, (token, _))| (*key, *token))
            .collect();
        for (key, token) in &doomed {
            self.queue.remove(key);
            self.index.remove(token);
        }
        doomed.len()
    }

    /// Advance the clock by `dt` seconds and return due tasks in fire order
    pub fn advance(&mut self, dt: f32) -> Vec<(TaskToken, T)> {
        self.elapsed += dt.max(0.0) as f64;
        // f32 frame deltas undershoot; allow a thousandth of a tick of slack
        self.now_tick = (self.elapsed * SCHEDULER_TICK_RATE as f64 + 1e-3).floor() as u64;

        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > self.now_tick {
                break;
            }
            let (token, task) = entry.remove();
            self.index.remove(&token);
            due.push((token, task));
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_delay() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_in(2.0, "fallback");

        assert!(scheduler.advance(1.0).is_empty());
        assert!(scheduler.advance(0.9).is_empty());
        let due = scheduler.advance(0.1);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1, "fallback");
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_fire_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_in(3.0, 3);
        scheduler.schedule_in(1.0, 1);
        scheduler.schedule_in(1.0, 2);

        let due: Vec<i32> = scheduler.advance(5.0).into_iter().map(|(_, t)| t).collect();
        assert_eq!(due, vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_before_fire() {
        let mut scheduler = Scheduler::new();
        let token = scheduler.schedule_in(1.0, ());
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.cancel(token));
        assert!(scheduler.is_empty());
        assert!(scheduler.advance(2.0).is_empty());
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let mut scheduler = Scheduler::new();
        let token = scheduler.schedule_in(0.5, ());
        assert_eq!(scheduler.advance(1.0).len(), 1);
        assert!(!scheduler.cancel(token));
        assert!(!scheduler.cancel(token));
    }

    #[test]
    fn test_cancel_where() {
        let mut scheduler = Scheduler::new();
        for i in 0..10 {
            scheduler.schedule_in(i as f32, i);
        }
        assert_eq!(scheduler.cancel_where(|t| t % 2 == 0), 5);
        let due: Vec<i32> = scheduler.advance(20.0).into_iter().map(|(_, t)| t).collect();
        assert_eq!(due, vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_small_steps_accumulate() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_in(1.0, ());
        let mut fired = 0;
        for _ in 0..59 {
            fired += scheduler.advance(1.0 / 60.0).len();
        }
        assert_eq!(fired, 0);
        fired += scheduler.advance(1.0 / 60.0).len();
        assert_eq!(fired, 1);
        assert!((scheduler.now_secs() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_delay_fires_on_next_advance() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_in(0.0, ());
        assert_eq!(scheduler.advance(0.0).len(), 1);
    }
}
