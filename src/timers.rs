//! Pending callbacks for one session. Everything the engine waits on lives
//! here, so leaving `playing` can drop all of it in one call.

use crate::clock::Millis;
use crate::stimulus::StimulusId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    CountdownEnd,
    /// A delayed spawn has served its delay.
    Spawn,
    /// Recurring spawn for interval-driven games.
    SpawnInterval,
    Expire(StimulusId),
    /// End of a between-rounds pause.
    Resume,
    /// Wall-clock limit for duration games.
    Deadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub id: TimerId,
    pub kind: TimerKind,
    pub due: Millis,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: Vec<Timer>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TimerKind, due: Millis) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer { id, kind, due });
        id
    }

    pub fn cancel(&mut self, id: TimerId) {
        self.timers.retain(|t| t.id != id);
    }

    pub fn cancel_kind(&mut self, kind: TimerKind) {
        self.timers.retain(|t| t.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn has(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|t| t.kind == kind)
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Remove and return the earliest timer due at or before `now`.
    /// Ties fire in scheduling order.
    pub fn pop_due(&mut self, now: Millis) -> Option<Timer> {
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;
        Some(self.timers.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_due_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule(TimerKind::Deadline, 300);
        q.schedule(TimerKind::Spawn, 100);
        q.schedule(TimerKind::Resume, 100);

        assert_eq!(q.pop_due(50), None);
        assert_eq!(q.pop_due(400).map(|t| t.kind), Some(TimerKind::Spawn));
        assert_eq!(q.pop_due(400).map(|t| t.kind), Some(TimerKind::Resume));
        assert_eq!(q.pop_due(400).map(|t| t.kind), Some(TimerKind::Deadline));
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_all_drops_everything() {
        let mut q = TimerQueue::new();
        q.schedule(TimerKind::Spawn, 10);
        q.schedule(TimerKind::Expire(StimulusId(1)), 20);
        q.cancel_all();
        assert_eq!(q.pop_due(u64::MAX), None);
        assert_eq!(q.next_due(), None);
    }

    #[test]
    fn cancel_by_id_and_kind() {
        let mut q = TimerQueue::new();
        let a = q.schedule(TimerKind::Spawn, 10);
        q.schedule(TimerKind::Expire(StimulusId(4)), 20);
        q.schedule(TimerKind::Expire(StimulusId(5)), 30);
        q.cancel(a);
        assert!(!q.has(TimerKind::Spawn));
        q.cancel_kind(TimerKind::Expire(StimulusId(4)));
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_due(), Some(30));
    }
}
