use std::time::{Duration, Instant};

/// A single-slot delayed action.
///
/// Scheduling always replaces whatever was pending, so at most one deadline
/// is outstanding per slot and [`DelaySlot::poll`] fires at most once per
/// schedule.
#[derive(Debug, Default)]
pub(crate) struct DelaySlot {
    deadline: Option<Instant>,
}

impl DelaySlot {
    /// Arms the slot `delay` from `now`, superseding any pending deadline.
    pub fn schedule_in(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once the deadline has passed; the slot is cleared on fire.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if now >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Time left until the pending deadline, `None` when the slot is idle.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|at| at.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn fires_once_after_deadline() {
        let t0 = Instant::now();
        let mut slot = DelaySlot::default();
        slot.schedule_in(t0, 100 * MS);

        assert!(!slot.poll(t0 + 99 * MS));
        assert!(slot.is_pending());
        assert!(slot.poll(t0 + 100 * MS));
        assert!(!slot.poll(t0 + 200 * MS));
        assert!(!slot.is_pending());
    }

    #[test]
    fn cancel_disarms() {
        let t0 = Instant::now();
        let mut slot = DelaySlot::default();
        slot.schedule_in(t0, 100 * MS);
        slot.cancel();

        assert!(!slot.is_pending());
        assert!(!slot.poll(t0 + 200 * MS));
    }

    #[test]
    fn reschedule_supersedes() {
        let t0 = Instant::now();
        let mut slot = DelaySlot::default();
        slot.schedule_in(t0, 100 * MS);
        slot.schedule_in(t0 + 50 * MS, 100 * MS);

        // The original deadline no longer fires.
        assert!(!slot.poll(t0 + 100 * MS));
        assert!(slot.poll(t0 + 150 * MS));
    }

    #[test]
    fn remaining_tracks_deadline() {
        let t0 = Instant::now();
        let mut slot = DelaySlot::default();
        assert_eq!(slot.remaining(t0), None);

        slot.schedule_in(t0, 100 * MS);
        assert_eq!(slot.remaining(t0 + 30 * MS), Some(70 * MS));
        assert_eq!(slot.remaining(t0 + 200 * MS), Some(Duration::ZERO));
    }
}
