use std::collections::BTreeSet;

pub type SourceId = u64;

/// Where and when a buffer was placed on the playback clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    pub start: f64,
    pub duration: f64,
}

/// Lays incoming buffers end to end on the playback clock and remembers which
/// ones are still playing.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start_time: f64,
    next_id: SourceId,
    active: BTreeSet<SourceId>,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a buffer of `duration` seconds at `max(now, cursor)`, so chunks play
    /// back to back without gaps or overlap, and advances the cursor past it.
    pub fn schedule(&mut self, now: f64, duration: f64) -> ScheduledSource {
        let start = now.max(self.next_start_time);
        self.next_start_time = start + duration;
        let id = self.next_id;
        self.next_id += 1;
        self.active.insert(id);
        ScheduledSource {
            id,
            start,
            duration,
        }
    }

    /// Untracks a source that ended on its own. False if it was not tracked.
    pub fn finished(&mut self, id: SourceId) -> bool {
        self.active.remove(&id)
    }

    /// Takes every still-tracked source, e.g. to stop them.
    pub fn drain(&mut self) -> Vec<SourceId> {
        std::mem::take(&mut self.active).into_iter().collect()
    }

    /// Takes every tracked source after a barge-in and pulls the cursor back to
    /// `now`, dropping queued time that will never play. Never moves it forward.
    pub fn interrupt(&mut self, now: f64) -> Vec<SourceId> {
        self.next_start_time = self.next_start_time.min(now);
        self.drain()
    }

    /// Forgets all sources and rewinds the cursor. Ids are never reused.
    pub fn reset(&mut self) {
        self.active.clear();
        self.next_start_time = 0.0;
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_play_back_to_back() {
        let mut scheduler = PlaybackScheduler::new();
        let a = scheduler.schedule(0.5, 0.2);
        let b = scheduler.schedule(0.55, 0.3);
        let c = scheduler.schedule(0.6, 0.1);
        assert_eq!(a.start, 0.5);
        assert!((b.start - 0.7).abs() < 1e-9);
        assert!((c.start - 1.0).abs() < 1e-9);
        for (prev, next) in [(a, b), (b, c)] {
            assert!(next.start >= prev.start + prev.duration - 1e-12);
        }
    }

    #[test]
    fn late_buffer_starts_now_and_cursor_never_decreases() {
        let mut scheduler = PlaybackScheduler::new();
        let mut cursor = scheduler.next_start_time();
        for (now, duration) in [(0.0, 0.1), (5.0, 0.2), (1.0, 0.3), (5.1, 0.0)] {
            let source = scheduler.schedule(now, duration);
            assert!(source.start >= now);
            assert!(scheduler.next_start_time() >= cursor);
            cursor = scheduler.next_start_time();
        }
        assert!((cursor - 5.5).abs() < 1e-9);
    }

    #[test]
    fn finished_sources_are_untracked() {
        let mut scheduler = PlaybackScheduler::new();
        let a = scheduler.schedule(0.0, 1.0);
        let b = scheduler.schedule(0.0, 1.0);
        assert!(scheduler.finished(a.id));
        assert!(!scheduler.finished(a.id));
        assert_eq!(scheduler.drain(), vec![b.id]);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn interrupt_rewinds_to_the_clock_only() {
        let mut scheduler = PlaybackScheduler::new();
        let a = scheduler.schedule(1.0, 2.0);
        let b = scheduler.schedule(1.0, 3.0);
        assert_eq!(scheduler.next_start_time(), 6.0);

        let mut stopped = scheduler.interrupt(2.5);
        stopped.sort();
        assert_eq!(stopped, vec![a.id, b.id]);
        assert_eq!(scheduler.next_start_time(), 2.5);
        assert_eq!(scheduler.active_count(), 0);

        // a clock past the cursor leaves it alone
        scheduler.schedule(2.5, 0.5);
        scheduler.interrupt(10.0);
        assert_eq!(scheduler.next_start_time(), 3.0);
        assert_eq!(scheduler.schedule(10.0, 1.0).start, 10.0);
    }

    #[test]
    fn reset_rewinds_but_keeps_ids_unique() {
        let mut scheduler = PlaybackScheduler::new();
        let a = scheduler.schedule(2.0, 1.0);
        scheduler.reset();
        assert_eq!(scheduler.next_start_time(), 0.0);
        let b = scheduler.schedule(0.0, 1.0);
        assert_ne!(a.id, b.id);
        assert_eq!(b.start, 0.0);
    }
}
