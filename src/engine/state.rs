use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Fixed-capacity record of per-gulp beam counts. Pushing onto a full window
/// evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct BeamActivityWindow {
    capacity: usize,
    counts: VecDeque<usize>,
}

impl BeamActivityWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            counts: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, count: usize) {
        if self.counts.len() == self.capacity {
            self.counts.pop_front();
        }
        self.counts.push_back(count);
    }

    /// Sum of the counts currently held, `None` on overflow.
    pub fn total(&self) -> Option<usize> {
        self.counts.iter().try_fold(0usize, |acc, &c| acc.checked_add(c))
    }

    /// Sum the window would hold after pushing `count`, without pushing it.
    /// `None` on overflow.
    pub fn total_after_push(&self, count: usize) -> Option<usize> {
        let skip = usize::from(self.counts.len() == self.capacity);
        self.counts
            .iter()
            .skip(skip)
            .try_fold(count, |acc, &c| acc.checked_add(c))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.counts.iter()
    }
}

/// State carried from one gulp to the next for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct TriggerState {
    prev_trigger_time: DateTime<Utc>,
    prev_trigger_name: Option<String>,
    pub beams: BeamActivityWindow,
}

impl TriggerState {
    /// `started_at` counts as the previous trigger, so nothing triggers within
    /// one debounce interval of startup.
    pub fn new(started_at: DateTime<Utc>, last_name: Option<String>, window_capacity: usize) -> Self {
        Self {
            prev_trigger_time: started_at,
            prev_trigger_name: last_name,
            beams: BeamActivityWindow::new(window_capacity),
        }
    }

    pub fn prev_trigger_time(&self) -> DateTime<Utc> {
        self.prev_trigger_time
    }

    pub fn prev_trigger_name(&self) -> Option<&str> {
        self.prev_trigger_name.as_deref()
    }

    /// Name handed out without a trigger (triggering disabled).
    pub fn record_name(&mut self, name: String) {
        self.prev_trigger_name = Some(name);
    }

    /// Record a fired trigger. Times earlier than the current one are ignored
    /// so the previous-trigger time never moves backwards.
    pub fn record_trigger(&mut self, name: String, at: DateTime<Utc>) {
        self.prev_trigger_name = Some(name);
        if at > self.prev_trigger_time {
            self.prev_trigger_time = at;
        }
    }
}
