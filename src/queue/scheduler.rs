//! Priority FIFO scheduling data structure (spec.md §4.3).
//!
//! Three per-priority FIFO lanes; `pop_next` always drains `high`
//! before `normal` before `low`. Retries re-enter at the head of their
//! own lane via [`JobQueues::push_front`], preserving position relative
//! to other same-priority jobs that arrived after the first attempt.

use std::collections::VecDeque;

use super::job::{Job, Priority};

#[derive(Default)]
pub struct JobQueues {
    high: VecDeque<Job>,
    normal: VecDeque<Job>,
    low: VecDeque<Job>,
}

impl JobQueues {
    fn lane_mut(&mut self, priority: Priority) -> &mut VecDeque<Job> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }

    pub fn push_back(&mut self, job: Job) {
        self.lane_mut(job.priority).push_back(job);
    }

    pub fn push_front(&mut self, job: Job) {
        self.lane_mut(job.priority).push_front(job);
    }

    pub fn pop_next(&mut self) -> Option<Job> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drain_all(&mut self) -> Vec<Job> {
        self.high
            .drain(..)
            .chain(self.normal.drain(..))
            .chain(self.low.drain(..))
            .collect()
    }
}
