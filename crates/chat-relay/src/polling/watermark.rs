//! Delivery watermark for polled message batches.

use chat_core::{Message, MessageId};
use std::collections::{HashSet, VecDeque};

/// Number of recently delivered ids remembered for deduplication
const RECENT_IDS: usize = 256;

/// Filters polled batches down to messages not delivered yet
///
/// A message is new when its timestamp is strictly greater than the last
/// delivered timestamp and its id was not delivered recently. The watermark
/// never moves backwards.
#[derive(Debug, Clone)]
pub struct Watermark {
    last_seen: i64,
    recent: VecDeque<MessageId>,
    recent_set: HashSet<MessageId>,
}

impl Watermark {
    /// Start at `last_seen` (epoch ms); only later messages are delivered
    #[must_use]
    pub fn new(last_seen: i64) -> Self {
        Self {
            last_seen,
            recent: VecDeque::with_capacity(RECENT_IDS),
            recent_set: HashSet::with_capacity(RECENT_IDS),
        }
    }

    /// Timestamp of the most recently delivered message
    #[must_use]
    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }

    /// Take a fetched batch and return the new messages in ascending
    /// timestamp order, advancing the watermark past them
    pub fn accept(&mut self, batch: Vec<Message>) -> Vec<Message> {
        let mut fresh: Vec<Message> = batch
            .into_iter()
            .filter(|message| message.timestamp > self.last_seen)
            .filter(|message| !self.recent_set.contains(&message.id))
            .collect();

        fresh.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        fresh.dedup_by(|a, b| a.id == b.id);

        for message in &fresh {
            self.remember(message.id.clone());
        }
        if let Some(newest) = fresh.last() {
            self.last_seen = self.last_seen.max(newest.timestamp);
        }

        fresh
    }

    fn remember(&mut self, id: MessageId) {
        if self.recent.len() == RECENT_IDS {
            if let Some(evicted) = self.recent.pop_front() {
                self.recent_set.remove(&evicted);
            }
        }
        self.recent_set.insert(id.clone());
        self.recent.push_back(id);
    }
}
