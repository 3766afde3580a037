//! Bounded per-signal buffer between producers and the export path.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// What `push` does when the buffer is at capacity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Fail the submission, leaving the buffer unchanged
    #[default]
    Reject,
    /// Evict the oldest record and accept the new one
    DropOldest,
}

/// Submission rejected because the buffer is at capacity under `Reject`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferFull;

impl std::fmt::Display for BufferFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("buffer at capacity")
    }
}

impl std::error::Error for BufferFull {}

/// Append-only bounded queue for one signal kind. Callers hold the
/// surrounding lock; nothing in here blocks or touches the network.
#[derive(Debug)]
pub struct SignalBuffer {
    records: VecDeque<Record>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl SignalBuffer {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            policy,
        }
    }

    /// Append a record. Under `DropOldest` the evicted head is returned so
    /// the caller can count the drop.
    pub fn push(&mut self, record: Record) -> Result<Option<Record>, BufferFull> {
        let evicted = if self.records.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::Reject => return Err(BufferFull),
                OverflowPolicy::DropOldest => self.records.pop_front(),
            }
        } else {
            None
        };
        self.records.push_back(record);
        Ok(evicted)
    }

    /// Atomically remove and return up to `max` records in submission
    /// order. Anything beyond `max` stays for a subsequent drain.
    pub fn drain(&mut self, max: usize) -> Vec<Record> {
        let n = self.records.len().min(max);
        self.records.drain(..n).collect()
    }

    /// Remove everything, without preserving it. Used when draining past a
    /// shutdown deadline, where the records are counted as dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.records.len();
        self.records.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LogRecord, Severity};

    fn log(message: &str) -> Record {
        Record::from(LogRecord::new(Severity::Info, message))
    }

    fn message(record: &Record) -> &str {
        match record {
            Record::Log(l) => &l.message,
            _ => panic!("expected log record"),
        }
    }

    #[test]
    fn drain_returns_records_in_submission_order() {
        let mut buffer = SignalBuffer::new(8, OverflowPolicy::Reject);
        for name in ["a", "b", "c"] {
            buffer.push(log(name)).unwrap();
        }

        let drained = buffer.drain(8);
        let names: Vec<_> = drained.iter().map(message).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn reject_policy_fails_at_capacity_without_altering_contents() {
        let mut buffer = SignalBuffer::new(3, OverflowPolicy::Reject);
        for name in ["a", "b", "c"] {
            assert_eq!(buffer.push(log(name)), Ok(None));
        }

        assert_eq!(buffer.push(log("d")), Err(BufferFull));
        assert_eq!(buffer.len(), 3);

        let names: Vec<_> = buffer.drain(16);
        let names: Vec<_> = names.iter().map(message).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn drop_oldest_policy_evicts_the_head() {
        let mut buffer = SignalBuffer::new(3, OverflowPolicy::DropOldest);
        for name in ["a", "b", "c"] {
            buffer.push(log(name)).unwrap();
        }

        let evicted = buffer.push(log("d")).unwrap();
        assert_eq!(evicted.as_ref().map(message), Some("a"));

        let names: Vec<_> = buffer.drain(16);
        let names: Vec<_> = names.iter().map(message).collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn drain_is_capped_and_leaves_the_remainder() {
        let mut buffer = SignalBuffer::new(10, OverflowPolicy::Reject);
        for i in 0..5 {
            buffer.push(log(&i.to_string())).unwrap();
        }

        let first = buffer.drain(2);
        assert_eq!(first.len(), 2);
        assert_eq!(buffer.len(), 3);
        assert_eq!(message(&first[0]), "0");

        let rest = buffer.drain(100);
        assert_eq!(rest.len(), 3);
        assert_eq!(message(&rest[0]), "2");
    }

    #[test]
    fn drain_on_empty_buffer_returns_nothing() {
        let mut buffer = SignalBuffer::new(4, OverflowPolicy::Reject);
        assert!(buffer.drain(4).is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut buffer = SignalBuffer::new(0, OverflowPolicy::Reject);
        assert_eq!(buffer.push(log("a")), Ok(None));
        assert_eq!(buffer.push(log("b")), Err(BufferFull));
    }
}
