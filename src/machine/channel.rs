//! Unbounded FIFO channels between a machine and the outside world.

use crate::machine::memory::Word;
use serde::{Serialize, Deserialize};
use std::collections::VecDeque;

/// An unbounded first-in first-out queue of words.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    queue: VecDeque<Word>,
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value at the back.
    pub fn push(&mut self, value: Word) {
        self.queue.push_back(value);
    }

    /// Remove the value at the front.
    pub fn pop(&mut self) -> Option<Word> {
        self.queue.pop_front()
    }

    /// Look at the value at the front without removing it.
    pub fn peek(&self) -> Option<Word> {
        self.queue.front().copied()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Remove every queued value, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Word> + '_ {
        self.queue.drain(..)
    }

    /// Queued values, oldest first, without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &Word> {
        self.queue.iter()
    }
}

impl Extend<Word> for Channel {
    fn extend<I: IntoIterator<Item = Word>>(&mut self, iter: I) {
        self.queue.extend(iter);
    }
}

impl FromIterator<Word> for Channel {
    fn from_iter<I: IntoIterator<Item = Word>>(iter: I) -> Self {
        Self { queue: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut chan = Channel::new();
        chan.push(1);
        chan.push(2);
        chan.extend([3, 4]);

        assert_eq!(chan.len(), 4);
        assert_eq!(chan.peek(), Some(1));
        assert_eq!(chan.pop(), Some(1));
        assert_eq!(chan.drain().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert!(chan.is_empty());
        assert_eq!(chan.pop(), None);
    }
}
