//! Task prioritization.

use std::cmp::Ordering;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Priority level for submitted work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Normal, Self::High, Self::Critical];

    /// Urgent classes bypass the queue-size check and are served newest-first.
    pub fn is_urgent(self) -> bool {
        self >= Self::High
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Low,
            1 => Self::Normal,
            2 => Self::High,
            _ => Self::Critical,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint classes the request pipeline maps onto priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    Health,
    Metrics,
    Authentication,
    General,
    AiComputation,
}

impl From<EndpointClass> for Priority {
    fn from(class: EndpointClass) -> Self {
        match class {
            EndpointClass::Health | EndpointClass::Metrics => Self::Critical,
            EndpointClass::Authentication => Self::High,
            EndpointClass::General => Self::Normal,
            EndpointClass::AiComputation => Self::Low,
        }
    }
}

/// Item with associated priority for queue ordering.
#[derive(Debug)]
pub struct PrioritizedItem<T> {
    pub priority: Priority,
    pub sequence: u64,
    pub item: T,
}

impl<T> PrioritizedItem<T> {
    /// `Less` means `self` runs before `other`.
    fn run_order(&self, other: &Self) -> Ordering {
        match other.priority.cmp(&self.priority) {
            // Urgent work serves the freshest signal; the rest is FIFO.
            Ordering::Equal if self.priority.is_urgent() => other.sequence.cmp(&self.sequence),
            Ordering::Equal => self.sequence.cmp(&other.sequence),
            ord => ord,
        }
    }
}

/// Priority queue kept sorted in run order; the head runs next.
///
/// Sorted storage (rather than a heap) lets the scheduler pull out an
/// arbitrary entry when its wait deadline fires.
pub struct PriorityQueue<T> {
    items: VecDeque<PrioritizedItem<T>>,
    next_sequence: u64,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            next_sequence: 0,
        }
    }

    pub fn push(&mut self, item: T, priority: Priority) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let entry = PrioritizedItem { priority, sequence, item };
        let index = self
            .items
            .partition_point(|existing| existing.run_order(&entry) == Ordering::Less);
        self.items.insert(index, entry);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front().map(|p| p.item)
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.front().map(|p| &p.item)
    }

    /// Remove the first item matching `pred`, wherever it sits.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        let index = self.items.iter().position(|p| pred(&p.item))?;
        self.items.remove(index).map(|p| p.item)
    }

    pub fn find_mut(&mut self, mut pred: impl FnMut(&T) -> bool) -> Option<&mut T> {
        self.items.iter_mut().map(|p| &mut p.item).find(|item| pred(item))
    }

    /// Remove every item, head first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..).map(|p| p.item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|p| &p.item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_priority_descending() {
        let mut queue: PriorityQueue<&str> = PriorityQueue::new();
        queue.push("low", Priority::Low);
        queue.push("critical", Priority::Critical);
        queue.push("normal", Priority::Normal);
        queue.push("high", Priority::High);

        assert_eq!(queue.pop(), Some("critical"));
        assert_eq!(queue.pop(), Some("high"));
        assert_eq!(queue.pop(), Some("normal"));
        assert_eq!(queue.pop(), Some("low"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn fifo_within_normal_and_low() {
        let mut queue: PriorityQueue<&str> = PriorityQueue::new();
        queue.push("first", Priority::Normal);
        queue.push("second", Priority::Normal);
        queue.push("third", Priority::Normal);

        assert_eq!(queue.pop(), Some("first"));
        assert_eq!(queue.pop(), Some("second"));
        assert_eq!(queue.pop(), Some("third"));
    }

    #[test]
    fn lifo_within_urgent_classes() {
        let mut queue: PriorityQueue<&str> = PriorityQueue::new();
        queue.push("d", Priority::Critical);
        queue.push("e", Priority::Critical);
        queue.push("h1", Priority::High);
        queue.push("h2", Priority::High);

        assert_eq!(queue.pop(), Some("e"));
        assert_eq!(queue.pop(), Some("d"));
        assert_eq!(queue.pop(), Some("h2"));
        assert_eq!(queue.pop(), Some("h1"));
    }

    #[test]
    fn mixed_submission_order() {
        let mut queue: PriorityQueue<&str> = PriorityQueue::new();
        queue.push("a", Priority::Normal);
        queue.push("b", Priority::High);
        queue.push("c", Priority::Normal);

        let order: Vec<_> = queue.drain().collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_where_pulls_from_middle() {
        let mut queue: PriorityQueue<u32> = PriorityQueue::new();
        for n in 0..4 {
            queue.push(n, Priority::Low);
        }
        assert_eq!(queue.remove_where(|n| *n == 2), Some(2));
        assert_eq!(queue.remove_where(|n| *n == 9), None);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(queue.peek(), Some(&0));
    }

    #[test]
    fn endpoint_classes_map_to_priorities() {
        assert_eq!(Priority::from(EndpointClass::Health), Priority::Critical);
        assert_eq!(Priority::from(EndpointClass::Metrics), Priority::Critical);
        assert_eq!(Priority::from(EndpointClass::Authentication), Priority::High);
        assert_eq!(Priority::from(EndpointClass::General), Priority::Normal);
        assert_eq!(Priority::from(EndpointClass::AiComputation), Priority::Low);
    }

    #[test]
    fn from_u8_saturates_to_critical() {
        assert_eq!(Priority::from(0), Priority::Low);
        assert_eq!(Priority::from(2), Priority::High);
        assert_eq!(Priority::from(200), Priority::Critical);
    }
}
