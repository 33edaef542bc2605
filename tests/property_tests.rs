//! Property-based tests for rust_logger_hierarchy using proptest

use proptest::prelude::*;
use rust_logger_hierarchy::core::{BoundedQueue, LogEvent, LogLevel, Repository};
use std::collections::VecDeque;

fn any_event_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
        Just(LogLevel::Fatal),
    ]
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Test that LogLevel string conversions roundtrip correctly
    #[test]
    fn test_log_level_str_roundtrip(level in any_event_level()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
    }

    /// Test that LogLevel ordering matches severity
    #[test]
    fn test_log_level_ordering(level1 in any_event_level(), level2 in any_event_level()) {
        let val1 = level1 as u8;
        let val2 = level2 as u8;

        prop_assert_eq!(level1 <= level2, val1 <= val2);
        prop_assert_eq!(level1.is_at_least(level2), val1 >= val2);
        prop_assert!(!LogLevel::Off.is_at_least(level1));
    }

    /// Test that parsing accepts any letter case
    #[test]
    fn test_log_level_case_insensitive(level in any_event_level(), mask in any::<u8>()) {
        let mixed: String = level
            .to_str()
            .chars()
            .enumerate()
            .map(|(i, c)| if mask & (1 << (i % 8)) != 0 { c.to_ascii_lowercase() } else { c })
            .collect();
        prop_assert_eq!(mixed.parse::<LogLevel>(), Ok(level));
    }
}

// ============================================================================
// Hierarchy Tests
// ============================================================================

fn dotted_name() -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof![Just("a"), Just("b"), Just("c")], 1..5)
        .prop_map(|segments| segments.join("."))
}

fn parents(repo: &Repository) -> Vec<(String, String)> {
    repo.current_loggers()
        .iter()
        .map(|l| {
            let parent = l.parent().map(|p| p.name().to_string()).unwrap_or_default();
            (l.name().to_string(), parent)
        })
        .collect()
}

proptest! {
    /// Creating loggers in any order gives the same tree as creating them
    /// ancestors first
    #[test]
    fn test_creation_order_does_not_matter(names in prop::collection::vec(dotted_name(), 1..12)) {
        let shuffled = Repository::new();
        for name in &names {
            shuffled.get_logger(name);
        }

        let mut sorted_names = names.clone();
        sorted_names.sort_by_key(|n| n.matches('.').count());
        let ordered = Repository::new();
        for name in &sorted_names {
            ordered.get_logger(name);
        }

        prop_assert_eq!(parents(&shuffled), parents(&ordered));
    }

    /// Effective level is the nearest set level up the chain
    #[test]
    fn test_effective_level_is_nearest_ancestor(
        name in dotted_name(),
        depth in 0usize..5,
        level in any_event_level(),
    ) {
        let repo = Repository::new();
        let leaf = repo.get_logger(&name);
        let segments: Vec<&str> = name.split('.').collect();
        let cut = depth.min(segments.len());

        if cut == 0 {
            repo.root_logger().set_level(Some(level));
        } else {
            repo.get_logger(&segments[..cut].join(".")).set_level(Some(level));
        }
        prop_assert_eq!(leaf.effective_level(), level);
    }
}

// ============================================================================
// BoundedQueue Tests
// ============================================================================

#[derive(Debug, Clone)]
enum QueueOp {
    Push(u32),
    Pop,
    Resize(usize),
}

fn queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        4 => any::<u32>().prop_map(QueueOp::Push),
        3 => Just(QueueOp::Pop),
        1 => (1usize..8).prop_map(QueueOp::Resize),
    ]
}

proptest! {
    /// The ring buffer behaves like a capped VecDeque that drops the oldest
    /// entries when shrunk
    #[test]
    fn test_bounded_queue_matches_model(
        capacity in 1usize..8,
        ops in prop::collection::vec(queue_op(), 0..64),
    ) {
        let mut queue = BoundedQueue::new(capacity);
        let mut model: VecDeque<u32> = VecDeque::new();
        let mut model_capacity = capacity;

        for op in ops {
            match op {
                QueueOp::Push(value) => {
                    let result = queue.push(value);
                    if model.len() < model_capacity {
                        prop_assert!(result.is_ok());
                        model.push_back(value);
                    } else {
                        prop_assert_eq!(result, Err(value));
                    }
                }
                QueueOp::Pop => {
                    prop_assert_eq!(queue.pop(), model.pop_front());
                }
                QueueOp::Resize(new_capacity) => {
                    let dropped = queue.resize(new_capacity);
                    let excess = model.len().saturating_sub(new_capacity);
                    let expected: Vec<u32> = model.drain(..excess).collect();
                    prop_assert_eq!(dropped, expected);
                    model_capacity = new_capacity;
                }
            }
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.capacity(), model_capacity);
        }
        prop_assert_eq!(queue.drain(), model.into_iter().collect::<Vec<_>>());
    }
}

// ============================================================================
// Event Tests
// ============================================================================

proptest! {
    /// Messages never contain raw line breaks or tabs
    #[test]
    fn test_message_is_single_line(message in ".*") {
        let event = LogEvent::new("prop", LogLevel::Info, &message);
        prop_assert!(!event.message.contains('\n'));
        prop_assert!(!event.message.contains('\r'));
        prop_assert!(!event.message.contains('\t'));
    }

    /// Messages without control characters are kept as is
    #[test]
    fn test_plain_message_unchanged(message in "[a-zA-Z0-9 .,:;!?-]{0,64}") {
        let event = LogEvent::new("prop", LogLevel::Info, &message);
        prop_assert_eq!(event.message, message);
    }
}
