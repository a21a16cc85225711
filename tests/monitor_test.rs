/*!
 * Token Monitor Tests
 * Single-slot hand-off between a network thread and the scheduler
 */

use actor_teleport::core::sync::TokenMonitor;
use actor_teleport::TeleportError;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_blocking_producer_non_blocking_consumer() {
    let monitor = Arc::new(TokenMonitor::new(8));
    let producer = {
        let monitor = Arc::clone(&monitor);
        thread::spawn(move || {
            for i in 0..100u64 {
                monitor.wait_until_empty_then_fill(&i.to_le_bytes()).unwrap();
            }
        })
    };

    let mut received = Vec::new();
    let mut buf = [0u8; 8];
    while received.len() < 100 {
        if monitor.try_drain(&mut buf) {
            received.push(u64::from_le_bytes(buf));
        } else {
            thread::yield_now();
        }
    }
    producer.join().unwrap();

    assert_eq!(received, (0..100).collect::<Vec<_>>());
    assert!(!monitor.is_full());
}

#[test]
fn test_non_blocking_producer_blocking_consumer() {
    let monitor = Arc::new(TokenMonitor::new(2));
    let consumer = {
        let monitor = Arc::clone(&monitor);
        thread::spawn(move || {
            let mut out = Vec::new();
            let mut token = [0u8; 2];
            for _ in 0..50 {
                monitor.wait_until_full_then_peek(&mut token).unwrap();
                out.push(token);
                monitor.release();
            }
            out
        })
    };

    let mut next = 0u16;
    while next < 50 {
        if monitor.try_fill(&next.to_be_bytes()) {
            next += 1;
        } else {
            thread::yield_now();
        }
    }

    let out = consumer.join().unwrap();
    let expected: Vec<[u8; 2]> = (0..50u16).map(|i| i.to_be_bytes()).collect();
    assert_eq!(out, expected);
}

#[test]
fn test_close_unblocks_both_sides() {
    let monitor = Arc::new(TokenMonitor::new(4));
    monitor.try_fill(&[1, 1, 1, 1]);

    // Slot is full: a producer blocks on it
    let producer = {
        let monitor = Arc::clone(&monitor);
        thread::spawn(move || monitor.wait_until_empty_then_fill(&[2, 2, 2, 2]))
    };
    thread::sleep(Duration::from_millis(20));
    monitor.close();

    assert_eq!(producer.join().unwrap(), Err(TeleportError::MonitorClosed));
    let mut out = [0u8; 4];
    assert_eq!(
        monitor.wait_until_full_then_drain(&mut out),
        Err(TeleportError::MonitorClosed)
    );

    // Non-blocking operations keep working on a closed monitor
    assert!(monitor.try_drain(&mut out));
    assert_eq!(out, [1, 1, 1, 1]);
}

#[test]
fn test_peek_keeps_slot_full_until_release() {
    let monitor = TokenMonitor::new(3);
    assert!(monitor.try_fill(&[7, 8, 9]));

    let mut out = [0u8; 3];
    monitor.wait_until_full_then_peek(&mut out).unwrap();
    assert_eq!(out, [7, 8, 9]);
    assert!(monitor.is_full());
    assert!(!monitor.try_fill(&[0, 0, 0]));

    monitor.release();
    assert!(monitor.try_fill(&[0, 0, 0]));
}

#[derive(Debug, Clone)]
enum Op {
    Fill(u8),
    Drain,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u8>().prop_map(Op::Fill), Just(Op::Drain)]
}

proptest! {
    #[test]
    fn prop_single_slot_model(ops in prop::collection::vec(op(), 0..64)) {
        let monitor = TokenMonitor::new(4);
        let mut model: Option<[u8; 4]> = None;

        for op in ops {
            match op {
                Op::Fill(b) => {
                    let token = [b; 4];
                    let accepted = monitor.try_fill(&token);
                    prop_assert_eq!(accepted, model.is_none());
                    if accepted {
                        model = Some(token);
                    }
                }
                Op::Drain => {
                    let mut out = [0u8; 4];
                    let drained = monitor.try_drain(&mut out);
                    prop_assert_eq!(drained, model.is_some());
                    if let Some(expected) = model.take() {
                        prop_assert_eq!(out, expected);
                    }
                }
            }
            prop_assert_eq!(monitor.is_full(), model.is_some());
        }
    }
}
