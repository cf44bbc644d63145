use std::cell::Cell;
use std::time::Instant;

use super::*;
use crate::condition::Condition;
use crate::{EventLoop, EventLoopConfig};

fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let count = Rc::new(Cell::new(0));
    (count.clone(), count)
}

#[test]
fn test_arm_fires_once() {
    let event_loop = EventLoop::bare(EventLoopConfig::default()).unwrap();
    let gate = Condition::new(&event_loop);
    let (count, hits) = counter();

    Trigger::arm(&event_loop, "once", &[gate.id()], move || {
        hits.set(hits.get() + 1);
        Ok(())
    });
    assert_eq!(Trigger::pending(&event_loop), 1);

    event_loop.run_once().unwrap();
    assert_eq!(count.get(), 0);

    gate.fire();
    event_loop.run_once().unwrap();
    event_loop.run_once().unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(Trigger::pending(&event_loop), 0);
    assert_eq!(event_loop.action_count(), 0);
}

#[test]
fn test_perform_runs_on_next_tick() {
    let event_loop = EventLoop::bare(EventLoopConfig::default()).unwrap();
    let (count, hits) = counter();

    Trigger::perform(&event_loop, "soon", move || {
        hits.set(hits.get() + 1);
        Ok(())
    });
    assert_eq!(count.get(), 0);

    event_loop.run_once().unwrap();
    event_loop.run_once().unwrap();
    assert_eq!(count.get(), 1);
}

#[test]
fn test_trigger_can_arm_another() {
    let event_loop = EventLoop::bare(EventLoopConfig::default()).unwrap();
    let (count, hits) = counter();
    let handle = event_loop.handle();

    Trigger::perform(&event_loop, "first", move || {
        hits.set(hits.get() + 1);
        let hits = hits.clone();
        Trigger::perform(&handle, "second", move || {
            hits.set(hits.get() + 10);
            Ok(())
        });
        Ok(())
    });

    event_loop.run_once().unwrap();
    assert_eq!(count.get(), 11);
    assert_eq!(Trigger::pending(&event_loop), 0);
}

#[test]
fn test_dead_trigger_is_dropped() {
    let event_loop = EventLoop::bare(EventLoopConfig::default()).unwrap();
    let gate = Condition::new(&event_loop);
    let (count, hits) = counter();

    Trigger::arm(&event_loop, "orphan", &[gate.id()], move || {
        hits.set(hits.get() + 1);
        Ok(())
    });
    drop(gate);

    event_loop.run_once().unwrap();
    assert_eq!(Trigger::pending(&event_loop), 0);
    assert_eq!(count.get(), 0);
}

#[test]
fn test_error_propagates() {
    let event_loop = EventLoop::bare(EventLoopConfig::default()).unwrap();
    Trigger::perform(&event_loop, "fail", || Err(crate::EventError::FifoEmpty));

    assert!(event_loop.run_once().is_err());
    assert_eq!(Trigger::pending(&event_loop), 0);
    event_loop.run_once().unwrap();
}

#[test]
fn test_perform_in_waits_for_delay() {
    let event_loop = EventLoop::new(EventLoopConfig {
        handle_termination_signals: false,
        ..Default::default()
    })
    .unwrap();
    let (count, hits) = counter();
    let start = Instant::now();

    Trigger::perform_in(&event_loop, "later", Duration::from_millis(20), move || {
        hits.set(hits.get() + 1);
        Ok(())
    })
    .unwrap();
    assert_eq!(event_loop.timers().pending(), 1);

    while count.get() == 0 && start.elapsed() < Duration::from_secs(2) {
        event_loop.run_once().unwrap();
    }
    assert_eq!(count.get(), 1);
    assert!(start.elapsed() >= Duration::from_millis(20));
    assert_eq!(Trigger::pending(&event_loop), 0);
    assert_eq!(event_loop.timers().pending(), 0);
}
