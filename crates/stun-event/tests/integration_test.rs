//! End-to-end tests of the event loop with its built-in managers.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::rc::Rc;
use std::time::{Duration, Instant};

use nix::unistd::pipe;

use stun_event::{
    Action, Condition, EventError, EventLoop, EventLoopConfig, Fifo, Promise, Timer, Trigger,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn quiet_loop() -> EventLoop {
    EventLoop::new(EventLoopConfig {
        handle_termination_signals: false,
        ..Default::default()
    })
    .unwrap()
}

fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let count = Rc::new(Cell::new(0));
    (count.clone(), count)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_base_condition_gates_action() {
    let event_loop = quiet_loop();
    let c = Rc::new(Condition::new(&event_loop));
    let (count, hits) = counter();
    let gate = c.clone();
    let action = Action::with_callback(&event_loop, "gated", &[c.id()], move || {
        hits.set(hits.get() + 1);
        gate.arm();
        Ok(())
    });

    assert!(!action.can_invoke());
    c.fire();
    assert!(action.can_invoke());

    event_loop.run_once().unwrap();
    assert_eq!(count.get(), 1);
    assert!(!c.eval());

    for _ in 0..3 {
        event_loop.run_once().unwrap();
    }
    assert_eq!(count.get(), 1);
}

#[test]
fn test_fifo_capacity_one() {
    let event_loop = quiet_loop();
    let mut fifo = Fifo::new(&event_loop, 1);

    fifo.push(7u32).unwrap();
    assert!(!event_loop.eval(fifo.can_push()));
    assert!(event_loop.eval(fifo.can_pop()));

    assert_eq!(fifo.pop().unwrap(), 7);
    assert!(fifo.is_empty());
    assert!(event_loop.eval(fifo.can_push()));
    assert!(!event_loop.eval(fifo.can_pop()));
    assert!(matches!(fifo.pop(), Err(EventError::FifoEmpty)));
}

#[test]
fn test_pipe_readiness() {
    let event_loop = quiet_loop();
    let io = event_loop.io();
    let (reader, writer) = pipe().unwrap();
    let mut writer = File::from(writer);
    let readable = io.can_read(reader.as_raw_fd()).unwrap();

    let (count, hits) = counter();
    let _action = Action::with_callback(&event_loop, "reader", &[readable], move || {
        hits.set(hits.get() + 1);
        Ok(())
    });

    event_loop.run_once().unwrap();
    assert_eq!(count.get(), 0);
    assert!(!event_loop.eval(readable));

    writer.write_all(b"hello").unwrap();
    event_loop.run_once().unwrap();
    assert_eq!(count.get(), 1);

    io.release(reader.as_raw_fd());
    drop(reader);
}

#[test]
fn test_timer_deadline() {
    let event_loop = quiet_loop();
    let d = Rc::new(Condition::new(&event_loop));
    let start = Instant::now();
    event_loop
        .timers()
        .set_timeout(start + Duration::from_millis(50), d.id())
        .unwrap();

    while !d.eval() {
        assert!(start.elapsed() < Duration::from_secs(2), "timer never fired");
        event_loop.run_once().unwrap();
    }
    assert!(start.elapsed() >= Duration::from_millis(50));

    let (count, hits) = counter();
    let rearm = d.clone();
    let _action = Action::with_callback(&event_loop, "on-timeout", &[d.id()], move || {
        hits.set(hits.get() + 1);
        rearm.arm();
        Ok(())
    });
    for _ in 0..5 {
        event_loop.run_once().unwrap();
    }
    assert_eq!(count.get(), 1);
    assert!(!d.eval());
}

#[test]
fn test_promise_value() {
    let event_loop = quiet_loop();
    let mut promise = Promise::new(&event_loop);

    promise.fulfill(42).unwrap();
    assert!(event_loop.eval(promise.is_ready()));
    assert_eq!(promise.consume().unwrap(), 42);
    assert!(!event_loop.eval(promise.is_ready()));
    assert!(matches!(promise.consume(), Err(EventError::PromiseNotReady)));
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn test_producer_consumer_backpressure() {
    let event_loop = quiet_loop();
    let fifo = Rc::new(RefCell::new(Fifo::new(&event_loop, 2)));
    let (can_push, can_pop) = {
        let fifo = fifo.borrow();
        (fifo.can_push(), fifo.can_pop())
    };

    let next = Rc::new(Cell::new(0u32));
    let producer_fifo = fifo.clone();
    let produced = next.clone();
    let _producer = Action::with_callback(&event_loop, "producer", &[can_push], move || {
        if produced.get() < 10 {
            producer_fifo.borrow_mut().push(produced.get())?;
            produced.set(produced.get() + 1);
        }
        Ok(())
    });

    let received = Rc::new(RefCell::new(Vec::new()));
    let consumer_fifo = fifo.clone();
    let sink = received.clone();
    let _consumer = Action::with_callback(&event_loop, "consumer", &[can_pop], move || {
        let value = consumer_fifo.borrow_mut().pop()?;
        sink.borrow_mut().push(value);
        if value == 9 {
            return Err(EventError::NormalTermination);
        }
        Ok(())
    });

    event_loop.run().unwrap();
    assert_eq!(*received.borrow(), (0..10).collect::<Vec<_>>());
    assert!(fifo.borrow().len() <= fifo.borrow().capacity());
}

#[test]
fn test_promise_between_actions() {
    let event_loop = quiet_loop();
    let promise = Rc::new(RefCell::new(Promise::new(&event_loop)));
    let is_ready = promise.borrow().is_ready();

    let producer = promise.clone();
    Trigger::perform(&event_loop, "fulfill", move || {
        producer.borrow_mut().fulfill("answer".to_string())
    });

    let got = Rc::new(RefCell::new(None));
    let slot = got.clone();
    let consumer = promise.clone();
    Trigger::arm(&event_loop, "consume", &[is_ready], move || {
        *slot.borrow_mut() = Some(consumer.borrow_mut().consume()?);
        Ok(())
    });

    event_loop.run_once().unwrap();
    assert_eq!(got.borrow().as_deref(), Some("answer"));
    assert_eq!(Trigger::pending(&event_loop), 0);
}

#[test]
fn test_periodic_timer_with_extend() {
    let event_loop = quiet_loop();
    let timer = Rc::new(Timer::with_timeout(&event_loop, Duration::from_millis(5)).unwrap());
    let first_target = timer.target().unwrap();

    let (count, hits) = counter();
    let periodic = timer.clone();
    let _tick = Action::with_callback(&event_loop, "periodic", &[timer.did_fire()], move || {
        hits.set(hits.get() + 1);
        if hits.get() == 3 {
            periodic.cancel();
            return Err(EventError::NormalTermination);
        }
        periodic.extend(Duration::from_millis(5))
    });

    let start = Instant::now();
    event_loop.run().unwrap();
    assert_eq!(count.get(), 3);
    assert!(Instant::now() >= first_target + Duration::from_millis(10));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(timer.target().is_none());
}

#[test]
fn test_reader_drains_pipe() {
    let event_loop = quiet_loop();
    let io = event_loop.io();
    let (reader, writer) = pipe().unwrap();
    let fd = reader.as_raw_fd();
    let readable = io.can_read(fd).unwrap();

    let collected = Rc::new(RefCell::new(Vec::new()));
    let sink = collected.clone();
    let mut source = File::from(reader);
    let _reader = Action::with_callback(&event_loop, "drain", &[readable], move || {
        let mut buf = [0u8; 64];
        let n = source.read(&mut buf)?;
        sink.borrow_mut().extend_from_slice(&buf[..n]);
        Ok(())
    });

    let mut writer = File::from(writer);
    writer.write_all(b"abc").unwrap();
    writer.write_all(b"def").unwrap();

    let start = Instant::now();
    while collected.borrow().len() < 6 && start.elapsed() < Duration::from_secs(2) {
        event_loop.run_once().unwrap();
    }
    assert_eq!(collected.borrow().as_slice(), b"abcdef");
    assert_eq!(io.release(fd), 1);
}
