//! Byte relay between two descriptors.
//!
//! Chunks read from the input are queued in a bounded [`Fifo`] and written
//! to the output as it becomes writable. A full queue stops the reader, so a
//! slow consumer throttles the producer without any blocking call.
//!
//! ```text
//!  input ──(readable ∧ can_push ∧ open)──► Fifo ──(can_pop ∧ idle)──► outbox
//!  outbox ──(writable ∧ staged)──► output
//! ```

use std::cell::{Cell, RefCell};
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;

use stun_config::RelayConfig;
use stun_event::{
    Action, ComputedCondition, Condition, EventError, EventResult, Fifo, LoopHandle, SignalKind,
    SignalSubscription, Timer,
};
use tracing::{debug, info};

/// Byte counters of a relay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RelayStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

#[derive(Default)]
struct Counters {
    bytes_in: Cell<u64>,
    bytes_out: Cell<u64>,
}

struct Outbox {
    chunk: Vec<u8>,
    offset: usize,
}

/// A running relay. The loop must be run for data to move.
pub(crate) struct Relay {
    handle: LoopHandle,
    input: RawFd,
    output: RawFd,
    saved_flags: Vec<(RawFd, libc::c_int)>,
    counters: Rc<Counters>,
    _actions: Vec<Action>,
    _conditions: Vec<Rc<Condition>>,
    _queue_empty: ComputedCondition,
    _subscriptions: Vec<SignalSubscription>,
    _heartbeat: Option<Rc<Timer>>,
}

impl Relay {
    /// Wire the relay into the loop behind `handle`.
    ///
    /// Both descriptors are switched to non-blocking mode until the relay
    /// is finished.
    pub(crate) fn start(
        handle: &LoopHandle,
        input: RawFd,
        output: RawFd,
        config: &RelayConfig,
    ) -> EventResult<Self> {
        let saved_flags = vec![
            (input, set_nonblocking(input)?),
            (output, set_nonblocking(output)?),
        ];

        let io = handle.io();
        let readable = io.can_read(input)?;
        let writable = io.can_write(output)?;

        let fifo = Rc::new(RefCell::new(Fifo::<Vec<u8>>::new(handle, config.queue_capacity)));
        let (can_push, can_pop) = {
            let fifo = fifo.borrow();
            (fifo.can_push(), fifo.can_pop())
        };

        let input_open = Rc::new(Condition::new(handle));
        input_open.fire();
        let input_closed = Rc::new(Condition::new(handle));
        let outbox_idle = Rc::new(Condition::new(handle));
        outbox_idle.fire();
        let staged = Rc::new(Condition::new(handle));
        let done = Rc::new(Condition::new(handle));

        let counters = Rc::new(Counters::default());
        let outbox = Rc::new(RefCell::new(Outbox {
            chunk: Vec::new(),
            offset: 0,
        }));
        let mut actions = Vec::new();

        let chunk_size = config.chunk_size;
        let (queue, open, closed, stats) = (
            fifo.clone(),
            input_open.clone(),
            input_closed.clone(),
            counters.clone(),
        );
        actions.push(Action::with_callback(
            handle,
            "relay-read",
            &[readable, can_push, input_open.id()],
            move || {
                let mut buf = vec![0; chunk_size];
                match read_fd(input, &mut buf)? {
                    None => {}
                    Some(0) => {
                        debug!(fd = input, "Relay input closed");
                        open.arm();
                        closed.fire();
                    }
                    Some(n) => {
                        buf.truncate(n);
                        stats.bytes_in.set(stats.bytes_in.get() + n as u64);
                        queue.borrow_mut().push(buf)?;
                    }
                }
                Ok(())
            },
        ));

        let (queue, idle, ready, out) = (
            fifo.clone(),
            outbox_idle.clone(),
            staged.clone(),
            outbox.clone(),
        );
        actions.push(Action::with_callback(
            handle,
            "relay-stage",
            &[can_pop, outbox_idle.id()],
            move || {
                let chunk = queue.borrow_mut().pop()?;
                *out.borrow_mut() = Outbox { chunk, offset: 0 };
                idle.arm();
                ready.fire();
                Ok(())
            },
        ));

        let (idle, ready, out, stats) = (
            outbox_idle.clone(),
            staged.clone(),
            outbox.clone(),
            counters.clone(),
        );
        actions.push(Action::with_callback(
            handle,
            "relay-write",
            &[writable, staged.id()],
            move || {
                let mut out = out.borrow_mut();
                let Some(n) = write_fd(output, &out.chunk[out.offset..])? else {
                    return Ok(());
                };
                out.offset += n;
                stats.bytes_out.set(stats.bytes_out.get() + n as u64);
                if out.offset == out.chunk.len() {
                    out.chunk.clear();
                    out.offset = 0;
                    ready.arm();
                    idle.fire();
                }
                Ok(())
            },
        ));

        let queue = fifo.clone();
        let queue_empty = ComputedCondition::new(handle, move || queue.borrow().is_empty());

        // Drained: input at EOF, nothing staged, nothing queued.
        let finished = done.clone();
        actions.push(Action::with_callback(
            handle,
            "relay-drained",
            &[input_closed.id(), outbox_idle.id(), queue_empty.id()],
            move || {
                finished.fire();
                Err(EventError::NormalTermination)
            },
        ));

        let signals = handle.signals();
        let mut subscriptions = Vec::new();
        for kind in SignalKind::ALL {
            let subscription = signals.subscribe(kind, done.id())?;
            let (queue, stats, finished) = (fifo.clone(), counters.clone(), done.clone());
            actions.push(Action::with_callback(
                handle,
                "relay-shutdown",
                &[subscription.fired()],
                move || {
                    info!(
                        signal = %kind,
                        bytes_in = stats.bytes_in.get(),
                        bytes_out = stats.bytes_out.get(),
                        dropped_chunks = queue.borrow().len(),
                        "Relay shutting down"
                    );
                    finished.fire();
                    Ok(())
                },
            ));
            subscriptions.push(subscription);
        }

        let heartbeat = match config.heartbeat_interval() {
            Some(interval) => {
                let timer = Rc::new(Timer::with_timeout(handle, interval)?);
                let (periodic, queue, stats) = (timer.clone(), fifo.clone(), counters.clone());
                actions.push(Action::with_callback(
                    handle,
                    "relay-heartbeat",
                    &[timer.did_fire()],
                    move || {
                        info!(
                            bytes_in = stats.bytes_in.get(),
                            bytes_out = stats.bytes_out.get(),
                            queued = queue.borrow().len(),
                            "Relay heartbeat"
                        );
                        periodic.extend(interval)
                    },
                ));
                Some(timer)
            }
            None => None,
        };

        debug!(input, output, capacity = config.queue_capacity, "Relay started");

        Ok(Self {
            handle: handle.clone(),
            input,
            output,
            saved_flags,
            counters,
            _actions: actions,
            _conditions: vec![input_open, input_closed, outbox_idle, staged, done],
            _queue_empty: queue_empty,
            _subscriptions: subscriptions,
            _heartbeat: heartbeat,
        })
    }

    pub(crate) fn stats(&self) -> RelayStats {
        RelayStats {
            bytes_in: self.counters.bytes_in.get(),
            bytes_out: self.counters.bytes_out.get(),
        }
    }

    /// Final byte counts. Dropping the relay then unregisters the
    /// descriptors and restores their flags.
    pub(crate) fn finish(self) -> RelayStats {
        self.stats()
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        let io = self.handle.io();
        io.release(self.input);
        io.release(self.output);
        for &(fd, flags) in &self.saved_flags {
            // SAFETY: plain fcntl on a descriptor the caller keeps open.
            unsafe {
                libc::fcntl(fd, libc::F_SETFL, flags);
            }
        }
    }
}

/// Switch `fd` to non-blocking mode, returning the previous flags.
fn set_nonblocking(fd: RawFd) -> io::Result<libc::c_int> {
    // SAFETY: fcntl only reads and writes the descriptor's status flags.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags)
}

/// `Ok(None)` when the descriptor was not ready after all.
fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<Option<usize>> {
    // SAFETY: buf is valid for writes of buf.len() bytes.
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    settle(n)
}

fn write_fd(fd: RawFd, buf: &[u8]) -> io::Result<Option<usize>> {
    // SAFETY: buf is valid for reads of buf.len() bytes.
    let n = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
    settle(n)
}

fn settle(n: isize) -> io::Result<Option<usize>> {
    if n >= 0 {
        return Ok(Some(n as usize));
    }
    let err = io::Error::last_os_error();
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
        _ => Err(err),
    }
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
