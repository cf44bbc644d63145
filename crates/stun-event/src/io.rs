//! Descriptor readiness conditions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::os::fd::RawFd;
use std::ptr;
use std::rc::Weak;
use std::time::Duration;

use nix::errno::Errno;
use tracing::{debug, trace};

use crate::condition::{Condition, ConditionKind};
use crate::error::{EventError, EventResult};
use crate::handle::{LoopCore, LoopHandle};
use crate::manager::{ConditionManager, PrepareContext};
use crate::registry::ConditionId;

#[cfg(target_os = "linux")]
const READ_MASK: libc::c_short = libc::POLLIN | libc::POLLPRI | libc::POLLRDHUP | libc::POLLHUP;
#[cfg(not(target_os = "linux"))]
const READ_MASK: libc::c_short = libc::POLLIN | libc::POLLPRI | libc::POLLHUP;

const WRITE_MASK: libc::c_short = libc::POLLOUT;

/// Direction of a readiness condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    Read,
    Write,
}

impl Interest {
    fn mask(self) -> libc::c_short {
        match self {
            Interest::Read => READ_MASK,
            Interest::Write => WRITE_MASK,
        }
    }
}

#[derive(Default)]
struct IoState {
    by_key: HashMap<(RawFd, Interest), Condition>,
    by_condition: HashMap<ConditionId, (RawFd, Interest)>,
}

/// Manager of `Io` conditions, one per (descriptor, direction).
///
/// A descriptor's conditions must be [released](Self::release) before the
/// descriptor is closed; polling a closed descriptor is reported as
/// [`EventError::InvalidDescriptor`].
pub struct IoConditionManager {
    core: Weak<LoopCore>,
    state: RefCell<IoState>,
}

impl IoConditionManager {
    pub(crate) fn new(core: Weak<LoopCore>) -> Self {
        Self {
            core,
            state: RefCell::new(IoState::default()),
        }
    }

    /// Condition that holds for one tick whenever `fd` is readable.
    pub fn can_read(&self, fd: RawFd) -> EventResult<ConditionId> {
        self.condition(fd, Interest::Read)
    }

    /// Condition that holds for one tick whenever `fd` is writable.
    pub fn can_write(&self, fd: RawFd) -> EventResult<ConditionId> {
        self.condition(fd, Interest::Write)
    }

    /// Condition for `fd` in one direction. Repeated requests return the
    /// same id.
    pub fn condition(&self, fd: RawFd, interest: Interest) -> EventResult<ConditionId> {
        if let Some(existing) = self.state.borrow().by_key.get(&(fd, interest)) {
            return Ok(existing.id());
        }

        let core = self.core.upgrade().ok_or(EventError::LoopGone)?;
        let condition = Condition::managed(&LoopHandle::from_core(core), ConditionKind::Io);
        let id = condition.id();

        let mut state = self.state.borrow_mut();
        state.by_key.insert((fd, interest), condition);
        state.by_condition.insert(id, (fd, interest));
        debug!(fd, ?interest, condition = %id, "I/O condition registered");
        Ok(id)
    }

    /// Retire both conditions of `fd`. Returns how many were registered.
    ///
    /// Must be called before closing the descriptor.
    pub fn release(&self, fd: RawFd) -> usize {
        // Retired on drop, after the state borrow ends.
        let removed: Vec<Condition> = {
            let mut state = self.state.borrow_mut();
            let removed: Vec<Condition> = [Interest::Read, Interest::Write]
                .into_iter()
                .filter_map(|interest| state.by_key.remove(&(fd, interest)))
                .collect();
            for condition in &removed {
                state.by_condition.remove(&condition.id());
            }
            removed
        };

        if !removed.is_empty() {
            debug!(fd, count = removed.len(), "I/O conditions released");
        }
        removed.len()
    }

    /// Whether `fd` has any registered condition.
    pub fn registered(&self, fd: RawFd) -> bool {
        let state = self.state.borrow();
        state.by_key.contains_key(&(fd, Interest::Read))
            || state.by_key.contains_key(&(fd, Interest::Write))
    }

    fn record_interrupted(&self) {
        if let Some(core) = self.core.upgrade() {
            core.metrics.record_interrupted_wait();
        }
        trace!("poll interrupted by a signal");
    }

    /// Sleep for `wait` without watching anything. Signals cut it short.
    fn idle(&self, wait: Duration) -> EventResult<()> {
        if wait.is_zero() {
            return Ok(());
        }

        let rc = unsafe { libc::poll(ptr::null_mut(), 0, timeout_ms(wait)) };
        if rc < 0 {
            match Errno::last() {
                Errno::EINTR => self.record_interrupted(),
                errno => return Err(EventError::Poll(errno)),
            }
        }
        Ok(())
    }
}

fn timeout_ms(wait: Duration) -> libc::c_int {
    wait.as_millis().min(libc::c_int::MAX as u128) as libc::c_int
}

impl ConditionManager for IoConditionManager {
    fn prepare_conditions(&self, cx: &PrepareContext<'_>) -> EventResult<()> {
        if cx.interesting.is_empty() {
            return self.idle(cx.wait);
        }

        let state = self.state.borrow();
        for condition in state.by_key.values() {
            condition.arm();
        }

        let watched: Vec<(RawFd, Interest, &Condition)> = cx
            .interesting
            .iter()
            .filter_map(|id| {
                let key = state.by_condition.get(id)?;
                let condition = state.by_key.get(key)?;
                Some((key.0, key.1, condition))
            })
            .collect();

        let mut polls: Vec<libc::pollfd> = watched
            .iter()
            .map(|(fd, interest, _)| libc::pollfd {
                fd: *fd,
                events: interest.mask(),
                revents: 0,
            })
            .collect();

        let rc = unsafe {
            libc::poll(
                polls.as_mut_ptr(),
                polls.len() as libc::nfds_t,
                timeout_ms(cx.wait),
            )
        };
        if rc < 0 {
            return match Errno::last() {
                Errno::EINTR => {
                    self.record_interrupted();
                    Ok(())
                }
                errno => Err(EventError::Poll(errno)),
            };
        }

        for (poll, (fd, interest, condition)) in polls.iter().zip(&watched) {
            if poll.revents & libc::POLLNVAL != 0 {
                return Err(EventError::InvalidDescriptor { fd: *fd });
            }
            if poll.revents & (interest.mask() | libc::POLLERR) != 0 {
                trace!(fd, ?interest, "ready");
                condition.fire();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "io_tests.rs"]
mod tests;
