//! Discrete-event substrate: a virtual clock, an ordered event queue, and the
//! `Host` the filetransfer node talks to.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::net::Ipv4Addr;
use std::rc::Rc;

use filetransfer_core::{host, Descriptor, Host, LogLevel, ResolveError, Wakeup};

/// Something the simulator will deliver to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Readable(Descriptor),
    Wakeup(Wakeup),
}

#[derive(Debug)]
struct Scheduled {
    at_ms: u64,
    seq: u64,
    event: SimEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        (self.at_ms, self.seq) == (other.at_ms, other.seq)
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed: BinaryHeap is a max-heap, we want the earliest event first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at_ms, other.seq).cmp(&(self.at_ms, self.seq))
    }
}

/// Events ordered by due time, then by insertion order.
#[derive(Debug, Default)]
pub struct EventQueue {
    now_ms: u64,
    seq: u64,
    pending: BinaryHeap<Scheduled>,
}

pub type SharedQueue = Rc<RefCell<EventQueue>>;

impl EventQueue {
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn schedule(&mut self, delay_ms: u64, event: SimEvent) {
        let at_ms = self.now_ms.saturating_add(delay_ms);
        self.seq += 1;
        self.pending.push(Scheduled {
            at_ms,
            seq: self.seq,
            event,
        });
    }

    /// Next event due no later than `limit_ms`, advancing the clock to it.
    /// When nothing is left before the limit the clock stops at the last event.
    pub fn pop_until(&mut self, limit_ms: u64) -> Option<SimEvent> {
        if self.pending.peek()?.at_ms > limit_ms {
            return None;
        }
        let next = self.pending.pop()?;
        self.now_ms = next.at_ms;
        Some(next.event)
    }

    /// Forget readiness still pending on `sd`.
    pub fn cancel_readable(&mut self, sd: Descriptor) {
        self.pending
            .retain(|s| s.event != SimEvent::Readable(sd));
    }
}

/// Simulated sockets: descriptor allocation and readiness after a fixed latency.
#[derive(Debug)]
pub struct SimNet {
    queue: SharedQueue,
    next_sd: Cell<Descriptor>,
    latency_ms: u64,
}

/// Descriptors below this stay free, as a real process would have stdio there.
const FIRST_SOCKET: Descriptor = 3;

/// Socket readiness is never same-instant, so the clock always moves.
pub const MIN_DELAY_MS: u64 = 1;

impl SimNet {
    pub fn new(queue: SharedQueue, latency_ms: u64) -> Self {
        Self {
            queue,
            next_sd: Cell::new(FIRST_SOCKET),
            latency_ms: latency_ms.max(MIN_DELAY_MS),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.queue.borrow().now_ms()
    }

    pub fn open(&self) -> Descriptor {
        let sd = self.next_sd.get();
        self.next_sd.set(sd + 1);
        sd
    }

    /// Peer answers after one network latency.
    pub fn respond(&self, sd: Descriptor) {
        self.ready_after(sd, self.latency_ms);
    }

    pub fn ready_after(&self, sd: Descriptor, delay_ms: u64) {
        self.queue
            .borrow_mut()
            .schedule(delay_ms.max(MIN_DELAY_MS), SimEvent::Readable(sd));
    }

    pub fn close(&self, sd: Descriptor) {
        self.queue.borrow_mut().cancel_readable(sd);
    }
}

/// Host services backed by the event queue, a static name table, and `tracing`.
pub struct SimHost {
    queue: SharedQueue,
    names: HashMap<String, Ipv4Addr>,
}

impl SimHost {
    pub fn new(queue: SharedQueue, names: HashMap<String, Ipv4Addr>) -> Self {
        let names = names
            .into_iter()
            .map(|(name, addr)| (name.to_ascii_lowercase(), addr))
            .collect();
        Self { queue, names }
    }
}

impl Host for SimHost {
    fn log(&self, level: LogLevel, label: &str, message: &str) {
        let now = self.queue.borrow().now_ms();
        let _span = tracing::info_span!("sim", ms = now).entered();
        host::emit_tracing(level, label, message);
    }

    fn resolve_hostname(&self, name: &str) -> Result<Ipv4Addr, ResolveError> {
        self.names
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| ResolveError::UnknownHost(name.to_string()))
    }

    fn schedule_wakeup(&self, wakeup: Wakeup, delay_ms: u64) {
        self.queue
            .borrow_mut()
            .schedule(delay_ms, SimEvent::Wakeup(wakeup));
    }
}
