//! Deferred wakeups: the engine asks to sleep, the host runs a timer, the timer
//! comes back as an activation with no socket.

use std::fmt;

use crate::host::Host;

const MILLIS_PER_SECOND: u64 = 1000;

/// Generation number of one configured session. Fresh on every successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn first() -> Self {
        SessionId(1)
    }

    pub(crate) fn next(self) -> Self {
        SessionId(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Opaque timer payload. The host stores it and returns it untouched when the timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Wakeup {
    session: SessionId,
}

impl Wakeup {
    pub(crate) fn for_session(session: SessionId) -> Self {
        Self { session }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }
}

/// Convert an engine sleep request into a host timer registration.
pub(crate) fn request_sleep<H: Host + ?Sized>(host: &H, session: SessionId, seconds: u32) {
    let delay_ms = u64::from(seconds) * MILLIS_PER_SECOND;
    host.schedule_wakeup(Wakeup::for_session(session), delay_ms);
}
