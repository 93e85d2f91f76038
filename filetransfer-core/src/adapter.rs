//! Host-service adaptation: translate engine log severities and hostnames into
//! host calls. Stateless apart from the session the services are bound to.

use std::net::Ipv4Addr;

use crate::engine::{EngineLogLevel, EngineServices};
use crate::host::{Host, LogLevel, ResolveError};
use crate::wakeup::{self, SessionId};

/// Returned for the "none" token (INADDR_NONE).
pub const NO_ADDRESS: Ipv4Addr = Ipv4Addr::BROADCAST;

impl From<EngineLogLevel> for LogLevel {
    fn from(level: EngineLogLevel) -> Self {
        match level {
            EngineLogLevel::Critical => LogLevel::Critical,
            EngineLogLevel::Warning => LogLevel::Warning,
            EngineLogLevel::Notice => LogLevel::Message,
            EngineLogLevel::Info => LogLevel::Info,
            EngineLogLevel::Debug => LogLevel::Debug,
        }
    }
}

/// "none" and "localhost" (any case) are answered locally; every other name
/// goes to the host resolver once and its answer or error is returned as is.
pub fn resolve_hostname<H: Host + ?Sized>(host: &H, name: &str) -> Result<Ipv4Addr, ResolveError> {
    if name.eq_ignore_ascii_case("none") {
        Ok(NO_ADDRESS)
    } else if name.eq_ignore_ascii_case("localhost") {
        Ok(Ipv4Addr::LOCALHOST)
    } else {
        host.resolve_hostname(name)
    }
}

/// The address as an `in_addr_t`-style value: network byte order in memory.
pub fn to_network_order(addr: Ipv4Addr) -> u32 {
    u32::from_ne_bytes(addr.octets())
}

/// Engine-facing services bound to one host and one session.
pub(crate) struct HostServices<'a, H: ?Sized> {
    host: &'a H,
    session: SessionId,
}

impl<'a, H: Host + ?Sized> HostServices<'a, H> {
    pub(crate) fn new(host: &'a H, session: SessionId) -> Self {
        Self { host, session }
    }
}

impl<H: Host + ?Sized> EngineServices for HostServices<'_, H> {
    fn log(&self, level: EngineLogLevel, label: &str, message: &str) {
        self.host.log(level.into(), label, message);
    }

    fn resolve(&self, hostname: &str) -> Result<Ipv4Addr, ResolveError> {
        resolve_hostname(self.host, hostname)
    }

    fn sleep(&self, seconds: u32) {
        wakeup::request_sleep(self.host, self.session, seconds);
    }
}
