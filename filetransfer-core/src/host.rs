//! Host service facade: what the simulator provides to a filetransfer node.
//! The core never logs, resolves, or waits on its own; it asks the host.

use std::fmt;
use std::net::Ipv4Addr;

use crate::wakeup::Wakeup;

/// Host log levels, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Critical,
    Warning,
    Message,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Critical => "critical",
            LogLevel::Warning => "warning",
            LogLevel::Message => "message",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// Hostname lookup failure reported by the host resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown host '{0}'")]
    UnknownHost(String),
    #[error("resolver unavailable: {0}")]
    Unavailable(String),
}

/// Services the simulator offers. All calls must return promptly.
pub trait Host {
    /// Emit one log record. Records must land in call order.
    fn log(&self, level: LogLevel, label: &str, message: &str);

    /// Resolve a simulated hostname to an IPv4 address.
    fn resolve_hostname(&self, name: &str) -> Result<Ipv4Addr, ResolveError>;

    /// Hand `wakeup` back through `FileTransfer::wake` after `delay_ms` of simulated time.
    fn schedule_wakeup(&self, wakeup: Wakeup, delay_ms: u64);
}

impl<H: Host + ?Sized> Host for &H {
    fn log(&self, level: LogLevel, label: &str, message: &str) {
        (**self).log(level, label, message)
    }

    fn resolve_hostname(&self, name: &str) -> Result<Ipv4Addr, ResolveError> {
        (**self).resolve_hostname(name)
    }

    fn schedule_wakeup(&self, wakeup: Wakeup, delay_ms: u64) {
        (**self).schedule_wakeup(wakeup, delay_ms)
    }
}

/// Forward a host log record to `tracing`, keeping the label as a field.
/// Hosts that have no log sink of their own can call this from `Host::log`.
pub fn emit_tracing(level: LogLevel, label: &str, message: &str) {
    match level {
        LogLevel::Critical => tracing::error!(label, "{}", message),
        LogLevel::Warning => tracing::warn!(label, "{}", message),
        LogLevel::Message | LogLevel::Info => tracing::info!(label, level = %level, "{}", message),
        LogLevel::Debug => tracing::debug!(label, "{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_display_lowercase() {
        assert_eq!(LogLevel::Critical.to_string(), "critical");
        assert_eq!(LogLevel::Message.to_string(), "message");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn resolve_error_names_host() {
        let e = ResolveError::UnknownHost("fileserver".into());
        assert_eq!(e.to_string(), "unknown host 'fileserver'");
    }

    #[test]
    fn emit_tracing_without_subscriber_is_harmless() {
        emit_tracing(LogLevel::Critical, "test", "no subscriber installed");
        emit_tracing(LogLevel::Debug, "test", "still fine");
    }
}
