//! Transfer engine interface. The engine owns the protocol and the sockets;
//! the core only starts, activates, queries, and stops its sessions.

use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::host::ResolveError;
use crate::session::{ClientConfig, ServerConfig};

/// Socket descriptor as numbered by the simulator.
pub type Descriptor = i32;

/// One stimulus from the host. Timer wakeups arrive as `NoSocket`, the same
/// value an I/O notification without a descriptor would carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activation {
    Socket(Descriptor),
    NoSocket,
}

impl Activation {
    /// Map a raw descriptor where anything below 1 means "no socket".
    pub fn from_raw(descriptor: Descriptor) -> Self {
        if descriptor > 0 {
            Activation::Socket(descriptor)
        } else {
            Activation::NoSocket
        }
    }

    pub fn descriptor(&self) -> Option<Descriptor> {
        match self {
            Activation::Socket(sd) => Some(*sd),
            Activation::NoSocket => None,
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Socket(sd) => write!(f, "socket {sd}"),
            Activation::NoSocket => f.write_str("no socket"),
        }
    }
}

/// Engine-internal log severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineLogLevel {
    Critical,
    Warning,
    Notice,
    Info,
    Debug,
}

/// Cumulative server counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub replies_sent: u64,
}

impl SessionStats {
    /// Fold a newer engine report in. Counters never move backwards; returns
    /// false if the report tried to.
    pub fn advance(&mut self, report: SessionStats) -> bool {
        let monotonic = report.bytes_received >= self.bytes_received
            && report.bytes_sent >= self.bytes_sent
            && report.replies_sent >= self.replies_sent;
        self.bytes_received = self.bytes_received.max(report.bytes_received);
        self.bytes_sent = self.bytes_sent.max(report.bytes_sent);
        self.replies_sent = self.replies_sent.max(report.replies_sent);
        monotonic
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes in, {} bytes out, {} replies",
            self.bytes_received, self.bytes_sent, self.replies_sent
        )
    }
}

/// File server result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerStatus {
    Success,
    Closed,
    ErrInvalid,
    ErrFatal,
    ErrBadSd,
    ErrWouldBlock,
    ErrBufSpace,
    ErrSocket,
    ErrBind,
    ErrListen,
    ErrAccept,
    ErrRecv,
    ErrSend,
    ErrClose,
    ErrEpoll,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Success => "FS_SUCCESS",
            ServerStatus::Closed => "FS_CLOSED",
            ServerStatus::ErrInvalid => "FS_ERR_INVALID",
            ServerStatus::ErrFatal => "FS_ERR_FATAL",
            ServerStatus::ErrBadSd => "FS_ERR_BADSD",
            ServerStatus::ErrWouldBlock => "FS_ERR_WOULDBLOCK",
            ServerStatus::ErrBufSpace => "FS_ERR_BUFSPACE",
            ServerStatus::ErrSocket => "FS_ERR_SOCKET",
            ServerStatus::ErrBind => "FS_ERR_BIND",
            ServerStatus::ErrListen => "FS_ERR_LISTEN",
            ServerStatus::ErrAccept => "FS_ERR_ACCEPT",
            ServerStatus::ErrRecv => "FS_ERR_RECV",
            ServerStatus::ErrSend => "FS_ERR_SEND",
            ServerStatus::ErrClose => "FS_ERR_CLOSE",
            ServerStatus::ErrEpoll => "FS_ERR_EPOLL",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine refused to start a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("hostname resolution failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("fileserver start failed: {0}")]
    Server(ServerStatus),
    #[error("client start failed: {0}")]
    Client(String),
}

/// What the engine may ask of its surroundings while it runs.
pub trait EngineServices {
    fn log(&self, level: EngineLogLevel, label: &str, message: &str);

    /// Resolve a name; "none" and "localhost" never reach the host resolver.
    fn resolve(&self, hostname: &str) -> Result<Ipv4Addr, ResolveError>;

    /// Come back with `Activation::NoSocket` after `seconds`. Returns immediately.
    fn sleep(&self, seconds: u32);
}

/// Outcome of starting a client: the session, plus the first socket to
/// activate if the engine opened one already.
#[derive(Debug)]
pub struct ClientStart<C> {
    pub session: C,
    pub socket: Option<Descriptor>,
}

pub trait ClientSession {
    fn activate(&mut self, event: Activation, services: &dyn EngineServices);

    /// Drop all pending interest. Outstanding transfers are abandoned.
    fn stop(&mut self, services: &dyn EngineServices);
}

pub trait ServerSession {
    fn activate(&mut self, event: Activation, services: &dyn EngineServices) -> ServerStatus;

    fn stats(&self) -> SessionStats;

    fn shutdown(&mut self, services: &dyn EngineServices);
}

/// Factory for client and server sessions.
pub trait TransferEngine {
    type Client: ClientSession;
    type Server: ServerSession;

    fn start_client(
        &mut self,
        config: &ClientConfig,
        services: &dyn EngineServices,
    ) -> Result<ClientStart<Self::Client>, EngineError>;

    fn start_server(
        &mut self,
        config: &ServerConfig,
        services: &dyn EngineServices,
    ) -> Result<Self::Server, EngineError>;
}
