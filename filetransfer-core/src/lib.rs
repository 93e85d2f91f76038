//! Filetransfer node core for a discrete-event network simulator.
//! Host-driven: no I/O and no waiting; the host delivers socket and timer
//! activations, the core routes them to the configured client or server session.

pub mod adapter;
pub mod dispatcher;
pub mod engine;
pub mod host;
pub mod session;
pub mod wakeup;

pub use adapter::{resolve_hostname, to_network_order, NO_ADDRESS};
pub use dispatcher::{CreateError, FileTransfer};
pub use engine::{
    Activation, ClientSession, ClientStart, Descriptor, EngineError, EngineLogLevel,
    EngineServices, ServerSession, ServerStatus, SessionStats, TransferEngine,
};
pub use host::{Host, LogLevel, ResolveError};
pub use session::{
    ClientConfig, ClientMode, DoubleConfig, Endpoint, MultiConfig, ProcessRole, RunTime,
    ServerConfig, SessionConfig, SingleConfig, UsageError, USAGE,
};
pub use wakeup::{SessionId, Wakeup};
