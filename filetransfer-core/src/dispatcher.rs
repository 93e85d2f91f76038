//! Role dispatcher: one node's lifecycle. Holds at most one client or one
//! server session and routes every activation to it.

use crate::adapter::HostServices;
use crate::engine::{
    Activation, ClientSession, ClientStart, EngineError, ServerSession, SessionStats,
    TransferEngine,
};
use crate::host::{Host, LogLevel};
use crate::session::{
    self, ClientConfig, ProcessRole, ServerConfig, SessionConfig, UsageError, USAGE,
};
use crate::wakeup::{SessionId, Wakeup};

const CREATE: &str = "filetransfer_create";
const ACTIVATE: &str = "filetransfer_activate";
const WAKE: &str = "filetransfer_wake";
const DESTROY: &str = "filetransfer_destroy";

/// Why `create` did not produce a session. Already logged when returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("a {0} session is already running")]
    AlreadyConfigured(ProcessRole),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

struct ClientSlot<C> {
    id: SessionId,
    session: C,
}

struct ServerSlot<S> {
    id: SessionId,
    session: S,
    stats: SessionStats,
}

enum Slot<C, S> {
    Empty,
    Client(ClientSlot<C>),
    Server(ServerSlot<S>),
    /// Torn down; remembers what it was.
    Retired(ProcessRole),
}

/// A filetransfer node. Every entry point takes `&mut self` and returns
/// without waiting; the host re-enters through `activate` and `wake`.
pub struct FileTransfer<H: Host, E: TransferEngine> {
    host: H,
    engine: E,
    slot: Slot<E::Client, E::Server>,
    next_session: SessionId,
}

impl<H: Host, E: TransferEngine> FileTransfer<H, E> {
    pub fn new(host: H, engine: E) -> Self {
        Self {
            host,
            engine,
            slot: Slot::Empty,
            next_session: SessionId::first(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Configured role. Stays tagged after `destroy`.
    pub fn role(&self) -> ProcessRole {
        match &self.slot {
            Slot::Empty => ProcessRole::Uninitialized,
            Slot::Client(_) => ProcessRole::Client,
            Slot::Server(_) => ProcessRole::Server,
            Slot::Retired(role) => *role,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live_session().is_some()
    }

    /// Counters of the running server session, if any.
    pub fn server_stats(&self) -> Option<SessionStats> {
        match &self.slot {
            Slot::Server(server) => Some(server.stats),
            _ => None,
        }
    }

    fn live_session(&self) -> Option<SessionId> {
        match &self.slot {
            Slot::Client(client) => Some(client.id),
            Slot::Server(server) => Some(server.id),
            Slot::Empty | Slot::Retired(_) => None,
        }
    }

    /// Configure from `args` (`args[0]` is the mode) and start the engine.
    /// Failures are logged here; the node stays usable either way.
    pub fn create<S: AsRef<str>>(&mut self, args: &[S]) -> Result<ProcessRole, CreateError> {
        self.host.log(LogLevel::Debug, CREATE, "create called");

        if self.live_session().is_some() {
            let role = self.role();
            self.host.log(
                LogLevel::Critical,
                CREATE,
                &format!("{role} session already running, destroy it first"),
            );
            return Err(CreateError::AlreadyConfigured(role));
        }

        let config = match session::parse(args) {
            Ok(config) => config,
            Err(err) => {
                self.host
                    .log(LogLevel::Critical, CREATE, &format!("{err}{USAGE}"));
                return Err(err.into());
            }
        };

        let id = self.next_session;
        self.next_session = id.next();
        match config {
            SessionConfig::Client(config) => self.start_client(id, &config),
            SessionConfig::Server(config) => self.start_server(id, &config),
        }
    }

    fn start_client(
        &mut self,
        id: SessionId,
        config: &ClientConfig,
    ) -> Result<ProcessRole, CreateError> {
        let services = HostServices::new(&self.host, id);
        let ClientStart { session, socket } = match self.engine.start_client(config, &services) {
            Ok(start) => start,
            Err(err) => {
                self.host.log(
                    LogLevel::Critical,
                    CREATE,
                    &format!("{} client not started: {err}", config.mode()),
                );
                return Err(err.into());
            }
        };
        self.host.log(
            LogLevel::Info,
            CREATE,
            &format!("{} client started as {id}", config.mode()),
        );
        self.slot = Slot::Client(ClientSlot { id, session });

        // A socket opened during start is activated right away; without one
        // the client waits for its first wakeup.
        if let Some(sd) = socket {
            self.activate(Activation::Socket(sd));
        }
        Ok(ProcessRole::Client)
    }

    fn start_server(
        &mut self,
        id: SessionId,
        config: &ServerConfig,
    ) -> Result<ProcessRole, CreateError> {
        self.host.log(
            LogLevel::Info,
            CREATE,
            &format!(
                "serving '{}' on port {}",
                config.doc_root.display(),
                config.port
            ),
        );
        let services = HostServices::new(&self.host, id);
        match self.engine.start_server(config, &services) {
            Ok(session) => {
                self.host.log(
                    LogLevel::Message,
                    CREATE,
                    &format!(
                        "fileserver running at {}:{}",
                        config.bind_address, config.port
                    ),
                );
                self.slot = Slot::Server(ServerSlot {
                    id,
                    session,
                    stats: SessionStats::default(),
                });
                Ok(ProcessRole::Server)
            }
            Err(err) => {
                self.host.log(
                    LogLevel::Critical,
                    CREATE,
                    &format!("fileserver error, not started! ({err})"),
                );
                Err(err.into())
            }
        }
    }

    /// Route one stimulus to the live session. Without one this does nothing.
    pub fn activate(&mut self, event: Activation) {
        match &mut self.slot {
            Slot::Client(client) => {
                self.host
                    .log(LogLevel::Debug, ACTIVATE, &format!("activating {event}"));
                let services = HostServices::new(&self.host, client.id);
                client.session.activate(event, &services);
            }
            Slot::Server(server) => {
                self.host
                    .log(LogLevel::Debug, ACTIVATE, &format!("activating {event}"));
                let services = HostServices::new(&self.host, server.id);
                let status = server.session.activate(event, &services);
                let report = server.session.stats();
                if !server.stats.advance(report) {
                    self.host.log(
                        LogLevel::Warning,
                        ACTIVATE,
                        &format!(
                            "fileserver reported shrinking counters ({report}), keeping previous values"
                        ),
                    );
                }
                self.host.log(
                    LogLevel::Debug,
                    ACTIVATE,
                    &format!("fileserver activation result: {status} ({})", server.stats),
                );
            }
            Slot::Empty | Slot::Retired(_) => {}
        }
    }

    /// A timer the host ran for us fired. Only the session that asked for it is woken.
    pub fn wake(&mut self, wakeup: Wakeup) {
        if self.live_session() == Some(wakeup.session()) {
            self.activate(Activation::NoSocket);
        } else {
            self.host.log(
                LogLevel::Debug,
                WAKE,
                &format!("dropping wakeup for {}, session is gone", wakeup.session()),
            );
        }
    }

    /// Tear down the live session, if any. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        let slot = std::mem::replace(&mut self.slot, Slot::Empty);
        self.slot = match slot {
            Slot::Client(mut client) => {
                self.host.log(LogLevel::Debug, DESTROY, "destroy called");
                let services = HostServices::new(&self.host, client.id);
                client.session.stop(&services);
                self.host.log(LogLevel::Info, DESTROY, "client stopped");
                Slot::Retired(ProcessRole::Client)
            }
            Slot::Server(mut server) => {
                self.host.log(LogLevel::Debug, DESTROY, "destroy called");
                server.stats.advance(server.session.stats());
                self.host.log(
                    LogLevel::Message,
                    DESTROY,
                    &format!("fileserver stats: {}", server.stats),
                );
                self.host
                    .log(LogLevel::Info, DESTROY, "shutting down fileserver");
                let services = HostServices::new(&self.host, server.id);
                server.session.shutdown(&services);
                Slot::Retired(ProcessRole::Server)
            }
            idle => idle,
        };
    }
}

impl<H: Host, E: TransferEngine> Drop for FileTransfer<H, E> {
    fn drop(&mut self) {
        self.destroy();
    }
}
