//! Session configurator: turn a mode keyword and positional arguments into exactly
//! one typed session configuration, or a usage error. Nothing is created here.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Printed at critical severity whenever an invocation is malformed.
pub const USAGE: &str = "\nFiletransfer usage:\n\
\t'server serverListenPort pathToDocRoot'\n\
\t'client single fileServerHostname fileServerPort socksServerHostname(or 'none') socksServerPort nDownloads pathToFile'\n\
\t'client double fileServerHostname fileServerPort socksServerHostname(or 'none') socksServerPort pathToFile1 pathToFile2 pathToFile3(or 'none') secondsPause'\n\
\t'client multi pathToDownloadSpec socksServerHostname(or 'none') socksServerPort pathToThinktimeCDF(or 'none') secondsRunTime(or '-1')'\n";

/// Listen queue length handed to every server session.
pub const SERVER_BACKLOG: u32 = 1000;

const NONE_TOKEN: &str = "none";

/// Which side of a transfer this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessRole {
    Uninitialized,
    Client,
    Server,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessRole::Uninitialized => "uninitialized",
            ProcessRole::Client => "client",
            ProcessRole::Server => "server",
        };
        f.write_str(s)
    }
}

/// Host name (unresolved) and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

/// `client single`: one server, `num_downloads` fetches of the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleConfig {
    pub http_server: Endpoint,
    pub socks_proxy: Option<Endpoint>,
    pub num_downloads: u32,
    pub file_path: String,
}

/// `client double`: two (or three) files back to back, then a pause, repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleConfig {
    pub http_server: Endpoint,
    pub socks_proxy: Option<Endpoint>,
    pub file_path1: String,
    pub file_path2: String,
    pub file_path3: Option<String>,
    pub pause_seconds: u32,
}

/// How long a multi-download client keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTime {
    Unbounded,
    Seconds(u32),
}

/// `client multi`: downloads described by a spec file, with optional think times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiConfig {
    pub server_spec_path: PathBuf,
    pub socks_proxy: Option<Endpoint>,
    pub thinktime_cdf_path: Option<PathBuf>,
    pub run_time: RunTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientConfig {
    Single(SingleConfig),
    Double(DoubleConfig),
    Multi(MultiConfig),
}

impl ClientConfig {
    pub fn socks_proxy(&self) -> Option<&Endpoint> {
        match self {
            ClientConfig::Single(c) => c.socks_proxy.as_ref(),
            ClientConfig::Double(c) => c.socks_proxy.as_ref(),
            ClientConfig::Multi(c) => c.socks_proxy.as_ref(),
        }
    }

    pub fn mode(&self) -> ClientMode {
        match self {
            ClientConfig::Single(_) => ClientMode::Single,
            ClientConfig::Double(_) => ClientMode::Double,
            ClientConfig::Multi(_) => ClientMode::Multi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: Ipv4Addr,
    pub port: u16,
    pub doc_root: PathBuf,
    pub backlog: u32,
}

/// A fully parsed invocation. Exactly one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionConfig {
    Client(ClientConfig),
    Server(ServerConfig),
}

impl SessionConfig {
    pub fn role(&self) -> ProcessRole {
        match self {
            SessionConfig::Client(_) => ProcessRole::Client,
            SessionConfig::Server(_) => ProcessRole::Server,
        }
    }
}

/// Client workload keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    Single,
    Double,
    Multi,
}

impl ClientMode {
    fn keyword(self) -> &'static str {
        match self {
            ClientMode::Single => "single",
            ClientMode::Double => "double",
            ClientMode::Multi => "multi",
        }
    }

    /// Positional fields expected after `client <mode>`.
    pub fn field_count(self) -> usize {
        match self {
            ClientMode::Single => 6,
            ClientMode::Double => 8,
            ClientMode::Multi => 5,
        }
    }

    /// Case-insensitive match on the leading keyword characters, so legacy
    /// invocations such as `SINGLE` or `multi-download` keep working.
    pub fn from_token(token: &str) -> Option<Self> {
        [ClientMode::Single, ClientMode::Double, ClientMode::Multi]
            .into_iter()
            .find(|mode| {
                let kw = mode.keyword().as_bytes();
                token
                    .as_bytes()
                    .get(..kw.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(kw))
            })
    }
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Malformed invocation. Always reported with [`USAGE`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("no mode given")]
    MissingMode,
    #[error("unknown mode '{0}'")]
    UnknownMode(String),
    #[error("no client mode given")]
    MissingClientMode,
    #[error("unknown client mode '{0}'")]
    UnknownClientMode(String),
    #[error("'{mode}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        mode: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid {field} '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

/// Parse a full argument list (`args[0]` is the mode keyword).
pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<SessionConfig, UsageError> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    let mode = *args.first().ok_or(UsageError::MissingMode)?;

    if mode.eq_ignore_ascii_case("client") {
        parse_client(&args[1..]).map(SessionConfig::Client)
    } else if mode.eq_ignore_ascii_case("server") {
        parse_server(&args[1..]).map(SessionConfig::Server)
    } else {
        Err(UsageError::UnknownMode(mode.to_string()))
    }
}

fn parse_server(args: &[&str]) -> Result<ServerConfig, UsageError> {
    let [port, doc_root] = args else {
        return Err(UsageError::ArgumentCount {
            mode: "server",
            expected: 2,
            got: args.len(),
        });
    };
    Ok(ServerConfig {
        bind_address: Ipv4Addr::UNSPECIFIED,
        port: parse_port("server port", port)?,
        doc_root: PathBuf::from(doc_root),
        backlog: SERVER_BACKLOG,
    })
}

fn parse_client(args: &[&str]) -> Result<ClientConfig, UsageError> {
    let (token, fields) = args.split_first().ok_or(UsageError::MissingClientMode)?;
    let mode =
        ClientMode::from_token(token).ok_or_else(|| UsageError::UnknownClientMode(token.to_string()))?;
    if fields.len() != mode.field_count() {
        return Err(UsageError::ArgumentCount {
            mode: mode.keyword(),
            expected: mode.field_count(),
            got: fields.len(),
        });
    }

    let config = match mode {
        ClientMode::Single => ClientConfig::Single(SingleConfig {
            http_server: endpoint("http server port", fields[0], fields[1])?,
            socks_proxy: proxy(fields[2], fields[3])?,
            num_downloads: parse_number("download count", fields[4])?,
            file_path: fields[5].to_string(),
        }),
        ClientMode::Double => ClientConfig::Double(DoubleConfig {
            http_server: endpoint("http server port", fields[0], fields[1])?,
            socks_proxy: proxy(fields[2], fields[3])?,
            file_path1: fields[4].to_string(),
            file_path2: fields[5].to_string(),
            file_path3: not_none(fields[6]).map(str::to_string),
            pause_seconds: parse_number("pause seconds", fields[7])?,
        }),
        ClientMode::Multi => ClientConfig::Multi(MultiConfig {
            server_spec_path: PathBuf::from(fields[0]),
            socks_proxy: proxy(fields[1], fields[2])?,
            thinktime_cdf_path: not_none(fields[3]).map(PathBuf::from),
            run_time: parse_run_time(fields[4])?,
        }),
    };
    Ok(config)
}

/// `None` for the literal token "none" (any case), else the token.
fn not_none(token: &str) -> Option<&str> {
    if token.eq_ignore_ascii_case(NONE_TOKEN) {
        None
    } else {
        Some(token)
    }
}

fn endpoint(field: &'static str, host: &str, port: &str) -> Result<Endpoint, UsageError> {
    Ok(Endpoint {
        host: host.to_string(),
        port: parse_port(field, port)?,
    })
}

/// The port is positional even without a proxy, but only parsed when one is set.
fn proxy(host: &str, port: &str) -> Result<Option<Endpoint>, UsageError> {
    not_none(host)
        .map(|host| endpoint("socks proxy port", host, port))
        .transpose()
}

fn parse_port(field: &'static str, value: &str) -> Result<u16, UsageError> {
    value.parse().map_err(|_| UsageError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn parse_number(field: &'static str, value: &str) -> Result<u32, UsageError> {
    value.parse().map_err(|_| UsageError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn parse_run_time(value: &str) -> Result<RunTime, UsageError> {
    if value == "-1" {
        return Ok(RunTime::Unbounded);
    }
    parse_number("run time seconds", value).map(RunTime::Seconds)
}
