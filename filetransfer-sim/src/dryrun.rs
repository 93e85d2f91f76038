//! Dry-run transfer engine: walks through the client and server workloads on
//! simulated sockets without moving real bytes or touching the disk.

use std::collections::BTreeSet;
use std::rc::Rc;

use filetransfer_core::{
    Activation, ClientConfig, ClientSession, ClientStart, Descriptor, EngineError, EngineLogLevel,
    EngineServices, RunTime, ServerConfig, ServerSession, ServerStatus, SessionStats,
    TransferEngine,
};
use filetransfer_core::to_network_order;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sim::{SimNet, MIN_DELAY_MS};

const CLIENT_LABEL: &str = "dryrun_client";
const SERVER_LABEL: &str = "dryrun_server";

/// Response sizes the dry-run server pretends to send.
const MIN_REPLY_BYTES: u64 = 1024;
const MAX_REPLY_BYTES: u64 = 1 << 20;

/// Think-time range used when a multi client has a CDF configured.
const THINK_SECONDS: std::ops::RangeInclusive<u32> = 1..=10;

pub struct DryRunEngine {
    net: Rc<SimNet>,
    seed: u64,
    sessions: u64,
    request_interval_ms: u64,
}

impl DryRunEngine {
    pub fn new(net: Rc<SimNet>, seed: u64, request_interval_ms: u64) -> Self {
        Self {
            net,
            seed,
            sessions: 0,
            request_interval_ms: request_interval_ms.max(MIN_DELAY_MS),
        }
    }

    fn session_rng(&mut self) -> StdRng {
        self.sessions += 1;
        StdRng::seed_from_u64(self.seed.wrapping_add(self.sessions))
    }
}

/// What a client does after each finished download.
#[derive(Debug)]
enum Plan {
    Single {
        path: String,
        remaining: u32,
    },
    Double {
        paths: Vec<String>,
        next: usize,
        pause_seconds: u32,
    },
    Multi {
        think: bool,
        deadline_ms: Option<u64>,
        downloads: u64,
        thinking: bool,
    },
}

#[derive(Debug)]
enum Step {
    Download(String),
    Pause(u32),
    Done,
}

impl Plan {
    fn next_step(&mut self, now_ms: u64, rng: &mut StdRng) -> Step {
        match self {
            Plan::Single { path, remaining } => {
                if *remaining == 0 {
                    return Step::Done;
                }
                *remaining -= 1;
                Step::Download(path.clone())
            }
            Plan::Double {
                paths,
                next,
                pause_seconds,
            } => {
                if *next == paths.len() {
                    *next = 0;
                    return Step::Pause(*pause_seconds);
                }
                *next += 1;
                Step::Download(paths[*next - 1].clone())
            }
            Plan::Multi {
                think,
                deadline_ms,
                downloads,
                thinking,
            } => {
                if deadline_ms.is_some_and(|deadline| now_ms >= deadline) {
                    return Step::Done;
                }
                // think between downloads, never before the first
                if *think && *downloads > 0 && !*thinking {
                    *thinking = true;
                    return Step::Pause(rng.gen_range(THINK_SECONDS));
                }
                *thinking = false;
                *downloads += 1;
                Step::Download(format!("/multi/{downloads}"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    /// Socket opened at start, request not yet sent.
    Connecting(Descriptor),
    Downloading(Descriptor),
    Sleeping,
    Done,
}

pub struct DryRunClient {
    net: Rc<SimNet>,
    rng: StdRng,
    plan: Plan,
    state: ClientState,
    current: Option<(String, u64)>,
    completed: u32,
}

impl DryRunClient {
    /// Move to the next step of the plan.
    fn advance(&mut self, services: &dyn EngineServices) {
        match self.plan.next_step(self.net.now_ms(), &mut self.rng) {
            Step::Download(path) => {
                let sd = self.net.open();
                self.net.respond(sd);
                services.log(
                    EngineLogLevel::Info,
                    CLIENT_LABEL,
                    &format!("requesting '{path}' on socket {sd}"),
                );
                self.current = Some((path, self.net.now_ms()));
                self.state = ClientState::Downloading(sd);
            }
            Step::Pause(seconds) => {
                services.log(
                    EngineLogLevel::Info,
                    CLIENT_LABEL,
                    &format!("pausing for {seconds} seconds"),
                );
                self.state = ClientState::Sleeping;
                services.sleep(seconds);
            }
            Step::Done => {
                services.log(
                    EngineLogLevel::Notice,
                    CLIENT_LABEL,
                    &format!("finished after {} downloads", self.completed),
                );
                self.state = ClientState::Done;
            }
        }
    }

    fn finish_download(&mut self, sd: Descriptor, services: &dyn EngineServices) {
        self.net.close(sd);
        self.completed += 1;
        let bytes = self.rng.gen_range(MIN_REPLY_BYTES..=MAX_REPLY_BYTES);
        if let Some((path, started_ms)) = self.current.take() {
            services.log(
                EngineLogLevel::Notice,
                CLIENT_LABEL,
                &format!(
                    "[fg-download-complete] got {bytes} bytes of '{path}' in {} ms",
                    self.net.now_ms().saturating_sub(started_ms)
                ),
            );
        }
    }
}

impl ClientSession for DryRunClient {
    fn activate(&mut self, event: Activation, services: &dyn EngineServices) {
        match (self.state, event) {
            (ClientState::Connecting(sd), Activation::Socket(ready)) if sd == ready => {
                // the start socket carries the first request
                self.net.close(sd);
                self.advance(services);
            }
            (ClientState::Downloading(sd), Activation::Socket(ready)) if sd == ready => {
                self.finish_download(sd, services);
                self.advance(services);
            }
            (ClientState::Sleeping, Activation::NoSocket) => self.advance(services),
            (state, event) => services.log(
                EngineLogLevel::Debug,
                CLIENT_LABEL,
                &format!("ignoring {event} while {state:?}"),
            ),
        }
    }

    fn stop(&mut self, services: &dyn EngineServices) {
        if let ClientState::Connecting(sd) | ClientState::Downloading(sd) = self.state {
            self.net.close(sd);
        }
        self.state = ClientState::Done;
        services.log(
            EngineLogLevel::Info,
            CLIENT_LABEL,
            &format!("stopped after {} downloads", self.completed),
        );
    }
}

pub struct DryRunServer {
    net: Rc<SimNet>,
    rng: StdRng,
    listen_sd: Descriptor,
    connections: BTreeSet<Descriptor>,
    request_interval_ms: u64,
    stats: SessionStats,
}

impl ServerSession for DryRunServer {
    fn activate(&mut self, event: Activation, services: &dyn EngineServices) -> ServerStatus {
        let Some(sd) = event.descriptor() else {
            return ServerStatus::ErrBadSd;
        };
        if sd == self.listen_sd {
            let conn = self.net.open();
            self.connections.insert(conn);
            self.net.respond(conn);
            self.net.ready_after(self.listen_sd, self.request_interval_ms);
            services.log(
                EngineLogLevel::Debug,
                SERVER_LABEL,
                &format!("accepted connection {conn}"),
            );
            return ServerStatus::Success;
        }
        if !self.connections.remove(&sd) {
            return ServerStatus::ErrBadSd;
        }
        self.stats.bytes_received += self.rng.gen_range(100..=400);
        self.stats.bytes_sent += self.rng.gen_range(MIN_REPLY_BYTES..=MAX_REPLY_BYTES);
        self.stats.replies_sent += 1;
        ServerStatus::Success
    }

    fn stats(&self) -> SessionStats {
        self.stats
    }

    fn shutdown(&mut self, services: &dyn EngineServices) {
        self.net.close(self.listen_sd);
        for sd in std::mem::take(&mut self.connections) {
            self.net.close(sd);
        }
        services.log(EngineLogLevel::Info, SERVER_LABEL, "listener closed");
    }
}

/// Resolve the fileserver once up front, as a real client would before connecting.
fn log_target(services: &dyn EngineServices, host: &str) -> Result<(), EngineError> {
    let addr = services.resolve(host)?;
    services.log(
        EngineLogLevel::Debug,
        CLIENT_LABEL,
        &format!(
            "fileserver '{host}' is {addr} (in_addr {:#010x})",
            to_network_order(addr)
        ),
    );
    Ok(())
}

impl TransferEngine for DryRunEngine {
    type Client = DryRunClient;
    type Server = DryRunServer;

    fn start_client(
        &mut self,
        config: &ClientConfig,
        services: &dyn EngineServices,
    ) -> Result<ClientStart<DryRunClient>, EngineError> {
        if let Some(proxy) = config.socks_proxy() {
            let addr = services.resolve(&proxy.host)?;
            services.log(
                EngineLogLevel::Info,
                CLIENT_LABEL,
                &format!("using socks proxy {addr}:{}", proxy.port),
            );
        }

        let plan = match config {
            ClientConfig::Single(c) => {
                log_target(services, &c.http_server.host)?;
                Plan::Single {
                    path: c.file_path.clone(),
                    remaining: c.num_downloads,
                }
            }
            ClientConfig::Double(c) => {
                log_target(services, &c.http_server.host)?;
                let mut paths = vec![c.file_path1.clone(), c.file_path2.clone()];
                paths.extend(c.file_path3.clone());
                Plan::Double {
                    paths,
                    next: 0,
                    pause_seconds: c.pause_seconds,
                }
            }
            ClientConfig::Multi(c) => {
                services.log(
                    EngineLogLevel::Info,
                    CLIENT_LABEL,
                    &format!(
                        "dry run does not read '{}', fetching synthetic objects",
                        c.server_spec_path.display()
                    ),
                );
                Plan::Multi {
                    think: c.thinktime_cdf_path.is_some(),
                    deadline_ms: match c.run_time {
                        RunTime::Unbounded => None,
                        RunTime::Seconds(s) => Some(self.net.now_ms() + u64::from(s) * 1000),
                    },
                    downloads: 0,
                    thinking: false,
                }
            }
        };

        let sd = self.net.open();
        Ok(ClientStart {
            session: DryRunClient {
                net: self.net.clone(),
                rng: self.session_rng(),
                plan,
                state: ClientState::Connecting(sd),
                current: None,
                completed: 0,
            },
            socket: Some(sd),
        })
    }

    fn start_server(
        &mut self,
        config: &ServerConfig,
        services: &dyn EngineServices,
    ) -> Result<DryRunServer, EngineError> {
        if config.port == 0 {
            return Err(EngineError::Server(ServerStatus::ErrBind));
        }
        let listen_sd = self.net.open();
        self.net.ready_after(listen_sd, self.request_interval_ms);
        services.log(
            EngineLogLevel::Debug,
            SERVER_LABEL,
            &format!(
                "listening on socket {listen_sd}, backlog {}",
                config.backlog
            ),
        );
        Ok(DryRunServer {
            net: self.net.clone(),
            rng: self.session_rng(),
            listen_sd,
            connections: BTreeSet::new(),
            request_interval_ms: self.request_interval_ms,
            stats: SessionStats::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    use filetransfer_core::{FileTransfer, ProcessRole};

    use super::*;
    use crate::sim::{SharedQueue, SimEvent, SimHost};

    fn node(latency_ms: u64, interval_ms: u64) -> (SharedQueue, FileTransfer<SimHost, DryRunEngine>) {
        let queue: SharedQueue = Rc::default();
        let names = HashMap::from([("fileserver".to_string(), Ipv4Addr::new(11, 0, 0, 1))]);
        let host = SimHost::new(queue.clone(), names);
        let net = Rc::new(SimNet::new(queue.clone(), latency_ms));
        (queue, FileTransfer::new(host, DryRunEngine::new(net, 7, interval_ms)))
    }

    /// Deliver events until the queue drains or the limit passes.
    fn run(queue: &SharedQueue, ft: &mut FileTransfer<SimHost, DryRunEngine>, limit_ms: u64) -> usize {
        let mut delivered = 0;
        loop {
            let next = queue.borrow_mut().pop_until(limit_ms);
            match next {
                Some(SimEvent::Readable(sd)) => ft.activate(Activation::from_raw(sd)),
                Some(SimEvent::Wakeup(w)) => ft.wake(w),
                None => return delivered,
            }
            delivered += 1;
        }
    }

    #[test]
    fn single_client_downloads_then_goes_quiet() {
        let (queue, mut ft) = node(50, 1000);
        ft.create(&["client", "single", "fileserver", "80", "none", "0", "3", "/f"])
            .unwrap();
        let delivered = run(&queue, &mut ft, 60_000);

        assert_eq!(delivered, 3);
        assert!(queue.borrow().is_empty());
        assert_eq!(queue.borrow().now_ms(), 150);
    }

    #[test]
    fn double_client_pauses_between_rounds() {
        let (queue, mut ft) = node(50, 1000);
        ft.create(&[
            "client", "double", "fileserver", "80", "none", "0", "/a", "/b", "none", "2",
        ])
        .unwrap();
        run(&queue, &mut ft, 2_100);

        // two downloads (100 ms) then a 2 s pause; the next round starts at 2100
        assert_eq!(queue.borrow().now_ms(), 2_100);
        assert_eq!(queue.borrow().len(), 1);
    }

    #[test]
    fn bounded_multi_client_stops() {
        let (queue, mut ft) = node(100, 1000);
        ft.create(&["client", "multi", "/spec", "none", "0", "/cdf", "30"])
            .unwrap();
        run(&queue, &mut ft, u64::MAX);
        assert!(queue.borrow().is_empty());
        assert!(queue.borrow().now_ms() >= 30_000);
    }

    #[test]
    fn multi_names_each_download_once() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut plan = Plan::Multi {
            think: false,
            deadline_ms: None,
            downloads: 0,
            thinking: false,
        };
        let names: Vec<String> = (0..3)
            .map(|_| match plan.next_step(0, &mut rng) {
                Step::Download(path) => path,
                step => panic!("unexpected {step:?}"),
            })
            .collect();
        assert_eq!(names, ["/multi/1", "/multi/2", "/multi/3"]);

        let mut plan = Plan::Multi {
            think: true,
            deadline_ms: None,
            downloads: 0,
            thinking: false,
        };
        assert!(matches!(plan.next_step(0, &mut rng), Step::Download(p) if p == "/multi/1"));
        assert!(matches!(plan.next_step(0, &mut rng), Step::Pause(s) if THINK_SECONDS.contains(&s)));
        assert!(matches!(plan.next_step(0, &mut rng), Step::Download(p) if p == "/multi/2"));
    }

    #[test]
    fn zero_latency_client_still_advances_the_clock() {
        let (queue, mut ft) = node(0, 1000);
        ft.create(&["client", "multi", "/spec", "none", "0", "none", "-1"])
            .unwrap();
        let delivered = run(&queue, &mut ft, 500);

        assert_eq!(delivered, 500);
        assert_eq!(queue.borrow().now_ms(), 500);
        assert_eq!(queue.borrow().len(), 1);
    }

    #[test]
    fn zero_interval_server_serves_one_request_per_tick() {
        let (queue, mut ft) = node(0, 0);
        ft.create(&["server", "8080", "/www"]).unwrap();
        run(&queue, &mut ft, 100);

        assert_eq!(queue.borrow().now_ms(), 100);
        assert_eq!(ft.server_stats().unwrap().replies_sent, 99);
        // one connection in flight plus the re-armed listener
        assert_eq!(queue.borrow().len(), 2);
    }

    #[test]
    fn unresolvable_target_fails_start() {
        let (_queue, mut ft) = node(50, 1000);
        let err = ft
            .create(&["client", "single", "nowhere", "80", "none", "0", "1", "/f"])
            .unwrap_err();
        assert!(err.to_string().contains("nowhere"));
        assert_eq!(ft.role(), ProcessRole::Uninitialized);
    }

    #[test]
    fn server_counts_requests() {
        let (queue, mut ft) = node(10, 1000);
        ft.create(&["server", "8080", "/srv/www"]).unwrap();
        run(&queue, &mut ft, 5_500);

        let stats = ft.server_stats().unwrap();
        assert_eq!(stats.replies_sent, 5);
        assert!(stats.bytes_sent >= 5 * MIN_REPLY_BYTES);

        ft.destroy();
        assert!(queue.borrow().is_empty());
    }

    #[test]
    fn server_port_zero_is_a_bind_error() {
        let (_queue, mut ft) = node(10, 1000);
        assert!(ft.create(&["server", "0", "/srv/www"]).is_err());
        assert_eq!(ft.role(), ProcessRole::Uninitialized);
    }

    #[test]
    fn stopping_a_client_cancels_its_socket() {
        let (queue, mut ft) = node(50, 1000);
        ft.create(&["client", "single", "fileserver", "80", "none", "0", "5", "/f"])
            .unwrap();
        assert_eq!(queue.borrow().len(), 1);
        ft.destroy();
        assert!(queue.borrow().is_empty());
    }
}
