// Filetransfer simulator: runs one node against a virtual clock and a dry-run engine.
//
//   filetransfer-sim [--config PATH] server 8080 /srv/www
//   filetransfer-sim client single fileserver 80 none 0 3 /file

mod config;
mod dryrun;
mod sim;

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::Context;
use filetransfer_core::{Activation, CreateError, FileTransfer, ProcessRole, SessionStats};
use serde::Serialize;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, registry, EnvFilter};

use crate::dryrun::DryRunEngine;
use crate::sim::{EventQueue, SimEvent, SimHost, SimNet};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Printed as JSON when the run ends.
#[derive(Debug, Serialize)]
struct Report {
    role: ProcessRole,
    sim_ms: u64,
    activations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_stats: Option<SessionStats>,
}

fn main() -> anyhow::Result<ExitCode> {
    let mut config_path = None;
    let mut node_args = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" if node_args.is_empty() => {
                println!("filetransfer-sim {}", VERSION);
                return Ok(ExitCode::SUCCESS);
            }
            "--config" if node_args.is_empty() => {
                let path = args.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            _ => node_args.push(arg),
        }
    }

    let cfg = config::load(config_path.as_deref())?;
    registry()
        .with(EnvFilter::builder().parse(&cfg.log_filter)?)
        .with(fmt::layer().with_target(false))
        .init();

    let queue = Rc::new(RefCell::new(EventQueue::default()));
    let net = Rc::new(SimNet::new(queue.clone(), cfg.latency_ms));
    let host = SimHost::new(queue.clone(), cfg.hosts.clone());
    let engine = DryRunEngine::new(net, cfg.seed, cfg.request_interval_ms);
    let mut node = FileTransfer::new(host, engine);

    match node.create(&node_args) {
        Ok(_) => {}
        Err(CreateError::Usage(_)) => return Ok(ExitCode::from(2)),
        Err(_) => return Ok(ExitCode::FAILURE),
    }

    let mut activations = 0;
    loop {
        let next = queue.borrow_mut().pop_until(cfg.run_limit_ms);
        match next {
            Some(SimEvent::Readable(sd)) => node.activate(Activation::from_raw(sd)),
            Some(SimEvent::Wakeup(wakeup)) => node.wake(wakeup),
            None => break,
        }
        activations += 1;
    }
    if !queue.borrow().is_empty() {
        tracing::info!(
            pending = queue.borrow().len(),
            "run limit of {} ms reached",
            cfg.run_limit_ms
        );
    }

    let report = Report {
        role: node.role(),
        sim_ms: queue.borrow().now_ms(),
        activations,
        server_stats: node.server_stats(),
    };
    node.destroy();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}
