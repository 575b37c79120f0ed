// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::net::IpAddr;
use std::net::Ipv6Addr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use protocol::Version;
use signal_hook::consts::signal::*;
use signal_hook::iterator::Signals;
use slog::debug;
use slog::info;
use structopt::StructOpt;

pub use errors::TopodError;
use types::FallbackPolicy;
use types::SessionParams;
use types::Target;
pub use types::TopodResult;

mod api_server;
mod channel;
mod crawler;
mod errors;
mod fallback;
mod monitor;
mod query;
mod reconcile;
mod session;
mod transport;
mod types;

#[cfg(test)]
mod mock;

/// All global state for the topod daemon
pub struct Global {
    /// Root of the tree of loggers
    pub log: slog::Logger,
    /// Community used when a request leaves it blank
    pub community: String,
    /// Polling sessions, shared by every consumer below
    pub sessions: Arc<session::SessionRegistry>,
    /// Device queries, with the configured fallback policy applied
    pub query: Arc<dyn query::QueryService>,
    pub crawler: crawler::Crawler,
    pub monitor: monitor::Monitor,
}

impl Global {
    fn new(
        log: &slog::Logger,
        connector: Arc<dyn transport::Connector>,
        params: SessionParams,
        policy: FallbackPolicy,
        community: &str,
    ) -> Self {
        let sessions =
            Arc::new(session::SessionRegistry::new(log, connector, params));
        let live = query::SnmpQueryService::new(log, sessions.clone());
        let query: Arc<dyn query::QueryService> =
            Arc::new(fallback::WithFallback::new(log, live, policy));

        Global {
            log: log.clone(),
            community: community.to_string(),
            sessions,
            query: query.clone(),
            crawler: crawler::Crawler::new(log, query.clone()),
            monitor: monitor::Monitor::new(log, query),
        }
    }

    /// Build a polling target from the fields of a request.
    pub fn target(
        &self,
        host: &str,
        community: &str,
        version: Version,
    ) -> TopodResult<Target> {
        let host = host.trim();
        if host.is_empty() {
            return Err(TopodError::InvalidHost("empty host".to_string()));
        }
        let community = match community {
            "" => self.community.as_str(),
            c => c,
        };
        Ok(Target::new(host, community, version))
    }
}

#[derive(Debug, StructOpt)]
#[structopt(name = "topod", about = "SNMP topology daemon")]
enum Args {
    /// Run the topod API server.
    Run(Opt),
}

#[derive(Clone, Debug, StructOpt)]
pub(crate) struct Opt {
    #[structopt(long, about = "log file")]
    log_file: Option<String>,

    #[structopt(
        long,
        short = "l",
        default_value = "json",
        about = "log format",
        help = "format logs for 'human' or 'json' consumption"
    )]
    log_format: common::logging::LogFormat,

    #[structopt(
        long = "listen-addr",
        short = "a",
        about = "SocketAddr topod should listen on. (default localhost:12240)"
    )]
    listen_addr: Option<SocketAddr>,

    #[structopt(
        long,
        default_value = "161",
        help = "UDP port the SNMP agents listen on"
    )]
    snmp_port: u16,

    #[structopt(
        long,
        default_value = "5000",
        help = "milliseconds to wait for each SNMP response"
    )]
    timeout_ms: u64,

    #[structopt(
        long,
        default_value = "3",
        help = "number of times an unanswered request is reissued"
    )]
    retries: u32,

    #[structopt(
        long,
        short = "c",
        default_value = "public",
        help = "community used when a request does not supply one"
    )]
    community: String,

    #[structopt(
        long,
        default_value = "fail",
        help = "on an unreachable agent, 'fail' or 'synthesize' data"
    )]
    fallback: FallbackPolicy,
}

fn signal_handler(log: &slog::Logger) -> anyhow::Result<()> {
    const SIGNALS: &[std::ffi::c_int] = &[SIGTERM, SIGQUIT, SIGINT];
    let mut sigs = Signals::new(SIGNALS)?;

    let log = log.new(slog::o!("unit" => "signal-handler"));
    if let Some(signal) = sigs.forever().next() {
        info!(&log, "caught signal {signal} - exiting");
    }
    Ok(())
}

async fn run_topod(opts: Opt) -> anyhow::Result<()> {
    let log =
        common::logging::init("topod", &opts.log_file, opts.log_format)?;

    let params = SessionParams {
        port: opts.snmp_port,
        timeout: Duration::from_millis(opts.timeout_ms),
        retries: opts.retries,
    };
    info!(&log, "starting";
        "snmp_port" => params.port,
        "timeout_ms" => opts.timeout_ms,
        "retries" => params.retries,
        "fallback" => opts.fallback.to_string());

    let global = Arc::new(Global::new(
        &log,
        Arc::new(transport::SnmpConnector),
        params,
        opts.fallback,
        &opts.community,
    ));

    let listen_addr = opts.listen_addr.unwrap_or(SocketAddr::new(
        IpAddr::V6(Ipv6Addr::LOCALHOST),
        common::DEFAULT_TOPOD_PORT,
    ));

    let (api_tx, api_rx) = tokio::sync::watch::channel(());
    let api_global = global.clone();
    let api_server_manager = tokio::task::spawn(async move {
        api_server::api_server_manager(listen_addr, api_global, api_rx).await
    });

    let signal_log = log.clone();
    tokio::task::spawn_blocking(move || signal_handler(&signal_log))
        .await??;

    debug!(&log, "shutting down API server");
    drop(api_tx);
    api_server_manager.await?;

    global.monitor.shutdown().await;

    info!(&log, "exiting");
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::from_args();

    match args {
        Args::Run(opt) => run_topod(opt).await,
    }
}

/// A daemon wired to mock agents, with short timeouts and no retries.
#[cfg(test)]
pub(crate) fn test_global(connector: mock::MockConnector) -> Arc<Global> {
    let log = slog::Logger::root(slog::Discard, slog::o!());
    let params = SessionParams {
        timeout: Duration::from_millis(100),
        retries: 0,
        ..Default::default()
    };
    Arc::new(Global::new(
        &log,
        Arc::new(connector),
        params,
        FallbackPolicy::Fail,
        common::DEFAULT_COMMUNITY,
    ))
}

#[cfg(test)]
mod tests {
    use protocol::Version;

    use super::test_global;
    use crate::mock::MockConnector;
    use crate::TopodError;

    #[test]
    fn test_target() {
        let g = test_global(MockConnector::new());

        let t = g.target(" 10.0.0.1 ", "private", Version::V1).unwrap();
        assert_eq!(t.host, "10.0.0.1");
        assert_eq!(t.community, "private");
        assert_eq!(t.version, Version::V1);

        let t = g.target("10.0.0.1", "", Version::V2c).unwrap();
        assert_eq!(t.community, "public");

        assert!(matches!(
            g.target("   ", "public", Version::V2c),
            Err(TopodError::InvalidHost(_))
        ));
    }
}
