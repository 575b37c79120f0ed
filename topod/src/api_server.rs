// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! topod HTTP API endpoint functions.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use dropshot::channel;
use dropshot::endpoint;
use dropshot::HttpError;
use dropshot::HttpResponseOk;
use dropshot::RequestContext;
use dropshot::TypedBody;
use dropshot::WebsocketChannelResult;
use dropshot::WebsocketConnection;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use topod_types::api::BuildInfo;
use topod_types::api::CdpNeighborList;
use topod_types::api::ConnectionTest;
use topod_types::api::DeviceQuery;
use topod_types::api::DiscoverRequest;
use topod_types::api::Health;
use topod_types::api::InterfaceList;
use topod_types::api::LldpNeighborList;
use topod_types::api::SessionInfo;
use topod_types::api::SessionList;
use topod_types::Device;
use topod_types::DiscoveryResult;

use crate::types::Target;
use crate::Global;
use crate::TopodError;
use crate::TopodResult;

type ApiServer = dropshot::HttpServer<Arc<Global>>;

fn build_version() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn query_target(global: &Global, q: &DeviceQuery) -> TopodResult<Target> {
    global.target(&q.host, &q.community, q.version)
}

/// Return the system group of a device
#[endpoint {
    method = POST,
    path = "/api/snmp/system-info",
}]
async fn system_info(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<DeviceQuery>,
) -> Result<HttpResponseOk<Device>, HttpError> {
    let global: &Global = rqctx.context();
    let target = query_target(global, &body.into_inner())?;
    debug!(global.log, "system-info"; "host" => &target.host);
    let device = global.query.system_info(&target).await?;
    Ok(HttpResponseOk(device))
}

/// Return the interface table of a device
#[endpoint {
    method = POST,
    path = "/api/snmp/interfaces",
}]
async fn interfaces(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<DeviceQuery>,
) -> Result<HttpResponseOk<InterfaceList>, HttpError> {
    let global: &Global = rqctx.context();
    let target = query_target(global, &body.into_inner())?;
    debug!(global.log, "interfaces"; "host" => &target.host);
    let ifaces = global.query.interfaces(&target).await?;
    Ok(HttpResponseOk(InterfaceList {
        host: target.host,
        interfaces: ifaces,
        timestamp: Utc::now(),
    }))
}

/// Return the LLDP neighbors a device has learned
#[endpoint {
    method = POST,
    path = "/api/snmp/lldp-neighbors",
}]
async fn lldp_neighbors(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<DeviceQuery>,
) -> Result<HttpResponseOk<LldpNeighborList>, HttpError> {
    let global: &Global = rqctx.context();
    let target = query_target(global, &body.into_inner())?;
    debug!(global.log, "lldp-neighbors"; "host" => &target.host);
    let neighbors = global.query.lldp_neighbors(&target).await?;
    Ok(HttpResponseOk(LldpNeighborList {
        host: target.host,
        neighbors,
        timestamp: Utc::now(),
    }))
}

/// Return the CDP cache of a device
#[endpoint {
    method = POST,
    path = "/api/snmp/cdp-neighbors",
}]
async fn cdp_neighbors(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<DeviceQuery>,
) -> Result<HttpResponseOk<CdpNeighborList>, HttpError> {
    let global: &Global = rqctx.context();
    let target = query_target(global, &body.into_inner())?;
    debug!(global.log, "cdp-neighbors"; "host" => &target.host);
    let neighbors = global.query.cdp_neighbors(&target).await?;
    Ok(HttpResponseOk(CdpNeighborList {
        host: target.host,
        neighbors,
        timestamp: Utc::now(),
    }))
}

/// Check that a device answers, by reading its uptime.  A device that does
/// not answer is reported in the body, not as an HTTP error.
#[endpoint {
    method = POST,
    path = "/api/snmp/test-connection",
}]
async fn test_connection(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<DeviceQuery>,
) -> Result<HttpResponseOk<ConnectionTest>, HttpError> {
    let global: &Global = rqctx.context();
    let target = query_target(global, &body.into_inner())?;
    Ok(HttpResponseOk(connection_test(global, target).await))
}

async fn connection_test(global: &Global, target: Target) -> ConnectionTest {
    let (success, message, up_time) = match global.query.uptime(&target).await
    {
        Ok(up) if up.synthesized => (
            true,
            "Agent unreachable, reporting synthesized data".to_string(),
            Some(up.ticks),
        ),
        Ok(up) => (true, "Connection successful".to_string(), Some(up.ticks)),
        Err(e) => (false, e.to_string(), None),
    };
    ConnectionTest {
        success,
        host: target.host,
        message,
        up_time,
        timestamp: Utc::now(),
    }
}

/// Crawl the network outward from a set of starting hosts, following LLDP
/// and CDP neighbors
#[endpoint {
    method = POST,
    path = "/api/snmp/discover",
}]
async fn discover(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<DiscoverRequest>,
) -> Result<HttpResponseOk<DiscoveryResult>, HttpError> {
    let global: &Global = rqctx.context();
    let req = body.into_inner();
    let start_hosts = start_hosts(&req)?;
    let community = match req.community.as_str() {
        "" => global.community.as_str(),
        c => c,
    };
    let result = global
        .crawler
        .discover(&start_hosts, community, req.version, req.max_hosts)
        .await;
    Ok(HttpResponseOk(result))
}

fn start_hosts(req: &DiscoverRequest) -> TopodResult<Vec<String>> {
    let hosts: Vec<String> = req
        .start_hosts
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .map(String::from)
        .collect();
    if hosts.is_empty() {
        return Err(TopodError::Invalid(
            "at least one start host is required".to_string(),
        ));
    }
    if req.max_hosts == 0 {
        return Err(TopodError::Invalid(
            "maxHosts must be at least 1".to_string(),
        ));
    }
    Ok(hosts)
}

/// Liveness check
#[endpoint {
    method = GET,
    path = "/api/health",
}]
async fn health(
    rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseOk<Health>, HttpError> {
    let global: &Global = rqctx.context();
    Ok(HttpResponseOk(Health {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        active_sessions: global.sessions.len(),
        active_monitoring: global.monitor.len(),
    }))
}

/// Return the polling sessions currently open
#[endpoint {
    method = GET,
    path = "/api/sessions",
}]
async fn sessions(
    rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseOk<SessionList>, HttpError> {
    let global: &Global = rqctx.context();
    Ok(HttpResponseOk(session_list(global)))
}

fn session_list(global: &Global) -> SessionList {
    let open: Vec<SessionInfo> = global
        .sessions
        .keys()
        .into_iter()
        .map(|t| SessionInfo {
            host: t.host,
            version: t.version,
        })
        .collect();
    SessionList {
        count: open.len(),
        sessions: open,
        timestamp: Utc::now(),
    }
}

/// Return build information about the `topod` server itself.
#[endpoint {
    method = GET,
    path = "/build-info",
}]
async fn build_info(
    _rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseOk<BuildInfo>, HttpError> {
    Ok(HttpResponseOk(build_version()))
}

/// Live uptime monitoring
#[channel {
    protocol = WEBSOCKETS,
    path = "/snmp",
}]
async fn snmp_channel(
    rqctx: RequestContext<Arc<Global>>,
    upgraded: WebsocketConnection,
) -> WebsocketChannelResult {
    let global = rqctx.context().clone();
    let ws = WebSocketStream::from_raw_socket(
        upgraded.into_inner(),
        Role::Server,
        None,
    )
    .await;
    crate::channel::serve(global, ws).await;
    Ok(())
}

fn launch_server(
    global: Arc<Global>,
    addr: &SocketAddr,
) -> anyhow::Result<ApiServer> {
    let config_dropshot = dropshot::ConfigDropshot {
        bind_address: *addr,
        request_body_max_bytes: 10240,
        default_handler_task_mode: dropshot::HandlerTaskMode::Detached,
    };
    let log = global.log.new(o!("unit" => "api-server"));

    info!(log, "starting api server on {addr}");
    dropshot::HttpServerStarter::new(
        &config_dropshot,
        http_api(),
        global.clone(),
        &log,
    )
    .map(|s| s.start())
    .map_err(|e| anyhow::anyhow!(e.to_string()))
}

/// Run the API server until the sending side of `shutdown_rx` is dropped.
pub async fn api_server_manager(
    addr: SocketAddr,
    global: Arc<Global>,
    mut shutdown_rx: tokio::sync::watch::Receiver<()>,
) {
    let log = global.log.new(o!("unit" => "api-server-manager"));
    let server = match launch_server(global.clone(), &addr) {
        Ok(s) => s,
        Err(e) => {
            error!(log, "failed to launch api server on {addr}: {e:?}");
            return;
        }
    };

    // When the tx side is dropped, changed() returns an error, telling us
    // that it is time to exit.
    while shutdown_rx.changed().await.is_ok() {}

    info!(log, "closing api server on {addr}");
    if let Err(e) = server.close().await {
        error!(log, "error closing api server on {addr}: {e:?}");
    }
}

pub fn http_api() -> dropshot::ApiDescription<Arc<Global>> {
    let mut api = dropshot::ApiDescription::new();

    api.register(build_info).unwrap();
    api.register(system_info).unwrap();
    api.register(interfaces).unwrap();
    api.register(lldp_neighbors).unwrap();
    api.register(cdp_neighbors).unwrap();
    api.register(test_connection).unwrap();
    api.register(discover).unwrap();
    api.register(health).unwrap();
    api.register(sessions).unwrap();
    api.register(snmp_channel).unwrap();

    api
}
