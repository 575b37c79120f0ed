// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Breadth-first topology discovery.

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use protocol::Version;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use slog::warn;
use topod_types::topology::estimate_bandwidth;
use topod_types::Connection;
use topod_types::Device;
use topod_types::DiscoveryResult;

use crate::query::QueryService;
use crate::types::Target;
use crate::types::TopodResult;

pub struct Crawler {
    log: slog::Logger,
    query: Arc<dyn QueryService>,
}

impl Crawler {
    pub fn new(log: &slog::Logger, query: Arc<dyn QueryService>) -> Self {
        Crawler {
            log: log.new(o!("unit" => "crawler")),
            query,
        }
    }

    // Poll everything we know how to ask a device about, in a fixed order.
    async fn poll(&self, target: &Target) -> TopodResult<Device> {
        let mut device = self.query.system_info(target).await?;
        device.interfaces = self.query.interfaces(target).await?;
        device.lldp_neighbors = self.query.lldp_neighbors(target).await?;
        device.cdp_neighbors = self.query.cdp_neighbors(target).await?;
        Ok(device)
    }

    /// Starting from `start_hosts`, poll each host and follow its LLDP and
    /// CDP neighbors until no unvisited hosts remain, or `max_hosts` have
    /// been polled.  Hosts are polled one at a time, in the order they were
    /// found.  A host that cannot be polled is logged and left out of the
    /// result; the crawl carries on without it.
    pub async fn discover(
        &self,
        start_hosts: &[String],
        community: &str,
        version: Version,
        max_hosts: usize,
    ) -> DiscoveryResult {
        let mut queue: VecDeque<String> = start_hosts.iter().cloned().collect();
        let mut visited = BTreeSet::new();
        let mut devices = Vec::new();
        let mut connections = Vec::new();

        info!(self.log, "starting discovery";
            "start_hosts" => start_hosts.join(","),
            "max_hosts" => max_hosts);

        while let Some(host) = queue.pop_front() {
            if visited.contains(&host) {
                continue;
            }
            if visited.len() >= max_hosts {
                warn!(self.log, "host limit reached, stopping discovery";
                    "max_hosts" => max_hosts,
                    "unvisited" => queue.len() + 1);
                break;
            }
            visited.insert(host.clone());

            let target = Target::new(&host, community, version);
            let device = match self.poll(&target).await {
                Ok(d) => d,
                Err(e) => {
                    error!(self.log, "failed to poll device: {e}";
                        "host" => &host);
                    continue;
                }
            };

            for n in device.neighbors() {
                let identity = n.identity();
                if identity.is_empty() || visited.contains(identity) {
                    continue;
                }
                queue.push_back(identity.to_string());
                connections.push(Connection {
                    from: host.clone(),
                    to: identity.to_string(),
                    from_port: n.local_port(),
                    to_port: n.remote_port().to_string(),
                    protocol: n.protocol(),
                    bandwidth: estimate_bandwidth(n.description()).to_string(),
                });
            }
            debug!(self.log, "polled device";
                "host" => &host,
                "interfaces" => device.interfaces.len(),
                "neighbors" => device.neighbors().count());
            devices.push(device);
        }

        info!(self.log, "discovery complete";
            "devices" => devices.len(),
            "connections" => connections.len());
        DiscoveryResult {
            devices,
            connections,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use protocol::mib::SystemObject;
    use protocol::Version;
    use topod_types::NeighborProtocol;

    use super::Crawler;
    use crate::fallback::WithFallback;
    use crate::mock::MockAgent;
    use crate::mock::MockConnector;
    use crate::query::SnmpQueryService;
    use crate::session::SessionRegistry;
    use crate::types::FallbackPolicy;
    use crate::types::SessionParams;

    fn crawler(connector: MockConnector, policy: FallbackPolicy) -> Crawler {
        let log = slog::Logger::root(slog::Discard, slog::o!());
        let params = SessionParams {
            timeout: Duration::from_millis(100),
            retries: 0,
            ..Default::default()
        };
        let sessions = Arc::new(SessionRegistry::new(
            &log,
            Arc::new(connector),
            params,
        ));
        let query = SnmpQueryService::new(&log, sessions);
        Crawler::new(&log, Arc::new(WithFallback::new(&log, query, policy)))
    }

    fn hosts(h: &[&str]) -> Vec<String> {
        h.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_single_edge() {
        let connector = MockConnector::new();
        let a = MockAgent::switch("A");
        a.add_lldp_neighbor(3, 1, "B", "Gi0/1", "Cisco 10G uplink");
        connector.add_agent("A", a);
        connector.add_agent("B", MockAgent::switch("B"));
        let c = crawler(connector, FallbackPolicy::Fail);

        let r = c.discover(&hosts(&["A"]), "public", Version::V2c, 256).await;
        let names: Vec<_> = r.devices.iter().map(|d| d.host.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(r.connections.len(), 1);
        let conn = &r.connections[0];
        assert_eq!(conn.from, "A");
        assert_eq!(conn.to, "B");
        assert_eq!(conn.from_port, 3);
        assert_eq!(conn.to_port, "Gi0/1");
        assert_eq!(conn.protocol, NeighborProtocol::Lldp);
        assert_eq!(conn.bandwidth, "10G");
    }

    #[tokio::test]
    async fn test_cycle() {
        // A -> B -> C -> A, with B also reporting A over CDP
        let connector = MockConnector::new();
        let a = MockAgent::switch("A");
        a.add_lldp_neighbor(1, 1, "B", "p1", "");
        let b = MockAgent::switch("B");
        b.add_lldp_neighbor(1, 1, "C", "p1", "");
        b.add_cdp_neighbor(2, 1, "A", "p2", "cisco WS-C3850 100M");
        let c = MockAgent::switch("C");
        c.add_lldp_neighbor(1, 1, "A", "p1", "");
        connector.add_agent("A", a.clone());
        connector.add_agent("B", b.clone());
        connector.add_agent("C", c.clone());
        let crawler = crawler(connector, FallbackPolicy::Fail);

        let r = crawler
            .discover(&hosts(&["A"]), "public", Version::V2c, 256)
            .await;
        let names: Vec<_> = r.devices.iter().map(|d| d.host.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        // Edges back to an already visited host are not recorded
        let edges: Vec<_> = r
            .connections
            .iter()
            .map(|c| (c.from.as_str(), c.to.as_str()))
            .collect();
        assert_eq!(edges, vec![("A", "B"), ("B", "C")]);

        // Each host's system group was fetched exactly once
        let name = SystemObject::Name.oid();
        assert_eq!(a.reads(&name), 1);
        assert_eq!(b.reads(&name), 1);
        assert_eq!(c.reads(&name), 1);
    }

    #[tokio::test]
    async fn test_duplicate_start_hosts() {
        let connector = MockConnector::new();
        connector.add_agent("A", MockAgent::switch("A"));
        let c = crawler(connector, FallbackPolicy::Fail);

        let r = c
            .discover(&hosts(&["A", "A"]), "public", Version::V2c, 256)
            .await;
        assert_eq!(r.devices.len(), 1);
        assert!(r.connections.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_host_skipped() {
        // B is unreachable, C does not resolve; A is still reported
        let connector = MockConnector::new();
        let a = MockAgent::switch("A");
        a.add_lldp_neighbor(1, 1, "B", "p1", "");
        a.add_cdp_neighbor(2, 1, "C", "p2", "");
        let b = MockAgent::switch("B");
        b.set_unresponsive(true);
        connector.add_agent("A", a);
        connector.add_agent("B", b);
        let c = crawler(connector, FallbackPolicy::Fail);

        let r = c.discover(&hosts(&["A"]), "public", Version::V2c, 256).await;
        assert_eq!(r.devices.len(), 1);
        assert_eq!(r.devices[0].host, "A");
        // The edges were found on A, so they are kept
        assert_eq!(r.connections.len(), 2);
        assert_eq!(r.connections[1].protocol, NeighborProtocol::Cdp);
    }

    #[tokio::test]
    async fn test_empty_identity() {
        let connector = MockConnector::new();
        let a = MockAgent::switch("A");
        a.add_lldp_neighbor(1, 1, "  ", "p1", "");
        connector.add_agent("A", a);
        let c = crawler(connector, FallbackPolicy::Fail);

        let r = c.discover(&hosts(&["A"]), "public", Version::V2c, 256).await;
        assert_eq!(r.devices.len(), 1);
        assert!(r.connections.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesized_crawl_terminates() {
        // Nothing answers; every device comes from the synthesizer
        let c = crawler(MockConnector::new(), FallbackPolicy::Synthesize);
        let r = c
            .discover(&hosts(&["10.20.30.200"]), "public", Version::V2c, 256)
            .await;
        // Session creation fails for unknown hosts, which is not absorbed
        assert!(r.devices.is_empty());

        let connector = MockConnector::new();
        for last in 200..=254u8 {
            let host = format!("10.20.30.{last}");
            let agent = MockAgent::switch(&host);
            agent.set_unresponsive(true);
            connector.add_agent(&host, agent);
        }
        let c = crawler(connector, FallbackPolicy::Synthesize);
        let r = c
            .discover(&hosts(&["10.20.30.200"]), "public", Version::V2c, 256)
            .await;
        assert!(!r.devices.is_empty());
        assert!(r.devices.iter().all(|d| d.synthesized));
        assert!(r.devices.len() <= 55);
        for conn in &r.connections {
            let from: std::net::Ipv4Addr = conn.from.parse().unwrap();
            let to: std::net::Ipv4Addr = conn.to.parse().unwrap();
            assert!(to > from);
        }
    }

    #[tokio::test]
    async fn test_max_hosts() {
        let connector = MockConnector::new();
        for i in 0..10 {
            let agent = MockAgent::switch(&format!("h{i}"));
            agent.add_lldp_neighbor(1, 1, &format!("h{}", i + 1), "p", "");
            connector.add_agent(&format!("h{i}"), agent);
        }
        let c = crawler(connector, FallbackPolicy::Fail);
        let r = c.discover(&hosts(&["h0"]), "public", Version::V2c, 3).await;
        assert_eq!(r.devices.len(), 3);
    }
}
