// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Substitute data for unreachable devices.
//!
//! When the daemon runs with the `synthesize` fallback policy, a transport
//! failure on any query is replaced by records generated here.  Generation is
//! seeded from the host name, so a given host always yields the same
//! interfaces and neighbors.  Every record is marked `synthesized`.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use chrono::Utc;
use protocol::capabilities::CdpCapabilities;
use protocol::capabilities::SystemCapabilities;
use protocol::MacAddr;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use slog::o;
use slog::warn;
use tokio::time::Instant;
use topod_types::CdpNeighbor;
use topod_types::Device;
use topod_types::Interface;
use topod_types::InterfaceSource;
use topod_types::LldpNeighbor;

use crate::query::QueryService;
use crate::types::FallbackPolicy;
use crate::types::Target;
use crate::types::TopodResult;
use crate::types::UpTime;

const DEVICE_TYPES: [&str; 4] = [
    "Cisco Catalyst 2960",
    "HP ProCurve 2520",
    "Juniper EX2300",
    "Dell PowerConnect 5524",
];
const SPEEDS: [u64; 3] = [100_000_000, 1_000_000_000, 10_000_000_000];
const OBJECT_ID: &str = "1.3.6.1.4.1.9.1.716";
const SYS_DESC: &str = "Cisco IOS Software, C2960 Software \
    (C2960-LANBASEK9-M), Version 15.0(2)SE4";
const CDP_PLATFORM: &str = "cisco WS-C2960-24TC-L";
const LLDP_TTL: u16 = 120;
const PORTS: u64 = 24;
// Neighbor addresses never go past this last octet
const LAST_HOST_OCTET: u8 = 254;

// Each kind of record draws from its own stream, so that adding a field to
// one does not shift the values of another.
const SALT_DEVICE: u64 = 1;
const SALT_INTERFACES: u64 = 2;
const SALT_LLDP: u64 = 3;
const SALT_CDP: u64 = 4;
const SALT_UPTIME: u64 = 5;

/// 64-bit FNV-1a.  Unlike `std`'s default hasher this is stable across
/// builds and processes.
fn host_seed(host: &str) -> u64 {
    host.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn rng(host: &str, salt: u64) -> StdRng {
    StdRng::seed_from_u64(host_seed(host) ^ salt.rotate_left(32))
}

fn mac(rng: &mut StdRng) -> String {
    MacAddr::from(rng.gen::<u64>()).to_local_unicast().to_string()
}

fn port_name(rng: &mut StdRng) -> String {
    format!("GigabitEthernet0/{}", rng.gen_range(1..=PORTS))
}

/// Addresses for `count` neighbors of `host`: in the host's /24, each above
/// the previous one, and all above the host itself.  Hosts that are not IPv4
/// addresses are placed at the bottom of 10.0.0.0/24.  Fewer than `count`
/// addresses are returned when the subnet runs out.
fn neighbor_addrs(
    host: &str,
    count: usize,
    rng: &mut StdRng,
) -> Vec<Ipv4Addr> {
    let base = host.parse().unwrap_or(Ipv4Addr::new(10, 0, 0, 0));
    let [a, b, c, mut last] = base.octets();
    let mut addrs = Vec::with_capacity(count);
    for _ in 0..count {
        let step = rng.gen_range(1..=10u8);
        match last.checked_add(step) {
            Some(next) if next <= LAST_HOST_OCTET => {
                last = next;
                addrs.push(Ipv4Addr::new(a, b, c, last));
            }
            _ => break,
        }
    }
    addrs
}

/// Generates substitute records.
pub struct Synthesizer {
    started: Instant,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Synthesizer::new()
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        Synthesizer {
            started: Instant::now(),
        }
    }

    pub fn device(&self, host: &str) -> Device {
        let mut rng = rng(host, SALT_DEVICE);
        let kind = DEVICE_TYPES[rng.gen_range(0..DEVICE_TYPES.len())];
        let label = host.rsplit('.').next().unwrap_or(host);
        Device {
            host: host.to_string(),
            name: format!("Switch-{label}"),
            description: format!("{kind} Switch"),
            object_id: OBJECT_ID.to_string(),
            up_time: self.uptime(host).ticks,
            contact: "admin@company.com".to_string(),
            location: "Data Center Rack 1".to_string(),
            interfaces: Vec::new(),
            lldp_neighbors: Vec::new(),
            cdp_neighbors: Vec::new(),
            synthesized: true,
            timestamp: Utc::now(),
        }
    }

    /// Between 8 and 28 ethernet ports, about four in five of them up.  The
    /// octet counters are chosen to produce a spread of utilizations; the
    /// derived fields follow from them exactly as for a polled interface.
    pub fn interfaces(&self, host: &str) -> Vec<Interface> {
        let mut rng = rng(host, SALT_INTERFACES);
        let count = rng.gen_range(8..=28u64);
        (1..=count)
            .map(|index| {
                let up = rng.gen_bool(0.8);
                let speed = SPEEDS[rng.gen_range(0..SPEEDS.len())];
                let percent = if up { rng.gen_range(0..100u64) } else { 0 };
                // octets * 8 / speed * 100 == percent, split across in/out
                let octets = speed / 800 * percent;
                Interface::from(InterfaceSource {
                    index,
                    description: format!("GigabitEthernet0/{index}"),
                    if_type: Some(6),
                    mtu: Some(1500),
                    speed,
                    physical_address: Some(mac(&mut rng)),
                    admin_status: Some(1),
                    oper_status: Some(if up { 1 } else { 2 }),
                    in_octets: octets / 2,
                    out_octets: octets - octets / 2,
                    synthesized: true,
                })
            })
            .collect()
    }

    pub fn lldp_neighbors(&self, host: &str) -> Vec<LldpNeighbor> {
        let mut rng = rng(host, SALT_LLDP);
        let count = rng.gen_range(1..=5);
        neighbor_addrs(host, count, &mut rng)
            .into_iter()
            .map(|addr| LldpNeighbor {
                local_port: rng.gen_range(1..=PORTS),
                remote_port: rng.gen_range(1..=PORTS),
                ttl: Some(LLDP_TTL),
                chassis_id: mac(&mut rng),
                port_id: port_name(&mut rng),
                port_description: None,
                sys_name: addr.to_string(),
                sys_desc: SYS_DESC.to_string(),
                cap_supported: vec![SystemCapabilities::MacBridgeComponent],
                cap_enabled: vec![SystemCapabilities::MacBridgeComponent],
                synthesized: true,
            })
            .collect()
    }

    pub fn cdp_neighbors(&self, host: &str) -> Vec<CdpNeighbor> {
        let mut rng = rng(host, SALT_CDP);
        let count = rng.gen_range(1..=3);
        neighbor_addrs(host, count, &mut rng)
            .into_iter()
            .map(|addr| CdpNeighbor {
                local_port: rng.gen_range(1..=PORTS),
                remote_port: rng.gen_range(1..=PORTS),
                device_id: addr.to_string(),
                device_port: port_name(&mut rng),
                platform: CDP_PLATFORM.to_string(),
                address: Some(addr),
                version: None,
                capabilities: vec![CdpCapabilities::TransparentBridge],
                vtp_domain: String::new(),
                native_vlan: Some(1),
                synthesized: true,
            })
            .collect()
    }

    /// A host-seeded boot time, advancing with the daemon's own clock so
    /// that successive polls see the device stay up.
    pub fn uptime(&self, host: &str) -> UpTime {
        let mut rng = rng(host, SALT_UPTIME);
        let base: u64 = rng.gen_range(100_000..100_000_000);
        let elapsed = self.started.elapsed().as_millis() as u64 / 10;
        UpTime {
            ticks: base + elapsed,
            synthesized: true,
        }
    }
}

/// Applies the fallback policy around another query service.
pub struct WithFallback<Q> {
    log: slog::Logger,
    inner: Q,
    policy: FallbackPolicy,
    synth: Synthesizer,
}

impl<Q: QueryService> WithFallback<Q> {
    pub fn new(log: &slog::Logger, inner: Q, policy: FallbackPolicy) -> Self {
        WithFallback {
            log: log.new(o!("unit" => "fallback")),
            inner,
            policy,
            synth: Synthesizer::new(),
        }
    }

    // Only transport failures are replaced.  Session errors, such as a host
    // that does not resolve, always reach the caller.
    fn recover<T>(
        &self,
        target: &Target,
        op: &str,
        result: TopodResult<T>,
        synthesize: impl FnOnce(&Synthesizer, &str) -> T,
    ) -> TopodResult<T> {
        match result {
            Err(e)
                if e.is_transport()
                    && self.policy == FallbackPolicy::Synthesize =>
            {
                warn!(self.log, "{op} failed, using substitute data: {e}";
                    "host" => &target.host,
                    "synthesized" => true);
                Ok(synthesize(&self.synth, &target.host))
            }
            r => r,
        }
    }
}

#[async_trait]
impl<Q: QueryService> QueryService for WithFallback<Q> {
    async fn system_info(&self, target: &Target) -> TopodResult<Device> {
        let r = self.inner.system_info(target).await;
        self.recover(target, "system_info", r, Synthesizer::device)
    }

    async fn interfaces(&self, target: &Target) -> TopodResult<Vec<Interface>> {
        let r = self.inner.interfaces(target).await;
        self.recover(target, "interfaces", r, Synthesizer::interfaces)
    }

    async fn lldp_neighbors(
        &self,
        target: &Target,
    ) -> TopodResult<Vec<LldpNeighbor>> {
        let r = self.inner.lldp_neighbors(target).await;
        self.recover(target, "lldp_neighbors", r, Synthesizer::lldp_neighbors)
    }

    async fn cdp_neighbors(
        &self,
        target: &Target,
    ) -> TopodResult<Vec<CdpNeighbor>> {
        let r = self.inner.cdp_neighbors(target).await;
        self.recover(target, "cdp_neighbors", r, Synthesizer::cdp_neighbors)
    }

    async fn uptime(&self, target: &Target) -> TopodResult<UpTime> {
        let r = self.inner.uptime(target).await;
        self.recover(target, "uptime", r, Synthesizer::uptime)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use protocol::Version;
    use topod_types::device::bandwidth_label;
    use topod_types::device::link_status;
    use topod_types::device::utilization;
    use topod_types::LinkStatus;

    use super::*;
    use crate::errors::TopodError;
    use crate::mock::MockAgent;
    use crate::mock::MockConnector;
    use crate::query::SnmpQueryService;
    use crate::session::SessionRegistry;
    use crate::types::SessionParams;

    fn service(
        connector: MockConnector,
        policy: FallbackPolicy,
    ) -> WithFallback<SnmpQueryService> {
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
        WithFallback::new(&log, SnmpQueryService::new(&log, sessions), policy)
    }

    fn dead_agent(host: &str) -> MockConnector {
        let connector = MockConnector::new();
        let agent = MockAgent::switch(host);
        agent.set_unresponsive(true);
        connector.add_agent(host, agent);
        connector
    }

    #[test]
    fn test_deterministic() {
        let s = Synthesizer::new();
        assert_eq!(s.interfaces("10.1.1.1"), s.interfaces("10.1.1.1"));
        assert_eq!(s.lldp_neighbors("10.1.1.1"), s.lldp_neighbors("10.1.1.1"));
        assert_eq!(s.cdp_neighbors("10.1.1.1"), s.cdp_neighbors("10.1.1.1"));
        assert_eq!(s.device("sw1").description, s.device("sw1").description);

        // A fresh synthesizer produces the same records
        let t = Synthesizer::new();
        assert_eq!(s.interfaces("sw1"), t.interfaces("sw1"));
    }

    #[test]
    fn test_interface_shape() {
        let s = Synthesizer::new();
        for host in ["10.1.1.1", "192.168.0.7", "core-sw"] {
            let ifaces = s.interfaces(host);
            assert!((8..=28).contains(&ifaces.len()), "{host}");
            for (i, iface) in ifaces.iter().enumerate() {
                assert_eq!(iface.index, i as u64 + 1);
                assert!(iface.synthesized);
                assert!(SPEEDS.contains(&iface.speed));
                // Derived fields obey the same rules as polled ones
                assert_eq!(
                    iface.status,
                    link_status(iface.admin_status, iface.oper_status)
                );
                assert_eq!(iface.bandwidth, bandwidth_label(iface.speed));
                assert_eq!(
                    iface.utilization,
                    utilization(iface.in_octets, iface.out_octets, iface.speed)
                );
                assert!((0.0..=100.0).contains(&iface.utilization));
            }
        }
    }

    #[test]
    fn test_neighbor_addresses() {
        let s = Synthesizer::new();
        let lldp = s.lldp_neighbors("10.1.1.20");
        assert!(!lldp.is_empty() && lldp.len() <= 5);
        let mut last = 20;
        for n in &lldp {
            let addr: Ipv4Addr = n.sys_name.parse().unwrap();
            let [a, b, c, d] = addr.octets();
            assert_eq!([a, b, c], [10, 1, 1]);
            assert!(d > last);
            last = d;
            assert!(n.synthesized);
            assert_eq!(n.ttl, Some(LLDP_TTL));
        }

        let cdp = s.cdp_neighbors("core-sw");
        assert!(!cdp.is_empty() && cdp.len() <= 3);
        for n in &cdp {
            assert!(n.device_id.starts_with("10.0.0."));
            assert_eq!(n.platform, CDP_PLATFORM);
        }

        // The top of the subnet has no room for neighbors
        assert!(s.lldp_neighbors("10.1.1.254").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesize_on_failure() {
        let svc = service(dead_agent("10.9.9.9"), FallbackPolicy::Synthesize);
        let t = Target::new("10.9.9.9", "public", Version::V2c);

        let ifaces = svc.interfaces(&t).await.unwrap();
        assert!(!ifaces.is_empty());
        for i in &ifaces {
            assert!(i.synthesized);
            assert!(
                matches!(i.status, LinkStatus::Up | LinkStatus::Down),
                "{}: {}",
                i.index,
                i.status
            );
            assert!(!i.bandwidth.is_empty(), "{}", i.index);
        }

        let d = svc.system_info(&t).await.unwrap();
        assert!(d.synthesized);
        assert_eq!(d.name, "Switch-9");

        let up = svc.uptime(&t).await.unwrap();
        assert!(up.synthesized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_policy() {
        let svc = service(dead_agent("10.9.9.9"), FallbackPolicy::Fail);
        let t = Target::new("10.9.9.9", "public", Version::V2c);
        let err = svc.interfaces(&t).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_session_errors_not_absorbed() {
        let svc = service(MockConnector::new(), FallbackPolicy::Synthesize);
        let t = Target::new("no.such.host", "public", Version::V2c);
        let err = svc.system_info(&t).await.unwrap_err();
        assert!(matches!(err, TopodError::InvalidHost(_)));
    }

    #[tokio::test]
    async fn test_live_data_untouched() {
        let connector = MockConnector::new();
        let agent = MockAgent::switch("sw1");
        agent.add_interface(1, "eth0", 1_000_000_000, 1, 1);
        connector.add_agent("sw1", agent);
        let svc = service(connector, FallbackPolicy::Synthesize);
        let t = Target::new("sw1", "public", Version::V2c);

        let ifaces = svc.interfaces(&t).await.unwrap();
        assert_eq!(ifaces.len(), 1);
        assert!(!ifaces[0].synthesized);
    }
}
