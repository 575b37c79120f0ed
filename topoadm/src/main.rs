// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use anyhow::Context;
use protocol::Version;
use structopt::*;
use topod_types::api::DeviceQuery;
use topod_types::api::DiscoverRequest;
use topod_types::api::DEFAULT_MAX_HOSTS;
use topod_types::Device;
use topod_types::DiscoveryResult;
use topod_types::Interface;

mod client;
use client::Client;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "topoadm",
    about = "provides a command-line interface to the SNMP topology daemon",
    version = "0.0.1"
)]
struct GlobalOpts {
    #[structopt(short, long, help = "topology daemon's hostname or IP address")]
    host: Option<String>,

    #[structopt(help = "daemon's TCP port", short, long)]
    port: Option<u16>,

    #[structopt(subcommand)]
    cmd: Commands,
}

/// The device a command is directed at.
#[derive(Debug, StructOpt)]
struct Agent {
    /// Hostname or address of the SNMP agent
    agent: String,
    #[structopt(long, short = "c", default_value = "public")]
    community: String,
    #[structopt(long, short = "v", default_value = "2c")]
    snmp_version: Version,
}

impl From<Agent> for DeviceQuery {
    fn from(a: Agent) -> Self {
        DeviceQuery {
            host: a.agent,
            community: a.community,
            version: a.snmp_version,
        }
    }
}

#[derive(Debug, StructOpt)]
enum Commands {
    /// Print build information about the `topod` server.
    #[structopt(visible_alias = "buildinfo")]
    BuildInfo,
    /// Report whether the daemon is up, and how busy it is
    Health,
    /// List the polling sessions the daemon has open
    Sessions,
    /// Show the system group of a device
    #[structopt(visible_alias = "sys")]
    SystemInfo(Agent),
    /// Show the interfaces of a device
    #[structopt(visible_alias = "iface")]
    Interfaces(Agent),
    /// Show the LLDP neighbors a device has learned
    Lldp(Agent),
    /// Show the CDP cache of a device
    Cdp(Agent),
    /// Check that a device answers
    Test(Agent),
    /// Crawl the network outward from one or more hosts
    Discover {
        #[structopt(long, short = "c", default_value = "public")]
        community: String,
        #[structopt(long, short = "v", default_value = "2c")]
        snmp_version: Version,
        #[structopt(long, short = "m")]
        max_hosts: Option<usize>,
        #[structopt(required = true)]
        start_hosts: Vec<String>,
    },
}

// sysUpTime is in hundredths of a second
fn uptime(ticks: u64) -> String {
    let mut secs = ticks / 100;
    let mut mins = secs / 60;
    secs -= mins * 60;
    let mut hours = mins / 60;
    mins -= hours * 60;
    let days = hours / 24;
    hours -= days * 24;
    if days > 0 {
        format!("{days}d{hours}h{mins}m{secs}s")
    } else if hours > 0 {
        format!("{hours}h{mins}m{secs}s")
    } else if mins > 0 {
        format!("{mins}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

fn synth_tag(synthesized: bool) -> &'static str {
    if synthesized {
        " (synthesized)"
    } else {
        ""
    }
}

fn display_device(d: &Device) {
    println!("{}{}", d.host, synth_tag(d.synthesized));
    println!("\tName: {}", d.name);
    println!("\tDescription: {}", d.description);
    println!("\tObject ID: {}", d.object_id);
    println!("\tUp time: {}", uptime(d.up_time));
    println!("\tContact: {}", d.contact);
    println!("\tLocation: {}", d.location);
}

fn display_interfaces(interfaces: &[Interface]) {
    println!(
        "{:>6} {:<28} {:<9} {:>8} {:>7}  MAC",
        "INDEX", "DESCRIPTION", "STATUS", "SPEED", "UTIL%"
    );
    for i in interfaces {
        println!(
            "{:>6} {:<28} {:<9} {:>8} {:>7.2}  {}{}",
            i.index,
            i.description,
            i.status.to_string(),
            i.bandwidth,
            i.utilization,
            i.physical_address.as_deref().unwrap_or("-"),
            synth_tag(i.synthesized),
        );
    }
}

fn display_discovery(r: &DiscoveryResult) {
    println!("Devices:");
    for d in &r.devices {
        println!(
            "\t{:<20} {:<24} {} interfaces{}",
            d.host,
            d.name,
            d.interfaces.len(),
            synth_tag(d.synthesized)
        );
    }
    println!("Connections:");
    for c in &r.connections {
        println!(
            "\t{}:{} -> {}:{} ({}, {})",
            c.from, c.from_port, c.to, c.to_port, c.protocol, c.bandwidth
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let opts = GlobalOpts::from_args();
    let port = opts.port.unwrap_or(common::DEFAULT_TOPOD_PORT);
    let host = opts.host.unwrap_or_else(|| "localhost".to_string());
    let client = Client::new(&format!("http://{host}:{port}"));

    match opts.cmd {
        Commands::BuildInfo => {
            let info = client
                .build_info()
                .await
                .context("failed to get build information")?;
            println!("Version: {}", info.version);
        }
        Commands::Health => {
            let h = client.health().await.context("failed to get health")?;
            println!("Status: {}", h.status);
            println!("Active sessions: {}", h.active_sessions);
            println!("Active monitoring: {}", h.active_monitoring);
        }
        Commands::Sessions => {
            let list =
                client.sessions().await.context("failed to list sessions")?;
            for s in &list.sessions {
                println!("{:<24} {}", s.host, s.version);
            }
            println!("{} sessions", list.count);
        }
        Commands::SystemInfo(agent) => {
            let d = client
                .system_info(&agent.into())
                .await
                .context("failed to get system info")?;
            display_device(&d);
        }
        Commands::Interfaces(agent) => {
            let list = client
                .interfaces(&agent.into())
                .await
                .context("failed to get interfaces")?;
            display_interfaces(&list.interfaces);
        }
        Commands::Lldp(agent) => {
            let list = client
                .lldp_neighbors(&agent.into())
                .await
                .context("failed to get LLDP neighbors")?;
            for n in &list.neighbors {
                println!("On port {}{}", n.local_port, synth_tag(n.synthesized));
                println!("\tSystem Name: {}", n.sys_name);
                println!("\tChassisID: {}", n.chassis_id);
                println!("\tPortId: {}", n.port_id);
                if let Some(desc) = &n.port_description {
                    println!("\tPortDescription: {desc}");
                }
                println!("\tSystem Description: {}", n.sys_desc);
                println!("\tCapabilities Available: {:?}", n.cap_supported);
                println!("\tCapabilities Enabled: {:?}", n.cap_enabled);
            }
        }
        Commands::Cdp(agent) => {
            let list = client
                .cdp_neighbors(&agent.into())
                .await
                .context("failed to get CDP neighbors")?;
            for n in &list.neighbors {
                println!("On port {}{}", n.local_port, synth_tag(n.synthesized));
                println!("\tDevice ID: {}", n.device_id);
                println!("\tDevice Port: {}", n.device_port);
                println!("\tPlatform: {}", n.platform);
                if let Some(addr) = n.address {
                    println!("\tAddress: {addr}");
                }
            }
        }
        Commands::Test(agent) => {
            let t = client
                .test_connection(&agent.into())
                .await
                .context("failed to test connection")?;
            println!("{}: {}", t.host, t.message);
            if let Some(ticks) = t.up_time {
                println!("\tUp time: {}", uptime(ticks));
            }
            if !t.success {
                anyhow::bail!("{} is not reachable", t.host);
            }
        }
        Commands::Discover {
            community,
            snmp_version,
            max_hosts,
            start_hosts,
        } => {
            let req = DiscoverRequest {
                start_hosts,
                community,
                version: snmp_version,
                max_hosts: max_hosts.unwrap_or(DEFAULT_MAX_HOSTS),
            };
            let r = client.discover(&req).await.context("discovery failed")?;
            display_discovery(&r);
        }
    }
    Ok(())
}

#[test]
fn test_uptime() {
    assert_eq!(uptime(0), "0s");
    assert_eq!(uptime(12_345), "2m3s");
    assert_eq!(uptime(360_000), "1h0m0s");
    assert_eq!(uptime(123_456_789), "14d6h56m7s");
}
