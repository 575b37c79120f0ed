// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::fmt;
use std::net::Ipv4Addr;

use chrono::DateTime;
use chrono::Utc;
use protocol::capabilities::CdpCapabilities;
use protocol::capabilities::SystemCapabilities;
use protocol::mib::IF_STATUS_DOWN;
use protocol::mib::IF_STATUS_UP;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// A snapshot of one managed device.  Each query produces a new snapshot;
/// callers replace earlier ones rather than patching them.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Address or name the device was polled at.
    pub host: String,
    pub name: String,
    pub description: String,
    pub object_id: String,
    /// sysUpTime, in hundredths of a second
    pub up_time: u64,
    pub contact: String,
    pub location: String,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub lldp_neighbors: Vec<LldpNeighbor>,
    #[serde(default)]
    pub cdp_neighbors: Vec<CdpNeighbor>,
    /// Set when the system information was produced by the fallback
    /// synthesizer rather than read from the device.
    #[serde(default)]
    pub synthesized: bool,
    pub timestamp: DateTime<Utc>,
}

/// Operational summary of an interface, derived from its administrative and
/// operational status.
#[derive(
    Clone, Copy, Debug, Deserialize, JsonSchema, Serialize, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Up,
    Down,
    Disabled,
    Unknown,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LinkStatus::Up => "up",
            LinkStatus::Down => "down",
            LinkStatus::Disabled => "disabled",
            LinkStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Map (ifAdminStatus, ifOperStatus) to a link status.
pub fn link_status(admin: Option<i64>, oper: Option<i64>) -> LinkStatus {
    match admin {
        Some(IF_STATUS_UP) if oper == Some(IF_STATUS_UP) => LinkStatus::Up,
        Some(IF_STATUS_UP) => LinkStatus::Down,
        Some(IF_STATUS_DOWN) => LinkStatus::Disabled,
        _ => LinkStatus::Unknown,
    }
}

/// Render a speed in bits per second as a short label, e.g. "10G" or
/// "1.5M".  The division is exact, not rounded.
pub fn bandwidth_label(speed: u64) -> String {
    let s = speed as f64;
    if s >= 1e9 {
        format!("{}G", s / 1e9)
    } else if s >= 1e6 {
        format!("{}M", s / 1e6)
    } else if s >= 1e3 {
        format!("{}K", s / 1e3)
    } else {
        format!("{speed}bps")
    }
}

/// Percentage of `speed` represented by the octet counters, capped at 100.
/// An interface with no known speed reports 0.
pub fn utilization(in_octets: u64, out_octets: u64, speed: u64) -> f64 {
    if speed == 0 {
        return 0.0;
    }
    let bits = (in_octets as f64 + out_octets as f64) * 8.0;
    (bits / speed as f64 * 100.0).min(100.0)
}

/// The polled fields of one interface row, before any derived values are
/// computed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InterfaceSource {
    pub index: u64,
    pub description: String,
    pub if_type: Option<i64>,
    pub mtu: Option<i64>,
    pub speed: u64,
    pub physical_address: Option<String>,
    pub admin_status: Option<i64>,
    pub oper_status: Option<i64>,
    pub in_octets: u64,
    pub out_octets: u64,
    pub synthesized: bool,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    /// ifIndex: the trailing index of the interface table row
    pub index: u64,
    pub description: String,
    #[serde(rename = "type")]
    pub if_type: Option<i64>,
    pub mtu: Option<i64>,
    /// bits per second
    pub speed: u64,
    pub physical_address: Option<String>,
    pub admin_status: Option<i64>,
    pub oper_status: Option<i64>,
    pub in_octets: u64,
    pub out_octets: u64,
    pub status: LinkStatus,
    pub bandwidth: String,
    pub utilization: f64,
    #[serde(default)]
    pub synthesized: bool,
}

impl From<InterfaceSource> for Interface {
    fn from(src: InterfaceSource) -> Interface {
        Interface {
            status: link_status(src.admin_status, src.oper_status),
            bandwidth: bandwidth_label(src.speed),
            utilization: utilization(src.in_octets, src.out_octets, src.speed),
            index: src.index,
            description: src.description,
            if_type: src.if_type,
            mtu: src.mtu,
            speed: src.speed,
            physical_address: src.physical_address,
            admin_status: src.admin_status,
            oper_status: src.oper_status,
            in_octets: src.in_octets,
            out_octets: src.out_octets,
            synthesized: src.synthesized,
        }
    }
}

/// A remote system listed in a device's LLDP remote table.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LldpNeighbor {
    /// lldpRemLocalPortNum: the local port the neighbor was heard on
    pub local_port: u64,
    /// lldpRemIndex: the agent's identifier for this remote entry
    pub remote_port: u64,
    /// Advertised hold time, when known
    pub ttl: Option<u16>,
    pub chassis_id: String,
    pub port_id: String,
    pub port_description: Option<String>,
    pub sys_name: String,
    pub sys_desc: String,
    pub cap_supported: Vec<SystemCapabilities>,
    pub cap_enabled: Vec<SystemCapabilities>,
    #[serde(default)]
    pub synthesized: bool,
}

/// A remote system listed in a device's CDP cache.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CdpNeighbor {
    /// cdpCacheIfIndex: the local interface the neighbor was heard on
    pub local_port: u64,
    /// cdpCacheDeviceIndex
    pub remote_port: u64,
    pub device_id: String,
    pub device_port: String,
    pub platform: String,
    pub address: Option<Ipv4Addr>,
    pub version: Option<String>,
    pub capabilities: Vec<CdpCapabilities>,
    pub vtp_domain: String,
    pub native_vlan: Option<i64>,
    #[serde(default)]
    pub synthesized: bool,
}
