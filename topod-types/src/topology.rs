// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::device::CdpNeighbor;
use crate::device::Device;
use crate::device::LldpNeighbor;

/// The discovery protocol a neighbor (and any link derived from it) was
/// learned through.
#[derive(
    Clone, Copy, Debug, Deserialize, JsonSchema, Serialize, PartialEq, Eq,
)]
pub enum NeighborProtocol {
    #[serde(rename = "LLDP")]
    Lldp,
    #[serde(rename = "CDP")]
    Cdp,
}

impl fmt::Display for NeighborProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NeighborProtocol::Lldp => write!(f, "LLDP"),
            NeighborProtocol::Cdp => write!(f, "CDP"),
        }
    }
}

/// A neighbor row of either protocol, as seen by code that does not care
/// which table it came from.
#[derive(Clone, Copy, Debug)]
pub enum Neighbor<'a> {
    Lldp(&'a LldpNeighbor),
    Cdp(&'a CdpNeighbor),
}

impl Neighbor<'_> {
    pub fn protocol(&self) -> NeighborProtocol {
        match self {
            Neighbor::Lldp(_) => NeighborProtocol::Lldp,
            Neighbor::Cdp(_) => NeighborProtocol::Cdp,
        }
    }

    /// The host identity under which the neighbor is polled next.
    pub fn identity(&self) -> &str {
        match self {
            Neighbor::Lldp(n) => n.sys_name.trim(),
            Neighbor::Cdp(n) => n.device_id.trim(),
        }
    }

    pub fn local_port(&self) -> u64 {
        match self {
            Neighbor::Lldp(n) => n.local_port,
            Neighbor::Cdp(n) => n.local_port,
        }
    }

    /// The neighbor's own name for the port facing us.
    pub fn remote_port(&self) -> &str {
        match self {
            Neighbor::Lldp(n) => &n.port_id,
            Neighbor::Cdp(n) => &n.device_port,
        }
    }

    /// Free text that hints at the link speed.
    pub fn description(&self) -> &str {
        match self {
            Neighbor::Lldp(n) => &n.sys_desc,
            Neighbor::Cdp(n) => &n.platform,
        }
    }
}

impl Device {
    /// All neighbors of the device, LLDP rows first.
    pub fn neighbors(&self) -> impl Iterator<Item = Neighbor<'_>> {
        self.lldp_neighbors
            .iter()
            .map(Neighbor::Lldp)
            .chain(self.cdp_neighbors.iter().map(Neighbor::Cdp))
    }
}

/// A link between two devices, derived from a neighbor row on the `from`
/// device.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from: String,
    pub to: String,
    pub from_port: u64,
    pub to_port: String,
    pub protocol: NeighborProtocol,
    pub bandwidth: String,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
pub struct DiscoveryResult {
    pub devices: Vec<Device>,
    pub connections: Vec<Connection>,
    pub timestamp: DateTime<Utc>,
}

// Checked in order; the first match wins, so faster links must precede the
// slower labels they contain ("100g" contains "10g").
const BANDWIDTH_HINTS: [(&str, &str); 6] = [
    ("100g", "100G"),
    ("40g", "40G"),
    ("10g", "10G"),
    ("1g", "1G"),
    ("100m", "100M"),
    ("10m", "10M"),
];

/// Guess the bandwidth of a link from the neighbor's description or
/// platform string.
pub fn estimate_bandwidth(description: &str) -> &'static str {
    let desc = description.to_lowercase();
    BANDWIDTH_HINTS
        .iter()
        .find(|(hint, _)| desc.contains(hint))
        .map(|(_, label)| *label)
        .unwrap_or("1G")
}
