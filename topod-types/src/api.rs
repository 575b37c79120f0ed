// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Request and response bodies of the daemon's HTTP API.

use chrono::DateTime;
use chrono::Utc;
use protocol::Version;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::device::CdpNeighbor;
use crate::device::Interface;
use crate::device::LldpNeighbor;

/// Upper bound on the number of hosts one discovery request will poll.
pub const DEFAULT_MAX_HOSTS: usize = 256;

fn default_community() -> String {
    "public".to_string()
}

fn default_max_hosts() -> usize {
    DEFAULT_MAX_HOSTS
}

/// Identifies the device a query is directed at, and the credentials used to
/// reach it.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq, Eq)]
pub struct DeviceQuery {
    pub host: String,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default)]
    pub version: Version,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
pub struct InterfaceList {
    pub host: String,
    pub interfaces: Vec<Interface>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
pub struct LldpNeighborList {
    pub host: String,
    pub neighbors: Vec<LldpNeighbor>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
pub struct CdpNeighborList {
    pub host: String,
    pub neighbors: Vec<CdpNeighbor>,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a single uptime poll used to check reachability.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTest {
    pub success: bool,
    pub host: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_time: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverRequest {
    pub start_hosts: Vec<String>,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default)]
    pub version: Version,
    #[serde(default = "default_max_hosts")]
    pub max_hosts: usize,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub active_sessions: usize,
    pub active_monitoring: usize,
}

/// A polling session known to the daemon.  The community string is
/// deliberately absent.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub host: String,
    pub version: Version,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq)]
pub struct SessionList {
    pub sessions: Vec<SessionInfo>,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
}
