// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use protocol::Version;

use crate::errors;

pub type TopodResult<T> = Result<T, errors::TopodError>;

/// A device to be polled, together with the credentials used to reach it.
/// This is also the identity of the polling session used for the device.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target {
    pub host: String,
    pub community: String,
    pub version: Version,
}

impl Target {
    pub fn new(host: &str, community: &str, version: Version) -> Self {
        Target {
            host: host.to_string(),
            community: community.to_string(),
            version,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // The community is a credential, and is left out on purpose
        write!(f, "{}/{}", self.host, self.version)
    }
}

/// Transport parameters shared by every session the daemon opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionParams {
    /// UDP port the agents listen on
    pub port: u16,
    /// Bound on a single request
    pub timeout: Duration,
    /// Number of times a timed-out or failed request is reissued
    pub retries: u32,
}

impl Default for SessionParams {
    fn default() -> Self {
        SessionParams {
            port: common::DEFAULT_SNMP_PORT,
            timeout: Duration::from_millis(5000),
            retries: 3,
        }
    }
}

/// What the daemon does when an agent cannot be reached.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FallbackPolicy {
    /// Report the failure to the caller
    #[default]
    Fail,
    /// Substitute synthesized data, flagged as such
    Synthesize,
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(FallbackPolicy::Fail),
            "synthesize" | "synth" => Ok(FallbackPolicy::Synthesize),
            _ => Err(format!("invalid fallback policy: {s}")),
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FallbackPolicy::Fail => write!(f, "fail"),
            FallbackPolicy::Synthesize => write!(f, "synthesize"),
        }
    }
}

/// Result of the narrow uptime query used by live monitoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpTime {
    /// sysUpTime, in hundredths of a second
    pub ticks: u64,
    pub synthesized: bool,
}
