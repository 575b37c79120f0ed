// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Messages carried over the live-monitoring websocket.

use chrono::DateTime;
use chrono::Utc;
use protocol::Version;
use serde::Deserialize;
use serde::Serialize;

/// Polling interval used when a client does not ask for one.
pub const DEFAULT_INTERVAL_MS: u64 = 5000;

fn default_community() -> String {
    "public".to_string()
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartMonitoring {
        host: String,
        #[serde(default = "default_community")]
        community: String,
        #[serde(default)]
        version: Version,
        /// milliseconds between polls
        #[serde(default = "default_interval")]
        interval: u64,
    },
    StopMonitoring {
        host: String,
    },
    Ping,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringData {
    /// sysUpTime, in hundredths of a second
    pub up_time: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub synthesized: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    MonitoringStarted {
        host: String,
        interval: u64,
        timestamp: DateTime<Utc>,
    },
    MonitoringStopped {
        host: String,
        timestamp: DateTime<Utc>,
    },
    MonitoringData {
        host: String,
        data: MonitoringData,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn started(host: &str, interval: u64) -> Self {
        ServerMessage::MonitoringStarted {
            host: host.to_string(),
            interval,
            timestamp: Utc::now(),
        }
    }

    pub fn stopped(host: &str) -> Self {
        ServerMessage::MonitoringStopped {
            host: host.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        ServerMessage::Pong {
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_defaults() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"start_monitoring","host":"10.0.0.1"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartMonitoring {
                host: "10.0.0.1".to_string(),
                community: "public".to_string(),
                version: Version::V2c,
                interval: DEFAULT_INTERVAL_MS,
            }
        );
    }

    #[test]
    fn test_client_messages() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"start_monitoring","host":"sw1","community":"c",
                "version":1,"interval":250}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::StartMonitoring { version: Version::V1, interval: 250, .. }
        ));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"stop_monitoring","host":"sw1"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::StopMonitoring {
                host: "sw1".to_string()
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn test_malformed() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"reboot"}"#)
            .is_err());
        assert!(serde_json::from_str::<ClientMessage>(
            r#"{"type":"stop_monitoring"}"#
        )
        .is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }

    #[test]
    fn test_server_messages() {
        let v = serde_json::to_value(ServerMessage::started("sw1", 1000))
            .unwrap();
        assert_eq!(v["type"], "monitoring_started");
        assert_eq!(v["host"], "sw1");
        assert_eq!(v["interval"], 1000);
        assert!(v.get("timestamp").is_some());

        let v = serde_json::to_value(ServerMessage::stopped("sw1")).unwrap();
        assert_eq!(v["type"], "monitoring_stopped");

        let v = serde_json::to_value(ServerMessage::pong()).unwrap();
        assert_eq!(v["type"], "pong");
    }

    #[test]
    fn test_monitoring_data() {
        let live = ServerMessage::MonitoringData {
            host: "sw1".to_string(),
            data: MonitoringData {
                up_time: 4200,
                timestamp: Utc::now(),
                synthesized: false,
            },
        };
        let v = serde_json::to_value(&live).unwrap();
        assert_eq!(v["type"], "monitoring_data");
        assert_eq!(v["data"]["upTime"], 4200);
        assert!(v["data"].get("synthesized").is_none());

        let fake = ServerMessage::MonitoringData {
            host: "sw1".to_string(),
            data: MonitoringData {
                up_time: 1,
                timestamp: Utc::now(),
                synthesized: true,
            },
        };
        let v = serde_json::to_value(&fake).unwrap();
        assert_eq!(v["data"]["synthesized"], true);
    }
}
