// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! SNMP vocabulary shared by the topology daemon and its clients.

use std::fmt;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

pub mod capabilities;
pub mod macaddr;
pub mod mib;
pub mod oid;
pub mod value;

pub use macaddr::MacAddr;
pub use oid::Oid;
pub use value::Value;
pub use value::Varbind;

/// The SNMP protocol versions we speak.  On the wire (and in JSON) these are
/// the numbers 1 and 2, the latter meaning community-based SNMPv2c.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Version {
    V1,
    #[default]
    V2c,
}

impl TryFrom<u8> for Version {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, String> {
        match v {
            1 => Ok(Version::V1),
            2 => Ok(Version::V2c),
            x => Err(format!("unsupported SNMP version: {x}")),
        }
    }
}

impl From<Version> for u8 {
    fn from(v: Version) -> u8 {
        match v {
            Version::V1 => 1,
            Version::V2c => 2,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Version::V1 => write!(f, "v1"),
            Version::V2c => write!(f, "v2c"),
        }
    }
}

impl std::str::FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "1" | "v1" => Ok(Version::V1),
            "2" | "2c" | "v2c" => Ok(Version::V2c),
            _ => Err(format!("unsupported SNMP version: {s}")),
        }
    }
}

impl JsonSchema for Version {
    fn schema_name() -> String {
        "Version".to_string()
    }

    fn json_schema(
        gen: &mut schemars::gen::SchemaGenerator,
    ) -> schemars::schema::Schema {
        u8::json_schema(gen)
    }
}

#[test]
fn verify_version() {
    assert_eq!(Version::try_from(1), Ok(Version::V1));
    assert_eq!(Version::try_from(2), Ok(Version::V2c));
    assert!(Version::try_from(3).is_err());
    assert_eq!(u8::from(Version::default()), 2);
    assert_eq!("v1".parse::<Version>(), Ok(Version::V1));
    assert_eq!("2c".parse::<Version>(), Ok(Version::V2c));
    assert!("v3".parse::<Version>().is_err());
}
