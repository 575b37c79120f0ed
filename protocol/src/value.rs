// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::fmt;
use std::net::Ipv4Addr;

use crate::macaddr::MacAddr;
use crate::oid::Oid;

/// A single value returned by an agent, detached from the response buffer it
/// was decoded from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectIdentifier(Oid),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Gauge32(u32),
    Timeticks(u32),
    Counter64(u64),
    Null,
}

/// An (identifier, value) pair as carried in a response PDU.
pub type Varbind = (Oid, Value);

impl Value {
    /// Interpret the value as a signed integer, if it is any of the numeric
    /// types.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Counter32(c) | Value::Gauge32(c) | Value::Timeticks(c) => {
                Some(*c as i64)
            }
            Value::Counter64(c) => i64::try_from(*c).ok(),
            _ => None,
        }
    }

    /// Interpret the value as an unsigned integer, if it is numeric and
    /// non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(i) => u64::try_from(*i).ok(),
            Value::Counter32(c) | Value::Gauge32(c) | Value::Timeticks(c) => {
                Some(*c as u64)
            }
            Value::Counter64(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(b) => Some(b),
            _ => None,
        }
    }

    /// Render the value as text.  Octet strings are decoded as (lossy) UTF-8
    /// with trailing NULs and whitespace removed.
    pub fn as_text(&self) -> String {
        match self {
            Value::OctetString(b) => String::from_utf8_lossy(b)
                .trim_end_matches('\0')
                .trim()
                .to_string(),
            other => other.to_string(),
        }
    }

    /// Render an octet string that carries a hardware address.  Six-octet
    /// strings are printed as a MAC address, anything else as colon-separated
    /// hex.  Empty strings produce `None`.
    pub fn as_hw_address(&self) -> Option<String> {
        let b = self.as_bytes()?;
        match b.len() {
            0 => None,
            6 => Some(MacAddr::from_slice(b).to_string()),
            _ => Some(hex2str(b)),
        }
    }

    /// Render an octet string that carries an IPv4 address in network byte
    /// order, as CDP does for its cache address column.
    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            Value::IpAddress(a) => Some(*a),
            Value::OctetString(b) if b.len() == 4 => {
                Some(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::OctetString(b) => {
                write!(f, "{}", String::from_utf8_lossy(b))
            }
            Value::ObjectIdentifier(o) => write!(f, "{o}"),
            Value::IpAddress(a) => write!(f, "{a}"),
            Value::Counter32(c) | Value::Gauge32(c) | Value::Timeticks(c) => {
                write!(f, "{c}")
            }
            Value::Counter64(c) => write!(f, "{c}"),
            Value::Null => write!(f, "null"),
        }
    }
}

fn hex2str(data: &[u8]) -> String {
    data.iter()
        .map(|a| format!("{a:02x}"))
        .collect::<Vec<String>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::Value;
    use std::net::Ipv4Addr;

    #[test]
    fn test_numeric() {
        assert_eq!(Value::Integer(-1).as_i64(), Some(-1));
        assert_eq!(Value::Integer(-1).as_u64(), None);
        assert_eq!(Value::Gauge32(1_000_000_000).as_u64(), Some(1_000_000_000));
        assert_eq!(Value::Counter64(u64::MAX).as_i64(), None);
        assert_eq!(Value::OctetString(b"7".to_vec()).as_u64(), None);
    }

    #[test]
    fn test_text() {
        let v = Value::OctetString(b"core-sw1\0\0".to_vec());
        assert_eq!(v.as_text(), "core-sw1");
        assert_eq!(Value::Timeticks(4200).as_text(), "4200");
    }

    #[test]
    fn test_hw_address() {
        let mac = Value::OctetString(vec![0x00, 0x1b, 0x54, 0xaa, 0xbb, 0x0c]);
        assert_eq!(mac.as_hw_address().unwrap(), "00:1b:54:aa:bb:0c");

        let odd = Value::OctetString(vec![0x01, 0x02, 0x03]);
        assert_eq!(odd.as_hw_address().unwrap(), "01:02:03");

        assert_eq!(Value::OctetString(Vec::new()).as_hw_address(), None);
    }

    #[test]
    fn test_ipv4() {
        let v = Value::OctetString(vec![10, 0, 0, 2]);
        assert_eq!(v.as_ipv4(), Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(Value::OctetString(vec![10, 0]).as_ipv4(), None);
    }
}
