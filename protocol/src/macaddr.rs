// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// An EUI-48 MAC address, as reported in `ifPhysAddress` and LLDP chassis
/// IDs of the MAC address subtype.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MacAddr {
    a: [u8; 6],
}

impl From<[u8; 6]> for MacAddr {
    fn from(a: [u8; 6]) -> Self {
        Self { a }
    }
}

impl MacAddr {
    /// Create a new MAC address from a slice of bytes in network byte order.
    ///
    /// # Panics
    ///
    /// Panics if the slice is fewer than 6 octets.
    pub fn from_slice(s: &[u8]) -> MacAddr {
        MacAddr {
            a: [s[0], s[1], s[2], s[3], s[4], s[5]],
        }
    }

    /// Return a copy of this address with the locally-administered bit set
    /// and the multicast bit cleared.
    pub fn to_local_unicast(self) -> MacAddr {
        let mut a = self.a;
        a[0] = (a[0] | 0x02) & !0x01;
        MacAddr { a }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacError {
    /// Too few octets to be a valid MAC address
    #[error("Too few octets")]
    TooShort,
    /// Too many octets to be a valid MAC address
    #[error("Too many octets")]
    TooLong,
    /// Found an octet with a non-hexadecimal character or invalid separator
    #[error("Invalid octect")]
    InvalidOctet,
}

impl FromStr for MacAddr {
    type Err = MacError;

    fn from_str(s: &str) -> Result<Self, MacError> {
        // Agents print hardware addresses with either separator
        let v: Vec<&str> = s.split([':', '-']).collect();

        match v.len().cmp(&6) {
            std::cmp::Ordering::Less => Err(MacError::TooShort),
            std::cmp::Ordering::Greater => Err(MacError::TooLong),
            std::cmp::Ordering::Equal => {
                let mut m = MacAddr { a: [0u8; 6] };
                for (i, octet) in v.iter().enumerate() {
                    m.a[i] = u8::from_str_radix(octet, 16)
                        .map_err(|_| MacError::InvalidOctet)?;
                }
                Ok(m)
            }
        }
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.a[0], self.a[1], self.a[2], self.a[3], self.a[4], self.a[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl From<u64> for MacAddr {
    fn from(x: u64) -> Self {
        MacAddr {
            a: [
                ((x >> 40) & 0xff) as u8,
                ((x >> 32) & 0xff) as u8,
                ((x >> 24) & 0xff) as u8,
                ((x >> 16) & 0xff) as u8,
                ((x >> 8) & 0xff) as u8,
                (x & 0xff) as u8,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MacAddr;
    use super::MacError;

    #[test]
    fn test_parse() {
        let a = MacAddr::from([0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc]);
        assert_eq!("12:34:56:78:9a:bc".parse::<MacAddr>().unwrap(), a);
        assert_eq!("12-34-56-78-9A-BC".parse::<MacAddr>().unwrap(), a);
        assert_eq!("12:34:56".parse::<MacAddr>(), Err(MacError::TooShort));
        assert_eq!(
            "12:34:56:78:9a:zz".parse::<MacAddr>(),
            Err(MacError::InvalidOctet)
        );
    }

    #[test]
    fn test_from_u64() {
        let a = MacAddr::from(0x0000_123456789abc_u64);
        assert_eq!(a.to_string(), "12:34:56:78:9a:bc");
    }

    #[test]
    fn test_local_unicast() {
        let a = MacAddr::from([0x01, 0, 0, 0, 0, 1]).to_local_unicast();
        assert_eq!(a.to_string(), "02:00:00:00:00:01");
    }
}
