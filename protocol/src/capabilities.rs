// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Decoding of the capability bitmaps reported in the LLDP remote table and
//! the CDP cache table.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// System Capabilities as defined by table 8-4 of 802.1AB.  The LLDP-MIB
/// reports them as a BITS value, with bit 0 being the most significant bit of
/// the first octet.
#[derive(
    Clone,
    Copy,
    Debug,
    Hash,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    Deserialize,
    JsonSchema,
    Serialize,
)]
#[repr(u8)]
pub enum SystemCapabilities {
    Other = 1,
    Repeater,
    MacBridgeComponent,
    AccessPoint,
    Router,
    Telephone,
    Docsis,
    StationOnly,
    CVlanComponent,
    SVlanComponent,
    MacRelayComponent,
}

const LLDP_CAPABILITIES: [SystemCapabilities; 11] = [
    SystemCapabilities::Other,
    SystemCapabilities::Repeater,
    SystemCapabilities::MacBridgeComponent,
    SystemCapabilities::AccessPoint,
    SystemCapabilities::Router,
    SystemCapabilities::Telephone,
    SystemCapabilities::Docsis,
    SystemCapabilities::StationOnly,
    SystemCapabilities::CVlanComponent,
    SystemCapabilities::SVlanComponent,
    SystemCapabilities::MacRelayComponent,
];

impl SystemCapabilities {
    /// Decode an LLDP-MIB `LldpSystemCapabilitiesMap` BITS value.  Bits
    /// beyond those defined by the standard are ignored.
    pub fn from_bits(octets: &[u8]) -> Vec<SystemCapabilities> {
        LLDP_CAPABILITIES
            .iter()
            .enumerate()
            .filter(|(bit, _)| {
                let octet = bit / 8;
                let mask = 0x80u8 >> (bit % 8);
                octets.get(octet).is_some_and(|o| o & mask != 0)
            })
            .map(|(_, cap)| *cap)
            .collect()
    }

    /// Encode a set of capabilities as an LLDP-MIB BITS value.
    pub fn to_bits(caps: &[SystemCapabilities]) -> Vec<u8> {
        let mut octets = vec![0u8; 2];
        for cap in caps {
            let bit = *cap as usize - 1;
            octets[bit / 8] |= 0x80 >> (bit % 8);
        }
        octets
    }
}

/// Device capabilities as carried in `cdpCacheCapabilities`, a four-octet
/// big-endian bitmask.
#[derive(
    Clone,
    Copy,
    Debug,
    Hash,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    Deserialize,
    JsonSchema,
    Serialize,
)]
pub enum CdpCapabilities {
    Router,
    TransparentBridge,
    SourceRouteBridge,
    Switch,
    Host,
    Igmp,
    Repeater,
}

const CDP_CAPABILITIES: [(u32, CdpCapabilities); 7] = [
    (0x01, CdpCapabilities::Router),
    (0x02, CdpCapabilities::TransparentBridge),
    (0x04, CdpCapabilities::SourceRouteBridge),
    (0x08, CdpCapabilities::Switch),
    (0x10, CdpCapabilities::Host),
    (0x20, CdpCapabilities::Igmp),
    (0x40, CdpCapabilities::Repeater),
];

impl CdpCapabilities {
    /// Convert the raw cache octets into a bitmask.  Short strings are
    /// treated as the low-order octets.
    pub fn mask(octets: &[u8]) -> u32 {
        octets
            .iter()
            .rev()
            .take(4)
            .enumerate()
            .fold(0u32, |acc, (i, o)| acc | (u32::from(*o) << (8 * i)))
    }

    pub fn from_mask(mask: u32) -> Vec<CdpCapabilities> {
        CDP_CAPABILITIES
            .iter()
            .filter(|(bit, _)| mask & bit != 0)
            .map(|(_, cap)| *cap)
            .collect()
    }
}

#[test]
fn verify_lldp_bits() {
    // bridge + router: bits 2 and 4 of the first octet
    let caps = SystemCapabilities::from_bits(&[0x28, 0x00]);
    assert_eq!(
        caps,
        vec![SystemCapabilities::MacBridgeComponent, SystemCapabilities::Router]
    );

    // C-VLAN lives in the second octet
    let caps = SystemCapabilities::from_bits(&[0x00, 0x80]);
    assert_eq!(caps, vec![SystemCapabilities::CVlanComponent]);

    assert!(SystemCapabilities::from_bits(&[]).is_empty());
}

#[test]
fn verify_lldp_bits_encode() {
    let caps = vec![
        SystemCapabilities::MacBridgeComponent,
        SystemCapabilities::Router,
    ];
    let bits = SystemCapabilities::to_bits(&caps);
    assert_eq!(bits, vec![0x28, 0x00]);
    assert_eq!(SystemCapabilities::from_bits(&bits), caps);
}

#[test]
fn verify_cdp_mask() {
    let mask = CdpCapabilities::mask(&[0x00, 0x00, 0x00, 0x29]);
    assert_eq!(mask, 0x29);
    assert_eq!(
        CdpCapabilities::from_mask(mask),
        vec![
            CdpCapabilities::Router,
            CdpCapabilities::Switch,
            CdpCapabilities::Igmp
        ]
    );
    assert_eq!(CdpCapabilities::mask(&[0x01, 0x08]), 0x0108);
}
