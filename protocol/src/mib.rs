// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! The subset of SNMPv2-MIB, IF-MIB, LLDP-MIB and CISCO-CDP-MIB that the
//! poller reads.

use std::fmt;

use crate::oid::Oid;

/// system: 1.3.6.1.2.1.1
const SYSTEM: [u64; 7] = [1, 3, 6, 1, 2, 1, 1];
/// ifEntry: 1.3.6.1.2.1.2.2.1
const IF_ENTRY: [u64; 9] = [1, 3, 6, 1, 2, 1, 2, 2, 1];
/// ifXEntry: 1.3.6.1.2.1.31.1.1.1
const IFX_ENTRY: [u64; 10] = [1, 3, 6, 1, 2, 1, 31, 1, 1, 1];
/// lldpRemEntry: 1.0.8802.1.1.2.1.4.1.1
const LLDP_REM_ENTRY: [u64; 10] = [1, 0, 8802, 1, 1, 2, 1, 4, 1, 1];
/// cdpCacheEntry: 1.3.6.1.4.1.9.9.23.1.2.1.1
const CDP_CACHE_ENTRY: [u64; 13] = [1, 3, 6, 1, 4, 1, 9, 9, 23, 1, 2, 1, 1];

/// Scalar objects in the SNMPv2-MIB system group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u64)]
pub enum SystemObject {
    Descr = 1,
    ObjectId = 2,
    UpTime = 3,
    Contact = 4,
    Name = 5,
    Location = 6,
}

impl SystemObject {
    pub const ALL: [SystemObject; 6] = [
        SystemObject::Descr,
        SystemObject::ObjectId,
        SystemObject::UpTime,
        SystemObject::Contact,
        SystemObject::Name,
        SystemObject::Location,
    ];

    /// The instance identifier (`.0`) of the scalar.
    pub fn oid(self) -> Oid {
        Oid::from(SYSTEM).child(&[self as u64, 0])
    }
}

/// A conceptual table whose columns are walked independently and then
/// reassembled into rows keyed by their index suffix.
pub trait Table {
    type Column: Copy + Ord + fmt::Debug + Send + Sync + 'static;

    /// Name used in log messages.
    const NAME: &'static str;
    /// Number of trailing arcs that make up a row's index.
    const SUFFIX_LEN: usize;
    /// Column without which a row is considered incomplete and dropped.
    const REQUIRED: Self::Column;

    /// Every column the poller walks, in request order.
    fn columns() -> &'static [Self::Column];
    /// The column's OID prefix.  Row instances are this prefix plus the
    /// row's index suffix.
    fn column_oid(column: Self::Column) -> Oid;
}

/// IF-MIB ifTable, plus ifHighSpeed from ifXTable (same index).
pub struct IfTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum IfColumn {
    Descr,
    Type,
    Mtu,
    Speed,
    PhysAddress,
    AdminStatus,
    OperStatus,
    InOctets,
    OutOctets,
    HighSpeed,
}

impl Table for IfTable {
    type Column = IfColumn;
    const NAME: &'static str = "ifTable";
    const SUFFIX_LEN: usize = 1;
    const REQUIRED: IfColumn = IfColumn::Descr;

    fn columns() -> &'static [IfColumn] {
        &[
            IfColumn::Descr,
            IfColumn::Type,
            IfColumn::Mtu,
            IfColumn::Speed,
            IfColumn::PhysAddress,
            IfColumn::AdminStatus,
            IfColumn::OperStatus,
            IfColumn::InOctets,
            IfColumn::OutOctets,
            IfColumn::HighSpeed,
        ]
    }

    fn column_oid(column: IfColumn) -> Oid {
        let entry = Oid::from(IF_ENTRY);
        match column {
            IfColumn::Descr => entry.child(&[2]),
            IfColumn::Type => entry.child(&[3]),
            IfColumn::Mtu => entry.child(&[4]),
            IfColumn::Speed => entry.child(&[5]),
            IfColumn::PhysAddress => entry.child(&[6]),
            IfColumn::AdminStatus => entry.child(&[7]),
            IfColumn::OperStatus => entry.child(&[8]),
            IfColumn::InOctets => entry.child(&[10]),
            IfColumn::OutOctets => entry.child(&[16]),
            IfColumn::HighSpeed => Oid::from(IFX_ENTRY).child(&[15]),
        }
    }
}

/// LLDP-MIB lldpRemTable, indexed by
/// (lldpRemTimeMark, lldpRemLocalPortNum, lldpRemIndex).
pub struct LldpRemTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LldpRemColumn {
    ChassisIdSubtype,
    ChassisId,
    PortIdSubtype,
    PortId,
    PortDesc,
    SysName,
    SysDesc,
    SysCapSupported,
    SysCapEnabled,
}

impl Table for LldpRemTable {
    type Column = LldpRemColumn;
    const NAME: &'static str = "lldpRemTable";
    const SUFFIX_LEN: usize = 3;
    const REQUIRED: LldpRemColumn = LldpRemColumn::SysName;

    fn columns() -> &'static [LldpRemColumn] {
        &[
            LldpRemColumn::ChassisIdSubtype,
            LldpRemColumn::ChassisId,
            LldpRemColumn::PortIdSubtype,
            LldpRemColumn::PortId,
            LldpRemColumn::PortDesc,
            LldpRemColumn::SysName,
            LldpRemColumn::SysDesc,
            LldpRemColumn::SysCapSupported,
            LldpRemColumn::SysCapEnabled,
        ]
    }

    fn column_oid(column: LldpRemColumn) -> Oid {
        let arc = match column {
            LldpRemColumn::ChassisIdSubtype => 4,
            LldpRemColumn::ChassisId => 5,
            LldpRemColumn::PortIdSubtype => 6,
            LldpRemColumn::PortId => 7,
            LldpRemColumn::PortDesc => 8,
            LldpRemColumn::SysName => 9,
            LldpRemColumn::SysDesc => 10,
            LldpRemColumn::SysCapSupported => 11,
            LldpRemColumn::SysCapEnabled => 12,
        };
        Oid::from(LLDP_REM_ENTRY).child(&[arc])
    }
}

/// CISCO-CDP-MIB cdpCacheTable, indexed by (cdpCacheIfIndex,
/// cdpCacheDeviceIndex).
pub struct CdpCacheTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CdpCacheColumn {
    Address,
    Version,
    DeviceId,
    DevicePort,
    Platform,
    Capabilities,
    VtpMgmtDomain,
    NativeVlan,
}

impl Table for CdpCacheTable {
    type Column = CdpCacheColumn;
    const NAME: &'static str = "cdpCacheTable";
    const SUFFIX_LEN: usize = 2;
    const REQUIRED: CdpCacheColumn = CdpCacheColumn::DeviceId;

    fn columns() -> &'static [CdpCacheColumn] {
        &[
            CdpCacheColumn::Address,
            CdpCacheColumn::Version,
            CdpCacheColumn::DeviceId,
            CdpCacheColumn::DevicePort,
            CdpCacheColumn::Platform,
            CdpCacheColumn::Capabilities,
            CdpCacheColumn::VtpMgmtDomain,
            CdpCacheColumn::NativeVlan,
        ]
    }

    fn column_oid(column: CdpCacheColumn) -> Oid {
        let arc = match column {
            CdpCacheColumn::Address => 4,
            CdpCacheColumn::Version => 5,
            CdpCacheColumn::DeviceId => 6,
            CdpCacheColumn::DevicePort => 7,
            CdpCacheColumn::Platform => 8,
            CdpCacheColumn::Capabilities => 9,
            CdpCacheColumn::VtpMgmtDomain => 10,
            CdpCacheColumn::NativeVlan => 11,
        };
        Oid::from(CDP_CACHE_ENTRY).child(&[arc])
    }
}

/// IF-MIB ifAdminStatus / ifOperStatus value for "up".
pub const IF_STATUS_UP: i64 = 1;
/// IF-MIB ifAdminStatus value for "down", i.e. administratively disabled.
pub const IF_STATUS_DOWN: i64 = 2;

#[test]
fn verify_oids() {
    assert_eq!(SystemObject::UpTime.oid().to_string(), "1.3.6.1.2.1.1.3.0");
    assert_eq!(
        IfTable::column_oid(IfColumn::OutOctets).to_string(),
        "1.3.6.1.2.1.2.2.1.16"
    );
    assert_eq!(
        IfTable::column_oid(IfColumn::HighSpeed).to_string(),
        "1.3.6.1.2.1.31.1.1.1.15"
    );
    assert_eq!(
        LldpRemTable::column_oid(LldpRemColumn::SysName).to_string(),
        "1.0.8802.1.1.2.1.4.1.1.9"
    );
    assert_eq!(
        CdpCacheTable::column_oid(CdpCacheColumn::DeviceId).to_string(),
        "1.3.6.1.4.1.9.9.23.1.2.1.1.6"
    );
}
