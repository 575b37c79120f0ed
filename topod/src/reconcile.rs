// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Reassembly of independently walked table columns into rows, and
//! construction of the records built from those rows.

use std::collections::BTreeMap;

use protocol::capabilities::CdpCapabilities;
use protocol::capabilities::SystemCapabilities;
use protocol::mib::CdpCacheColumn;
use protocol::mib::CdpCacheTable;
use protocol::mib::IfColumn;
use protocol::mib::IfTable;
use protocol::mib::LldpRemColumn;
use protocol::mib::LldpRemTable;
use protocol::mib::Table;
use protocol::Value;
use protocol::Varbind;
use slog::debug;
use topod_types::CdpNeighbor;
use topod_types::Interface;
use topod_types::InterfaceSource;
use topod_types::LldpNeighbor;

/// One conceptual row of a table: the index suffix shared by its cells, and
/// the value found in each column.
pub struct Row<T: Table> {
    pub suffix: Vec<u64>,
    cells: BTreeMap<T::Column, Value>,
}

impl<T: Table> Row<T> {
    pub fn get(&self, column: T::Column) -> Option<&Value> {
        self.cells.get(&column)
    }

    /// The column rendered as text; empty if the column is missing.
    pub fn text(&self, column: T::Column) -> String {
        self.get(column).map(Value::as_text).unwrap_or_default()
    }

    pub fn int(&self, column: T::Column) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn uint(&self, column: T::Column) -> Option<u64> {
        self.get(column).and_then(Value::as_u64)
    }

    pub fn bytes(&self, column: T::Column) -> &[u8] {
        self.get(column).and_then(Value::as_bytes).unwrap_or_default()
    }
}

/// Merge the walks of a table's columns into rows, ordered by suffix.
///
/// A varbind whose name is not below its column, or whose suffix has the
/// wrong width for the table, is ignored.  If a (suffix, column) pair appears
/// more than once the last value wins.  Rows without the table's identifying
/// column are dropped; a column with no instances at all simply leaves its
/// cell empty in every row.
pub fn reconcile<T: Table>(
    log: &slog::Logger,
    walks: Vec<(T::Column, Vec<Varbind>)>,
) -> Vec<Row<T>> {
    let mut rows: BTreeMap<Vec<u64>, BTreeMap<T::Column, Value>> =
        BTreeMap::new();

    for (column, varbinds) in walks {
        let prefix = T::column_oid(column);
        for (oid, value) in varbinds {
            match oid.suffix(&prefix) {
                Some(suffix) if suffix.len() == T::SUFFIX_LEN => {
                    rows.entry(suffix.to_vec())
                        .or_default()
                        .insert(column, value);
                }
                _ => {
                    debug!(log, "ignoring stray varbind";
                        "table" => T::NAME,
                        "column" => format!("{column:?}"),
                        "oid" => oid.to_string());
                }
            }
        }
    }

    rows.into_iter()
        .filter(|(_, cells)| cells.contains_key(&T::REQUIRED))
        .map(|(suffix, cells)| Row { suffix, cells })
        .collect()
}

/// ifSpeed saturates at this value on links faster than 4.29 Gb/s.
const IF_SPEED_SATURATED: u64 = u32::MAX as u64;

fn is_virtual(description: &str) -> bool {
    let d = description.to_lowercase();
    d.contains("loopback") || d.contains("null")
}

/// The effective speed of an interface in bits per second.  When ifSpeed is
/// saturated we use ifHighSpeed, which is in Mb/s.
fn if_speed(row: &Row<IfTable>) -> u64 {
    let speed = row.uint(IfColumn::Speed).unwrap_or(0);
    match row.uint(IfColumn::HighSpeed) {
        Some(high) if speed >= IF_SPEED_SATURATED => {
            high.saturating_mul(1_000_000)
        }
        _ => speed,
    }
}

/// Build the interface list of a device, leaving out loopback and null
/// interfaces.
pub fn interfaces(rows: &[Row<IfTable>]) -> Vec<Interface> {
    rows.iter()
        .filter(|row| !is_virtual(&row.text(IfColumn::Descr)))
        .map(|row| {
            Interface::from(InterfaceSource {
                index: row.suffix[0],
                description: row.text(IfColumn::Descr),
                if_type: row.int(IfColumn::Type),
                mtu: row.int(IfColumn::Mtu),
                speed: if_speed(row),
                physical_address: row
                    .get(IfColumn::PhysAddress)
                    .and_then(Value::as_hw_address),
                admin_status: row.int(IfColumn::AdminStatus),
                oper_status: row.int(IfColumn::OperStatus),
                in_octets: row.uint(IfColumn::InOctets).unwrap_or(0),
                out_octets: row.uint(IfColumn::OutOctets).unwrap_or(0),
                synthesized: false,
            })
        })
        .collect()
}

// lldpRemChassisIdSubtype / lldpRemPortIdSubtype value for a MAC address
const ID_SUBTYPE_MAC: i64 = 4;
const PORT_ID_SUBTYPE_MAC: i64 = 3;

// Identifiers are rendered as MAC addresses when their subtype says so, and
// as text otherwise.
fn lldp_id(
    row: &Row<LldpRemTable>,
    subtype: LldpRemColumn,
    id: LldpRemColumn,
    mac: i64,
) -> String {
    match (row.int(subtype), row.get(id)) {
        (Some(s), Some(v)) if s == mac => {
            v.as_hw_address().unwrap_or_else(|| v.as_text())
        }
        (_, Some(v)) => v.as_text(),
        (_, None) => String::new(),
    }
}

pub fn lldp_neighbors(rows: &[Row<LldpRemTable>]) -> Vec<LldpNeighbor> {
    rows.iter()
        .map(|row| LldpNeighbor {
            // Rows are keyed by the LLDP-MIB index (lldpRemTimeMark,
            // lldpRemLocalPortNum, lldpRemIndex).  remIndex identifies the
            // remote entry, not a port on the neighbor, and it stands in
            // for remote_port.  The MIB carries no TTL column, so live
            // rows leave ttl unset and only synthesized neighbors have one.
            local_port: row.suffix[1],
            remote_port: row.suffix[2],
            ttl: None,
            chassis_id: lldp_id(
                row,
                LldpRemColumn::ChassisIdSubtype,
                LldpRemColumn::ChassisId,
                ID_SUBTYPE_MAC,
            ),
            port_id: lldp_id(
                row,
                LldpRemColumn::PortIdSubtype,
                LldpRemColumn::PortId,
                PORT_ID_SUBTYPE_MAC,
            ),
            port_description: row
                .get(LldpRemColumn::PortDesc)
                .map(Value::as_text)
                .filter(|d| !d.is_empty()),
            sys_name: row.text(LldpRemColumn::SysName),
            sys_desc: row.text(LldpRemColumn::SysDesc),
            cap_supported: SystemCapabilities::from_bits(
                row.bytes(LldpRemColumn::SysCapSupported),
            ),
            cap_enabled: SystemCapabilities::from_bits(
                row.bytes(LldpRemColumn::SysCapEnabled),
            ),
            synthesized: false,
        })
        .collect()
}

pub fn cdp_neighbors(rows: &[Row<CdpCacheTable>]) -> Vec<CdpNeighbor> {
    rows.iter()
        .map(|row| CdpNeighbor {
            // (cdpCacheIfIndex, cdpCacheDeviceIndex)
            local_port: row.suffix[0],
            remote_port: row.suffix[1],
            device_id: row.text(CdpCacheColumn::DeviceId),
            device_port: row.text(CdpCacheColumn::DevicePort),
            platform: row.text(CdpCacheColumn::Platform),
            address: row.get(CdpCacheColumn::Address).and_then(Value::as_ipv4),
            version: row
                .get(CdpCacheColumn::Version)
                .map(Value::as_text)
                .filter(|v| !v.is_empty()),
            capabilities: CdpCapabilities::from_mask(CdpCapabilities::mask(
                row.bytes(CdpCacheColumn::Capabilities),
            )),
            vtp_domain: row.text(CdpCacheColumn::VtpMgmtDomain),
            native_vlan: row.int(CdpCacheColumn::NativeVlan),
            synthesized: false,
        })
        .collect()
}
