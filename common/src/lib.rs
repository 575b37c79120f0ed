// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

pub mod logging;

/// The default port on which the topod API server listens.
pub const DEFAULT_TOPOD_PORT: u16 = 12240;
/// The UDP port SNMP agents listen on.
pub const DEFAULT_SNMP_PORT: u16 = 161;
/// Community used when a request does not name one.
pub const DEFAULT_COMMUNITY: &str = "public";
