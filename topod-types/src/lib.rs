// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Records produced by the topology daemon and consumed by its clients.

pub mod api;
pub mod channel;
pub mod device;
pub mod topology;

pub use device::CdpNeighbor;
pub use device::Device;
pub use device::Interface;
pub use device::InterfaceSource;
pub use device::LinkStatus;
pub use device::LldpNeighbor;
pub use topology::Connection;
pub use topology::DiscoveryResult;
pub use topology::NeighborProtocol;
