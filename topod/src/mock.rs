// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! In-memory agents for exercising the poller without a network.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use protocol::mib::CdpCacheColumn;
use protocol::mib::CdpCacheTable;
use protocol::mib::IfColumn;
use protocol::mib::IfTable;
use protocol::mib::LldpRemColumn;
use protocol::mib::LldpRemTable;
use protocol::mib::SystemObject;
use protocol::mib::Table;
use protocol::Oid;
use protocol::Value;
use protocol::Varbind;

use crate::errors::TopodError;
use crate::errors::TransportError;
use crate::transport::Connector;
use crate::transport::Transport;
use crate::types::SessionParams;
use crate::types::Target;
use crate::types::TopodResult;

#[derive(Default)]
struct AgentState {
    objects: Mutex<BTreeMap<Oid, Value>>,
    unresponsive: AtomicBool,
    requests: AtomicUsize,
    reads: Mutex<BTreeMap<Oid, usize>>,
    latency: Mutex<Duration>,
    stalled: Mutex<Option<Oid>>,
    // Like a real agent socket, this answers one request at a time
    serial: tokio::sync::Mutex<()>,
}

/// A scripted agent.  Clones share state, so a test can keep a handle on an
/// agent after giving it to a `MockConnector`.
#[derive(Clone, Default)]
pub struct MockAgent {
    state: Arc<AgentState>,
}

fn text(s: &str) -> Value {
    Value::OctetString(s.as_bytes().to_vec())
}

impl MockAgent {
    pub fn new() -> Self {
        MockAgent::default()
    }

    /// An agent with a populated system group and nothing else.
    pub fn switch(name: &str) -> Self {
        let agent = MockAgent::new();
        agent.set(SystemObject::Descr.oid(), text("Mock switch 1G"));
        agent.set(
            SystemObject::ObjectId.oid(),
            Value::ObjectIdentifier(Oid::from([1, 3, 6, 1, 4, 1, 9, 1, 1])),
        );
        agent.set(SystemObject::UpTime.oid(), Value::Timeticks(123_456));
        agent.set(SystemObject::Contact.oid(), text("noc@example.com"));
        agent.set(SystemObject::Name.oid(), text(name));
        agent.set(SystemObject::Location.oid(), text("rack 1"));
        agent
    }

    pub fn set(&self, oid: Oid, value: Value) {
        self.state.objects.lock().unwrap().insert(oid, value);
    }

    pub fn set_if<T: Table>(&self, column: T::Column, suffix: &[u64], v: Value) {
        self.set(T::column_oid(column).child(suffix), v);
    }

    pub fn add_interface(
        &self,
        index: u64,
        descr: &str,
        speed: u32,
        admin: i64,
        oper: i64,
    ) {
        let s = &[index];
        self.set_if::<IfTable>(IfColumn::Descr, s, text(descr));
        self.set_if::<IfTable>(IfColumn::Type, s, Value::Integer(6));
        self.set_if::<IfTable>(IfColumn::Mtu, s, Value::Integer(1500));
        self.set_if::<IfTable>(IfColumn::Speed, s, Value::Gauge32(speed));
        self.set_if::<IfTable>(
            IfColumn::PhysAddress,
            s,
            Value::OctetString(vec![0x00, 0x1b, 0x54, 0, 0, index as u8]),
        );
        self.set_if::<IfTable>(IfColumn::AdminStatus, s, Value::Integer(admin));
        self.set_if::<IfTable>(IfColumn::OperStatus, s, Value::Integer(oper));
        self.set_if::<IfTable>(IfColumn::InOctets, s, Value::Counter32(0));
        self.set_if::<IfTable>(IfColumn::OutOctets, s, Value::Counter32(0));
    }

    pub fn add_lldp_neighbor(
        &self,
        local_port: u64,
        index: u64,
        sys_name: &str,
        port_id: &str,
        sys_desc: &str,
    ) {
        let s = &[0, local_port, index];
        self.set_if::<LldpRemTable>(
            LldpRemColumn::ChassisIdSubtype,
            s,
            Value::Integer(4),
        );
        self.set_if::<LldpRemTable>(
            LldpRemColumn::ChassisId,
            s,
            Value::OctetString(vec![0x02, 0, 0, 0, local_port as u8, 1]),
        );
        self.set_if::<LldpRemTable>(LldpRemColumn::PortId, s, text(port_id));
        self.set_if::<LldpRemTable>(LldpRemColumn::SysName, s, text(sys_name));
        self.set_if::<LldpRemTable>(LldpRemColumn::SysDesc, s, text(sys_desc));
        self.set_if::<LldpRemTable>(
            LldpRemColumn::SysCapEnabled,
            s,
            Value::OctetString(vec![0x28, 0x00]),
        );
    }

    pub fn add_cdp_neighbor(
        &self,
        if_index: u64,
        index: u64,
        device_id: &str,
        device_port: &str,
        platform: &str,
    ) {
        let s = &[if_index, index];
        self.set_if::<CdpCacheTable>(
            CdpCacheColumn::DeviceId,
            s,
            text(device_id),
        );
        self.set_if::<CdpCacheTable>(
            CdpCacheColumn::DevicePort,
            s,
            text(device_port),
        );
        self.set_if::<CdpCacheTable>(
            CdpCacheColumn::Platform,
            s,
            text(platform),
        );
        self.set_if::<CdpCacheTable>(
            CdpCacheColumn::Capabilities,
            s,
            Value::OctetString(vec![0, 0, 0, 0x29]),
        );
    }

    /// While set, every request hangs until the caller gives up on it.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.state.unresponsive.store(unresponsive, Ordering::SeqCst);
    }

    /// While set, requests naming `oid` hang like an unresponsive agent.
    pub fn set_stalled(&self, oid: Option<Oid>) {
        *self.state.stalled.lock().unwrap() = oid;
    }

    /// How long the agent takes to answer each request.
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock().unwrap() = latency;
    }

    /// The number of requests this agent has received.
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// The number of requests naming `oid`.
    pub fn reads(&self, oid: &Oid) -> usize {
        self.state.reads.lock().unwrap().get(oid).copied().unwrap_or(0)
    }

    async fn begin_request(
        &self,
        oid: &Oid,
    ) -> tokio::sync::MutexGuard<'_, ()> {
        let serial = self.state.serial.lock().await;
        self.state.requests.fetch_add(1, Ordering::SeqCst);
        *self
            .state
            .reads
            .lock()
            .unwrap()
            .entry(oid.clone())
            .or_default() += 1;
        let latency = *self.state.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let stalled = self.state.stalled.lock().unwrap().as_ref() == Some(oid);
        if stalled || self.state.unresponsive.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        serial
    }
}

#[async_trait]
impl Transport for MockAgent {
    async fn get(&self, oid: &Oid) -> Result<Option<Varbind>, TransportError> {
        let _serial = self.begin_request(oid).await;
        let objects = self.state.objects.lock().unwrap();
        Ok(objects.get(oid).map(|v| (oid.clone(), v.clone())))
    }

    async fn get_next(
        &self,
        oid: &Oid,
    ) -> Result<Option<Varbind>, TransportError> {
        let _serial = self.begin_request(oid).await;
        let objects = self.state.objects.lock().unwrap();
        Ok(objects
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .next()
            .map(|(oid, v)| (oid.clone(), v.clone())))
    }
}

/// Resolves host names to `MockAgent`s.  Unknown hosts fail to resolve.
#[derive(Default)]
pub struct MockConnector {
    agents: Mutex<BTreeMap<String, MockAgent>>,
    connections: AtomicUsize,
    delay: Mutex<Duration>,
}

impl MockConnector {
    pub fn new() -> Self {
        MockConnector::default()
    }

    pub fn add_agent(&self, host: &str, agent: MockAgent) {
        self.agents.lock().unwrap().insert(host.to_string(), agent);
    }

    /// How long each connection attempt takes to complete.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// The number of transports handed out so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        target: &Target,
        _params: &SessionParams,
    ) -> TopodResult<Arc<dyn Transport>> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let agent = self
            .agents
            .lock()
            .unwrap()
            .get(&target.host)
            .cloned()
            .ok_or_else(|| TopodError::InvalidHost(target.host.clone()))?;
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(agent))
    }
}
