// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! The boundary between the poller and the wire.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use protocol::Oid;
use protocol::Value;
use protocol::Varbind;
use protocol::Version;
use snmp2::AsyncSession;
use tokio::sync::Mutex;

use crate::errors::TopodError;
use crate::errors::TransportError;
use crate::types::SessionParams;
use crate::types::Target;
use crate::types::TopodResult;

/// An established path to one agent.  Each call sends a single PDU and
/// makes a single attempt; timeouts and retries are applied by the session
/// layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch one scalar instance.  An object the agent does not implement
    /// comes back as `None`.
    async fn get(&self, oid: &Oid) -> Result<Option<Varbind>, TransportError>;

    /// Fetch the instance that follows `oid` in the agent's MIB, or `None`
    /// once the agent has nothing further.
    async fn get_next(
        &self,
        oid: &Oid,
    ) -> Result<Option<Varbind>, TransportError>;
}

/// Opens transports.  Called at most once per session key.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        target: &Target,
        params: &SessionParams,
    ) -> TopodResult<Arc<dyn Transport>>;
}

/// Connector for real agents, speaking SNMPv1 or SNMPv2c over UDP.
pub struct SnmpConnector;

#[async_trait]
impl Connector for SnmpConnector {
    async fn connect(
        &self,
        target: &Target,
        params: &SessionParams,
    ) -> TopodResult<Arc<dyn Transport>> {
        let addr = tokio::net::lookup_host((target.host.as_str(), params.port))
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| TopodError::InvalidHost(target.host.clone()))?;

        let community = target.community.as_bytes();
        let session = match target.version {
            Version::V1 => AsyncSession::new_v1(addr, community, 0).await,
            Version::V2c => AsyncSession::new_v2c(addr, community, 0).await,
        }
        .map_err(|e| TopodError::Session {
            host: target.host.clone(),
            reason: format!("{e:?}"),
        })?;

        Ok(Arc::new(SnmpTransport {
            session: Mutex::new(session),
        }))
    }
}

/// An `AsyncSession` reuses one receive buffer, so requests on it are
/// serialized.
struct SnmpTransport {
    session: Mutex<AsyncSession>,
}

fn wire_oid(oid: &Oid) -> Result<snmp2::Oid<'static>, TransportError> {
    snmp2::Oid::from(oid.arcs()).map_err(|e| {
        TransportError::Protocol(format!("cannot encode {oid}: {e:?}"))
    })
}

fn local_oid(oid: &snmp2::Oid<'_>) -> Result<Oid, TransportError> {
    let s = oid.to_id_string();
    s.parse()
        .map_err(|e| TransportError::Protocol(format!("bad OID {s}: {e}")))
}

/// Detach a value from the response buffer.  Exception values and types we
/// never read come back as `None`.
fn local_value(value: snmp2::Value<'_>) -> Option<Value> {
    use snmp2::Value as V;

    let v = match value {
        V::Integer(i) => Value::Integer(i),
        V::OctetString(b) => Value::OctetString(b.to_vec()),
        V::ObjectIdentifier(o) => {
            Value::ObjectIdentifier(o.to_id_string().parse().ok()?)
        }
        V::IpAddress(a) => Value::IpAddress(Ipv4Addr::from(a)),
        V::Counter32(c) => Value::Counter32(c),
        V::Unsigned32(g) => Value::Gauge32(g),
        V::Timeticks(t) => Value::Timeticks(t),
        V::Counter64(c) => Value::Counter64(c),
        V::Null => Value::Null,
        _ => return None,
    };
    Some(v)
}

fn is_exception(value: &snmp2::Value<'_>) -> bool {
    matches!(
        value,
        snmp2::Value::EndOfMibView
            | snmp2::Value::NoSuchObject
            | snmp2::Value::NoSuchInstance
    )
}

#[async_trait]
impl Transport for SnmpTransport {
    async fn get(&self, oid: &Oid) -> Result<Option<Varbind>, TransportError> {
        let req = wire_oid(oid)?;
        let mut session = self.session.lock().await;
        let mut pdu = session.get(&req).await?;
        match pdu.error_status {
            0 => {}
            // noSuchName, as reported by SNMPv1 agents
            2 => return Ok(None),
            e => {
                return Err(TransportError::Protocol(format!(
                    "get {oid}: error status {e}"
                )))
            }
        }
        let Some((name, value)) = pdu.varbinds.next() else {
            return Ok(None);
        };
        if is_exception(&value) {
            return Ok(None);
        }
        let name = local_oid(&name)?;
        Ok(local_value(value).map(|value| (name, value)))
    }

    async fn get_next(
        &self,
        oid: &Oid,
    ) -> Result<Option<Varbind>, TransportError> {
        let req = wire_oid(oid)?;
        let mut session = self.session.lock().await;
        let mut pdu = session.getnext(&req).await?;
        match pdu.error_status {
            0 => {}
            // SNMPv1 agents report the end of their MIB as noSuchName
            2 => return Ok(None),
            e => {
                return Err(TransportError::Protocol(format!(
                    "getnext {oid}: error status {e}"
                )))
            }
        }
        let Some((name, value)) = pdu.varbinds.next() else {
            return Ok(None);
        };
        if is_exception(&value) {
            return Ok(None);
        }
        let name = local_oid(&name)?;
        // The walk still has to step past a value we never read
        let value = local_value(value).unwrap_or(Value::Null);
        Ok(Some((name, value)))
    }
}
