// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Queries against a single device.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use protocol::mib::CdpCacheTable;
use protocol::mib::IfTable;
use protocol::mib::LldpRemTable;
use protocol::mib::SystemObject;
use protocol::mib::Table;
use protocol::Value;
use slog::debug;
use slog::o;
use topod_types::CdpNeighbor;
use topod_types::Device;
use topod_types::Interface;
use topod_types::LldpNeighbor;

use crate::errors::TopodError;
use crate::reconcile;
use crate::reconcile::Row;
use crate::session::Session;
use crate::session::SessionRegistry;
use crate::types::Target;
use crate::types::TopodResult;
use crate::types::UpTime;

/// The operations the daemon performs against one device.  Each call is
/// independent and produces a fresh snapshot.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// The system group: identity and description, without any tables.
    async fn system_info(&self, target: &Target) -> TopodResult<Device>;
    async fn interfaces(&self, target: &Target) -> TopodResult<Vec<Interface>>;
    async fn lldp_neighbors(
        &self,
        target: &Target,
    ) -> TopodResult<Vec<LldpNeighbor>>;
    async fn cdp_neighbors(
        &self,
        target: &Target,
    ) -> TopodResult<Vec<CdpNeighbor>>;
    /// sysUpTime alone.
    async fn uptime(&self, target: &Target) -> TopodResult<UpTime>;
}

/// Queries live agents through the session registry.
pub struct SnmpQueryService {
    log: slog::Logger,
    sessions: Arc<SessionRegistry>,
}

impl SnmpQueryService {
    pub fn new(log: &slog::Logger, sessions: Arc<SessionRegistry>) -> Self {
        SnmpQueryService {
            log: log.new(o!("unit" => "query")),
            sessions,
        }
    }

    // Walk the columns one after another, then stitch them back together.
    async fn table<T: Table>(
        &self,
        session: &Session,
    ) -> TopodResult<Vec<Row<T>>> {
        let mut walks = Vec::with_capacity(T::columns().len());
        for column in T::columns() {
            let varbinds = session.walk(&T::column_oid(*column)).await?;
            walks.push((*column, varbinds));
        }
        let rows = reconcile::reconcile::<T>(&self.log, walks);
        debug!(self.log, "walked table";
            "host" => session.host(),
            "table" => T::NAME,
            "rows" => rows.len());
        Ok(rows)
    }
}

#[async_trait]
impl QueryService for SnmpQueryService {
    async fn system_info(&self, target: &Target) -> TopodResult<Device> {
        let session = self.sessions.get_or_create(target).await?;
        let oids: Vec<_> = SystemObject::ALL.iter().map(|o| o.oid()).collect();
        let varbinds = session.get(&oids).await?;

        let value = |object: SystemObject| {
            let oid = object.oid();
            varbinds.iter().find(|(o, _)| *o == oid).map(|(_, v)| v)
        };
        let text =
            |object| value(object).map(Value::as_text).unwrap_or_default();

        Ok(Device {
            host: target.host.clone(),
            name: text(SystemObject::Name),
            description: text(SystemObject::Descr),
            object_id: text(SystemObject::ObjectId),
            up_time: value(SystemObject::UpTime)
                .and_then(Value::as_u64)
                .unwrap_or(0),
            contact: text(SystemObject::Contact),
            location: text(SystemObject::Location),
            interfaces: Vec::new(),
            lldp_neighbors: Vec::new(),
            cdp_neighbors: Vec::new(),
            synthesized: false,
            timestamp: Utc::now(),
        })
    }

    async fn interfaces(&self, target: &Target) -> TopodResult<Vec<Interface>> {
        let session = self.sessions.get_or_create(target).await?;
        let rows = self.table::<IfTable>(&session).await?;
        Ok(reconcile::interfaces(&rows))
    }

    async fn lldp_neighbors(
        &self,
        target: &Target,
    ) -> TopodResult<Vec<LldpNeighbor>> {
        let session = self.sessions.get_or_create(target).await?;
        let rows = self.table::<LldpRemTable>(&session).await?;
        Ok(reconcile::lldp_neighbors(&rows))
    }

    async fn cdp_neighbors(
        &self,
        target: &Target,
    ) -> TopodResult<Vec<CdpNeighbor>> {
        let session = self.sessions.get_or_create(target).await?;
        let rows = self.table::<CdpCacheTable>(&session).await?;
        Ok(reconcile::cdp_neighbors(&rows))
    }

    async fn uptime(&self, target: &Target) -> TopodResult<UpTime> {
        let session = self.sessions.get_or_create(target).await?;
        let oid = SystemObject::UpTime.oid();
        session
            .get(&[oid.clone()])
            .await?
            .into_iter()
            .find(|(o, _)| *o == oid)
            .and_then(|(_, v)| v.as_u64())
            .map(|ticks| UpTime {
                ticks,
                synthesized: false,
            })
            .ok_or_else(|| {
                TopodError::Missing(format!("sysUpTime on {}", target.host))
            })
    }
}
