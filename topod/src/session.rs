// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Polling sessions, and the registry that hands them out.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use protocol::Oid;
use protocol::Varbind;
use slog::debug;
use slog::o;
use tokio::sync::OnceCell;

use crate::errors::TopodError;
use crate::errors::TransportError;
use crate::transport::Connector;
use crate::transport::Transport;
use crate::types::SessionParams;
use crate::types::Target;
use crate::types::TopodResult;

/// A handle on one agent: its identity, the transport used to reach it, and
/// the timeout and retry parameters applied to every request.
pub struct Session {
    log: slog::Logger,
    target: Target,
    params: SessionParams,
    transport: Arc<dyn Transport>,
    // One PDU in flight per session.  Callers queue here, before the
    // timeout for their request starts running.
    turn: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn host(&self) -> &str {
        &self.target.host
    }

    /// Fetch the given scalar instances, one GET apiece.  Objects the agent
    /// does not implement are left out of the result.
    pub async fn get(&self, oids: &[Oid]) -> TopodResult<Vec<Varbind>> {
        let mut varbinds = Vec::with_capacity(oids.len());
        for oid in oids {
            if let Some(vb) =
                self.request("get", || self.transport.get(oid)).await?
            {
                varbinds.push(vb);
            }
        }
        Ok(varbinds)
    }

    /// Fetch every instance below `column`, in lexicographic order, with a
    /// GETNEXT per instance.  A failed GETNEXT is retried from the same
    /// cursor, so a retry never repeats the part of the walk already done.
    pub async fn walk(&self, column: &Oid) -> TopodResult<Vec<Varbind>> {
        let mut varbinds = Vec::new();
        let mut cursor = column.clone();
        loop {
            let next = self
                .request("getnext", || self.transport.get_next(&cursor))
                .await?;
            let Some((name, value)) = next else {
                break;
            };
            if !name.starts_with(column) {
                break;
            }
            if name <= cursor {
                let err = TransportError::Protocol(format!(
                    "walk {column}: agent returned {name} after {cursor}"
                ));
                return Err(TopodError::transport(self.host(), err));
            }
            varbinds.push((name.clone(), value));
            cursor = name;
        }
        Ok(varbinds)
    }

    // Each attempt is bounded by the session timeout, which starts once this
    // request holds the session.  The request is issued at most
    // `retries + 1` times, and the last failure is returned.
    async fn request<F, Fut, T>(&self, op: &str, f: F) -> TopodResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let _turn = self.turn.lock().await;
        let attempts = self.params.retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match tokio::time::timeout(self.params.timeout, f()).await
            {
                Ok(Ok(v)) => return Ok(v),
                Ok(Err(e)) => e,
                Err(_) => TransportError::Timeout(self.params.timeout),
            };
            if attempt >= attempts {
                return Err(TopodError::transport(self.host(), err));
            }
            debug!(self.log, "{op} failed, retrying: {err}";
                "attempt" => attempt);
        }
    }
}

type SessionCell = Arc<OnceCell<Arc<Session>>>;

/// Hands out one `Session` per (host, community, version).  Sessions are
/// created on first use and kept for the life of the daemon.
pub struct SessionRegistry {
    log: slog::Logger,
    connector: Arc<dyn Connector>,
    params: SessionParams,
    sessions: Mutex<BTreeMap<Target, SessionCell>>,
}

impl SessionRegistry {
    pub fn new(
        log: &slog::Logger,
        connector: Arc<dyn Connector>,
        params: SessionParams,
    ) -> Self {
        SessionRegistry {
            log: log.new(o!("unit" => "sessions")),
            connector,
            params,
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Return the session for `target`, creating it if needed.  Concurrent
    /// callers missing on the same key wait for a single creation and share
    /// its result.  If creation fails, the error goes to the caller that
    /// attempted it and the next caller tries again.
    pub async fn get_or_create(
        &self,
        target: &Target,
    ) -> TopodResult<Arc<Session>> {
        let cell = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.entry(target.clone()).or_default().clone()
        };

        cell.get_or_try_init(|| async {
            let transport =
                self.connector.connect(target, &self.params).await?;
            debug!(self.log, "created session"; "host" => &target.host,
                "version" => target.version.to_string());
            Ok::<_, TopodError>(Arc::new(Session {
                log: self.log.new(o!("host" => target.host.clone())),
                target: target.clone(),
                params: self.params,
                transport,
                turn: tokio::sync::Mutex::new(()),
            }))
        })
        .await
        .cloned()
    }

    /// The number of established sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// The keys of all established sessions, in order.
    pub fn keys(&self) -> Vec<Target> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(target, _)| target.clone())
            .collect()
    }
}
