// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Live monitoring: periodic uptime polls pushed to connected clients.
//!
//! Each (subscriber, host) pair gets its own task.  The task waits one
//! interval, polls, pushes the result, and repeats until cancelled.  Because
//! a subscription has exactly one task, its updates are delivered in tick
//! order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use slog::debug;
use slog::info;
use slog::o;
use slog::warn;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use topod_types::channel::MonitoringData;
use topod_types::channel::ServerMessage;
use uuid::Uuid;

use crate::query::QueryService;
use crate::types::Target;

/// Polls are never scheduled more often than this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// The sending half of a client's message queue.
pub type Outbox = UnboundedSender<ServerMessage>;

type SubscriptionKey = (Uuid, String);

struct Subscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
    outbox: Outbox,
}

impl Subscription {
    // Cancel the task and wait for it to notice.  A poll that is already in
    // flight runs to completion, but its result is dropped.
    async fn cancel(self, log: &slog::Logger) -> Outbox {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(log, "monitor task failed: {e:?}");
        }
        self.outbox
    }
}

pub struct Monitor {
    log: slog::Logger,
    query: Arc<dyn QueryService>,
    subscriptions: Mutex<BTreeMap<SubscriptionKey, Subscription>>,
}

impl Monitor {
    pub fn new(log: &slog::Logger, query: Arc<dyn QueryService>) -> Self {
        Monitor {
            log: log.new(o!("unit" => "monitor")),
            query,
            subscriptions: Mutex::new(BTreeMap::new()),
        }
    }

    /// The number of active subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    /// Start polling `target` every `interval_ms` on behalf of `subscriber`.
    /// An existing subscription for the same host is replaced.
    pub async fn start(
        &self,
        subscriber: Uuid,
        outbox: Outbox,
        target: Target,
        interval_ms: u64,
    ) {
        let key = (subscriber, target.host.clone());
        let period = Duration::from_millis(interval_ms).max(MIN_INTERVAL);

        let previous = self.subscriptions.lock().unwrap().remove(&key);
        if let Some(sub) = previous {
            debug!(self.log, "replacing subscription";
                "subscriber" => subscriber.to_string(),
                "host" => &target.host);
            sub.cancel(&self.log).await;
        }

        let _ = outbox.send(ServerMessage::started(
            &target.host,
            period.as_millis() as u64,
        ));
        info!(self.log, "monitoring started";
            "subscriber" => subscriber.to_string(),
            "host" => &target.host,
            "interval_ms" => period.as_millis() as u64);

        let token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            self.log.new(o!(
                "subscriber" => subscriber.to_string(),
                "host" => target.host.clone(),
            )),
            self.query.clone(),
            target,
            period,
            token.clone(),
            outbox.clone(),
        ));

        let sub = Subscription {
            token,
            handle,
            outbox,
        };
        // A concurrent start for the same key may have slipped in while we
        // were waiting on the previous task.  The last one wins.
        let raced = self.subscriptions.lock().unwrap().insert(key, sub);
        if let Some(sub) = raced {
            sub.cancel(&self.log).await;
        }
    }

    /// Stop the subscription for `host`, if there is one.  The subscriber is
    /// told once the task has finished, which may be after an in-flight poll
    /// completes, so the wait happens on its own task.  The caller gets that
    /// task's handle back.
    pub fn stop(
        &self,
        subscriber: Uuid,
        host: &str,
    ) -> Option<JoinHandle<()>> {
        let key = (subscriber, host.to_string());
        let sub = self.subscriptions.lock().unwrap().remove(&key)?;
        let log = self.log.clone();
        let host = key.1;
        Some(tokio::spawn(async move {
            let outbox = sub.cancel(&log).await;
            let _ = outbox.send(ServerMessage::stopped(&host));
            info!(log, "monitoring stopped";
                "subscriber" => subscriber.to_string(),
                "host" => host);
        }))
    }

    /// Stop every subscription held by `subscriber`.  Used when its channel
    /// goes away, so nothing is sent.
    pub async fn stop_all(&self, subscriber: Uuid) {
        let subs: Vec<Subscription> = {
            let mut all = self.subscriptions.lock().unwrap();
            let keys: Vec<SubscriptionKey> = all
                .keys()
                .filter(|(id, _)| *id == subscriber)
                .cloned()
                .collect();
            keys.iter().filter_map(|k| all.remove(k)).collect()
        };
        if !subs.is_empty() {
            debug!(self.log, "dropping subscriptions";
                "subscriber" => subscriber.to_string(),
                "count" => subs.len());
        }
        for sub in subs {
            sub.cancel(&self.log).await;
        }
    }

    /// Stop everything.
    pub async fn shutdown(&self) {
        let subs = std::mem::take(&mut *self.subscriptions.lock().unwrap());
        for (_, sub) in subs {
            sub.cancel(&self.log).await;
        }
    }
}

async fn poll_loop(
    log: slog::Logger,
    query: Arc<dyn QueryService>,
    target: Target,
    period: Duration,
    token: CancellationToken,
    outbox: Outbox,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let up = match query.uptime(&target).await {
            Ok(up) => up,
            Err(e) => {
                warn!(log, "poll failed: {e}");
                continue;
            }
        };
        if token.is_cancelled() {
            break;
        }
        let msg = ServerMessage::MonitoringData {
            host: target.host.clone(),
            data: MonitoringData {
                up_time: up.ticks,
                timestamp: Utc::now(),
                synthesized: up.synthesized,
            },
        };
        if outbox.send(msg).is_err() {
            debug!(log, "subscriber went away");
            break;
        }
    }
}
