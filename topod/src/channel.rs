// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! The live-monitoring websocket channel.
//!
//! Each connected client is a subscriber.  Frames from the client are decoded
//! into `ClientMessage`s and dispatched to the monitor; everything the monitor
//! and the dispatcher have to say goes through a single outbox, drained by a
//! writer task that owns the sink half of the socket.

use std::sync::Arc;

use futures::SinkExt;
use futures::StreamExt;
use slog::debug;
use slog::info;
use slog::o;
use slog::warn;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use topod_types::channel::ClientMessage;
use topod_types::channel::ServerMessage;
use uuid::Uuid;

use crate::monitor::Outbox;
use crate::Global;

/// Run one client connection until the client goes away.
pub async fn serve<S>(global: Arc<Global>, ws: WebSocketStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let subscriber = Uuid::new_v4();
    let log = global
        .log
        .new(o!("unit" => "channel", "subscriber" => subscriber.to_string()));
    info!(log, "client connected");

    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer_log = log.clone();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    warn!(writer_log, "failed to encode message: {e}");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!(writer_log, "write failed: {e}");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                dispatch(&log, &global, subscriber, &tx, &text).await
            }
            Ok(Message::Close(_)) => break,
            // Pings are answered by the protocol layer
            Ok(_) => {}
            Err(e) => {
                debug!(log, "read failed: {e}");
                break;
            }
        }
    }

    global.monitor.stop_all(subscriber).await;
    drop(tx);
    if let Err(e) = writer.await {
        warn!(log, "writer task failed: {e:?}");
    }
    info!(log, "client disconnected");
}

/// Act on one text frame from a subscriber.  Frames that do not decode are
/// logged and otherwise ignored.
pub async fn dispatch(
    log: &slog::Logger,
    global: &Global,
    subscriber: Uuid,
    outbox: &Outbox,
    text: &str,
) {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(log, "ignoring malformed message: {e}");
            return;
        }
    };

    match msg {
        ClientMessage::StartMonitoring {
            host,
            community,
            version,
            interval,
        } => match global.target(&host, &community, version) {
            Ok(target) => {
                global
                    .monitor
                    .start(subscriber, outbox.clone(), target, interval)
                    .await
            }
            Err(e) => warn!(log, "ignoring start_monitoring: {e}"),
        },
        // Not awaited, so the reader keeps going while an in-flight poll
        // for this host finishes
        ClientMessage::StopMonitoring { host } => {
            let _ = global.monitor.stop(subscriber, host.trim());
        }
        ClientMessage::Ping => {
            let _ = outbox.send(ServerMessage::pong());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use topod_types::channel::ServerMessage;
    use uuid::Uuid;

    use super::dispatch;
    use crate::mock::MockAgent;
    use crate::mock::MockConnector;
    use crate::test_global;

    fn global() -> std::sync::Arc<crate::Global> {
        let connector = MockConnector::new();
        connector.add_agent("sw1", MockAgent::switch("sw1"));
        test_global(connector)
    }

    #[tokio::test]
    async fn test_ping() {
        let g = global();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatch(&g.log, &g, Uuid::new_v4(), &tx, r#"{"type":"ping"}"#).await;
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Pong { .. })));
    }

    #[tokio::test]
    async fn test_malformed() {
        let g = global();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        for text in [
            "not json",
            r#"{"type":"reboot"}"#,
            r#"{"type":"start_monitoring"}"#,
            r#"{"type":"start_monitoring","host":"  "}"#,
        ] {
            dispatch(&g.log, &g, id, &tx, text).await;
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(g.monitor.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop() {
        let g = global();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let start = r#"{"type":"start_monitoring","host":"sw1","interval":500}"#;
        dispatch(&g.log, &g, id, &tx, start).await;
        assert_eq!(g.monitor.len(), 1);
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::MonitoringStarted { interval: 500, .. })
        ));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::MonitoringData { .. })
        ));

        let stop = r#"{"type":"stop_monitoring","host":"sw1"}"#;
        dispatch(&g.log, &g, id, &tx, stop).await;
        assert_eq!(g.monitor.len(), 0);
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::MonitoringStopped { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_while_stopping() {
        let connector = MockConnector::new();
        let agent = MockAgent::switch("sw1");
        agent.set_latency(Duration::from_millis(40));
        connector.add_agent("sw1", agent);
        let g = test_global(connector);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let start = r#"{"type":"start_monitoring","host":"sw1","interval":500}"#;
        dispatch(&g.log, &g, id, &tx, start).await;
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::MonitoringStarted { .. })
        ));

        // The first poll is still waiting on the agent when the stop lands
        tokio::time::sleep(Duration::from_millis(510)).await;
        let stop = r#"{"type":"stop_monitoring","host":"sw1"}"#;
        dispatch(&g.log, &g, id, &tx, stop).await;
        dispatch(&g.log, &g, id, &tx, r#"{"type":"ping"}"#).await;

        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Pong { .. })));
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::MonitoringStopped { .. })
        ));
        assert!(rx.try_recv().is_err());
    }
}
