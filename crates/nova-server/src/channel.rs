//! WebSocket reload channel sessions.
//!
//! One session per accepted upgrade. The session starts subscribed to the
//! topic of the path that produced the upgrade and grows its subscription
//! set from client messages: the only accepted payload is a JSON array of
//! topic strings. Anything else is a protocol violation and closes the
//! connection with a policy-violation close frame; there is no recovery
//! path for malformed input.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use std::sync::Arc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, warn};

use crate::watch::{ReloadHub, ReloadSignal};

/// Client payload that is not a JSON array of strings.
#[derive(Debug, thiserror::Error)]
#[error("expected a JSON array of topic strings: {0}")]
pub struct ProtocolError(#[from] serde_json::Error);

/// Parse one client subscription message.
pub fn parse_subscription(text: &str) -> Result<Vec<String>, ProtocolError> {
    Ok(serde_json::from_str::<Vec<String>>(text)?)
}

/// Drive one reload channel session to completion.
///
/// Subscriptions live in a per-session stream map; dropping it on return
/// releases every broadcast receiver at once.
pub async fn run_session(mut socket: WebSocket, hub: Arc<ReloadHub>, primary: String) {
    let mut subscriptions: StreamMap<String, BroadcastStream<ReloadSignal>> = StreamMap::new();
    subscriptions.insert(primary.clone(), BroadcastStream::new(hub.subscribe(&primary)));
    debug!(topic = %primary, "reload channel opened");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match parse_subscription(&text) {
                            Ok(topics) => {
                                for topic in topics {
                                    if !subscriptions.contains_key(&topic) {
                                        debug!(topic = %topic, "subscribing reload channel");
                                        subscriptions.insert(
                                            topic.clone(),
                                            BroadcastStream::new(hub.subscribe(&topic)),
                                        );
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "closing reload channel on protocol violation");
                                close_on_violation(socket).await;
                                return;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("closing reload channel on binary frame");
                        close_on_violation(socket).await;
                        return;
                    }
                    // Transport-level frames; axum answers pings itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("reload channel closed by client");
                        return;
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "reload channel transport error");
                        return;
                    }
                }
            }
            Some((topic, event)) = subscriptions.next() => {
                let signal = match event {
                    Ok(signal) => signal,
                    // Missed signals still mean something changed.
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        debug!(topic = %topic, missed, "reload channel lagged");
                        ReloadSignal { kind: "update", path: topic }
                    }
                };
                let payload = match serde_json::to_string(&signal) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize reload signal");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn close_on_violation(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: "expected a JSON array of topic strings".into(),
        })))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_router_with;
    use crate::config::ServeConfig;
    use crate::watch::WatchRegistry;
    use futures_util::{SinkExt, StreamExt};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    /// Serve a one-page site on an ephemeral port, returning the hub so
    /// tests can publish into live sessions.
    async fn spawn_site() -> (Arc<ReloadHub>, SocketAddr, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();

        let hub = Arc::new(ReloadHub::new());
        let registry = Arc::new(WatchRegistry::new(Arc::clone(&hub), dir.path()));
        let config = ServeConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let router = build_router_with(config, Arc::clone(&hub), registry);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (hub, addr, dir)
    }

    /// Publish to `topic` until a session receives it. Subscriptions are
    /// processed on the session task, so early publishes can land first.
    async fn publish_until_delivered(hub: &ReloadHub, topic: &str) -> usize {
        for _ in 0..200 {
            let delivered = hub.publish(
                topic,
                ReloadSignal {
                    kind: "update",
                    path: topic.to_string(),
                },
            );
            if delivered > 0 {
                return delivered;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        0
    }

    /// Publish to `topic` until no session receives it anymore.
    async fn publish_until_released(hub: &ReloadHub, topic: &str) -> usize {
        let mut delivered = 0;
        for _ in 0..200 {
            delivered = hub.publish(
                topic,
                ReloadSignal {
                    kind: "update",
                    path: topic.to_string(),
                },
            );
            if delivered == 0 {
                return 0;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        delivered
    }

    #[tokio::test]
    async fn test_session_subscribes_primary_and_requested_topics() {
        let (hub, addr, _dir) = spawn_site().await;
        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/index.html"))
            .await
            .unwrap();

        socket
            .send(WsMessage::Text(r#"["a/b.css", "c/d.png"]"#.into()))
            .await
            .unwrap();

        // Primary topic from the upgrade path plus both requested topics.
        for topic in ["index.html", "a/b.css", "c/d.png"] {
            assert_eq!(
                publish_until_delivered(&hub, topic).await,
                1,
                "no session subscribed to {topic}"
            );
            let frame = socket.next().await.unwrap().unwrap();
            let payload = frame.into_text().unwrap();
            assert!(payload.contains(topic));
        }
    }

    #[tokio::test]
    async fn test_closing_releases_every_subscription() {
        let (hub, addr, _dir) = spawn_site().await;
        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/index.html"))
            .await
            .unwrap();

        socket
            .send(WsMessage::Text(r#"["a/b.css"]"#.into()))
            .await
            .unwrap();
        assert_eq!(publish_until_delivered(&hub, "a/b.css").await, 1);

        socket.close(None).await.unwrap();
        drop(socket);

        assert_eq!(publish_until_released(&hub, "a/b.css").await, 0);
        assert_eq!(publish_until_released(&hub, "index.html").await, 0);
    }

    #[tokio::test]
    async fn test_violation_closes_with_policy_code() {
        let (hub, addr, _dir) = spawn_site().await;
        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/index.html"))
            .await
            .unwrap();

        socket
            .send(WsMessage::Text("not json".into()))
            .await
            .unwrap();

        let frame = loop {
            match socket.next().await.unwrap().unwrap() {
                WsMessage::Close(frame) => break frame,
                _ => {}
            }
        };
        let frame = frame.expect("close frame carries a code");
        assert_eq!(frame.code, CloseCode::Policy);

        assert_eq!(publish_until_released(&hub, "index.html").await, 0);
    }

    #[test]
    fn test_valid_subscription() {
        let topics = parse_subscription(r#"["a/b.css", "c/d.png"]"#).unwrap();
        assert_eq!(topics, vec!["a/b.css", "c/d.png"]);
    }

    #[test]
    fn test_empty_array_is_valid() {
        assert!(parse_subscription("[]").unwrap().is_empty());
    }

    #[test]
    fn test_non_array_rejected() {
        assert!(parse_subscription(r#"{"topic": "a"}"#).is_err());
        assert!(parse_subscription(r#""just a string""#).is_err());
        assert!(parse_subscription("42").is_err());
    }

    #[test]
    fn test_non_string_element_rejected() {
        assert!(parse_subscription(r#"["a", 1]"#).is_err());
        assert!(parse_subscription(r#"[null]"#).is_err());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(parse_subscription("not json").is_err());
    }
}
