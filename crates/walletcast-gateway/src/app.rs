use axum::{routing::get, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use walletcast_core::config::WalletcastConfig;
use walletcast_hub::HubHandle;

use crate::ws::broadcast::EventBroadcaster;

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: WalletcastConfig,
    /// Command side of the Hub actor; every client mutation goes through it.
    pub hub: HubHandle,
    /// Legacy namespace channel, also handed to the relay as its donation sink.
    pub donations: Arc<EventBroadcaster>,
    /// Root token; cancelled on Ctrl-C to end every session loop.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: WalletcastConfig,
        hub: HubHandle,
        donations: Arc<EventBroadcaster>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            hub,
            donations,
            shutdown,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(crate::ws::connection::ws_handler))
        .route("/health", get(crate::http::health::health_handler));
    if state.config.donations.enabled {
        router = router.route("/donations", get(crate::ws::donations::donations_handler));
    }
    router
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;
    use tower::ServiceExt;
    use walletcast_hub::Hub;
    use walletcast_relay::NamespaceBroadcaster;

    fn state(config: WalletcastConfig) -> Arc<AppState> {
        let (hub, handle) = Hub::new(&config.hub);
        let shutdown = CancellationToken::new();
        tokio::spawn(hub.run(shutdown.clone()));
        Arc::new(AppState::new(
            config,
            handle,
            Arc::new(EventBroadcaster::new()),
            shutdown,
        ))
    }

    async fn serve(state: Arc<AppState>) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn next_text<S>(ws: &mut S) -> serde_json::Value
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("timed out waiting for a frame")
                .unwrap()
                .unwrap();
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn health_reports_clients_and_mode() {
        let app = build_router(state(WalletcastConfig::default()));
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["clients"], 0);
        assert_eq!(json["price_mode"], "nano");
        assert_eq!(json["donations"], false);
    }

    #[tokio::test]
    async fn health_is_degraded_once_hub_stops() {
        let state = state(WalletcastConfig::default());
        state.shutdown.cancel();
        // let the hub observe cancellation and drop its receiver
        tokio::time::sleep(Duration::from_millis(50)).await;

        let resp = build_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "degraded");
    }

    #[tokio::test]
    async fn donations_route_only_exists_when_enabled() {
        let disabled = build_router(state(WalletcastConfig::default()));
        let resp = disabled
            .oneshot(Request::get("/donations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let mut config = WalletcastConfig::default();
        config.donations.enabled = true;
        let enabled = build_router(state(config));
        let resp = enabled
            .oneshot(Request::get("/donations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        // plain GET without upgrade headers is rejected by the extractor, not routed away
        assert_ne!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn subscribed_socket_receives_account_payloads() {
        let state = state(WalletcastConfig::default());
        let hub = state.hub.clone();
        let addr = serve(state).await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
            .await
            .unwrap();
        ws.send(Message::text(
            r#"{"action":"account_subscribe","account":"nano_3dest","currency":"eur"}"#,
        ))
        .await
        .unwrap();

        let ack = next_text(&mut ws).await;
        assert_eq!(ack["ack"], "subscribed");
        assert_eq!(ack["currency"], "EUR");

        hub.broadcast_to_account("nano_3dest".into(), r#"{"hash":"ABC"}"#.into())
            .await
            .unwrap();
        let payload = next_text(&mut ws).await;
        assert_eq!(payload["hash"], "ABC");

        ws.close(None).await.unwrap();
        // unregister happens on the server side after the close frame
        tokio::time::timeout(Duration::from_secs(2), async {
            while hub.client_count().await.unwrap() != 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client must be unregistered after close");
    }

    #[tokio::test]
    async fn oversized_frame_closes_the_connection() {
        let state = state(WalletcastConfig::default());
        let hub = state.hub.clone();
        let addr = serve(state).await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while hub.client_count().await.unwrap() != 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let oversized = "x".repeat(walletcast_core::config::MAX_PAYLOAD_BYTES + 1024);
        // the server may reset before the write completes
        let _ = ws.send(Message::text(oversized)).await;

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await
        .expect("server must end the session");

        tokio::time::timeout(Duration::from_secs(2), async {
            while hub.client_count().await.unwrap() != 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("oversized sender must be unregistered");
    }

    #[tokio::test]
    async fn donation_listener_receives_namespace_events() {
        let mut config = WalletcastConfig::default();
        config.donations.enabled = true;
        let state = state(config);
        let donations = state.donations.clone();
        let addr = serve(state).await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/donations"))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while donations.listeners() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        donations.broadcast_to_namespace(
            "/",
            "donation_event",
            serde_json::json!({ "amount": "1000" }),
        );
        let frame = next_text(&mut ws).await;
        assert_eq!(frame["namespace"], "/");
        assert_eq!(frame["event"], "donation_event");
        assert_eq!(frame["data"]["amount"], "1000");
    }
}
