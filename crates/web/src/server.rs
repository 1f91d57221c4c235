use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use {
    axum::{
        Json, Router,
        extract::State,
        response::IntoResponse,
        routing::{get, post},
    },
    tower_http::trace::TraceLayer,
    tracing::info,
};

use crate::{pages, state::AppState, submit};

/// Build the router (shared between production startup and tests).
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/wall", get(pages::wall))
        .route("/assets/style.css", get(pages::stylesheet))
        .route("/api/submit", post(submit::submit))
        .route("/api/requests", get(pages::list_requests))
        .route("/api/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn start_server(
    bind: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = socket_addr(bind, port)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let channel = state.status.snapshot();
    let lines = [
        format!("prayerwall v{}", state.version),
        format!("listening on http://{addr}"),
        format!(
            "relay: {} ({})",
            channel.channel,
            state.target.as_deref().unwrap_or("no target group")
        ),
    ];
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("http server stopped");
    Ok(())
}

/// Accepts bare IPv4 and IPv6 addresses, e.g. `0.0.0.0` or `::1`.
fn socket_addr(bind: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let ip: IpAddr = bind
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address '{bind}': {e}"))?;
    Ok(SocketAddr::from((ip, port)))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "whatsapp": state.status.snapshot(),
    }))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use {
        async_trait::async_trait,
        axum::{
            body::{Body, to_bytes},
            http::{Request, StatusCode, header},
        },
        prayerwall_channels::{ChannelHealthSnapshot, ChannelOutbound, ChannelStatus},
        prayerwall_store::PrayerStore,
        serde_json::Value,
        tower::ServiceExt,
    };

    use super::*;

    /// Page size used by `/wall`.
    const WALL_PAGE: usize = 100;

    #[derive(Default)]
    struct RecordingOutbound {
        sent: Mutex<Vec<(String, String)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ChannelOutbound for RecordingOutbound {
        async fn send_message(&self, target: &str, text: &str) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((target.to_string(), text.to_string()));
            !self.fail.load(Ordering::SeqCst)
        }
    }

    impl ChannelStatus for RecordingOutbound {
        fn snapshot(&self) -> ChannelHealthSnapshot {
            ChannelHealthSnapshot {
                channel: "test".into(),
                state: "ready".into(),
                ready: true,
            }
        }
    }

    async fn setup(target: Option<&str>) -> (Router, Arc<RecordingOutbound>, PrayerStore) {
        let store = PrayerStore::in_memory().await.unwrap();
        let outbound = Arc::new(RecordingOutbound::default());
        let state = AppState::new(
            store.clone(),
            Arc::clone(&outbound),
            target.map(str::to_string),
        );
        (build_app(state), outbound, store)
    }

    async fn post_json(app: &Router, body: &str) -> (StatusCode, Value) {
        let resp = app
            .clone()
            .oneshot(
                Request::post("/api/submit")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_text(app: &Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn submit_stores_and_relays() {
        let (app, outbound, store) = setup(Some("120363@g.us")).await;
        let (status, body) = post_json(&app, r#"{"message":"for my mother"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "success": true }));

        assert_eq!(store.list(10).await.unwrap()[0].content, "for my mother");
        let sent = outbound.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(
            "120363@g.us".to_string(),
            "🙏 *New Anonymous Request:* for my mother".to_string()
        )]);
    }

    #[tokio::test]
    async fn relay_failure_does_not_fail_submission() {
        let (app, outbound, store) = setup(Some("120363@g.us")).await;
        outbound.fail.store(true, Ordering::SeqCst);
        let (status, _) = post_json(&app, r#"{"message":"still saved"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_target_skips_relay() {
        let (app, outbound, store) = setup(None).await;
        let (status, _) = post_json(&app, r#"{"message":"quiet"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(outbound.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn over_limit_message_never_reaches_channel() {
        let (app, outbound, store) = setup(Some("120363@g.us")).await;
        let body = serde_json::json!({ "message": "a".repeat(1001) }).to_string();
        let (status, body) = post_json(&app, &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message too long (max 1000 chars)");
        assert!(outbound.sent.lock().unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_bodies_are_rejected() {
        let (app, outbound, _) = setup(Some("120363@g.us")).await;

        let (status, body) = post_json(&app, r#"{"message":""}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message is required");

        let (status, body) = post_json(&app, "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON body");

        assert!(outbound.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn feed_lists_newest_first() {
        let (app, _, store) = setup(None).await;
        store.insert("first").await.unwrap();
        store.insert("second <b>").await.unwrap();

        let (status, body) = get_text(&app, "/api/requests?limit=1").await;
        assert_eq!(status, StatusCode::OK);
        let list: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["content"], "second <b>");

        let (status, html) = get_text(&app, "/wall").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("second &lt;b&gt;"));
        assert!(html.find("second").unwrap() < html.find("first").unwrap());
    }

    #[tokio::test]
    async fn wall_pages_through_older_requests() {
        let (app, _, store) = setup(None).await;
        for i in 0..=WALL_PAGE {
            store.insert(&format!("request {i}")).await.unwrap();
        }

        let (_, first) = get_text(&app, "/wall").await;
        assert!(first.contains("request 100"));
        assert!(!first.contains("request 0<"));
        assert!(first.contains(r#"href="/wall?page=2""#));

        let (status, second) = get_text(&app, "/wall?page=2").await;
        assert_eq!(status, StatusCode::OK);
        assert!(second.contains("request 0<"));
        assert!(second.contains(r#"href="/wall?page=1""#));
        assert!(!second.contains("page=3"));
    }

    #[test]
    fn bind_accepts_ipv4_and_ipv6() {
        assert_eq!(
            socket_addr("127.0.0.1", 3000).unwrap(),
            "127.0.0.1:3000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            socket_addr("::1", 3000).unwrap(),
            "[::1]:3000".parse::<SocketAddr>().unwrap()
        );
        assert!(socket_addr("localhost", 3000).is_err());
    }

    #[tokio::test]
    async fn server_binds_ipv6_loopback() {
        let (_, _, store) = setup(None).await;
        let state = AppState::without_channel(store);
        // Port 0 picks a free port; an immediate shutdown stops the server.
        let res = start_server("::1", 0, state, async {}).await;
        if let Err(e) = &res {
            // Hosts without IPv6 fail at bind, not at address parsing.
            assert!(!e.to_string().contains("invalid bind address"), "{e:#}");
        }
    }

    #[tokio::test]
    async fn health_reports_channel() {
        let (app, _, _) = setup(None).await;
        let (status, body) = get_text(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["whatsapp"]["ready"], true);
    }

    #[tokio::test]
    async fn form_page_is_served() {
        let (app, _, _) = setup(None).await;
        let (status, html) = get_text(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("prayer-form"));
    }
}
