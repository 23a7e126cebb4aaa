use std::collections::BTreeMap;

use anyhow::{Context, Result};
use axum::{Router, body::Bytes, extract::State, http::StatusCode, routing::post};
use serde_json::Value;
use tokio::{net::TcpListener, sync::mpsc};

use adpulse::{
    AdEventType,
    config::{ObserverConfig, ObserverDefinition, WebhookObserverConfig},
    observer::{AdEventOutcome, instantiate_observer},
};

#[tokio::test(flavor = "multi_thread")]
async fn webhook_observer_posts_outcome_payload() -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(1);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind webhook listener")?;
    let addr = listener
        .local_addr()
        .context("failed to read listener address")?;
    let app = Router::new()
        .route(
            "/hook",
            post(
                |State(tx): State<mpsc::Sender<Vec<u8>>>, body: Bytes| async move {
                    if tx.send(body.to_vec()).await.is_err() {
                        return StatusCode::INTERNAL_SERVER_ERROR;
                    }
                    StatusCode::OK
                },
            ),
        )
        .with_state(tx.clone());

    let server_handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            eprintln!("webhook server error: {err}");
        }
    });

    let endpoint = format!("http://{}/hook", addr);
    let definition = ObserverDefinition {
        enabled: true,
        name: Some("webhook-regression".to_string()),
        config: ObserverConfig::Webhook(WebhookObserverConfig {
            endpoint,
            headers: BTreeMap::from([("X-Test".to_string(), "ok".to_string())]),
            https: false,
        }),
    };
    let outcome = AdEventOutcome::Failed {
        placement_id: "placement-123".into(),
        creative_instance_id: "creative-123".into(),
        event_type: AdEventType::Viewed,
    };

    // The blocking HTTP client must live off the async executor.
    let notify_handle = tokio::task::spawn_blocking(move || {
        let observer = instantiate_observer(&definition);
        observer.notify(&outcome)
    });
    notify_handle
        .await
        .context("notify task panicked")?
        .context("observer notify failed")?;

    let body = rx
        .recv()
        .await
        .context("server did not receive webhook request")?;
    server_handle.abort();

    let received: Value = serde_json::from_slice(&body).context("payload is not JSON")?;
    assert_eq!(received["outcome"], "failed");
    assert_eq!(received["placement_id"], "placement-123");
    assert_eq!(received["creative_instance_id"], "creative-123");
    assert_eq!(received["event_type"], "viewed");
    Ok(())
}
