#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request};
use ed25519_dalek::{Signer, SigningKey};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

use gatekeeper_bot::config::{Config, DiscordConfig, VerificationConfig};
use gatekeeper_bot::error::PlatformError;
use gatekeeper_bot::models::{Quiz, Surface, View};
use gatekeeper_bot::services::platform::Platform;
use gatekeeper_bot::services::AppState;

pub const ROLE_ID: &str = "role-verified";
pub const SUPPORT_CHANNEL: &str = "#help-desk";
pub const ADMIN_ID: &str = "admin-1";

/// Platform double: every render lands in a channel, grants and notices are kept.
pub struct RecordingPlatform {
    renders: mpsc::UnboundedSender<(String, View)>,
    pub grants: Mutex<Vec<(String, String)>>,
    pub notices: Mutex<Vec<String>>,
    fail_grants: AtomicBool,
}

impl RecordingPlatform {
    pub fn failing_grants(&self) {
        self.fail_grants.store(true, Ordering::SeqCst);
    }

    pub fn grants(&self) -> Vec<(String, String)> {
        self.grants.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn render(&self, surface: &Surface, view: &View) -> Result<(), PlatformError> {
        let _ = self
            .renders
            .send((surface.interaction_token.clone(), view.clone()));
        Ok(())
    }

    async fn grant_capability(&self, user_id: &str, role_id: &str) -> Result<(), PlatformError> {
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(PlatformError::Status {
                status: 403,
                body: "Missing Permissions".to_string(),
            });
        }
        self.grants
            .lock()
            .unwrap()
            .push((user_id.to_string(), role_id.to_string()));
        Ok(())
    }

    async fn notify_operators(&self, message: &str) -> Result<(), PlatformError> {
        self.notices.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

pub struct TestHarness {
    pub state: Arc<AppState>,
    pub platform: Arc<RecordingPlatform>,
    renders: mpsc::UnboundedReceiver<(String, View)>,
    _dir: TempDir,
}

impl TestHarness {
    /// Next render on any surface.
    pub async fn next_render(&mut self) -> (String, View) {
        tokio::time::timeout(Duration::from_secs(5), self.renders.recv())
            .await
            .expect("timed out waiting for a render")
            .expect("render channel closed")
    }

    /// Skips renders on `token` until one satisfies `accept`.
    pub async fn render_matching(&mut self, token: &str, accept: impl Fn(&View) -> bool) -> View {
        loop {
            let (surface, view) = self.next_render().await;
            if surface == token && accept(&view) {
                return view;
            }
        }
    }

    /// Fails if anything renders within `window`.
    pub async fn assert_quiet(&mut self, window: Duration) {
        if let Ok(Some((token, view))) = tokio::time::timeout(window, self.renders.recv()).await {
            panic!("unexpected render on {}: {:?}", token, view);
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.state.store.path().to_path_buf()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

pub fn test_config(responses_path: PathBuf, flow_timeout: Duration) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        discord: DiscordConfig {
            application_id: "app-1".to_string(),
            public_key: hex::encode(signing_key().verifying_key().to_bytes()),
            bot_token: "test-token".to_string(),
            guild_id: "guild-1".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
        },
        verification: VerificationConfig {
            support_channel: SUPPORT_CHANNEL.to_string(),
            operator_channel_id: Some("ops-1".to_string()),
            responses_path,
            flow_timeout,
            admin_user_ids: vec![ADMIN_ID.to_string()],
        },
        quiz: Quiz::default_for("member", ROLE_ID),
    }
}

pub async fn harness() -> TestHarness {
    harness_with_timeout(Duration::from_secs(30)).await
}

pub async fn harness_with_timeout(flow_timeout: Duration) -> TestHarness {
    init_tracing();

    let dir = TempDir::new().expect("tempdir");
    let config = test_config(dir.path().join("responses.json"), flow_timeout);
    let (tx, rx) = mpsc::unbounded_channel();
    let platform = Arc::new(RecordingPlatform {
        renders: tx,
        grants: Mutex::new(Vec::new()),
        notices: Mutex::new(Vec::new()),
        fail_grants: AtomicBool::new(false),
    });

    let state = AppState::with_platform(config, platform.clone())
        .await
        .expect("Failed to initialize test app state");

    TestHarness {
        state: Arc::new(state),
        platform,
        renders: rx,
        _dir: dir,
    }
}

/// POST /interactions signed the way Discord signs it.
pub fn signed_request(body: &serde_json::Value) -> Request<Body> {
    let body = serde_json::to_vec(body).unwrap();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = signing_key().sign(&[timestamp.as_bytes(), body.as_slice()].concat());

    Request::builder()
        .method("POST")
        .uri("/interactions")
        .header("content-type", "application/json")
        .header("x-signature-ed25519", hex::encode(signature.to_bytes()))
        .header("x-signature-timestamp", timestamp)
        .body(Body::from(body))
        .unwrap()
}

pub const CORRECT_ANSWERS: [(&str, &str); 2] = [
    ("ask-for-solutions", "No"),
    ("rules-in-dms", "No, they will be harsher than in public channels"),
];
