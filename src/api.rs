//! HTTP server: LINE webhook callback and the cron broadcast trigger.
//!
//! All state is built once at startup and shared read-only across requests;
//! handlers hold trait objects so tests can substitute mocks.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use eggbird_core::config::Config;
use eggbird_core::prompt::{daily_prompt, PromptMode, BROADCAST_GREETING, GREETING_REPLY, WELCOME_MESSAGE};
use eggbird_core::traits::{Channel, Provider};
use eggbird_line::events::{parse_webhook, MessageContent, WebhookEvent};
use eggbird_line::signature;
use eggbird_providers::complete_or_fallback;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::dispatch::{route_text, Action};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    channel: Arc<dyn Channel>,
    provider: Arc<dyn Provider>,
    channel_secret: String,
    cron_token: String,
    prompt_mode: PromptMode,
}

/// Constant-time string comparison to prevent timing attacks on the cron token.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// `GET /` — liveness line.
async fn home() -> &'static str {
    "EggBird LINE bot is running"
}

/// `POST /callback` — inbound LINE webhook.
///
/// Signature mismatch rejects the whole delivery before any event is looked
/// at. Once verified, every event is dispatched and the response is always
/// `200 OK`: per-event reply failures are logged, never surfaced.
async fn callback(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    let signature = match headers.get("x-line-signature").and_then(|v| v.to_str().ok()) {
        Some(s) => s,
        None => {
            warn!("callback: missing X-Line-Signature header");
            return (StatusCode::BAD_REQUEST, "missing signature");
        }
    };

    if !signature::verify(&state.channel_secret, signature, body.as_bytes()) {
        warn!("callback: signature verification failed");
        return (StatusCode::BAD_REQUEST, "invalid signature");
    }

    let payload = match parse_webhook(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!("callback: {e}");
            return (StatusCode::BAD_REQUEST, "invalid payload");
        }
    };

    for event in payload.events {
        handle_event(&state, event).await;
    }

    (StatusCode::OK, "OK")
}

/// Dispatch one webhook event to at most one outbound reply.
async fn handle_event(state: &ApiState, event: WebhookEvent) {
    match event {
        WebhookEvent::Join { reply_token } => {
            info!("join event: sending welcome");
            send_reply(state, &reply_token, WELCOME_MESSAGE).await;
        }
        WebhookEvent::Message {
            reply_token,
            source,
            message,
        } => {
            let MessageContent::Text { text, .. } = message else {
                return;
            };
            let Some(action) = route_text(&text) else {
                return;
            };

            let sender = source
                .and_then(|s| s.user_id)
                .unwrap_or_else(|| "unknown".to_string());
            info!("text message from {sender}: {action:?}");

            let reply = match action {
                Action::Greeting => GREETING_REPLY.to_string(),
                Action::DailyAdvice => {
                    let prompt = daily_prompt(Utc::now(), state.prompt_mode);
                    complete_or_fallback(state.provider.as_ref(), &prompt).await
                }
                Action::FreeForm(prompt) => {
                    complete_or_fallback(state.provider.as_ref(), &prompt).await
                }
            };

            send_reply(state, &reply_token, &reply).await;
        }
        WebhookEvent::Other => {}
    }
}

/// Best-effort reply: failures are logged and swallowed (the webhook
/// response is already committed to `200 OK`).
async fn send_reply(state: &ApiState, reply_token: &str, text: &str) {
    if let Err(e) = state.channel.reply(reply_token, text).await {
        error!("reply send failed: {e}");
    }
}

/// `GET /cron_trigger` — scheduled morning broadcast.
///
/// Intended for a trusted external scheduler. With `cron_token` configured,
/// the caller must present it in `X-Cron-Token`. The completion step never
/// fails (fallback policy), so the only failure path is the broadcast.
async fn cron_trigger(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    if !state.cron_token.is_empty() {
        let presented = headers
            .get("x-cron-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !constant_time_eq(presented, &state.cron_token) {
            warn!("cron trigger: invalid or missing token");
            return (StatusCode::UNAUTHORIZED, "invalid cron token".to_string());
        }
    }

    info!("cron trigger: building morning broadcast");
    let prompt = daily_prompt(Utc::now(), state.prompt_mode);
    let advice = complete_or_fallback(state.provider.as_ref(), &prompt).await;
    let text = format!("{BROADCAST_GREETING}\n{advice}");

    match state.channel.broadcast(&text).await {
        Ok(()) => (StatusCode::OK, "Morning Broadcast Sent!".to_string()),
        Err(e) => {
            error!("broadcast failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}"))
        }
    }
}

/// Build the axum router with shared state.
fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/callback", post(callback))
        .route("/cron_trigger", get(cron_trigger))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .with_state(state)
}

/// Start the HTTP server. Runs until the process exits.
pub async fn serve(config: &Config, channel: Arc<dyn Channel>, provider: Arc<dyn Provider>) {
    let state = ApiState {
        channel,
        provider,
        channel_secret: config.line.channel_secret.clone(),
        cron_token: config.server.cron_token.clone(),
        prompt_mode: config.prompt.mode,
    };

    let app = build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("EggBird listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use eggbird_core::error::EggbirdError;
    use eggbird_providers::FALLBACK_REPLY;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const TEST_SECRET: &str = "test_channel_secret";

    // -----------------------------------------------------------------------
    // Mocks
    // -----------------------------------------------------------------------

    /// Records replies and broadcasts; optionally fails either path.
    struct MockChannel {
        replies: Arc<Mutex<Vec<(String, String)>>>,
        broadcasts: Arc<Mutex<Vec<String>>>,
        fail_reply: bool,
        fail_broadcast: bool,
    }

    impl MockChannel {
        fn new() -> Self {
            Self {
                replies: Arc::new(Mutex::new(Vec::new())),
                broadcasts: Arc::new(Mutex::new(Vec::new())),
                fail_reply: false,
                fail_broadcast: false,
            }
        }
    }

    #[async_trait]
    impl Channel for MockChannel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn reply(&self, reply_token: &str, text: &str) -> Result<(), EggbirdError> {
            if self.fail_reply {
                return Err(EggbirdError::Channel("connection reset".to_string()));
            }
            self.replies
                .lock()
                .unwrap()
                .push((reply_token.to_string(), text.to_string()));
            Ok(())
        }

        async fn broadcast(&self, text: &str) -> Result<(), EggbirdError> {
            if self.fail_broadcast {
                return Err(EggbirdError::Channel("quota exhausted".to_string()));
            }
            self.broadcasts.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    /// Records prompts; answers with a fixed string or fails.
    struct MockProvider {
        prompts: Arc<Mutex<Vec<String>>>,
        reply: Option<String>,
    }

    impl MockProvider {
        fn answering(text: &str) -> Self {
            Self {
                prompts: Arc::new(Mutex::new(Vec::new())),
                reply: Some(text.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                prompts: Arc::new(Mutex::new(Vec::new())),
                reply: None,
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn requires_api_key(&self) -> bool {
            false
        }

        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, EggbirdError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .ok_or_else(|| EggbirdError::Provider("simulated outage".to_string()))
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct TestBot {
        app: Router,
        replies: Arc<Mutex<Vec<(String, String)>>>,
        broadcasts: Arc<Mutex<Vec<String>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    fn test_bot_with(channel: MockChannel, provider: MockProvider, cron_token: &str) -> TestBot {
        let replies = Arc::clone(&channel.replies);
        let broadcasts = Arc::clone(&channel.broadcasts);
        let prompts = Arc::clone(&provider.prompts);
        let state = ApiState {
            channel: Arc::new(channel),
            provider: Arc::new(provider),
            channel_secret: TEST_SECRET.to_string(),
            cron_token: cron_token.to_string(),
            prompt_mode: PromptMode::Dynamic,
        };
        TestBot {
            app: build_router(state),
            replies,
            broadcasts,
            prompts,
        }
    }

    fn test_bot() -> TestBot {
        test_bot_with(MockChannel::new(), MockProvider::answering("AI 回覆"), "")
    }

    /// POST /callback with a valid signature for `body`.
    fn signed_callback(body: &str) -> Request<Body> {
        Request::post("/callback")
            .header("X-Line-Signature", signature::sign(TEST_SECRET, body.as_bytes()))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn text_event_body(text: &str) -> String {
        format!(
            r#"{{"events":[{{"type":"message","replyToken":"rt-1","source":{{"type":"user","userId":"U1"}},"message":{{"type":"text","id":"m1","text":"{text}"}}}}]}}"#
        )
    }

    async fn body_string(resp: axum::http::Response<Body>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Webhook: signature gate
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_callback_invalid_signature_returns_400_no_outbound() {
        let bot = test_bot();
        let req = Request::post("/callback")
            .header("X-Line-Signature", "bm90IGEgcmVhbCBzaWduYXR1cmU=")
            .body(Body::from(text_event_body("@雞蛋鳥健康助手")))
            .unwrap();
        let resp = bot.app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(bot.replies.lock().unwrap().is_empty());
        assert!(bot.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_callback_missing_signature_returns_400() {
        let bot = test_bot();
        let req = Request::post("/callback")
            .body(Body::from(text_event_body("hi")))
            .unwrap();
        let resp = bot.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_malformed_body_with_valid_signature_returns_400() {
        let bot = test_bot();
        let resp = bot.app.oneshot(signed_callback("not json")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(bot.replies.lock().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Webhook: keyword dispatch
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_keyword_only_replies_greeting_without_provider_call() {
        let bot = test_bot();
        let body = text_event_body("@雞蛋鳥健康助手");
        let resp = bot.app.oneshot(signed_callback(&body)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "OK");

        let replies = bot.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "rt-1");
        assert_eq!(replies[0].1, GREETING_REPLY);
        assert!(bot.prompts.lock().unwrap().is_empty(), "no completion call");
    }

    #[tokio::test]
    async fn test_no_keyword_yields_no_reply() {
        let bot = test_bot();
        let body = text_event_body("今天天氣真好");
        let resp = bot.app.oneshot(signed_callback(&body)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(bot.replies.lock().unwrap().is_empty());
        assert!(bot.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_test_phrase_routes_daily_prompt_to_provider() {
        let bot = test_bot();
        let body = text_event_body("@雞蛋鳥健康助手 測試三餐建議");
        let resp = bot.app.oneshot(signed_callback(&body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let prompts = bot.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(
            prompts[0].contains("三餐飲食建議"),
            "provider should receive the daily meal-advice prompt"
        );

        let replies = bot.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1, "AI 回覆");
    }

    #[tokio::test]
    async fn test_free_form_prompt_sent_verbatim() {
        let bot = test_bot();
        let body = text_event_body("@雞蛋鳥健康助手 晚餐推薦什麼？");
        let resp = bot.app.oneshot(signed_callback(&body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let prompts = bot.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0], "晚餐推薦什麼？");
    }

    #[tokio::test]
    async fn test_join_event_replies_welcome() {
        let bot = test_bot();
        let body = r#"{"events":[{"type":"join","replyToken":"rt-join"}]}"#;
        let resp = bot.app.oneshot(signed_callback(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let replies = bot.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "rt-join");
        assert_eq!(replies[0].1, WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn test_unknown_event_kinds_are_ignored() {
        let bot = test_bot();
        let body = r#"{"events":[{"type":"follow","replyToken":"rt-f"},{"type":"unfollow"}]}"#;
        let resp = bot.app.oneshot(signed_callback(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(bot.replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_replies_with_fallback() {
        let bot = test_bot_with(MockChannel::new(), MockProvider::failing(), "");
        let body = text_event_body("@雞蛋鳥健康助手 晚餐推薦什麼？");
        let resp = bot.app.oneshot(signed_callback(&body)).await.unwrap();

        // Completion failure never fails the request.
        assert_eq!(resp.status(), StatusCode::OK);
        let replies = bot.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_reply_send_failure_still_returns_200_ok() {
        let channel = MockChannel {
            fail_reply: true,
            ..MockChannel::new()
        };
        let bot = test_bot_with(channel, MockProvider::answering("hi"), "");
        let body = text_event_body("@雞蛋鳥健康助手");
        let resp = bot.app.oneshot(signed_callback(&body)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "OK");
    }

    #[tokio::test]
    async fn test_multiple_events_each_dispatched() {
        let bot = test_bot();
        let body = r#"{"events":[
            {"type":"join","replyToken":"rt-a"},
            {"type":"message","replyToken":"rt-b","message":{"type":"text","text":"@雞蛋鳥健康助手"}}
        ]}"#;
        let resp = bot.app.oneshot(signed_callback(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(bot.replies.lock().unwrap().len(), 2);
    }

    // -----------------------------------------------------------------------
    // Cron trigger
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_cron_trigger_broadcasts_and_confirms() {
        let bot = test_bot();
        let req = Request::get("/cron_trigger").body(Body::empty()).unwrap();
        let resp = bot.app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.contains("Sent"));

        let broadcasts = bot.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        assert!(broadcasts[0].starts_with(BROADCAST_GREETING));
        assert!(broadcasts[0].contains("AI 回覆"));

        let prompts = bot.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("三餐飲食建議"));
    }

    #[tokio::test]
    async fn test_cron_trigger_broadcast_failure_returns_500_with_error() {
        let channel = MockChannel {
            fail_broadcast: true,
            ..MockChannel::new()
        };
        let bot = test_bot_with(channel, MockProvider::answering("advice"), "");
        let req = Request::get("/cron_trigger").body(Body::empty()).unwrap();
        let resp = bot.app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(resp).await;
        assert!(body.starts_with("Error:"));
        assert!(body.contains("quota exhausted"));
    }

    #[tokio::test]
    async fn test_cron_trigger_provider_failure_still_broadcasts_fallback() {
        let bot = test_bot_with(MockChannel::new(), MockProvider::failing(), "");
        let req = Request::get("/cron_trigger").body(Body::empty()).unwrap();
        let resp = bot.app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let broadcasts = bot.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        assert!(broadcasts[0].contains(FALLBACK_REPLY));
    }

    #[tokio::test]
    async fn test_cron_trigger_token_required_when_configured() {
        let bot = test_bot_with(MockChannel::new(), MockProvider::answering("a"), "s3cret");

        // Missing token.
        let req = Request::get("/cron_trigger").body(Body::empty()).unwrap();
        let resp = bot.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // Wrong token.
        let req = Request::get("/cron_trigger")
            .header("X-Cron-Token", "wrong")
            .body(Body::empty())
            .unwrap();
        let resp = bot.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(bot.broadcasts.lock().unwrap().is_empty());

        // Correct token.
        let req = Request::get("/cron_trigger")
            .header("X-Cron-Token", "s3cret")
            .body(Body::empty())
            .unwrap();
        let resp = bot.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(bot.broadcasts.lock().unwrap().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Misc routes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_home_route() {
        let bot = test_bot();
        let req = Request::get("/").body(Body::empty()).unwrap();
        let resp = bot.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.contains("EggBird"));
    }

    #[tokio::test]
    async fn test_callback_rejects_get() {
        let bot = test_bot();
        let req = Request::get("/callback").body(Body::empty()).unwrap();
        let resp = bot.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
