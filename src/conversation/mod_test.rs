use super::*;
use crate::credentials::MemoryCredentialStore;
use crate::transport::TransportError;
use crate::transport::test_helpers::MockTransport;
use message::RenderHint;
use serde_json::{Value, json};

const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

fn catalog_body() -> Value {
    json!({
        "data": [
            { "id": "flux-schnell", "endpoint": "/v1/images/generations" },
            { "id": "gpt-4o" },
            { "id": "claude-3-haiku", "is_free": true }
        ]
    })
}

fn config() -> ClientConfig {
    ClientConfig { base_url: "https://api.test/v1/".into(), ..ClientConfig::default() }
}

fn store_with(mock: &Arc<MockTransport>, credentials: Arc<MemoryCredentialStore>) -> ConversationStore {
    ConversationStore::new(&config(), mock.clone(), credentials)
}

/// Store with a loaded catalog; the listing request is request 0.
async fn ready_store(mock: &Arc<MockTransport>) -> ConversationStore {
    mock.push_json(200, &catalog_body());
    let mut store = store_with(mock, Arc::new(MemoryCredentialStore::with_key("sk-test")));
    store.refresh_catalog_now().await.unwrap();
    store
}

fn chat_reply(text: &str) -> Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] })
}

// =============================================================================
// construction + catalog
// =============================================================================

#[test]
fn new_loads_key_and_normalizes_base_url() {
    let mock = Arc::new(MockTransport::new());
    let store = store_with(&mock, Arc::new(MemoryCredentialStore::with_key("sk-test")));
    assert_eq!(store.config().api_key, "sk-test");
    assert_eq!(store.config().base_url, "https://api.test/v1");
    assert_eq!(store.config().mode, Mode::Chat);
    assert_eq!(store.phase(), Phase::Idle);
    assert!(mock.requests().is_empty());
}

#[test]
fn new_without_stored_key_uses_empty_key() {
    let mock = Arc::new(MockTransport::new());
    let store = store_with(&mock, Arc::new(MemoryCredentialStore::default()));
    assert_eq!(store.config().api_key, "");
}

#[tokio::test]
async fn refresh_selects_first_model_of_mode() {
    let mock = Arc::new(MockTransport::new());
    let store = ready_store(&mock).await;

    assert_eq!(store.config().selected_model_id.as_deref(), Some("gpt-4o"));
    assert!(store.error().is_none());
    let requests = mock.requests();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "https://api.test/v1/models");
    assert_eq!(requests[0].bearer, "sk-test");
}

#[tokio::test]
async fn catalog_failure_clears_selection_and_sets_banner() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    mock.push_json(401, &json!({ "error": { "message": "bad key" } }));

    let err = store.refresh_catalog_now().await.unwrap_err();

    assert!(matches!(err, CatalogError::Status { status: 401, .. }));
    assert!(store.catalog().is_empty());
    assert!(store.config().selected_model_id.is_none());
    assert_eq!(store.error(), Some("model listing returned status 401"));

    mock.push_json(200, &catalog_body());
    store.refresh_catalog_now().await.unwrap();
    assert!(store.error().is_none());
    assert_eq!(store.config().selected_model_id.as_deref(), Some("gpt-4o"));
}

#[tokio::test]
async fn refresh_keeps_a_still_valid_selection() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    store
        .set_configuration(ConfigChange::Model("claude-3-haiku".into()))
        .unwrap();

    mock.push_json(200, &catalog_body());
    store.refresh_catalog_now().await.unwrap();

    assert_eq!(store.config().selected_model_id.as_deref(), Some("claude-3-haiku"));
}

#[tokio::test(start_paused = true)]
async fn base_url_edits_are_debounced_into_one_listing() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, &catalog_body());
    let mut store = store_with(&mock, Arc::new(MemoryCredentialStore::with_key("k")));

    store.start();
    store
        .set_configuration(ConfigChange::BaseUrl("https://a.test".into()))
        .unwrap();
    store
        .set_configuration(ConfigChange::BaseUrl("https://b.test/".into()))
        .unwrap();
    store.next_catalog_update().await;

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://b.test/models");
    assert_eq!(store.config().selected_model_id.as_deref(), Some("gpt-4o"));
    assert!(!store.poll_catalog_update());
}

#[tokio::test]
async fn unchanged_base_url_does_not_schedule() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    store
        .set_configuration(ConfigChange::BaseUrl(" https://api.test/v1 ".into()))
        .unwrap();
    assert!(!store.catalog().refresh_pending());
}

// =============================================================================
// configuration
// =============================================================================

#[tokio::test(start_paused = true)]
async fn key_entered_during_debounce_is_used_for_listing() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, &catalog_body());
    let credentials = Arc::new(MemoryCredentialStore::default());
    let mut store = store_with(&mock, credentials.clone());

    store.start();
    store
        .set_configuration(ConfigChange::ApiKey("  sk-new ".into()))
        .unwrap();
    store.next_catalog_update().await;

    assert_eq!(store.config().api_key, "sk-new");
    assert_eq!(credentials.load().as_deref(), Some("sk-new"));
    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].bearer, "sk-new");
    assert!(store.error().is_none());
    assert_eq!(store.config().selected_model_id.as_deref(), Some("gpt-4o"));
}

#[tokio::test]
async fn unchanged_key_does_not_schedule() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    store
        .set_configuration(ConfigChange::ApiKey("sk-test".into()))
        .unwrap();
    assert!(!store.catalog().refresh_pending());
}

#[tokio::test]
async fn mode_change_reconciles_selection_and_schedules_refresh() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;

    store.set_configuration(ConfigChange::Mode(Mode::Image)).unwrap();

    assert_eq!(store.config().mode, Mode::Image);
    assert_eq!(store.config().selected_model_id.as_deref(), Some("flux-schnell"));
    assert!(store.catalog().refresh_pending());
}

#[tokio::test]
async fn mode_without_models_clears_selection() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, &json!({ "data": [{ "id": "gpt-4o" }] }));
    let mut store = store_with(&mock, Arc::new(MemoryCredentialStore::with_key("k")));
    store.refresh_catalog_now().await.unwrap();

    store.set_configuration(ConfigChange::Mode(Mode::Image)).unwrap();

    assert!(store.config().selected_model_id.is_none());
    assert_eq!(store.submit("a cat").await.unwrap_err(), ValidationError::EmptyCatalog);
}

#[tokio::test]
async fn select_model_only_accepts_models_of_current_mode() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;

    let err = store
        .set_configuration(ConfigChange::Model("flux-schnell".into()))
        .unwrap_err();
    assert_eq!(err, ValidationError::UnknownModel("flux-schnell".into()));

    let err = store
        .set_configuration(ConfigChange::Model("nope".into()))
        .unwrap_err();
    assert_eq!(err.error_code(), "E_UNKNOWN_MODEL");
    assert_eq!(store.config().selected_model_id.as_deref(), Some("gpt-4o"));
}

// =============================================================================
// submit
// =============================================================================

#[tokio::test]
async fn chat_submit_appends_user_and_assistant() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    mock.push_json(200, &chat_reply("Hello!"));

    let outcome = store.submit("hi").await.unwrap();

    assert!(matches!(outcome, ExchangeOutcome::Replied));
    assert!(!store.loading());
    let messages = store.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, Content::Text("hi".into()));
    assert_eq!(messages[0].exchange.as_ref().map(|e| e.model.id.as_str()), Some("gpt-4o"));
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].render_hint, RenderHint::Markdown);
    assert_eq!(messages[1].content, Content::Text("Hello!".into()));

    let requests = mock.requests();
    let post = &requests[1];
    assert_eq!(post.url, "https://api.test/v1/chat/completions");
    assert_eq!(
        post.body,
        Some(json!({ "model": "gpt-4o", "messages": [{ "role": "user", "content": "hi" }] }))
    );
}

#[tokio::test]
async fn single_paid_chat_model_is_auto_selected() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, &json!({ "data": [{ "id": "gpt-4o", "is_free": false }] }));
    mock.push_json(200, &chat_reply("hey"));
    let mut store = store_with(&mock, Arc::new(MemoryCredentialStore::with_key("k")));
    store.refresh_catalog_now().await.unwrap();

    assert_eq!(store.selected_model().map(|m| m.is_free), Some(false));
    store.submit("hi").await.unwrap();

    assert_eq!(
        mock.requests()[1].body,
        Some(json!({ "model": "gpt-4o", "messages": [{ "role": "user", "content": "hi" }] }))
    );
}

#[tokio::test]
async fn provider_error_becomes_error_entry() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    mock.push_json(401, &json!({ "error": { "message": "bad key" } }));

    let outcome = store.submit("hi").await.unwrap();

    assert!(matches!(outcome, ExchangeOutcome::Failed(DispatchError::Provider { status: 401, .. })));
    assert!(!store.loading());
    assert_eq!(store.phase(), Phase::Idle);
    let last = store.messages().last().unwrap();
    assert_eq!(last.role, Role::Error);
    assert_eq!(last.content, Content::Text("Error: bad key".into()));
}

#[tokio::test]
async fn transport_error_becomes_error_entry() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    mock.push(Err(TransportError::Request("connection refused".into())));

    store.submit("hi").await.unwrap();

    assert_eq!(
        store.messages().last().unwrap().content,
        Content::Text("Error: request failed: connection refused".into())
    );
}

#[tokio::test]
async fn image_submit_uses_image_endpoint() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    store.set_configuration(ConfigChange::Mode(Mode::Image)).unwrap();
    mock.push_json(200, &json!({ "data": [{ "url": "https://x/y.png" }] }));

    store.submit("a cat").await.unwrap();

    let requests = mock.requests();
    let post = &requests[1];
    assert_eq!(post.url, "https://api.test/v1/images/generations");
    assert_eq!(
        post.body,
        Some(json!({ "model": "flux-schnell", "prompt": "a cat", "n": 1, "size": "1024x1024" }))
    );
    let last = store.messages().last().unwrap();
    assert_eq!(last.render_hint, RenderHint::Image);
    assert_eq!(last.content, Content::Text("https://x/y.png".into()));
}

#[tokio::test]
async fn blank_prompt_is_ignored() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;

    assert_eq!(store.submit("   ").await.unwrap_err(), ValidationError::EmptyPrompt);
    assert!(store.messages().is_empty());
    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test]
async fn submit_without_catalog_is_ignored() {
    let mock = Arc::new(MockTransport::new());
    let mut store = store_with(&mock, Arc::new(MemoryCredentialStore::default()));

    assert_eq!(store.submit("hi").await.unwrap_err(), ValidationError::EmptyCatalog);
    assert!(store.messages().is_empty());
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn prepare_rejects_while_sending() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;

    let pending = store.prepare_submit("hi").unwrap();
    assert!(store.loading());
    assert_eq!(pending.history.len(), 0);
    assert_eq!(store.prepare_submit("again").unwrap_err(), ValidationError::ExchangeInFlight);
    assert_eq!(store.prepare_retry(1).unwrap_err(), ValidationError::ExchangeInFlight);
    assert_eq!(store.clear_history().unwrap_err(), ValidationError::ExchangeInFlight);

    store
        .finish(Ok(DispatchOutcome { message: Message::assistant_markdown("ok"), clear_attachments: true }))
        .unwrap();
    assert_eq!(store.phase(), Phase::Idle);
    assert_eq!(store.messages().len(), 2);
}

#[tokio::test]
async fn finish_without_open_exchange_is_rejected() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    mock.push_json(200, &chat_reply("hey"));
    store.submit("hi").await.unwrap();

    let err = store
        .finish(Ok(DispatchOutcome { message: Message::assistant_markdown("again"), clear_attachments: true }))
        .unwrap_err();
    assert_eq!(err, ValidationError::NoExchangeInFlight);
    let err = store
        .finish(Err(DispatchError::MalformedResponse("late".into())))
        .unwrap_err();
    assert_eq!(err.error_code(), "E_NO_EXCHANGE_IN_FLIGHT");
    assert_eq!(store.messages().len(), 2);
    assert_eq!(store.phase(), Phase::Idle);
}

// =============================================================================
// attachments
// =============================================================================

#[tokio::test]
async fn chat_success_clears_attachments_and_sends_parts() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    store.attach_image(PNG.into()).unwrap();
    mock.push_json(200, &chat_reply("a red square"));

    store.submit("what is this?").await.unwrap();

    assert!(store.attachments().is_empty());
    assert_eq!(
        mock.requests()[1].body,
        Some(json!({
            "model": "gpt-4o",
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": "what is this?" },
                    { "type": "image_url", "image_url": { "url": PNG } }
                ]
            }]
        }))
    );
}

#[tokio::test]
async fn failure_keeps_attachments() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    store.attach_image(PNG.into()).unwrap();
    mock.push_json(500, &json!({ "error": { "message": "overloaded" } }));

    store.submit("what is this?").await.unwrap();

    assert_eq!(store.attachments(), [PNG.to_string()]);
}

#[tokio::test]
async fn image_mode_ignores_but_keeps_attachments() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    store.set_configuration(ConfigChange::Mode(Mode::Image)).unwrap();
    store.attach_image(PNG.into()).unwrap();
    mock.push_json(200, &json!({ "data": [{ "url": "https://x/y.png" }] }));

    store.submit("a cat").await.unwrap();

    assert_eq!(store.messages()[0].content, Content::Text("a cat".into()));
    assert_eq!(store.attachments().len(), 1);
}

#[test]
fn attach_and_remove() {
    let mock = Arc::new(MockTransport::new());
    let mut store = store_with(&mock, Arc::new(MemoryCredentialStore::default()));

    assert_eq!(store.attach_image("https://x/y.png".into()).unwrap_err(), ValidationError::NotADataUri);
    store.attach_image(PNG.into()).unwrap();
    store.attach_image("data:image/jpeg;base64,/9j/".into()).unwrap();

    assert_eq!(store.remove_attachment(0).unwrap(), PNG);
    assert_eq!(store.remove_attachment(1).unwrap_err(), ValidationError::NoSuchAttachment(1));
    assert_eq!(store.attachments(), ["data:image/jpeg;base64,/9j/".to_string()]);
}

// =============================================================================
// retry
// =============================================================================

#[tokio::test]
async fn retry_replays_identical_payload() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    store.attach_image(PNG.into()).unwrap();
    mock.push_json(503, &json!({ "error": { "message": "try later" } }));
    store.submit("describe").await.unwrap();
    assert_eq!(store.messages().len(), 2);

    mock.push_json(200, &chat_reply("a pixel"));
    let outcome = store.retry(1).await.unwrap();

    assert!(matches!(outcome, ExchangeOutcome::Replied));
    let requests = mock.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].url, requests[2].url);
    assert_eq!(requests[1].body, requests[2].body);
    let messages = store.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, Content::Text("a pixel".into()));
}

#[tokio::test]
async fn retry_uses_original_mode_and_model() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    mock.push_json(500, &json!({}));
    store.submit("hi").await.unwrap();
    store.set_configuration(ConfigChange::Mode(Mode::Image)).unwrap();

    mock.push_json(200, &chat_reply("hey"));
    store.retry(1).await.unwrap();

    let requests = mock.requests();
    let retried = &requests[2];
    assert_eq!(retried.url, "https://api.test/v1/chat/completions");
    assert_eq!(
        retried.body,
        Some(json!({ "model": "gpt-4o", "messages": [{ "role": "user", "content": "hi" }] }))
    );
    assert_eq!(store.messages()[1].render_hint, RenderHint::Markdown);
}

#[tokio::test]
async fn retry_sends_prior_history_only() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    mock.push_json(200, &chat_reply("one"));
    store.submit("first").await.unwrap();
    mock.push_json(200, &chat_reply("two"));
    store.submit("second").await.unwrap();

    mock.push_json(200, &chat_reply("two again"));
    store.retry(3).await.unwrap();

    assert_eq!(
        mock.requests()[3].body,
        Some(json!({
            "model": "gpt-4o",
            "messages": [
                { "role": "user", "content": "first" },
                { "role": "assistant", "content": "one" },
                { "role": "user", "content": "second" }
            ]
        }))
    );
    assert_eq!(store.messages().len(), 4);
}

#[tokio::test]
async fn invalid_retry_index_changes_nothing() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    store.attach_image(PNG.into()).unwrap();
    mock.push_json(500, &json!({}));
    store.submit("hi").await.unwrap();
    let before = store.snapshot();

    for index in [0, 2, 7] {
        assert_eq!(store.retry(index).await.unwrap_err(), ValidationError::InvalidRetryIndex(index));
    }
    // index 1 is valid only while messages[0] is a user message.
    store.messages.insert(0, Message::assistant_markdown("greeting"));
    assert_eq!(store.retry(1).await.unwrap_err(), ValidationError::InvalidRetryIndex(1));
    store.messages.remove(0);

    assert_eq!(store.snapshot(), before);
    assert_eq!(mock.requests().len(), 2);
}

// =============================================================================
// snapshot + clear
// =============================================================================

#[tokio::test]
async fn snapshot_reflects_search_and_state() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;

    let found = store.search_models("FLUX");
    assert_eq!(found.len(), 1);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.models.len(), 3);
    assert_eq!(snapshot.filtered_models, found);
    assert_eq!(snapshot.base_url, "https://api.test/v1");
    assert_eq!(snapshot.mode, Mode::Chat);
    assert!(!snapshot.loading);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.selected_model_id.as_deref(), Some("gpt-4o"));
}

#[tokio::test]
async fn clear_history_empties_messages_and_attachments() {
    let mock = Arc::new(MockTransport::new());
    let mut store = ready_store(&mock).await;
    mock.push_json(200, &chat_reply("hey"));
    store.submit("hi").await.unwrap();
    store.attach_image(PNG.into()).unwrap();

    store.clear_history().unwrap();

    assert!(store.messages().is_empty());
    assert!(store.attachments().is_empty());
}
