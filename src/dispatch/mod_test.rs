use super::*;
use crate::catalog::Model;
use crate::conversation::message::{Content, RenderHint};
use crate::transport::TransportError;
use crate::transport::test_helpers::MockTransport;
use serde_json::json;

fn model(id: &str, kind: Mode, endpoint: &str) -> Model {
    Model { id: id.into(), kind, is_free: true, endpoint_path: endpoint.into() }
}

fn dispatcher() -> (Arc<MockTransport>, RequestDispatcher) {
    let mock = Arc::new(MockTransport::new());
    (mock.clone(), RequestDispatcher::new(mock))
}

#[tokio::test]
async fn chat_dispatch_posts_to_resolved_url() {
    let (mock, dispatcher) = dispatcher();
    mock.push_json(200, &json!({ "choices": [{ "message": { "content": "hey" } }] }));
    let gpt = model("gpt-4o", Mode::Chat, "/v1/chat/completions");

    let outcome = dispatcher
        .send(&DispatchRequest {
            mode: Mode::Chat,
            model: &gpt,
            api_key: "sk-test",
            base_url: "https://api.test/v1",
            history: &[],
            prompt: "hi",
            attachments: &[],
        })
        .await
        .unwrap();

    assert_eq!(outcome.message.content, Content::Text("hey".into()));
    assert_eq!(outcome.message.render_hint, RenderHint::Markdown);
    assert!(outcome.clear_attachments);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, "https://api.test/v1/chat/completions");
    assert_eq!(requests[0].bearer, "sk-test");
    assert_eq!(
        requests[0].body,
        Some(json!({ "model": "gpt-4o", "messages": [{ "role": "user", "content": "hi" }] }))
    );
}

#[tokio::test]
async fn image_dispatch_does_not_clear_attachments() {
    let (mock, dispatcher) = dispatcher();
    mock.push_json(200, &json!({ "data": [{ "url": "https://x/y.png" }] }));
    let flux = model("flux-schnell", Mode::Image, "/v1/images/generations");

    let outcome = dispatcher
        .send(&DispatchRequest {
            mode: Mode::Image,
            model: &flux,
            api_key: "k",
            base_url: "https://api.test",
            history: &[],
            prompt: "a cat",
            attachments: &[],
        })
        .await
        .unwrap();

    assert_eq!(outcome.message.render_hint, RenderHint::Image);
    assert!(!outcome.clear_attachments);
    assert_eq!(
        mock.requests()[0].body,
        Some(json!({ "model": "flux-schnell", "prompt": "a cat", "n": 1, "size": "1024x1024" }))
    );
}

#[tokio::test]
async fn invalid_endpoint_makes_no_network_call() {
    let (mock, dispatcher) = dispatcher();
    let rogue = model("gpt-4o", Mode::Chat, "/admin/delete");

    let err = dispatcher
        .send(&DispatchRequest {
            mode: Mode::Chat,
            model: &rogue,
            api_key: "k",
            base_url: "https://api.test",
            history: &[],
            prompt: "hi",
            attachments: &[],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::InvalidEndpoint { .. }));
    assert_eq!(err.error_code(), "E_INVALID_ENDPOINT");
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn provider_error_is_returned() {
    let (mock, dispatcher) = dispatcher();
    mock.push_json(429, &json!({ "error": { "message": "slow down" } }));
    let gpt = model("gpt-4o", Mode::Chat, "/v1/chat/completions");

    let err = dispatcher
        .send(&DispatchRequest {
            mode: Mode::Chat,
            model: &gpt,
            api_key: "k",
            base_url: "https://api.test",
            history: &[],
            prompt: "hi",
            attachments: &[],
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "slow down");
    assert!(err.retryable());
}

#[tokio::test]
async fn transport_error_is_wrapped() {
    let (mock, dispatcher) = dispatcher();
    mock.push(Err(TransportError::Request("timed out".into())));
    let gpt = model("gpt-4o", Mode::Chat, "/v1/chat/completions");

    let err = dispatcher
        .send(&DispatchRequest {
            mode: Mode::Chat,
            model: &gpt,
            api_key: "k",
            base_url: "https://api.test",
            history: &[],
            prompt: "hi",
            attachments: &[],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transport(_)));
    assert_eq!(err.to_string(), "request failed: timed out");
    assert!(err.retryable());
}
