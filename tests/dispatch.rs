use promptml_cli::dispatch::{Dispatcher, OLLAMA_MODEL_NOT_FOUND};
use promptml_cli::provider::{
    ClientFactory, Endpoints, FragmentStream, GenerationRequest, ProviderError, ProviderKind,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio_stream::StreamExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAYLOAD: &str = "<prompt><task>summarize</task></prompt>";

fn endpoints(server: &MockServer) -> Endpoints {
    Endpoints {
        openai: format!("{}/v1", server.uri()),
        google: server.uri(),
        ollama: format!("{}/v1", server.uri()),
    }
}

/// Dispatcher against `server`, recording every diagnostic it emits.
fn dispatcher(server: &MockServer) -> (Dispatcher, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let factory = ClientFactory::new(
        endpoints(server),
        Some("sk-test".to_string()),
        Some("g-key".to_string()),
    );
    let d = Dispatcher::new(factory).with_diagnostics(Arc::new(move |msg: &str| {
        sink.lock().unwrap().push(msg.to_string());
    }));
    (d, seen)
}

fn request(provider: ProviderKind, model: &str) -> GenerationRequest {
    GenerationRequest {
        provider,
        model: model.to_string(),
        payload: PAYLOAD.to_string(),
    }
}

async fn collect(mut stream: FragmentStream) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => out.push(fragment),
            Err(e) => panic!("stream yielded an error: {e}"),
        }
    }
    out
}

fn sse(events: &[&str]) -> ResponseTemplate {
    let body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn chat_completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
}

const OPENAI_CHUNKS: &[&str] = &[
    r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
    r#"{"choices":[{"index":0,"delta":{"content":"A short "}}]}"#,
    r#"{"choices":[{"index":0,"delta":{"content":"summary."}}]}"#,
    r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
    "[DONE]",
];

#[tokio::test]
async fn openai_complete_sends_payload_as_only_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(chat_completion("A short summary."))
        .expect(1)
        .mount(&server)
        .await;

    let (d, _) = dispatcher(&server);
    let text = d.complete(&request(ProviderKind::OpenAi, "gpt-4o")).await.unwrap();
    assert_eq!(text, "A short summary.");

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["stream"], false);
    assert_eq!(
        body["messages"],
        json!([{ "role": "user", "content": PAYLOAD }])
    );
}

#[tokio::test]
async fn openai_stream_keeps_going_past_empty_deltas() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(sse(OPENAI_CHUNKS))
        .expect(1)
        .mount(&server)
        .await;

    let (d, _) = dispatcher(&server);
    let stream = d.stream(&request(ProviderKind::OpenAi, "gpt-4o")).await.unwrap();
    let fragments = collect(stream).await;
    assert_eq!(fragments, vec!["", "A short ", "summary.", ""]);
}

#[tokio::test]
async fn stream_concatenation_matches_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(sse(OPENAI_CHUNKS))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "stream": false })))
        .respond_with(chat_completion("A short summary."))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash-latest:streamGenerateContent"))
        .respond_with(sse(&[
            r#"{"candidates":[{"content":{"parts":[{"text":"A short "}]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"summary."}]}}]}"#,
        ]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash-latest:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "A short summary." }] } }]
        })))
        .mount(&server)
        .await;

    let (d, _) = dispatcher(&server);
    for kind in [ProviderKind::OpenAi, ProviderKind::Google, ProviderKind::Ollama] {
        let req = request(kind, "gpt-4o");
        let whole = d.complete(&req).await.unwrap();
        let streamed = collect(d.stream(&req).await.unwrap()).await.concat();
        assert_eq!(streamed, whole, "provider {kind}");
    }
}

#[tokio::test]
async fn google_aliases_default_model_and_reads_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash-latest:generateContent"))
        .and(query_param("key", "g-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Gemini " }, { "text": "says hi" }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (d, _) = dispatcher(&server);
    let text = d.complete(&request(ProviderKind::Google, "gpt-4o")).await.unwrap();
    assert_eq!(text, "Gemini says hi");

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["contents"][0]["parts"][0]["text"], PAYLOAD);
}

#[tokio::test]
async fn google_stream_forwards_text_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/custom-model:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .respond_with(sse(&[
            r#"{"candidates":[{"content":{"parts":[{"text":"one "}]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"two"}]}}]}"#,
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let (d, _) = dispatcher(&server);
    let stream = d.stream(&request(ProviderKind::Google, "custom-model")).await.unwrap();
    assert_eq!(collect(stream).await, vec!["one ", "two"]);
}

#[tokio::test]
async fn ollama_missing_model_ends_stream_with_one_diagnostic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer ollama"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "message": "model \"nope\" not found, try pulling it first",
                "type": "api_error"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (d, seen) = dispatcher(&server);
    let stream = d.stream(&request(ProviderKind::Ollama, "nope")).await.unwrap();
    assert!(collect(stream).await.is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![OLLAMA_MODEL_NOT_FOUND.to_string()]);
}

#[tokio::test]
async fn ollama_not_found_mid_stream_truncates_quietly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(&[
            r#"{"choices":[{"delta":{"content":"partial"}}]}"#,
            r#"{"error":{"message":"model \"nope\" not found"}}"#,
            r#"{"choices":[{"delta":{"content":"never seen"}}]}"#,
        ]))
        .mount(&server)
        .await;

    let (d, seen) = dispatcher(&server);
    let stream = d.stream(&request(ProviderKind::Ollama, "nope")).await.unwrap();
    assert_eq!(collect(stream).await, vec!["partial"]);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_model_propagates_outside_local_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such model"))
        .mount(&server)
        .await;

    let (d, seen) = dispatcher(&server);

    match d.stream(&request(ProviderKind::OpenAi, "gpt-17")).await {
        Err(ProviderError::ModelNotFound { model, .. }) => assert_eq!(model, "gpt-17"),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("remote 404 produced a stream"),
    }

    let err = d.complete(&request(ProviderKind::Ollama, "nope")).await.unwrap_err();
    assert!(err.is_model_not_found());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn other_backend_errors_propagate_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let (d, seen) = dispatcher(&server);
    for kind in [ProviderKind::OpenAi, ProviderKind::Google, ProviderKind::Ollama] {
        match d.stream(&request(kind, "m")).await {
            Err(ProviderError::Api { status, body }) => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "invalid api key");
            }
            Err(other) => panic!("unexpected error for {kind}: {other:?}"),
            Ok(_) => panic!("401 produced a stream for {kind}"),
        }
    }
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_backend_is_a_connection_error() {
    let factory = ClientFactory::new(
        Endpoints {
            openai: "http://127.0.0.1:1/v1".to_string(),
            google: "http://127.0.0.1:1/".to_string(),
            ollama: "http://127.0.0.1:1/v1".to_string(),
        },
        None,
        None,
    );
    let d = Dispatcher::new(factory);

    for kind in [ProviderKind::OpenAi, ProviderKind::Google, ProviderKind::Ollama] {
        let err = d.complete(&request(kind, "gpt-4o")).await.unwrap_err();
        assert!(err.is_connection(), "{kind}: {err:?}");
    }
}

#[tokio::test]
async fn abandoning_a_stream_early_is_fine() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(OPENAI_CHUNKS))
        .mount(&server)
        .await;

    let (d, _) = dispatcher(&server);
    let mut stream = d.stream(&request(ProviderKind::OpenAi, "gpt-4o")).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, "");
    drop(stream);
}
