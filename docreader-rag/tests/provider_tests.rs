//! Tests for the OpenAI-compatible embedding and chat backends, run against a
//! local axum server that imitates the API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use docreader_rag::{
    AnswerGenerator, ChatCompletionGenerator, EmbeddingProvider, HttpOptions,
    OpenAiEmbeddingProvider, RagError,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;

async fn spawn(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    (format!("http://{addr}/v1"), handle)
}

fn fast_options() -> HttpOptions {
    HttpOptions {
        timeout: Duration::from_secs(5),
        max_retries: 2,
        backoff: Duration::from_millis(1),
    }
}

#[derive(Default)]
struct Recorder {
    hits: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
    auth: Mutex<Vec<Option<String>>>,
}

impl Recorder {
    async fn record(&self, headers: &HeaderMap, body: &Value) -> usize {
        self.bodies.lock().await.push(body.clone());
        let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_owned);
        self.auth.lock().await.push(auth);
        self.hits.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Embeds input `i` as `[i, chars(i)]` and returns the data reversed so the
/// client has to reorder by `index`.
async fn reversed_embeddings(
    State(rec): State<Arc<Recorder>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    rec.record(&headers, &body).await;
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    let mut data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let len = text.as_str().unwrap_or_default().chars().count();
            json!({ "index": i, "embedding": [i as f32, len as f32] })
        })
        .collect();
    data.reverse();
    Json(json!({ "object": "list", "data": data }))
}

#[tokio::test]
async fn embeddings_are_batched_and_reordered_by_index() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new().route("/v1/embeddings", post(reversed_embeddings)).with_state(rec.clone());
    let (base, handle) = spawn(app).await;

    let provider = OpenAiEmbeddingProvider::new(&base, None, fast_options())
        .unwrap()
        .with_model("mini")
        .with_dimensions(2)
        .with_batch_size(2);

    let texts = ["a", "bb", "ccc", "dddd", "eeeee"];
    let vectors = provider.embed_batch(&texts).await.unwrap();

    let lengths: Vec<f32> = vectors.iter().map(|v| v[1]).collect();
    assert_eq!(lengths, [1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(rec.hits.load(Ordering::SeqCst), 3);

    let bodies = rec.bodies.lock().await;
    assert_eq!(bodies[0]["model"], "mini");
    assert!(bodies[0].get("dimensions").is_none());
    assert_eq!(bodies[2]["input"], json!(["eeeee"]));
    assert!(rec.auth.lock().await.iter().all(Option::is_none));

    handle.abort();
}

#[tokio::test]
async fn empty_batch_does_not_call_the_backend() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new().route("/v1/embeddings", post(reversed_embeddings)).with_state(rec.clone());
    let (base, handle) = spawn(app).await;

    let provider = OpenAiEmbeddingProvider::new(&base, None, fast_options()).unwrap();
    assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    assert_eq!(rec.hits.load(Ordering::SeqCst), 0);

    handle.abort();
}

#[tokio::test]
async fn request_dimensions_and_api_key_are_sent_when_configured() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new().route("/v1/embeddings", post(reversed_embeddings)).with_state(rec.clone());
    let (base, handle) = spawn(app).await;

    let provider = OpenAiEmbeddingProvider::new(&base, Some("sk-test".into()), fast_options())
        .unwrap()
        .with_dimensions(2)
        .with_request_dimensions(true);
    provider.embed("hello").await.unwrap();

    assert_eq!(rec.bodies.lock().await[0]["dimensions"], 2);
    assert_eq!(rec.auth.lock().await[0].as_deref(), Some("Bearer sk-test"));

    handle.abort();
}

#[tokio::test]
async fn embedding_count_mismatch_is_an_error() {
    async fn one_too_few() -> impl IntoResponse {
        Json(json!({ "data": [{ "index": 0, "embedding": [0.0, 0.0] }] }))
    }
    let (base, handle) = spawn(Router::new().route("/v1/embeddings", post(one_too_few))).await;

    let provider = OpenAiEmbeddingProvider::new(&base, None, fast_options()).unwrap().with_dimensions(2);
    let err = provider.embed_batch(&["a", "b"]).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding { ref message, .. } if message.contains("1 embeddings for 2 inputs")));

    handle.abort();
}

#[tokio::test]
async fn duplicate_embedding_indices_are_an_error() {
    async fn duplicated() -> impl IntoResponse {
        Json(json!({ "data": [
            { "index": 1, "embedding": [1.0, 1.0] },
            { "index": 1, "embedding": [2.0, 2.0] },
        ] }))
    }
    let (base, handle) = spawn(Router::new().route("/v1/embeddings", post(duplicated))).await;

    let provider = OpenAiEmbeddingProvider::new(&base, None, fast_options()).unwrap().with_dimensions(2);
    let err = provider.embed_batch(&["first", "second"]).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding { ref message, .. } if message.contains("duplicate embedding indices")));

    handle.abort();
}

#[tokio::test]
async fn out_of_range_embedding_index_is_an_error() {
    async fn skipped() -> impl IntoResponse {
        Json(json!({ "data": [
            { "index": 0, "embedding": [1.0, 1.0] },
            { "index": 2, "embedding": [2.0, 2.0] },
        ] }))
    }
    let (base, handle) = spawn(Router::new().route("/v1/embeddings", post(skipped))).await;

    let provider = OpenAiEmbeddingProvider::new(&base, None, fast_options()).unwrap().with_dimensions(2);
    assert!(matches!(
        provider.embed_batch(&["first", "second"]).await,
        Err(RagError::Embedding { .. })
    ));

    handle.abort();
}

#[tokio::test]
async fn client_errors_are_not_retried_and_carry_api_detail() {
    async fn unauthorized(State(rec): State<Arc<Recorder>>) -> impl IntoResponse {
        rec.hits.fetch_add(1, Ordering::SeqCst);
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": { "message": "invalid api key" } })))
    }
    let rec = Arc::new(Recorder::default());
    let app = Router::new().route("/v1/embeddings", post(unauthorized)).with_state(rec.clone());
    let (base, handle) = spawn(app).await;

    let provider = OpenAiEmbeddingProvider::new(&base, None, fast_options()).unwrap();
    let err = provider.embed("x").await.unwrap_err();
    assert!(matches!(err, RagError::Embedding { ref message, .. } if message.contains("invalid api key")));
    assert_eq!(rec.hits.load(Ordering::SeqCst), 1);

    handle.abort();
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    async fn flaky(State(rec): State<Arc<Recorder>>) -> axum::response::Response {
        let attempt = rec.hits.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < 3 {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        Json(json!({ "data": [{ "index": 0, "embedding": [1.0, 2.0] }] })).into_response()
    }
    let rec = Arc::new(Recorder::default());
    let app = Router::new().route("/v1/embeddings", post(flaky)).with_state(rec.clone());
    let (base, handle) = spawn(app).await;

    let provider = OpenAiEmbeddingProvider::new(&base, None, fast_options()).unwrap().with_dimensions(2);
    assert_eq!(provider.embed("x").await.unwrap(), [1.0, 2.0]);
    assert_eq!(rec.hits.load(Ordering::SeqCst), 3);

    handle.abort();
}

#[tokio::test]
async fn slow_backend_surfaces_timeout() {
    async fn slow() -> impl IntoResponse {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Json(json!({ "data": [] }))
    }
    let (base, handle) = spawn(Router::new().route("/v1/embeddings", post(slow))).await;

    let options = HttpOptions { timeout: Duration::from_millis(100), max_retries: 0, ..fast_options() };
    let provider = OpenAiEmbeddingProvider::new(&base, None, options).unwrap();
    let err = provider.embed("x").await.unwrap_err();
    assert!(matches!(err, RagError::Timeout { stage: "embedding", .. }));

    handle.abort();
}

async fn chat_answer(
    State(rec): State<Arc<Recorder>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    rec.record(&headers, &body).await;
    Json(json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Forty-two." } }]
    }))
}

#[tokio::test]
async fn chat_generator_sends_prompt_and_returns_content() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new().route("/v1/chat/completions", post(chat_answer)).with_state(rec.clone());
    let (base, handle) = spawn(app).await;

    let generator =
        ChatCompletionGenerator::new(&base, "gsk-test", fast_options()).unwrap().with_model("tiny-llm");
    let answer = generator.generate("The answer is 42.", "What is the answer?").await.unwrap();
    assert_eq!(answer, "Forty-two.");

    let bodies = rec.bodies.lock().await;
    let body = &bodies[0];
    assert_eq!(body["model"], "tiny-llm");
    assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    let content = messages[0]["content"].as_str().unwrap();
    assert!(content.contains("Context:\nThe answer is 42."));
    assert!(content.contains("Question:\nWhat is the answer?"));
    assert_eq!(rec.auth.lock().await[0].as_deref(), Some("Bearer gsk-test"));

    handle.abort();
}

#[tokio::test]
async fn empty_completion_is_a_generation_error() {
    async fn blank() -> impl IntoResponse {
        Json(json!({ "choices": [{ "message": { "role": "assistant", "content": "  " } }] }))
    }
    let (base, handle) = spawn(Router::new().route("/v1/chat/completions", post(blank))).await;

    let generator = ChatCompletionGenerator::new(&base, "key", fast_options()).unwrap();
    let err = generator.generate("ctx", "q").await.unwrap_err();
    assert!(matches!(err, RagError::Generation { ref message, .. } if message.contains("empty answer")));

    handle.abort();
}

#[tokio::test]
async fn missing_choices_is_a_generation_error() {
    async fn no_choices() -> impl IntoResponse {
        Json(json!({ "choices": [] }))
    }
    let (base, handle) = spawn(Router::new().route("/v1/chat/completions", post(no_choices))).await;

    let generator = ChatCompletionGenerator::new(&base, "key", fast_options()).unwrap();
    let err = generator.generate("ctx", "q").await.unwrap_err();
    assert!(matches!(err, RagError::Generation { ref message, .. } if message.contains("no choices")));

    handle.abort();
}

#[tokio::test]
async fn rate_limit_exhausts_retries_then_fails() {
    async fn limited(State(rec): State<Arc<Recorder>>) -> impl IntoResponse {
        rec.hits.fetch_add(1, Ordering::SeqCst);
        (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": { "message": "slow down" } })))
    }
    let rec = Arc::new(Recorder::default());
    let app = Router::new().route("/v1/chat/completions", post(limited)).with_state(rec.clone());
    let (base, handle) = spawn(app).await;

    let generator = ChatCompletionGenerator::new(&base, "key", fast_options()).unwrap();
    let err = generator.generate("ctx", "q").await.unwrap_err();
    assert!(matches!(err, RagError::Generation { ref message, .. } if message.contains("429")));
    assert_eq!(rec.hits.load(Ordering::SeqCst), 3);

    handle.abort();
}

#[tokio::test]
async fn unreachable_backend_is_a_generation_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let options = HttpOptions { max_retries: 0, ..fast_options() };
    let generator = ChatCompletionGenerator::new(format!("http://{addr}/v1"), "key", options).unwrap();
    let err = generator.generate("ctx", "q").await.unwrap_err();
    assert!(matches!(err, RagError::Generation { .. }));
}
