use newsrewrite::llm::azure::{AzureStyleProvider, BackendError, BlockingChatClient, GithubModelsClient};
use newsrewrite::llm::openrouter::OpenRouterProvider;
use newsrewrite::llm::{Completion, LlmProvider, LlmRequest};

fn request() -> LlmRequest {
    LlmRequest::new("openai/gpt-3.5-turbo", "system text", "Original news:\nx\n\nRewritten news:\n")
}

const CHAT_BODY: &str = r#"{
    "id": "gen-1",
    "choices": [{
        "message": { "role": "assistant", "content": "  नयाँ शीर्षक\n\nपहिलो अनुच्छेद  " },
        "finish_reason": "stop"
    }]
}"#;

#[tokio::test]
async fn openrouter_returns_trimmed_text() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer or-key")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "model": "openai/gpt-3.5-turbo",
            "messages": [
                { "role": "system", "content": "system text" },
                { "role": "user", "content": "Original news:\nx\n\nRewritten news:\n" }
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(CHAT_BODY)
        .create_async()
        .await;

    let provider = OpenRouterProvider::new(server.url(), Some("or-key".into()));
    let result = provider.generate(request()).await;

    assert_eq!(result, Completion::Text("नयाँ शीर्षक\n\nपहिलो अनुच्छेद".into()));
    mock.assert_async().await;
}

#[tokio::test]
async fn openrouter_429_is_rate_limited() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(429)
        .with_body(r#"{"error":{"message":"Rate limit exceeded"}}"#)
        .create_async()
        .await;

    let provider = OpenRouterProvider::new(server.url(), Some("or-key".into()));
    assert_eq!(provider.generate(request()).await, Completion::RateLimited);
    mock.assert_async().await;
}

#[tokio::test]
async fn openrouter_server_error_is_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let provider = OpenRouterProvider::new(server.url(), Some("or-key".into()));
    assert_eq!(provider.generate(request()).await, Completion::Unavailable);
}

#[tokio::test]
async fn openrouter_empty_choices_is_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let provider = OpenRouterProvider::new(server.url(), Some("or-key".into()));
    assert_eq!(provider.generate(request()).await, Completion::Unavailable);
}

#[tokio::test]
async fn openrouter_without_key_makes_no_call() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", "/").expect(0).create_async().await;

    let provider = OpenRouterProvider::new(server.url(), None);
    assert_eq!(provider.generate(request()).await, Completion::Unavailable);
    mock.assert_async().await;
}

#[tokio::test]
async fn github_models_429_is_rate_limited() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer gh-token")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "model": "openai/gpt-4.1",
            "temperature": 0.7,
            "top_p": 1.0
        })))
        .with_status(429)
        .with_body(r#"{"error":{"code":"RateLimitReached"}}"#)
        .create_async()
        .await;

    let provider = AzureStyleProvider::new(GithubModelsClient::new(server.url(), Some("gh-token".into())));
    let result = provider
        .generate(LlmRequest::new("openai/gpt-4.1", "system text", "prompt"))
        .await;

    assert_eq!(result, Completion::RateLimited);
    mock.assert_async().await;
}

#[tokio::test]
async fn github_models_success() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(CHAT_BODY)
        .create_async()
        .await;

    let provider = AzureStyleProvider::new(GithubModelsClient::new(server.url(), Some("gh-token".into())));
    let result = provider.generate(request()).await;
    assert_eq!(result, Completion::Text("नयाँ शीर्षक\n\nपहिलो अनुच्छेद".into()));
}

/// Blocking client that fails the way SDKs do: an opaque error string.
struct OpaqueFailure(&'static str);

impl BlockingChatClient for OpaqueFailure {
    fn complete(&self, _request: &LlmRequest) -> Result<String, BackendError> {
        Err(BackendError::Transport(self.0.to_string()))
    }
}

#[tokio::test]
async fn quota_message_without_status_is_rate_limited() {
    let provider = AzureStyleProvider::new(OpaqueFailure("Error: Quota exceeded for model gpt-4.1"));
    assert_eq!(provider.generate(request()).await, Completion::RateLimited);
}

#[tokio::test]
async fn other_opaque_errors_are_unavailable() {
    let provider = AzureStyleProvider::new(OpaqueFailure("connection reset by peer"));
    assert_eq!(provider.generate(request()).await, Completion::Unavailable);
}

struct Panicking;

impl BlockingChatClient for Panicking {
    fn complete(&self, _request: &LlmRequest) -> Result<String, BackendError> {
        panic!("backend crashed");
    }
}

#[tokio::test]
async fn panicking_backend_is_unavailable() {
    let provider = AzureStyleProvider::new(Panicking);
    assert_eq!(provider.generate(request()).await, Completion::Unavailable);
}

#[tokio::test]
async fn openrouter_malformed_json_is_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{\"choices\": [ this is not json")
        .create_async()
        .await;

    let provider = OpenRouterProvider::new(server.url(), Some("or-key".into()));
    assert_eq!(provider.generate(request()).await, Completion::Unavailable);
}

/// Listener that accepts connections, optionally writes `preamble`, then never finishes.
async fn stalled_upstream(preamble: &'static [u8]) -> String {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(preamble).await;
            held.push(socket);
        }
    });
    format!("http://{}/", addr)
}

#[tokio::test]
async fn openrouter_silent_upstream_times_out() {
    let url = stalled_upstream(b"").await;
    let provider = OpenRouterProvider::new(url, Some("or-key".into())).with_timeout(1);

    let started = std::time::Instant::now();
    assert_eq!(provider.generate(request()).await, Completion::Unavailable);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}

#[tokio::test]
async fn openrouter_stalled_body_times_out() {
    let url = stalled_upstream(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"choices\"").await;
    let provider = OpenRouterProvider::new(url, Some("or-key".into())).with_timeout(1);

    let started = std::time::Instant::now();
    assert_eq!(provider.generate(request()).await, Completion::Unavailable);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}
