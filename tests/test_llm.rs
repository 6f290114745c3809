use arxiv_assist::config::Credentials;
use arxiv_assist::error::AssistError;
use arxiv_assist::llm::{
    AnthropicBackend, ChatBackend, Dispatcher, GeminiBackend, Message, ModelCatalog, OpenAiBackend, Params, Vendor,
};
use arxiv_assist::retry::RetryPolicy;
use arxiv_assist::Settings;
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

fn params(value: serde_json::Value) -> Params {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("params must be a JSON object"),
    }
}

fn conversation() -> Vec<Message> {
    vec![Message::system("Be brief"), Message::user("Hi")]
}

fn all_keys() -> Credentials {
    Credentials {
        openai_api_key: Some("sk-test".to_string()),
        anthropic_api_key: Some("ant-test".to_string()),
        google_api_key: Some("goog-test".to_string()),
        ..Default::default()
    }
}

fn settings_for(server: &Server, credentials: Credentials, retry: RetryPolicy) -> Settings {
    Settings::default()
        .with_base_url(&server.url())
        .with_retry(retry)
        .with_credentials(credentials)
}

fn catalog() -> ModelCatalog {
    ModelCatalog::new()
        .with_models(Vendor::OpenAi, ["gpt-4o"])
        .with_models(Vendor::Anthropic, ["claude-3-5-sonnet"])
        .with_models(Vendor::Gemini, ["gemini-1.5-pro"])
}

#[test]
fn test_vendor_names() {
    assert_eq!("OpenAI".parse::<Vendor>().unwrap(), Vendor::OpenAi);
    assert_eq!("claude".parse::<Vendor>().unwrap(), Vendor::Anthropic);
    assert_eq!("google".parse::<Vendor>().unwrap(), Vendor::Gemini);
    assert!("mistral".parse::<Vendor>().is_err());
    assert_eq!(Vendor::Gemini.key_variable(), "GOOGLE_API_KEY");
}

#[test]
fn test_catalog_registration_replaces() {
    let mut catalog = catalog();
    catalog.register(Vendor::Anthropic, "gpt-4o");
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.vendor_of("gpt-4o"), Some(Vendor::Anthropic));
    assert_eq!(catalog.vendor_of("llama"), None);
}

#[test]
fn test_openai_request_body() {
    let body = OpenAiBackend::request_body(
        "gpt-4o",
        &params(json!({ "max_tokens": 100, "temperature": 0.2 })),
        &conversation(),
    );
    assert_eq!(
        body,
        json!({
            "model": "gpt-4o",
            "max_completion_tokens": 100,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": "Be brief" },
                { "role": "user", "content": "Hi" }
            ]
        })
    );
}

#[test]
fn test_anthropic_request_body() {
    let body = AnthropicBackend::request_body("claude-3-5-sonnet", &Params::new(), &conversation());
    assert_eq!(body["max_tokens"], 8192);
    assert_eq!(body["system"], "Be brief");
    assert_eq!(body["messages"], json!([{ "role": "user", "content": "Hi" }]));

    let explicit = AnthropicBackend::request_body(
        "claude-3-5-sonnet",
        &params(json!({ "max_tokens": 10 })),
        &[Message::user("Hi")],
    );
    assert_eq!(explicit["max_tokens"], 10);
    assert!(explicit.get("system").is_none());
}

#[test]
fn test_gemini_request_body() {
    let messages = vec![
        Message::system("Be brief"),
        Message::user("Hi"),
        Message::assistant("Hello"),
        Message::user("Again"),
    ];
    let body = GeminiBackend::request_body(
        &params(json!({ "max_tokens": 50, "top_p": 0.9, "stop": "END", "temperature": 0.1 })),
        &messages,
    );

    assert_eq!(
        body["contents"],
        json!([
            { "role": "user", "parts": [{ "text": "Hi\n" }] },
            { "role": "model", "parts": [{ "text": "Hello\n" }] },
            { "role": "user", "parts": [{ "text": "Again\n" }] }
        ])
    );
    assert_eq!(body["systemInstruction"], json!({ "parts": [{ "text": "Be brief" }] }));
    assert_eq!(
        body["generationConfig"],
        json!({ "maxOutputTokens": 50, "topP": 0.9, "stopSequences": ["END"], "temperature": 0.1 })
    );
    assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
    assert!(body["safetySettings"]
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["threshold"] == "BLOCK_NONE"));
}

#[test]
fn test_gemini_blocked_prompt_is_empty() {
    let response = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
    assert_eq!(GeminiBackend::parse_response(&response), "");
}

#[tokio::test]
async fn test_openai_completion() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "max_completion_tokens": 100,
            "messages": [
                { "role": "system", "content": "Be brief" },
                { "role": "user", "content": "Hi" }
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "choices": [{ "message": { "role": "assistant", "content": "Hello!" } }] }).to_string())
        .expect(1)
        .create_async()
        .await;

    let settings = settings_for(&server, all_keys(), RetryPolicy::none());
    let dispatcher = Dispatcher::from_settings(&settings, catalog()).unwrap();
    let response = dispatcher
        .complete("gpt-4o", &params(json!({ "max_tokens": 100 })), &conversation())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response, "Hello!");
}

#[tokio::test]
async fn test_anthropic_completion() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "ant-test")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-3-5-sonnet",
            "system": "Be brief",
            "max_tokens": 8192,
            "messages": [{ "role": "user", "content": "Hi" }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "content": [{ "type": "text", "text": "Hey" }] }).to_string())
        .expect(1)
        .create_async()
        .await;

    let settings = settings_for(&server, all_keys(), RetryPolicy::none());
    let dispatcher = Dispatcher::from_settings(&settings, catalog()).unwrap();
    let response = dispatcher
        .complete("claude-3-5-sonnet", &Params::new(), &conversation())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response, "Hey");
}

#[tokio::test]
async fn test_gemini_completion() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
        .match_header("x-goog-api-key", "goog-test")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Hi\n" }] }],
            "systemInstruction": { "parts": [{ "text": "Be brief" }] },
            "generationConfig": { "maxOutputTokens": 50 }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "candidates": [{ "content": { "parts": [{ "text": "Hel" }, { "text": "lo" }] } }] }).to_string())
        .expect(1)
        .create_async()
        .await;

    let settings = settings_for(&server, all_keys(), RetryPolicy::none());
    let dispatcher = Dispatcher::from_settings(&settings, catalog()).unwrap();
    let response = dispatcher
        .complete("gemini-1.5-pro", &params(json!({ "max_tokens": 50 })), &conversation())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response, "Hello");
}

#[tokio::test]
async fn test_gather_preserves_model_order() {
    let mut server = Server::new_async().await;
    let _openai = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(json!({ "choices": [{ "message": { "content": "from openai" } }] }).to_string())
        .create_async()
        .await;
    let _anthropic = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(json!({ "content": [{ "type": "text", "text": "from anthropic" }] }).to_string())
        .create_async()
        .await;

    let settings = settings_for(&server, all_keys(), RetryPolicy::none());
    let dispatcher = Dispatcher::from_settings(&settings, catalog()).unwrap();
    let models = vec!["claude-3-5-sonnet".to_string(), "gpt-4o".to_string()];
    let messages = [Message::user("Hi")];

    let gathered = dispatcher.gather(&models, &Params::new(), &messages).await.unwrap();
    assert_eq!(gathered, vec!["from anthropic", "from openai"]);

    let sequential = dispatcher.complete_many(&models, &Params::new(), &messages).await.unwrap();
    assert_eq!(
        sequential,
        vec![
            ("claude-3-5-sonnet".to_string(), "from anthropic".to_string()),
            ("gpt-4o".to_string(), "from openai".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_unknown_model_is_unsupported() {
    let server = Server::new_async().await;
    let settings = settings_for(&server, all_keys(), RetryPolicy::none());
    let dispatcher = Dispatcher::from_settings(&settings, catalog()).unwrap();

    let result = dispatcher.complete("llama-3", &Params::new(), &[Message::user("Hi")]).await;

    match result {
        Err(AssistError::UnsupportedModel { model, supported }) => {
            assert_eq!(model, "llama-3");
            assert_eq!(supported, "gpt-4o, claude-3-5-sonnet, gemini-1.5-pro");
        }
        other => panic!("expected UnsupportedModel, got {:?}", other),
    }
}

#[tokio::test]
async fn test_known_model_without_key_reports_variable() {
    let server = Server::new_async().await;
    let credentials = Credentials {
        openai_api_key: Some("sk-test".to_string()),
        ..Default::default()
    };
    let settings = settings_for(&server, credentials, RetryPolicy::none());
    let dispatcher = Dispatcher::from_settings(&settings, catalog()).unwrap();

    let result = dispatcher.complete("gemini-1.5-pro", &Params::new(), &[Message::user("Hi")]).await;

    assert!(matches!(result, Err(AssistError::MissingCredentials(message)) if message.contains("GOOGLE_API_KEY")));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(500)
        .with_body("overloaded")
        .expect(2)
        .create_async()
        .await;

    let settings = settings_for(&server, all_keys(), RetryPolicy::new(2, Duration::ZERO));
    let dispatcher = Dispatcher::from_settings(&settings, catalog()).unwrap();
    let result = dispatcher.complete("gpt-4o", &Params::new(), &[Message::user("Hi")]).await;

    mock.assert_async().await;
    assert!(matches!(result, Err(AssistError::Status { status: 500, .. })));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(400)
        .with_body(json!({ "error": { "message": "bad request" } }).to_string())
        .expect(1)
        .create_async()
        .await;

    let settings = settings_for(&server, all_keys(), RetryPolicy::new(3, Duration::ZERO));
    let dispatcher = Dispatcher::from_settings(&settings, catalog()).unwrap();
    let result = dispatcher
        .complete("claude-3-5-sonnet", &Params::new(), &[Message::user("Hi")])
        .await;

    mock.assert_async().await;
    assert!(matches!(result, Err(AssistError::Status { status: 400, body, .. }) if body.contains("bad request")));
}

#[tokio::test]
async fn test_discover_builds_catalog_from_listings() {
    let mut server = Server::new_async().await;
    let _openai_models = server
        .mock("GET", "/v1/models")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_body(json!({ "data": [{ "id": "gpt-4o" }, { "id": "gpt-4o-mini" }] }).to_string())
        .create_async()
        .await;
    let _gemini_first_page = server
        .mock("GET", "/v1beta/models")
        .match_query(Matcher::Exact("pageSize=1000".to_string()))
        .with_status(200)
        .with_body(
            json!({
                "models": [
                    { "name": "models/gemini-1.5-pro", "supportedGenerationMethods": ["generateContent", "countTokens"] },
                    { "name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"] }
                ],
                "nextPageToken": "next"
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _gemini_second_page = server
        .mock("GET", "/v1beta/models")
        .match_query(Matcher::Exact("pageSize=1000&pageToken=next".to_string()))
        .with_status(200)
        .with_body(
            json!({ "models": [{ "name": "models/gemini-1.5-flash", "supportedGenerationMethods": ["generateContent"] }] })
                .to_string(),
        )
        .create_async()
        .await;

    let credentials = Credentials {
        openai_api_key: Some("sk-test".to_string()),
        google_api_key: Some("goog-test".to_string()),
        ..Default::default()
    };
    let settings = settings_for(&server, credentials, RetryPolicy::none());
    let dispatcher = Dispatcher::discover(&settings).await.unwrap();
    let catalog = dispatcher.catalog();

    assert_eq!(
        catalog.names().collect::<Vec<_>>(),
        vec!["gpt-4o", "gpt-4o-mini", "gemini-1.5-pro", "gemini-1.5-flash"]
    );
    assert_eq!(catalog.vendor_of("gemini-1.5-flash"), Some(Vendor::Gemini));
    assert_eq!(catalog.vendor_of("embedding-001"), None);
}

#[tokio::test]
async fn test_failed_listing_is_skipped() {
    let mut server = Server::new_async().await;
    let _anthropic_models = server
        .mock("GET", "/v1/models")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let credentials = Credentials {
        anthropic_api_key: Some("bad-key".to_string()),
        ..Default::default()
    };
    let settings = settings_for(&server, credentials, RetryPolicy::none());
    let dispatcher = Dispatcher::discover(&settings).await.unwrap();

    assert!(dispatcher.catalog().is_empty());
}

#[tokio::test]
async fn test_backend_trait_object() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(json!({ "choices": [{ "message": { "content": "direct" } }] }).to_string())
        .create_async()
        .await;

    let backend: Box<dyn ChatBackend> = Box::new(OpenAiBackend::new(reqwest::Client::new(), "sk-test", &server.url()));
    assert_eq!(backend.vendor(), Vendor::OpenAi);
    let response = backend.complete("gpt-4o", &Params::new(), &[Message::user("Hi")]).await.unwrap();
    assert_eq!(response, "direct");
}
