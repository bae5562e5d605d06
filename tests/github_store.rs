//! GitHub contents store against a mock API.

use serde_json::json;
use sprite::config::StoreConfig;
use sprite::contents::{write_daily_file, write_note};
use sprite::error::Error;
use sprite::github::{encode_base64, GitHubStore};
use sprite::models::{DailyFileOutput, InboxEntry, MarkdownOutput, SourceType};
use sprite::traits::DocumentStore;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTENTS: &str = "/repos/me/vault/contents";

fn store_config(api_base: &str, branch: Option<&str>) -> StoreConfig {
    StoreConfig {
        owner: "me".to_string(),
        repo: "vault".to_string(),
        branch: branch.map(str::to_string),
        api_base: api_base.to_string(),
        inbox_dir: "00_Inbox".to_string(),
        timeout_secs: 5,
        max_attempts: 3,
    }
}

fn store(server: &MockServer) -> GitHubStore {
    GitHubStore::new(&store_config(&server.uri(), None), "ghp_test").unwrap()
}

#[tokio::test]
async fn test_read_missing_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/00_Inbox/inbox-2024-01-15.md", CONTENTS)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let doc = store(&server)
        .read("00_Inbox/inbox-2024-01-15.md")
        .await
        .unwrap();
    assert!(doc.is_none());
}

#[tokio::test]
async fn test_read_decodes_wrapped_base64() {
    let server = MockServer::start().await;
    let encoded = encode_base64("---\ndate: 2024-01-15\n---\n\n## 10:00\n\n- 10:30 你好\n");
    let wrapped = format!("{}\n{}\n", &encoded[..20], &encoded[20..]);

    Mock::given(method("GET"))
        .and(path(format!("{}/notes.md", CONTENTS)))
        .and(header("authorization", "Bearer ghp_test"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "content": wrapped, "sha": "abc123" })),
        )
        .mount(&server)
        .await;

    let doc = store(&server).read("notes.md").await.unwrap().unwrap();
    assert_eq!(doc.revision, "abc123");
    assert!(doc.content.ends_with("- 10:30 你好\n"));
}

#[tokio::test]
async fn test_branch_is_sent_on_read_and_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/a.md", CONTENTS)))
        .and(query_param("ref", "notes"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/a.md", CONTENTS)))
        .and(body_partial_json(json!({ "branch": "notes", "sha": "old" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store = GitHubStore::new(&store_config(&server.uri(), Some("notes")), "t").unwrap();
    assert!(store.read("a.md").await.unwrap().is_none());
    store.write("a.md", "x", Some("old"), "msg").await.unwrap();
}

#[tokio::test]
async fn test_write_sends_base64_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/new.md", CONTENTS)))
        .and(body_partial_json(json!({
            "message": "Add: Rust",
            "content": encode_base64("hello 世界"),
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    store(&server)
        .write("new.md", "hello 世界", None, "Add: Rust")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_write_status_mapping() {
    let server = MockServer::start().await;
    for (file, status) in [("c409.md", 409), ("c412.md", 412), ("c422.md", 422), ("c500.md", 500)] {
        Mock::given(method("PUT"))
            .and(path(format!("{}/{}", CONTENTS, file)))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;
    }
    let store = store(&server);

    let err = store.write("c409.md", "x", Some("s"), "m").await.unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    let err = store.write("c412.md", "x", Some("s"), "m").await.unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    let err = store.write("c422.md", "x", None, "m").await.unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert!(err.is_write_retryable());

    let err = store.write("c500.md", "x", None, "m").await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(!err.is_write_retryable());
    assert!(err.to_string().contains("500"));
}

fn note() -> MarkdownOutput {
    MarkdownOutput {
        filename: "inbox-2024-01-15T10-30-00.000Z.md".to_string(),
        content: "---\nsource-type: text\n---\n\nHello".to_string(),
    }
}

#[tokio::test]
async fn test_note_conflict_retries_with_suffix() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/00_Inbox/inbox-2024-01-15T10-30-00.000Z.md", CONTENTS)))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(
            r"^/repos/me/vault/contents/00_Inbox/inbox-2024-01-15T10-30-00\.000Z-[0-9a-f]{8}\.md$",
        ))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let written = write_note(&store(&server), "00_Inbox", &note()).await.unwrap();
    assert_ne!(written, "00_Inbox/inbox-2024-01-15T10-30-00.000Z.md");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_note_conflict_then_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/00_Inbox/inbox-2024-01-15T10-30-00.000Z.md", CONTENTS)))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"-[0-9a-f]{8}\.md$"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = write_note(&store(&server), "00_Inbox", &note())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_daily_merge_rereads_after_conflict() {
    let server = MockServer::start().await;
    let daily = format!("{}/00_Inbox/inbox-2024-01-15.md", CONTENTS);
    let before = "---\ndate: 2024-01-15\n---\n\n## 09:00\n\n- 09:05 early\n";
    let after = "---\ndate: 2024-01-15\n---\n\n## 09:00\n\n- 09:05 early\n\n- 09:40 concurrent\n";

    // First read sees `before`, the second (after the conflict) sees `after`.
    Mock::given(method("GET"))
        .and(path(daily.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "content": encode_base64(before), "sha": "v1" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(daily.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "content": encode_base64(after), "sha": "v2" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(daily.clone()))
        .and(body_partial_json(json!({ "sha": "v1" })))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(daily.clone()))
        .and(body_partial_json(json!({ "sha": "v2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let output = DailyFileOutput {
        filename: "inbox-2024-01-15.md".to_string(),
        date: "2024-01-15".to_string(),
        entry: InboxEntry {
            time: "10:30".to_string(),
            hour: "10:00".to_string(),
            text: "Hello".to_string(),
            source_type: SourceType::Text,
            source_url: String::new(),
        },
    };

    let written = write_daily_file(&store(&server), "00_Inbox", &output, 3)
        .await
        .unwrap();
    assert_eq!(written, "00_Inbox/inbox-2024-01-15.md");

    let requests = server.received_requests().await.unwrap();
    let last_put = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .last()
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&last_put.body).unwrap();
    let content = sprite::github::decode_base64(body["content"].as_str().unwrap()).unwrap();
    assert!(content.contains("- 09:40 concurrent"));
    assert!(content.contains("## 10:00\n\n- 10:30 Hello"));
}
