use swapscout::errors::PrError;
use swapscout::pull_request::{GitHubClient, PullRequestGateway, PullRequestRequest};
use swapscout::vcs::RepoIdentity;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pr_request() -> PullRequestRequest {
    PullRequestRequest {
        repo: RepoIdentity::new("octo", "widgets"),
        token: "secret-token".to_string(),
        title: "Text replacement: 1 files modified".to_string(),
        body: "## Text Replacement Summary".to_string(),
        head: "text-replace-20240101_120000".to_string(),
        base: "develop".to_string(),
    }
}

/// The blocking client must not run on a runtime worker
async fn create(api_url: String) -> Result<String, PrError> {
    tokio::task::spawn_blocking(move || {
        let client = GitHubClient::new(api_url)?;
        client.create_pull_request(&pr_request()).map(|created| created.url)
    })
    .await
    .expect("blocking task")
}

#[tokio::test(flavor = "multi_thread")]
async fn client_posts_pull_request_and_returns_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/pulls"))
        .and(header("authorization", "token secret-token"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .and(body_json(serde_json::json!({
            "title": "Text replacement: 1 files modified",
            "body": "## Text Replacement Summary",
            "head": "text-replace-20240101_120000",
            "base": "develop",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "number": 42,
            "html_url": "https://github.com/octo/widgets/pull/42",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = create(server.uri()).await.expect("pull request created");
    assert_eq!(url, "https://github.com/octo/widgets/pull/42");
}

#[tokio::test(flavor = "multi_thread")]
async fn client_reports_api_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/pulls"))
        .respond_with(
            ResponseTemplate::new(422).set_body_string(r#"{"message":"Validation Failed"}"#),
        )
        .mount(&server)
        .await;

    let err = create(server.uri()).await.unwrap_err();
    match err {
        PrError::Api { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("Validation Failed"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn client_rejects_malformed_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = create(server.uri()).await.unwrap_err();
    assert!(matches!(err, PrError::Http(_)));
}
