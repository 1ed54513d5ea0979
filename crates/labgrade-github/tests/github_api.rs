//! GitHubClient against a mock GitHub REST server.

use labgrade_core::{FileStatus, RepoError, RepoRef, RepositoryClient};
use labgrade_github::{GitHubClient, GitHubConfig, HISTORY_PAGE_SIZE};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const REPO_PATH: &str = "/repos/suai-os/os-task2-octocat";

fn repo() -> RepoRef {
    RepoRef::new("suai-os", "os-task2-octocat")
}

fn client(server: &MockServer) -> GitHubClient {
    GitHubClient::new(GitHubConfig::new(&server.uri()).with_token("test-token")).unwrap()
}

async fn mount_get(server: &MockServer, path: &str, response: ResponseTemplate) {
    Mock::given(matchers::method("GET"))
        .and(matchers::path(path))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn requests_carry_token_and_media_type() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/users/octocat"))
        .and(matchers::header("authorization", "Bearer test-token"))
        .and(matchers::header("accept", "application/vnd.github+json"))
        .and(matchers::header("x-github-api-version", "2022-11-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "octocat"})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client(&server).user_exists("octocat").await.unwrap());
}

#[tokio::test]
async fn unknown_user_does_not_exist() {
    let server = MockServer::start().await;
    mount_get(&server, "/users/ghost", ResponseTemplate::new(404)).await;

    assert!(!client(&server).user_exists("ghost").await.unwrap());
}

#[tokio::test]
async fn missing_files_keeps_input_order() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/contents/main.py"),
        ResponseTemplate::new(200).set_body_json(json!({"name": "main.py"})),
    )
    .await;
    mount_get(&server, &format!("{REPO_PATH}/contents/test_main.py"), ResponseTemplate::new(404)).await;
    mount_get(&server, &format!("{REPO_PATH}/contents/README.md"), ResponseTemplate::new(404)).await;

    let required = vec![
        "test_main.py".to_string(),
        "main.py".to_string(),
        "README.md".to_string(),
    ];
    let missing = client(&server).missing_files(&repo(), &required).await.unwrap();

    assert_eq!(missing, vec!["test_main.py", "README.md"]);
}

#[tokio::test]
async fn server_error_on_contents_is_status_error() {
    let server = MockServer::start().await;
    mount_get(&server, &format!("{REPO_PATH}/contents/.github/workflows"), ResponseTemplate::new(502)).await;

    let err = client(&server).has_ci_config(&repo()).await.unwrap_err();
    assert!(matches!(err, RepoError::Status { status: 502, .. }));
}

#[tokio::test]
async fn workflows_directory_means_ci_configured() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/contents/.github/workflows"),
        ResponseTemplate::new(200).set_body_json(json!([{"name": "ci.yml"}])),
    )
    .await;

    assert!(client(&server).has_ci_config(&repo()).await.unwrap());
}

#[tokio::test]
async fn latest_commit_includes_changed_files() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits"),
        ResponseTemplate::new(200).set_body_json(json!([{"sha": "abc123"}])),
    )
    .await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits/abc123"),
        ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc123",
            "files": [
                {"filename": "main.py", "status": "modified"},
                {"filename": "test_main.py", "status": "removed"}
            ]
        })),
    )
    .await;

    let commit = client(&server).latest_commit(&repo()).await.unwrap().unwrap();

    assert_eq!(commit.sha, "abc123");
    assert_eq!(commit.files.len(), 2);
    assert_eq!(commit.files[1].status, FileStatus::Removed);
}

#[tokio::test]
async fn latest_commit_without_details_has_no_files() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits"),
        ResponseTemplate::new(200).set_body_json(json!([{"sha": "abc123"}])),
    )
    .await;
    mount_get(&server, &format!("{REPO_PATH}/commits/abc123"), ResponseTemplate::new(500)).await;

    let commit = client(&server).latest_commit(&repo()).await.unwrap().unwrap();
    assert_eq!(commit.sha, "abc123");
    assert!(commit.files.is_empty());
}

#[tokio::test]
async fn empty_repository_has_no_latest_commit() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits"),
        ResponseTemplate::new(409).set_body_json(json!({"message": "Git Repository is empty."})),
    )
    .await;

    assert!(client(&server).latest_commit(&repo()).await.unwrap().is_none());
}

#[tokio::test]
async fn absent_repository_is_not_found() {
    let server = MockServer::start().await;
    mount_get(&server, &format!("{REPO_PATH}/commits"), ResponseTemplate::new(404)).await;

    let err = client(&server).latest_commit(&repo()).await.unwrap_err();
    assert_eq!(err, RepoError::NotFound("suai-os/os-task2-octocat".to_string()));
}

#[tokio::test]
async fn history_is_deduplicated_in_first_seen_order() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits"),
        ResponseTemplate::new(200).set_body_json(json!([{"sha": "c2"}, {"sha": "c1"}])),
    )
    .await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits/c2"),
        ResponseTemplate::new(200).set_body_json(json!({
            "sha": "c2",
            "files": [{"filename": "main.py"}, {"filename": "tests/test_a.py"}]
        })),
    )
    .await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits/c1"),
        ResponseTemplate::new(200).set_body_json(json!({
            "sha": "c1",
            "files": [{"filename": "main.py"}, {"filename": "README.md"}]
        })),
    )
    .await;

    let paths = client(&server).all_modified_files(&repo()).await.unwrap();
    assert_eq!(paths, vec!["main.py", "tests/test_a.py", "README.md"]);
}

#[tokio::test]
async fn history_walks_every_page() {
    let server = MockServer::start().await;
    let first: Vec<_> = (0..HISTORY_PAGE_SIZE)
        .map(|i| json!({"sha": format!("p1-{i}")}))
        .collect();

    Mock::given(matchers::method("GET"))
        .and(matchers::path(format!("{REPO_PATH}/commits")))
        .and(matchers::query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(first)))
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path(format!("{REPO_PATH}/commits")))
        .and(matchers::query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sha": "p2-0"}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path_regex(format!(r"^{REPO_PATH}/commits/p1-\d+$")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"sha": "p1", "files": [{"filename": "main.py"}]})),
        )
        .mount(&server)
        .await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits/p2-0"),
        ResponseTemplate::new(200)
            .set_body_json(json!({"sha": "p2-0", "files": [{"filename": "test_main.py"}]})),
    )
    .await;

    let paths = client(&server).all_modified_files(&repo()).await.unwrap();
    assert_eq!(paths, vec!["main.py", "test_main.py"]);
}

#[tokio::test]
async fn history_of_empty_repository_is_empty() {
    let server = MockServer::start().await;
    mount_get(&server, &format!("{REPO_PATH}/commits"), ResponseTemplate::new(409)).await;

    assert!(client(&server).all_modified_files(&repo()).await.unwrap().is_empty());
}

#[tokio::test]
async fn check_runs_are_returned_raw() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits/abc123/check-runs"),
        ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "check_runs": [
                {"id": 11, "name": "test", "status": "completed", "conclusion": "success",
                 "html_url": "https://github.com/suai-os/os-task2-octocat/actions/runs/5/job/11"},
                {"id": 12, "name": "build", "status": "in_progress", "conclusion": null}
            ]
        })),
    )
    .await;

    let runs = client(&server).check_runs(&repo(), "abc123").await.unwrap();

    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].name.as_deref(), Some("test"));
    assert_eq!(runs[1].conclusion, None);
    assert_eq!(runs[1].html_url, None);
}

#[tokio::test]
async fn check_runs_failure_is_an_error() {
    let server = MockServer::start().await;
    mount_get(&server, &format!("{REPO_PATH}/commits/abc123/check-runs"), ResponseTemplate::new(403)).await;

    let err = client(&server).check_runs(&repo(), "abc123").await.unwrap_err();
    assert!(matches!(err, RepoError::Status { status: 403, .. }));
}

#[tokio::test]
async fn malformed_check_runs_is_decode_error() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/commits/abc123/check-runs"),
        ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
    )
    .await;

    let err = client(&server).check_runs(&repo(), "abc123").await.unwrap_err();
    assert!(matches!(err, RepoError::Decode(_)));
}

#[tokio::test]
async fn job_logs_follow_redirect() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        &format!("{REPO_PATH}/actions/jobs/42/logs"),
        ResponseTemplate::new(302).insert_header("location", format!("{}/blob/42.txt", server.uri())),
    )
    .await;
    mount_get(
        &server,
        "/blob/42.txt",
        ResponseTemplate::new(200).set_body_string("2024-03-01T10:00:00.000Z TASKID is 7\n"),
    )
    .await;

    let logs = client(&server).job_logs(&repo(), 42).await.unwrap();
    assert_eq!(logs.as_deref(), Some("2024-03-01T10:00:00.000Z TASKID is 7\n"));
}

#[tokio::test]
async fn expired_job_logs_are_absent() {
    let server = MockServer::start().await;
    mount_get(&server, &format!("{REPO_PATH}/actions/jobs/42/logs"), ResponseTemplate::new(410)).await;
    mount_get(&server, &format!("{REPO_PATH}/actions/jobs/43/logs"), ResponseTemplate::new(404)).await;

    let client = client(&server);
    assert_eq!(client.job_logs(&repo(), 42).await.unwrap(), None);
    assert_eq!(client.job_logs(&repo(), 43).await.unwrap(), None);
}
