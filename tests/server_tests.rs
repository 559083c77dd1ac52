use axum::http::StatusCode;
use serde_json::Value;

use test_harness::{
    body_string, config_with, endpoint, get, get_text, parse_job_id, post, test_app,
    test_app_with_path, write_config,
};

fn standard_config() -> rexecd::config::Configuration {
    config_with(vec![
        endpoint("test", "echo", &["Test Output"], false),
        endpoint("fail", "echoo-no-such-binary", &[], false),
        endpoint("longrun", "sleep", &["1"], false),
        endpoint("multi", "sleep", &["0.2"], true),
    ])
}

#[tokio::test]
async fn trigger_returns_output_inline() {
    let (app, _state) = test_app(standard_config());

    let response = get(&app, "/run/test").await;
    assert_eq!(response.status(), StatusCode::OK);

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("x-request-id header")
        .to_str()
        .expect("ascii header")
        .to_string();
    assert_eq!(request_id.len(), 8);

    let body = body_string(response).await;
    assert!(body.starts_with("Job "), "unexpected body: {body}");
    assert!(body.contains("finished.\nTest Output"), "unexpected body: {body}");
}

#[tokio::test]
async fn unknown_endpoint_is_not_found() {
    let (app, _state) = test_app(standard_config());
    let (status, body) = get_text(&app, "/run/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("No endpoint configured"));
}

#[tokio::test]
async fn finished_job_stays_queryable() {
    let (app, _state) = test_app(standard_config());

    let (status, body) = get_text(&app, "/run/test").await;
    assert_eq!(status, StatusCode::OK);
    let job_id = parse_job_id(&body);

    let (status, body) = get_text(&app, &format!("/status/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Finished");

    let (status, body) = get_text(&app, &format!("/output/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Test Output\n");

    let (status, body) = get_text(&app, &format!("/result/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).expect("result is json");
    assert_eq!(json["message"], "Job results");
    assert_eq!(json["requestID"].as_str().expect("requestID").len(), 8);
    assert_eq!(json["job"]["jobID"], job_id.to_string());
    assert_eq!(json["job"]["endpoint"]["path"], "test");
    assert_eq!(json["job"]["endpoint"]["command"], "echo");
    assert_eq!(json["job"]["exitCode"], 0);
    assert_eq!(json["job"]["running"], false);
    assert_eq!(json["job"]["output"], "Test Output\n");
    assert_eq!(json["job"]["truncated"], false);
    assert!(json["job"]["pid"].as_u64().is_some());
}

#[tokio::test]
async fn querying_twice_yields_identical_results() {
    let (app, _state) = test_app(standard_config());

    let (_, body) = get_text(&app, "/run/test").await;
    let job_id = parse_job_id(&body);
    let uri = format!("/output/{}", job_id);

    let (_, first) = get_text(&app, &uri).await;
    let (_, second) = get_text(&app, &uri).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn launch_failure_reports_error_and_leaves_no_running_job() {
    let (app, state) = test_app(standard_config());

    let (status, body) = get_text(&app, "/run/fail").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("failed:"), "unexpected body: {body}");
    assert!(body.contains("Failed to start process"), "unexpected body: {body}");

    let job_id = parse_job_id(&body);
    let (status, body) = get_text(&app, &format!("/status/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Finished");

    let (_, body) = get_text(&app, &format!("/result/{}", job_id)).await;
    let json: Value = serde_json::from_str(&body).expect("result is json");
    assert_eq!(json["job"]["running"], false);
    assert_eq!(json["job"]["exitCode"], Value::Null);
    assert!(json["job"]["error"].as_str().is_some());

    assert_eq!(state.jobs.read().await.running_jobs(), 0);
}

#[tokio::test]
async fn concurrent_triggers_get_one_success_one_conflict() {
    let (app, _state) = test_app(standard_config());

    let (first, second) = tokio::join!(get(&app, "/run/longrun"), get(&app, "/run/longrun"));
    let mut statuses = [first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let conflict = if first.status() == StatusCode::CONFLICT {
        first
    } else {
        second
    };
    assert_eq!(
        body_string(conflict).await,
        "A job for this endpoint is already running."
    );
}

#[tokio::test]
async fn allow_multi_endpoint_runs_overlapping_jobs() {
    let (app, _state) = test_app(standard_config());

    let (first, second) = tokio::join!(get(&app, "/run/multi"), get(&app, "/run/multi"));
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);

    let first_id = parse_job_id(&body_string(first).await);
    let second_id = parse_job_id(&body_string(second).await);
    assert_ne!(first_id, second_id);
}

#[tokio::test]
async fn unknown_job_id_is_not_found_on_every_query_route() {
    let (app, _state) = test_app(standard_config());
    let missing = uuid::Uuid::new_v4();

    let (status, body) = get_text(&app, &format!("/status/{}", missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("No job found"));

    let (status, _) = get_text(&app, &format!("/output/{}", missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get_text(&app, &format!("/result/{}", missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_str(&body).expect("404 result is json");
    assert_eq!(json["message"], "No job found");
    assert_eq!(json["jobID"], missing.to_string());
    assert!(json["requestID"].as_str().is_some());
}

#[tokio::test]
async fn malformed_job_id_is_not_found() {
    let (app, _state) = test_app(standard_config());
    let (status, _) = get_text(&app, "/status/not-a-job-id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_store_rejects_new_triggers() {
    let mut config = standard_config();
    config.max_jobs = 1;
    let (app, _state) = test_app(config);

    let (status, _) = get_text(&app, "/run/test").await;
    assert_eq!(status, StatusCode::OK);

    // The finished record still occupies the single slot until swept.
    let (status, body) = get_text(&app, "/run/test").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("capacity"));
}

#[tokio::test]
async fn reload_swaps_the_endpoint_set() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = config_with(vec![endpoint("old", "echo", &["one"], false)]);
    let path = write_config(&dir, &old);
    let (app, _state) = test_app_with_path(path.clone(), old);

    let (status, _) = get_text(&app, "/run/old").await;
    assert_eq!(status, StatusCode::OK);

    let new = config_with(vec![endpoint("new", "echo", &["two"], false)]);
    std::fs::write(&path, serde_yaml::to_string(&new).expect("yaml")).expect("rewrite config");

    let response = post(&app, "/reload").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("reloaded"));

    let (status, body) = get_text(&app, "/run/new").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("two"));

    let (status, _) = get_text(&app, "/run/old").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_reload_keeps_the_previous_configuration() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with(vec![endpoint("old", "echo", &["one"], false)]);
    let path = write_config(&dir, &config);
    let (app, _state) = test_app_with_path(path.clone(), config);

    std::fs::write(&path, "endpoints: [unclosed\n").expect("corrupt config");

    let response = post(&app, "/reload").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_string(response).await.contains("Failed to reload"));

    // Old endpoints keep serving.
    let (status, _) = get_text(&app, "/run/old").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn completed_jobs_survive_a_reload_that_drops_their_endpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with(vec![endpoint("old", "echo", &["one"], false)]);
    let path = write_config(&dir, &config);
    let (app, _state) = test_app_with_path(path.clone(), config);

    let (_, body) = get_text(&app, "/run/old").await;
    let job_id = parse_job_id(&body);

    let new = config_with(vec![endpoint("new", "echo", &["two"], false)]);
    std::fs::write(&path, serde_yaml::to_string(&new).expect("yaml")).expect("rewrite config");
    let response = post(&app, "/reload").await;
    assert_eq!(response.status(), StatusCode::OK);

    // The job captured its endpoint at trigger time; the reload does not
    // touch it.
    let (status, body) = get_text(&app, &format!("/result/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).expect("result is json");
    assert_eq!(json["job"]["endpoint"]["path"], "old");
}
