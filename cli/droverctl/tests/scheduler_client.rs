//! HTTP scheduler client against a mock scheduler.

use std::sync::Arc;
use std::time::Duration;

use drover_id::InstanceId;
use drover_rollout::{RestartOutcome, RestartSettings, Restarter, StatusWatcher};
use drover_sla::Sla;
use drover_tasks::{
    Clock, ResponseCode, ScheduleStatus, SchedulerError, SchedulerMutate, SchedulerQuery,
    TaskQuery,
};
use drover_testing::{job_key, FakeClock, TaskBuilder};
use droverctl::client::SchedulerClient;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB: &str = "west/www-data/prod/hello";

fn ok_tasks(tasks: &[drover_tasks::TaskRecord]) -> Value {
    json!({
        "code": "OK",
        "messages": [],
        "result": { "tasks": tasks },
    })
}

async fn mock_tasks(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/api/tasks/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_query_tasks_sends_filter_and_decodes_tasks() {
    let server = MockServer::start().await;
    let task = TaskBuilder::new(JOB, 0, "h1").event(ScheduleStatus::Running, 1_000).build();
    let query = TaskQuery::live().with_hosts(["h1"]);

    Mock::given(method("POST"))
        .and(path("/api/tasks/query"))
        .and(body_json(serde_json::to_value(&query).unwrap()))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_tasks(&[task.clone()])))
        .expect(1)
        .mount(&server)
        .await;

    let client = SchedulerClient::new(&server.uri()).unwrap();
    let tasks = client.query_tasks(&query).await.unwrap();

    assert_eq!(tasks, vec![task]);
}

#[tokio::test]
async fn test_query_non_ok_code_is_an_error() {
    let server = MockServer::start().await;
    mock_tasks(
        &server,
        json!({ "code": "AUTH_FAILED", "messages": ["denied"] }),
    )
    .await;

    let client = SchedulerClient::new(&server.uri()).unwrap();
    let err = client.query_tasks(&TaskQuery::live()).await.unwrap_err();

    let response = err.response().expect("typed response");
    assert_eq!(response.code, ResponseCode::AuthFailed);
    assert_eq!(response.message(), "denied");
}

#[tokio::test]
async fn test_query_without_result_is_decode_error() {
    let server = MockServer::start().await;
    mock_tasks(&server, json!({ "code": "OK" })).await;

    let client = SchedulerClient::new(&server.uri()).unwrap();
    let err = client.query_tasks(&TaskQuery::live()).await.unwrap_err();

    assert!(matches!(err, SchedulerError::Decode(_)));
}

#[tokio::test]
async fn test_http_error_without_envelope_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = SchedulerClient::new(&server.uri()).unwrap();
    let err = client.query_tasks(&TaskQuery::live()).await.unwrap_err();

    assert!(matches!(err, SchedulerError::Transport(ref msg) if msg.contains("503")));
}

#[tokio::test]
async fn test_unreachable_scheduler_is_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = SchedulerClient::new(&uri).unwrap();
    let err = client.query_tasks(&TaskQuery::live()).await.unwrap_err();

    assert!(matches!(err, SchedulerError::Transport(_)));
}

#[tokio::test]
async fn test_restart_posts_instances_and_returns_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/west/www-data/prod/hello/restart"))
        .and(body_json(json!({ "instances": [1, 3] })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": "LOCK_ERROR", "messages": ["job locked"] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = SchedulerClient::new(&server.uri()).unwrap();
    let response = client
        .restart_instances(&job_key(JOB), &[InstanceId::new(1), InstanceId::new(3)])
        .await
        .unwrap();

    assert_eq!(response.code, ResponseCode::LockError);
    assert!(!response.is_ok());
}

#[tokio::test]
async fn test_job_uptime_over_http() {
    let server = MockServer::start().await;
    let clock = FakeClock::new();
    let now = clock.now();
    let tasks: Vec<_> = [100, 200, 300, 400]
        .into_iter()
        .enumerate()
        .map(|(i, uptime)| TaskBuilder::running(JOB, i as u32, &format!("h{i}"), uptime, now))
        .collect();
    mock_tasks(&server, ok_tasks(&tasks)).await;

    let sla = Sla::new(SchedulerClient::new(&server.uri()).unwrap(), Arc::new(clock));
    let vector = sla.job_uptime_vector(&job_key(JOB)).await.unwrap();

    assert_eq!(vector.total_tasks(), 4);
    assert_eq!(vector.task_up_count(250, None), 50.0);
    assert_eq!(vector.job_uptime(50.0).unwrap(), 200);
}

#[tokio::test]
async fn test_rolling_restart_over_http() {
    let server = MockServer::start().await;
    let tasks = vec![
        TaskBuilder::new(JOB, 0, "h1").build(),
        TaskBuilder::new(JOB, 1, "h2").build(),
    ];
    mock_tasks(&server, ok_tasks(&tasks)).await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/west/www-data/prod/hello/restart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    let settings = RestartSettings {
        batch_size: 2,
        watch_duration: Duration::from_secs(10),
        ..RestartSettings::default()
    };
    let client = Arc::new(SchedulerClient::new(&server.uri()).unwrap());
    let watcher = StatusWatcher::new(Arc::clone(&client), Arc::new(FakeClock::new()), &settings);
    let restarter = Restarter::new(job_key(JOB), settings, client, watcher).unwrap();

    let report = restarter.restart(&[]).await.unwrap();

    assert_eq!(report.outcome, RestartOutcome::Done);
    assert_eq!(report.batches, 1);
    assert!(report.pending.is_empty());
}
