//! Route definitions and router construction.

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::HttpError;
use crate::handlers;
use crate::state::AppState;

/// All API routes without the `/api` prefix.
fn api_routes() -> Router<AppState> {
    Router::new()
        // Encode tasks
        .route("/encodes/tasks", get(handlers::encodes::list))
        .route(
            "/encodes/tasks/in-progress",
            get(handlers::encodes::in_progress),
        )
        .route(
            "/encodes/tasks/{id}",
            get(handlers::encodes::detail).post(handlers::encodes::update),
        )
        .route(
            "/encodes/tasks/{id}/file",
            get(handlers::encodes::download_source).post(handlers::encodes::upload_artifact),
        )
        .route("/encodes/ingest", post(handlers::encodes::ingest))
        .route("/encodes/scan", get(handlers::encodes::scan))
        .route(
            "/encodes/profiles",
            get(handlers::encodes::profiles).post(handlers::encodes::create_profile),
        )
        // Metric tasks
        .route("/metrics/tasks", get(handlers::metrics::list))
        .route(
            "/metrics/tasks/in-progress",
            get(handlers::metrics::in_progress),
        )
        .route(
            "/metrics/tasks/{id}",
            get(handlers::metrics::detail).post(handlers::metrics::update),
        )
        .route(
            "/metrics/tasks/{id}/files/source",
            get(handlers::metrics::download_source),
        )
        .route(
            "/metrics/tasks/{id}/files/compressed",
            get(handlers::metrics::download_compressed),
        )
        .route(
            "/metrics/tasks/{id}/report",
            post(handlers::metrics::upload_report),
        )
        .route("/metrics/ingest", post(handlers::metrics::ingest))
}

/// Create the coordinator router.
///
/// Undocumented methods answer 405 and unknown paths 404, both with the
/// JSON error body.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn method_not_allowed(method: Method) -> HttpError {
    HttpError::MethodNotAllowed(method.to_string())
}

async fn not_found() -> HttpError {
    HttpError::NotFound("no such endpoint".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use revid_core::domain::{Codec, EncodeMode, NewEncodeTask, NewMediaFile, NewProfile, TaskStatus};
    use revid_core::settings::{Flags, HttpSettings, PathSettings, RabbitSettings};
    use revid_core::{
        EncodeTaskRepository, Envelope, FileRepository, MetricTaskRepository, ProfileRepository,
        QueueError, Repos, Settings, TaskQueue,
    };
    use revid_db::{build_repos, setup_test_database};

    use crate::state::AppContext;

    /// Queue stub capturing published envelopes.
    #[derive(Default)]
    struct RecordingQueue {
        published: Mutex<Vec<Envelope>>,
    }

    #[async_trait::async_trait]
    impl TaskQueue for RecordingQueue {
        async fn publish(&self, envelope: &Envelope) -> Result<(), QueueError> {
            self.published.lock().await.push(envelope.clone());
            Ok(())
        }
    }

    struct Harness {
        router: Router,
        repos: Repos,
        queue: Arc<RecordingQueue>,
        output: tempfile::TempDir,
        _input: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let pool = setup_test_database().await.unwrap();
        let repos = build_repos(pool);
        let queue = Arc::new(RecordingQueue::default());

        let settings = Settings {
            paths: PathSettings {
                input: input.path().to_path_buf(),
                output: output.path().to_path_buf(),
                work: PathBuf::from("/tmp/revid-work"),
                database: PathBuf::from(":memory:"),
            },
            rabbitmq: RabbitSettings {
                broker: "localhost".into(),
                broker_port: 5672,
                queue: "revid-tasks".into(),
            },
            http: HttpSettings {
                bind: "127.0.0.1:0".into(),
                public_url: "http://coordinator:8080".into(),
            },
            flags: Flags { auto_delete: false },
            retry_delay_secs: 30,
        };

        let context = Arc::new(AppContext {
            settings,
            repos: repos.clone(),
            queue: queue.clone(),
        });

        Harness {
            router: create_router(context),
            repos,
            queue,
            output,
            _input: input,
        }
    }

    async fn seed_encode_task(repos: &Repos) -> i64 {
        let source = repos
            .files
            .get_or_create(&NewMediaFile {
                name: "episode.mkv".into(),
                directory: "/in".into(),
                size: 8_000_000,
                duration: 120.0,
                frame_rate: 24.0,
                frames: 2880,
                probe_info: None,
            })
            .await
            .unwrap();
        let profile = repos
            .profiles
            .insert(&NewProfile {
                name: "x264-crf18".into(),
                description: String::new(),
                codec: Codec::H264,
                encode_type: EncodeMode::Crf,
                encode_value: 18,
                preset: "slow".into(),
                tune: None,
                extra_args: None,
                keep_original_main_audio: false,
            })
            .await
            .unwrap();
        repos
            .encode_tasks
            .insert(&NewEncodeTask {
                source_file_id: source.id,
                compressed_file_id: None,
                profile_id: profile.id,
                encode_type: EncodeMode::Crf,
                encode_value: 18,
            })
            .await
            .unwrap()
            .id
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn undocumented_method_is_405_with_json_body() {
        let h = harness().await;
        let id = seed_encode_task(&h.repos).await;

        let response = h
            .router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/encodes/tasks/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = body_json(response).await;
        assert_eq!(body["status"], 405);
        assert!(body["error"].as_str().unwrap().contains("DELETE"));
    }

    #[tokio::test]
    async fn unknown_path_is_404_with_json_body() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(
                Request::builder()
                    .uri("/api/thumbnails")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["status"], 404);
    }

    #[tokio::test]
    async fn progress_post_without_progress_key_is_400() {
        let h = harness().await;
        let id = seed_encode_task(&h.repos).await;

        let response = h
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/encodes/tasks/{id}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"fps": 50.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("progress"));
    }

    #[tokio::test]
    async fn progress_post_adopts_worker_and_advances_status() {
        let h = harness().await;
        let id = seed_encode_task(&h.repos).await;

        let response = h
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/encodes/tasks/{id}"))
                    .header("content-type", "application/json")
                    .header("Worker", "worker-7")
                    .body(Body::from(
                        r#"{"progress": 42.5, "fps": 81.2, "eta": 95}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let task = h.repos.encode_tasks.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.worker.as_deref(), Some("worker-7"));
        assert_eq!(task.progress, 42.5);
        assert_eq!(task.seconds_remaining, 95);
    }

    #[tokio::test]
    async fn artifact_upload_without_size_header_is_400() {
        let h = harness().await;
        let id = seed_encode_task(&h.repos).await;

        let response = h
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/encodes/tasks/{id}/file"))
                    .body(Body::from(vec![0u8; 128]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn size_mismatch_quarantines_requeues_and_still_returns_200() {
        let h = harness().await;
        let id = seed_encode_task(&h.repos).await;

        let response = h
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/encodes/tasks/{id}/file"))
                    .header("Worker", "worker-1")
                    .header("size", "1000000")
                    .body(Body::from(vec![0u8; 999_999]))
                    .unwrap(),
            )
            .await
            .unwrap();

        // The worker still gets a 200 so it acknowledges its message.
        assert_eq!(response.status(), StatusCode::OK);

        // The truncated artifact landed in quarantine, not the output tree.
        let quarantined = h
            .output
            .path()
            .join("invalid/x264-crf18/episode.mkv");
        assert!(quarantined.exists());
        assert_eq!(std::fs::metadata(&quarantined).unwrap().len(), 999_999);
        assert!(!h.output.path().join("x264-crf18/episode.mkv").exists());

        // A fresh envelope with the same task id went back on the queue and
        // the task dropped back to Queued.
        let published = h.queue.published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id(), id);
        drop(published);
        assert_eq!(
            h.repos.encode_tasks.get(id).await.unwrap().status,
            TaskStatus::Queued
        );
    }

    #[tokio::test]
    async fn detail_includes_nested_records_and_links() {
        let h = harness().await;
        let id = seed_encode_task(&h.repos).await;

        let response = h
            .router
            .oneshot(
                Request::builder()
                    .uri(format!("/api/encodes/tasks/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["source_file"]["name"], "episode.mkv");
        assert_eq!(body["profile"]["name"], "x264-crf18");
        assert_eq!(
            body["links"]["file"],
            format!("http://coordinator:8080/api/encodes/tasks/{id}/file")
        );
    }

    async fn seed_metric_task(repos: &Repos) -> i64 {
        let source = repos
            .files
            .get_or_create(&NewMediaFile {
                name: "episode.mkv".into(),
                directory: "/in".into(),
                size: 8_000_000,
                duration: 120.0,
                frame_rate: 24.0,
                frames: 2880,
                probe_info: None,
            })
            .await
            .unwrap();
        let compressed = repos
            .files
            .get_or_create(&NewMediaFile {
                name: "episode.mkv".into(),
                directory: "/out/x264-crf18".into(),
                size: 3_000_000,
                duration: 120.0,
                frame_rate: 24.0,
                frames: 2880,
                probe_info: None,
            })
            .await
            .unwrap();
        repos
            .metric_tasks
            .insert(&revid_core::domain::NewMetricTask {
                source_file_id: source.id,
                compressed_file_id: compressed.id,
                psnr: false,
                ms_ssim: false,
                vmaf: true,
                neg_mode: false,
                subsample_rate: 1,
            })
            .await
            .unwrap()
            .id
    }

    fn vmaf_only_report(frames: usize) -> String {
        let entries: Vec<serde_json::Value> = (0..frames)
            .map(|i| {
                serde_json::json!({
                    "frameNum": i,
                    "metrics": {"vmaf": 90.0 + i as f64 / 100.0}
                })
            })
            .collect();
        serde_json::json!({
            "frames": entries,
            "pooled_metrics": {
                "vmaf": {"min": 90.0, "max": 99.0, "mean": 94.5, "harmonic_mean": 94.4}
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn report_upload_ingests_frames_and_completes_the_task() {
        let h = harness().await;
        let id = seed_metric_task(&h.repos).await;

        let report = vmaf_only_report(120);
        let size = report.len();

        let response = h
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/metrics/tasks/{id}/report"))
                    .header("Worker", "worker-3")
                    .header("size", size.to_string())
                    .body(Body::from(report))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let task = h.repos.metric_tasks.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.worker.as_deref(), Some("worker-3"));
        assert!(task.analyze_end_at.is_some());

        let frames = h.repos.metric_tasks.list_frames(id).await.unwrap();
        assert_eq!(frames.len(), 120);

        let pooled = h
            .repos
            .metric_tasks
            .get_pooled(id, revid_core::domain::MetricKind::Vmaf)
            .await
            .unwrap()
            .unwrap();
        // 120 frames: the 1% low is the single worst score.
        assert_eq!(pooled.one_percent_low, 90.0);
        assert_eq!(pooled.mean, 94.5);
    }

    #[tokio::test]
    async fn report_size_mismatch_requeues_without_ingesting() {
        let h = harness().await;
        let id = seed_metric_task(&h.repos).await;

        let report = vmaf_only_report(120);
        let wrong_size = report.len() + 1;

        let response = h
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/metrics/tasks/{id}/report"))
                    .header("Worker", "worker-3")
                    .header("size", wrong_size.to_string())
                    .body(Body::from(report))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(h.repos.metric_tasks.list_frames(id).await.unwrap().is_empty());
        assert_eq!(
            h.repos.metric_tasks.get(id).await.unwrap().status,
            TaskStatus::Queued
        );

        let published = h.queue.published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id(), id);
        assert_eq!(published[0].kind(), "metrics");
    }

    #[tokio::test]
    async fn missing_task_is_404() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(
                Request::builder()
                    .uri("/api/encodes/tasks/9999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
