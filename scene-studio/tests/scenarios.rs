use std::path::Path;
use std::time::Duration;

use scene_core::Settings;
use scene_credits::CreditKind;
use scene_studio::{QuickCreateRequest, StudioApp, SubmitError};

fn test_settings(dir: &Path) -> Settings {
    Settings {
        worker_concurrency: 1,
        media_dir: dir.join("media"),
        database_url: format!("sqlite://{}", dir.join("studio.db").display()),
        ..Settings::default()
    }
}

fn universe_request() -> QuickCreateRequest {
    QuickCreateRequest {
        idea_text: "A quiet garden at dawn".to_string(),
        duration: "30s".to_string(),
        style_key: "cinematic_realism".to_string(),
        auto_create_universe: true,
        video_model: None,
        video_duration: None,
        video_quality: None,
        aspect_ratio: Some("9:16".to_string()),
    }
}

async fn wait_for_status(app: &StudioApp, job_id: &str, wanted: &str) {
    for _ in 0..500 {
        if let Ok(view) = app.get_status(job_id).await {
            if view.status == wanted {
                return;
            }
            assert_ne!(view.status, "error", "job failed unexpectedly");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never reached {wanted}");
}

#[tokio::test]
async fn health_reports_database_and_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();

    let health = app.health().await;
    assert!(health.database_ok);
    assert_eq!(health.total_jobs, 0);
    assert_eq!(health.video_models, 8);
}

#[tokio::test]
async fn insufficient_funds_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();

    let err = app
        .submit_full_universe("u2", universe_request())
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::InsufficientCredits));

    assert_eq!(app.store.count(None).await.unwrap(), 0);
    assert_eq!(app.ledger.balance("u2").await.unwrap(), 0);
    assert!(app.ledger.history("u2", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn submission_debits_the_style_default_model_cost() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();
    app.ledger
        .credit("u1", 1000, CreditKind::Topup, "initial", None)
        .await
        .unwrap();

    let receipt = app
        .submit_full_universe("u1", universe_request())
        .await
        .unwrap();

    assert!(receipt.job_id.starts_with("qcf-"));
    assert_eq!(receipt.status, "queued");
    assert_eq!(receipt.estimated_time_sec, Some(60));
    assert!(receipt.episode_id.is_some());
    assert!(receipt.series_id.is_some());
    assert!(receipt.character_id.is_some());

    // cinematic_realism defaults to runway-gen3 at 200 credits per 5 s.
    assert_eq!(app.ledger.balance("u1").await.unwrap(), 800);
    assert_eq!(
        app.ledger.debit_total_for_job(&receipt.job_id).await.unwrap(),
        200
    );

    let view = app.get_status(&receipt.job_id).await.unwrap();
    assert_eq!(view.status, "queued");
    assert_eq!(view.progress, 0);
}

#[tokio::test]
async fn override_model_changes_the_debit() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();
    app.ledger
        .credit("u6", 1000, CreditKind::Topup, "initial", None)
        .await
        .unwrap();

    let mut request = universe_request();
    request.style_key = "anime".to_string();
    request.video_model = Some("wan/2-6-text-to-video".to_string());
    let receipt = app.submit_full_universe("u6", request).await.unwrap();

    assert_eq!(app.ledger.balance("u6").await.unwrap(), 940);
    assert_eq!(
        app.ledger.debit_total_for_job(&receipt.job_id).await.unwrap(),
        60
    );
}

#[tokio::test]
async fn unknown_model_override_is_rejected_before_any_debit() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();
    app.ledger
        .credit("u7", 1000, CreditKind::Topup, "initial", None)
        .await
        .unwrap();

    let mut request = universe_request();
    request.video_model = Some("definitely-not-a-model".to_string());
    let err = app.submit_full_universe("u7", request).await.unwrap_err();

    assert!(matches!(err, SubmitError::UnknownModel(_)));
    assert_eq!(app.ledger.balance("u7").await.unwrap(), 1000);
    assert_eq!(app.store.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_style_selects_the_fallback_model_and_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();
    app.ledger
        .credit("u8", 1000, CreditKind::Topup, "initial", None)
        .await
        .unwrap();

    let mut request = universe_request();
    request.style_key = "vaporwave_dreams".to_string();
    let receipt = app.submit_full_universe("u8", request).await.unwrap();

    // Fallback model is runway-gen3 in the default settings.
    assert_eq!(
        app.ledger.debit_total_for_job(&receipt.job_id).await.unwrap(),
        200
    );
}

#[tokio::test]
async fn duration_beyond_model_max_is_clamped_before_billing() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();
    app.ledger
        .credit("u9", 1000, CreditKind::Topup, "initial", None)
        .await
        .unwrap();

    // documentary_grit defaults to hailuo (max 6 s); a 10 s request clamps
    // to 6 s = two 5-second blocks at 180.
    let mut request = universe_request();
    request.style_key = "documentary_grit".to_string();
    request.video_duration = Some(10);
    let receipt = app.submit_full_universe("u9", request).await.unwrap();

    assert_eq!(
        app.ledger.debit_total_for_job(&receipt.job_id).await.unwrap(),
        360
    );
}

#[tokio::test]
async fn cancelling_a_queued_job_refunds_once() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();
    app.ledger
        .credit("u4", 500, CreditKind::Topup, "initial", None)
        .await
        .unwrap();

    // Workers are never started: the job stays queued.
    let receipt = app
        .submit_full_universe("u4", universe_request())
        .await
        .unwrap();
    assert_eq!(app.ledger.balance("u4").await.unwrap(), 300);

    assert!(app.cancel(&receipt.job_id).await.unwrap());
    let view = app.get_status(&receipt.job_id).await.unwrap();
    assert_eq!(view.status, "cancelled");

    assert_eq!(app.ledger.balance("u4").await.unwrap(), 500);
    assert_eq!(
        app.ledger.refund_total_for_job(&receipt.job_id).await.unwrap(),
        200
    );

    // Already terminal: not cancellable a second time, no double refund.
    assert!(!app.cancel(&receipt.job_id).await.unwrap());
    assert_eq!(app.ledger.balance("u4").await.unwrap(), 500);
}

#[tokio::test]
async fn quick_create_scaffold_runs_to_done() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();

    let receipt = app
        .submit_quick_create(
            "u5",
            QuickCreateRequest {
                idea_text: "A tiny robot learns to paint".to_string(),
                duration: "45s".to_string(),
                style_key: "anime".to_string(),
                auto_create_universe: true,
                video_model: None,
                video_duration: None,
                video_quality: None,
                aspect_ratio: None,
            },
        )
        .await
        .unwrap();
    assert!(receipt.job_id.starts_with("qc-"));

    app.start_workers().await;
    wait_for_status(&app, &receipt.job_id, "done").await;

    let view = app.get_status(&receipt.job_id).await.unwrap();
    assert_eq!(view.progress, 100);
    assert_eq!(
        view.metadata.get("output_url").and_then(|v| v.as_str()),
        Some(format!("/files/{}/output.mp4", receipt.job_id).as_str())
    );

    // 45 s of footage yields four scene renders.
    let scenes = app.renders.list_for_job(&receipt.job_id).await.unwrap();
    assert_eq!(scenes.len(), 4);

    app.shutdown().await;
}

#[tokio::test]
async fn tts_with_empty_text_still_completes_with_min_duration() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();

    let receipt = app.submit_tts("u5", "").await.unwrap();
    assert!(receipt.job_id.starts_with("tts-"));

    app.start_workers().await;
    wait_for_status(&app, &receipt.job_id, "done").await;

    let view = app.get_status(&receipt.job_id).await.unwrap();
    let duration = view
        .metadata
        .get("estimated_duration_sec")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert!(duration >= 1);
    assert_eq!(
        view.metadata.get("audio_url").and_then(|v| v.as_str()),
        Some(format!("/files/{}/speech.wav", receipt.job_id).as_str())
    );

    app.shutdown().await;
}

#[tokio::test]
async fn restart_recovers_queued_work_without_redebiting() {
    let dir = tempfile::tempdir().unwrap();

    let receipt = {
        let app = StudioApp::build(test_settings(dir.path())).await.unwrap();
        app.ledger
            .credit("u10", 1000, CreditKind::Topup, "initial", None)
            .await
            .unwrap();
        // No workers started: the process "dies" with the job still queued.
        app.submit_full_universe("u10", universe_request())
            .await
            .unwrap()
    };

    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();

    // Before recovery the store answers, with empty metadata.
    let view = app.get_status(&receipt.job_id).await.unwrap();
    assert_eq!(view.status, "queued");
    assert!(view.metadata.is_empty());

    assert_eq!(app.recover().await.unwrap(), 1);
    assert!(app.registry.contains(&receipt.job_id.as_str().into()));

    // Idempotent, and the original debit still stands alone.
    assert_eq!(app.recover().await.unwrap(), 0);
    assert_eq!(app.ledger.balance("u10").await.unwrap(), 800);
    assert_eq!(
        app.ledger.debit_total_for_job(&receipt.job_id).await.unwrap(),
        200
    );
}

#[tokio::test]
async fn delete_removes_job_and_renders() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();

    let receipt = app.submit_tts("u5", "hello there").await.unwrap();
    assert!(app.delete(&receipt.job_id).await.unwrap());

    assert!(matches!(
        app.get_status(&receipt.job_id).await.unwrap_err(),
        SubmitError::JobNotFound(_)
    ));
    assert!(matches!(
        app.delete(&receipt.job_id).await.unwrap_err(),
        SubmitError::JobNotFound(_)
    ));
}

#[tokio::test]
async fn list_recent_uses_public_status_names() {
    let dir = tempfile::tempdir().unwrap();
    let app = StudioApp::build(test_settings(dir.path())).await.unwrap();

    let receipt = app.submit_tts("u5", "short clip").await.unwrap();
    app.start_workers().await;
    wait_for_status(&app, &receipt.job_id, "done").await;
    app.shutdown().await;

    let listed = app.list_recent(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    // The boundary translates internal `completed` to `done`.
    assert_eq!(listed[0].status, "done");
}
