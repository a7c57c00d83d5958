//! Firestore integration tests.

use vtx_models::{Job, JobId, JobStatus, LogLevel};
use vtx_store::{JobLogRepository, JobRepository, StoreClient, JOBS_COLLECTION};

/// Test Firestore connection.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_store_connection() {
    dotenvy::dotenv().ok();

    let client = StoreClient::from_env()
        .await
        .expect("Failed to create store client");

    // A miss still proves the backend is reachable.
    let doc = client
        .get_document(JOBS_COLLECTION, "_health")
        .await
        .expect("Failed to read health check document");
    match doc {
        Some(_) => println!("Health check document exists"),
        None => println!("Health check document not found (expected)"),
    }
}

/// Test job repository CRUD and transition guards.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_job_repository() {
    dotenvy::dotenv().ok();

    let client = StoreClient::from_env()
        .await
        .expect("Failed to create store client");
    let repo = JobRepository::new(client);

    let job = Job::new(
        "test_user_integration",
        "integration.mp4",
        vec!["360p".to_string(), "720p".to_string()],
    );
    let job_id = job.id.clone();

    // Create
    repo.create(&job).await.expect("Failed to create job");
    println!("Created job: {}", job_id);

    // Read
    let fetched = repo
        .get(&job_id)
        .await
        .expect("Failed to get job")
        .expect("Job should exist");
    assert_eq!(fetched.user_id, "test_user_integration");
    assert_eq!(fetched.status, JobStatus::Queued);
    assert_eq!(fetched.input_key, job.input_key);

    // Queued -> Processing is allowed.
    let applied = repo
        .set_status(&job_id, JobStatus::Processing)
        .await
        .expect("Failed to update status");
    assert!(applied);

    // Processing -> Queued is not; the write is skipped, not an error.
    let applied = repo
        .set_status(&job_id, JobStatus::Queued)
        .await
        .expect("Failed to attempt backward transition");
    assert!(!applied);

    // Complete with outputs.
    let output_keys = vec![format!("videos/{}/360p.mp4", job_id)];
    let applied = repo
        .complete(&job_id, &output_keys, "12.34 seconds")
        .await
        .expect("Failed to complete job");
    assert!(applied);

    let completed = repo
        .get(&job_id)
        .await
        .expect("Failed to get job")
        .expect("Job should exist");
    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(completed.output_keys, output_keys);
    assert_eq!(completed.completion_duration.as_deref(), Some("12.34 seconds"));

    // A late cancel on a terminal job is absorbed.
    let applied = repo.cancel(&job_id).await.expect("Failed to attempt cancel");
    assert!(!applied);

    // Delete
    repo.delete(&job_id).await.expect("Failed to delete job");
    println!("Deleted job: {}", job_id);

    let deleted = repo.get(&job_id).await.expect("Failed to get job");
    assert!(deleted.is_none());
}

/// Test duplicate terminal writes are no-ops.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_redelivered_terminal_write_is_noop() {
    dotenvy::dotenv().ok();

    let client = StoreClient::from_env()
        .await
        .expect("Failed to create store client");
    let repo = JobRepository::new(client);

    let job = Job::new("test_user_integration", "redelivery.mp4", vec!["480p".to_string()]);
    let job_id = job.id.clone();

    repo.create(&job).await.expect("Failed to create job");
    repo.set_status(&job_id, JobStatus::Processing)
        .await
        .expect("Failed to update status");

    let first = repo
        .fail(&job_id, "ffmpeg exited with code 1")
        .await
        .expect("Failed to fail job");
    assert!(first);

    let second = repo
        .fail(&job_id, "ffmpeg exited with code 1")
        .await
        .expect("Failed to attempt duplicate fail");
    assert!(!second);

    repo.delete(&job_id).await.expect("Failed to delete job");
}

/// Test log subcollection append and ordered listing.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_job_log_repository() {
    dotenvy::dotenv().ok();

    let client = StoreClient::from_env()
        .await
        .expect("Failed to create store client");
    let jobs = JobRepository::new(client.clone());
    let logs = JobLogRepository::new(client);

    let job = Job::new("test_user_integration", "logged.mp4", vec!["720p".to_string()]);
    let job_id = job.id.clone();
    jobs.create(&job).await.expect("Failed to create job");

    logs.append(&job_id, LogLevel::Info, "Transcoding started")
        .await
        .expect("Failed to append log");
    logs.append(&job_id, LogLevel::Error, "Variant 1080p failed")
        .await
        .expect("Failed to append log");

    let entries = logs.list(&job_id).await.expect("Failed to list logs");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "Transcoding started");
    assert_eq!(entries[1].level, LogLevel::Error);

    // Deleting the job removes the subcollection too.
    jobs.delete(&job_id).await.expect("Failed to delete job");
    let entries = logs.list(&job_id).await.expect("Failed to list logs");
    assert!(entries.is_empty());
}

/// Sanity check: an unknown job id reads as None, not an error.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_missing_job_reads_as_none() {
    dotenvy::dotenv().ok();

    let client = StoreClient::from_env()
        .await
        .expect("Failed to create store client");
    let repo = JobRepository::new(client);

    let missing = repo
        .get(&JobId::new())
        .await
        .expect("Failed to query missing job");
    assert!(missing.is_none());
}
