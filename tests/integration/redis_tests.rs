//! Redis/Queue integration tests.

use std::time::Duration;

/// Test Redis connection and basic operations.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    dotenvy::dotenv().ok();

    let queue = advgen_queue::JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    // Test queue length (should not error)
    let len = queue.len().await.expect("Failed to get queue length");
    println!("Queue length: {}", len);
}

/// Test job enqueue and dequeue cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_dequeue() {
    use advgen_models::{AspectRatio, JobId};
    use advgen_queue::GenerateVideoJob;

    dotenvy::dotenv().ok();

    let queue = advgen_queue::JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    // Create a test job
    let job = GenerateVideoJob::new(
        "test_owner_123",
        JobId::new(),
        "A 15 second ad for a cold brew can",
        15,
        AspectRatio::PORTRAIT,
        "narrator_a",
    );
    let job_id = job.job_id.clone();

    // Enqueue
    let message_id = queue.enqueue_generate(job).await.expect("Failed to enqueue");
    println!("Enqueued job {} with message ID {}", job_id, message_id);

    // Consume
    let consumer_name = "test-consumer";
    let jobs = queue
        .consume(consumer_name, 1000, 1)
        .await
        .expect("Failed to consume");

    assert_eq!(jobs.len(), 1);
    let (msg_id, consumed_job) = &jobs[0];
    assert_eq!(consumed_job.job_id(), &job_id);

    // Acknowledge
    queue.ack(msg_id).await.expect("Failed to ack");
    println!("Job {} acknowledged", job_id);
}

/// Test DLQ functionality.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_dlq() {
    use advgen_models::{AspectRatio, JobId};
    use advgen_queue::{GenerateVideoJob, QueueJob};

    dotenvy::dotenv().ok();

    let queue = advgen_queue::JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    // Create and enqueue a job
    let job = GenerateVideoJob::new(
        "test_dlq_owner",
        JobId::new(),
        "A 15 second ad, DLQ test",
        15,
        AspectRatio::PORTRAIT,
        "narrator_a",
    );
    let job_id = job.job_id.clone();

    let message_id = queue
        .enqueue_generate(job.clone())
        .await
        .expect("Failed to enqueue");

    // Consume it
    let consumer_name = "test-dlq-consumer";
    let jobs = queue.consume(consumer_name, 1000, 1).await.expect("Failed to consume");
    assert!(!jobs.is_empty());

    // Move to DLQ
    let queue_job = QueueJob::GenerateVideo(job);
    queue
        .dlq(&message_id, &queue_job, "Test error")
        .await
        .expect("Failed to move to DLQ");

    // Check DLQ length increased
    let dlq_len = queue.dlq_len().await.expect("Failed to get DLQ length");
    assert!(dlq_len > 0);
    println!("DLQ length: {}", dlq_len);
    let _ = job_id;
}

/// Test idempotency key acquire/release.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_idempotency_dedup() {
    dotenvy::dotenv().ok();

    let queue = advgen_queue::JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let key = "generate:test_owner:idempotency-test";

    let first = queue
        .try_acquire_idempotency(key, 60)
        .await
        .expect("Failed to acquire idempotency key");
    assert!(first, "first acquire should succeed");

    let second = queue
        .try_acquire_idempotency(key, 60)
        .await
        .expect("Failed to acquire idempotency key");
    assert!(!second, "second acquire of the same key should be rejected");

    queue.release_idempotency(key).await.expect("Failed to release idempotency key");

    let third = queue
        .try_acquire_idempotency(key, 60)
        .await
        .expect("Failed to acquire idempotency key");
    assert!(third, "acquire after release should succeed again");
}

/// Test the ProgressStream pub/sub channel.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_progress_channel() {
    use advgen_models::{JobId, ProgressEvent};
    use advgen_queue::{ProgressBus, ProgressEnvelope};
    use futures::StreamExt;

    dotenvy::dotenv().ok();

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let bus = ProgressBus::new(&redis_url).expect("Failed to create progress bus");

    let job_id = JobId::new();

    // Subscribe in a separate task
    let bus_clone = bus.clone();
    let job_id_clone = job_id.clone();
    let subscriber = tokio::spawn(async move {
        let mut stream = bus_clone.subscribe(&job_id_clone).await.expect("Failed to subscribe");
        let mut messages = Vec::new();

        // Collect messages with timeout
        let timeout = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(event) = stream.next().await {
                messages.push(event);
                if messages.len() >= 2 {
                    break;
                }
            }
        });

        let _ = timeout.await;
        messages
    });

    // Give subscriber time to connect
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Publish some events
    bus.emit(&job_id, ProgressEvent::update(advgen_models::Stage::Script, 0, 3))
        .await
        .ok();
    bus.emit(&job_id, ProgressEvent::scene_ready(0, "scenes/0/clip.mp4"))
        .await
        .ok();

    // Wait for subscriber
    let messages: Vec<ProgressEnvelope> = subscriber.await.expect("Subscriber task failed");
    println!("Received {} messages", messages.len());
}

/// Test that progress history survives a late subscriber via `get_history_since`.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_progress_history() {
    use advgen_models::{JobId, ProgressEvent, Stage};
    use advgen_queue::ProgressBus;

    dotenvy::dotenv().ok();

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let bus = ProgressBus::new(&redis_url).expect("Failed to create progress bus");
    let job_id = JobId::new();

    let envelope = advgen_queue::ProgressEnvelope::new(
        job_id.clone(),
        ProgressEvent::update(Stage::Composition, 3, 3),
    );
    bus.publish_with_history(&envelope).await.expect("Failed to publish with history");

    let history = bus.get_history_since(&job_id, 0).await.expect("Failed to get history");
    assert!(!history.is_empty());

    bus.clear_history(&job_id).await.ok();
}
