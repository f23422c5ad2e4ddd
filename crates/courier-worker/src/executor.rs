// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job execution against storage and the provider.
//!
//! Broker acknowledgement is not transactional with the job-row updates, so
//! a crash between persistence and ack causes redelivery. The executor
//! tolerates that: a job already `succeeded` is skipped outright, and the
//! `queued -> running` transition is conditional so a redelivered job never
//! looks fresh. A `failed` job with retries left is re-executed and may
//! still converge to `succeeded`.

use std::sync::Arc;

use tracing::{info, warn};

use courier_chat::ChatService;
use courier_core::{CourierError, JobStatus};
use courier_storage::queries::jobs;
use courier_storage::Database;

/// Executes one job end to end: status transitions, inference, persistence.
#[derive(Clone)]
pub struct JobExecutor {
    db: Database,
    service: Arc<ChatService>,
}

impl JobExecutor {
    pub fn new(db: Database, service: Arc<ChatService>) -> Self {
        Self { db, service }
    }

    /// Run the job. `Ok` means the delivery may be acknowledged; `Err` routes
    /// it to the retry/dead-letter machinery.
    pub async fn execute_job(&self, job_id: &str) -> Result<(), CourierError> {
        // A storage failure here fails the attempt rather than proceeding on
        // stale state; the retry path picks it up.
        jobs::mark_job_running(&self.db, job_id).await?;

        let job = jobs::get_job(&self.db, job_id)
            .await?
            .ok_or(CourierError::NotFound { entity: "job" })?;

        if job.status == JobStatus::Succeeded {
            info!(job_id, "job already succeeded, skipping redelivery");
            return Ok(());
        }

        match self
            .service
            .generate_assistant_reply(job.user_id, &job.session_id)
            .await
        {
            Ok((_reply, message_id)) => {
                jobs::mark_job_succeeded(&self.db, job_id, message_id).await?;
                info!(job_id, message_id, "job succeeded");
                Ok(())
            }
            Err(e) => {
                if let Err(mark_err) =
                    jobs::mark_job_failed(&self.db, job_id, &e.to_string()).await
                {
                    warn!(job_id, error = %mark_err, "failed to record job failure");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{new_id, JobQueue};
    use courier_providers::ProviderRegistry;
    use courier_storage::database::now_timestamp;
    use courier_storage::Job;
    use courier_test_utils::{MockJobQueue, MockProvider};
    use tempfile::tempdir;

    struct Fixture {
        executor: JobExecutor,
        service: Arc<ChatService>,
        provider: MockProvider,
        db: Database,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let provider = MockProvider::new();
        let registry = ProviderRegistry::new();
        let handle = provider.clone();
        registry.register("mock", move |_model| {
            Ok(Arc::new(handle.clone()) as Arc<dyn courier_core::Provider>)
        });

        let queue: Arc<dyn JobQueue> = Arc::new(MockJobQueue::new());
        let service = Arc::new(ChatService::new(db.clone(), Arc::new(registry), queue, 20));
        Fixture {
            executor: JobExecutor::new(db.clone(), service.clone()),
            service,
            provider,
            db,
            _dir: dir,
        }
    }

    /// Seed a session, a queued job, and the job's user message, the way
    /// submission leaves them.
    async fn seed_job(f: &Fixture, user_id: i64) -> Job {
        let session = f
            .service
            .create_session(user_id, "mock", "m")
            .await
            .unwrap();
        let now = now_timestamp();
        let job = Job {
            id: new_id(),
            user_id,
            session_id: session.session_id.clone(),
            prompt: "prompt".to_string(),
            idempotency_key: None,
            status: JobStatus::Queued,
            result_message_id: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        };
        jobs::create_job(&f.db, &job).await.unwrap();
        courier_storage::queries::messages::insert_message(
            &f.db,
            user_id,
            &session.session_id,
            courier_core::Role::User,
            "prompt",
        )
        .await
        .unwrap();
        job
    }

    #[tokio::test]
    async fn success_marks_job_and_links_assistant_message() {
        let f = fixture().await;
        f.provider.queue_reply("the answer");
        let job = seed_job(&f, 1).await;

        f.executor.execute_job(&job.id).await.unwrap();

        let stored = jobs::get_job(&f.db, &job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Succeeded);
        assert!(stored.error.is_none());

        let message_id = stored.result_message_id.unwrap();
        let listed = f
            .service
            .list_messages(1, &job.session_id, 10, 0)
            .await
            .unwrap();
        let assistant = listed.iter().find(|m| m.id == message_id).unwrap();
        assert_eq!(assistant.role, "assistant");
        assert_eq!(assistant.content, "the answer");
        assert_eq!(assistant.session_id, job.session_id);
        assert_eq!(assistant.user_id, 1);
    }

    #[tokio::test]
    async fn provider_failure_marks_job_failed_and_propagates() {
        let f = fixture().await;
        f.provider.queue_chat_error("model melted");
        let job = seed_job(&f, 1).await;

        let err = f.executor.execute_job(&job.id).await.unwrap_err();
        assert!(err.to_string().contains("model melted"));

        let stored = jobs::get_job(&f.db, &job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error.unwrap().contains("model melted"));
        assert!(stored.result_message_id.is_none());
    }

    #[tokio::test]
    async fn succeeded_job_short_circuits_on_redelivery() {
        let f = fixture().await;
        f.provider.queue_reply("first");
        let job = seed_job(&f, 1).await;

        f.executor.execute_job(&job.id).await.unwrap();
        let calls_after_first = f.provider.call_count();

        // Redelivery of the same envelope: no second inference, no new row.
        f.executor.execute_job(&job.id).await.unwrap();
        assert_eq!(f.provider.call_count(), calls_after_first);

        let listed = f
            .service
            .list_messages(1, &job.session_id, 10, 0)
            .await
            .unwrap();
        let assistants = listed.iter().filter(|m| m.role == "assistant").count();
        assert_eq!(assistants, 1);
    }

    #[tokio::test]
    async fn failed_job_is_re_executed_and_may_succeed() {
        let f = fixture().await;
        f.provider.queue_chat_error("transient");
        let job = seed_job(&f, 1).await;

        assert!(f.executor.execute_job(&job.id).await.is_err());

        // The retry attempt runs the provider again and flips the job.
        f.provider.queue_reply("recovered");
        f.executor.execute_job(&job.id).await.unwrap();

        let stored = jobs::get_job(&f.db, &job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Succeeded);
        assert!(stored.error.is_none());
    }

    #[tokio::test]
    async fn unknown_job_is_an_error() {
        let f = fixture().await;
        let err = f
            .executor
            .execute_job("01NOSUCHJOB000000000000000")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
