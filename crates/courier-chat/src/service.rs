// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The chat service.
//!
//! Every operation resolves the session by external ID scoped to the calling
//! user first; an ownership mismatch is indistinguishable from absence. User
//! messages are persisted before the provider is invoked so a provider
//! failure never orphans the prompt.

use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use courier_core::{new_id, ChatMessage, CourierError, JobQueue, JobStatus, Role};
use courier_providers::ProviderRegistry;
use courier_storage::database::now_timestamp;
use courier_storage::queries::{jobs, messages, sessions};
use courier_storage::{Database, Job, Message, Session};

use crate::stream::{run_stream, StreamEvent};

const DEFAULT_PROVIDER: &str = "ollama";
const DEFAULT_CONTEXT_WINDOW: usize = 20;
const MAX_CONTEXT_WINDOW: usize = 100;
const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 100;
const MAX_TITLE_CHARS: usize = 128;

/// Coordinates storage, the provider registry, and the job queue.
pub struct ChatService {
    db: Database,
    registry: Arc<ProviderRegistry>,
    queue: Arc<dyn JobQueue>,
    context_window: usize,
}

impl ChatService {
    pub fn new(
        db: Database,
        registry: Arc<ProviderRegistry>,
        queue: Arc<dyn JobQueue>,
        context_window: usize,
    ) -> Self {
        let context_window = if context_window == 0 || context_window > MAX_CONTEXT_WINDOW {
            DEFAULT_CONTEXT_WINDOW
        } else {
            context_window
        };
        Self {
            db,
            registry,
            queue,
            context_window,
        }
    }

    /// Create a session bound to a provider and model. A blank provider
    /// falls back to the service default; a blank model is stored as-is and
    /// resolves to the provider factory's default at call time.
    pub async fn create_session(
        &self,
        user_id: i64,
        provider: &str,
        model: &str,
    ) -> Result<Session, CourierError> {
        let provider = match provider.trim() {
            "" => DEFAULT_PROVIDER,
            p => p,
        };
        let model = model.trim();

        let now = now_timestamp();
        let session = Session {
            id: 0,
            session_id: new_id(),
            user_id,
            provider: provider.to_string(),
            model: model.to_string(),
            title: None,
            created_at: now.clone(),
            updated_at: now,
        };
        sessions::create_session(&self.db, &session).await?;

        info!(
            session_id = session.session_id.as_str(),
            user_id, provider, model, "session created"
        );

        // Re-read so the returned row carries its numeric primary key.
        sessions::get_session(&self.db, user_id, &session.session_id).await
    }

    /// Synchronous inference: persist the user message, call the provider,
    /// persist the assistant reply. Returns the reply and its message ID.
    pub async fn send_message(
        &self,
        user_id: i64,
        session_id: &str,
        content: &str,
    ) -> Result<(String, i64), CourierError> {
        let session = sessions::get_session(&self.db, user_id, session_id).await?;

        messages::insert_message(&self.db, user_id, session_id, Role::User, content).await?;
        sessions::touch_session(&self.db, session_id).await?;

        let context = self.build_context(user_id, session_id).await?;
        let provider = self.registry.get(&session.provider, &session.model)?;
        let reply = provider.chat(&context).await?;

        let message_id =
            messages::insert_message(&self.db, user_id, session_id, Role::Assistant, &reply)
                .await?;

        debug!(
            session_id,
            message_id,
            provider = session.provider.as_str(),
            "assistant reply persisted"
        );
        Ok((reply, message_id))
    }

    /// Streaming inference. Returns a single-shot event channel: zero or
    /// more [`StreamEvent::Chunk`]s, then exactly one of
    /// [`StreamEvent::Done`] or [`StreamEvent::Error`].
    ///
    /// Dropping the receiver cancels the producer; nothing is persisted for
    /// a stream abandoned before completion.
    pub fn send_message_stream(
        &self,
        user_id: i64,
        session_id: &str,
        content: &str,
        idempotency_key: Option<&str>,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(run_stream(
            self.db.clone(),
            self.registry.clone(),
            self.context_window,
            user_id,
            session_id.to_string(),
            content.to_string(),
            idempotency_key.map(String::from),
            tx,
        ));
        rx
    }

    /// Asynchronous inference: create (or dedupe) the job row and hand it to
    /// the broker. Returns the job ID and whether this call created it.
    ///
    /// Only the creating call persists the user message and publishes; a
    /// duplicate submission returns the prior job's ID without publishing.
    pub async fn submit_job(
        &self,
        user_id: i64,
        session_id: &str,
        prompt: &str,
        idempotency_key: Option<&str>,
    ) -> Result<(String, bool), CourierError> {
        sessions::get_session(&self.db, user_id, session_id).await?;

        let key = idempotency_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from);

        let now = now_timestamp();
        let job = Job {
            id: new_id(),
            user_id,
            session_id: session_id.to_string(),
            prompt: prompt.to_string(),
            idempotency_key: key.clone(),
            status: JobStatus::Queued,
            result_message_id: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        };

        let (job, created) = if key.is_none() {
            jobs::create_job(&self.db, &job).await?;
            (job, true)
        } else {
            jobs::create_job_or_get(&self.db, &job).await?
        };

        if created {
            messages::insert_user_message_or_get(
                &self.db,
                user_id,
                session_id,
                prompt,
                key.as_deref(),
            )
            .await?;
            sessions::touch_session(&self.db, session_id).await?;
            self.queue.publish_job(&job.id).await?;
            info!(job_id = job.id.as_str(), session_id, "job enqueued");
        } else {
            debug!(
                job_id = job.id.as_str(),
                session_id, "duplicate submission coalesced"
            );
        }

        Ok((job.id, created))
    }

    /// Worker-side execution: assemble context from the already-persisted
    /// conversation, call the provider, and persist the assistant reply.
    pub async fn generate_assistant_reply(
        &self,
        user_id: i64,
        session_id: &str,
    ) -> Result<(String, i64), CourierError> {
        let session = sessions::get_session(&self.db, user_id, session_id).await?;

        let context = self.build_context(user_id, session_id).await?;
        let provider = self.registry.get(&session.provider, &session.model)?;
        let reply = provider.chat(&context).await?;

        let message_id =
            messages::insert_message(&self.db, user_id, session_id, Role::Assistant, &reply)
                .await?;
        sessions::touch_session(&self.db, session_id).await?;
        Ok((reply, message_id))
    }

    /// Fetch a job, reported as not-found unless `user_id` owns it.
    pub async fn get_job(&self, user_id: i64, job_id: &str) -> Result<Job, CourierError> {
        let job = jobs::get_job(&self.db, job_id)
            .await?
            .ok_or(CourierError::NotFound { entity: "job" })?;
        if job.user_id != user_id {
            return Err(CourierError::NotFound { entity: "job" });
        }
        Ok(job)
    }

    pub async fn list_sessions(
        &self,
        user_id: i64,
        limit: i64,
        before_id: i64,
    ) -> Result<Vec<Session>, CourierError> {
        let limit = clamp_limit(limit);
        sessions::list_sessions(&self.db, user_id, limit, before_id).await
    }

    pub async fn list_messages(
        &self,
        user_id: i64,
        session_id: &str,
        limit: i64,
        before_id: i64,
    ) -> Result<Vec<Message>, CourierError> {
        sessions::get_session(&self.db, user_id, session_id).await?;
        let limit = clamp_limit(limit);
        messages::list_messages(&self.db, user_id, session_id, limit, before_id).await
    }

    /// Rename a session. Titles are trimmed, required, and at most 128
    /// characters.
    pub async fn update_session_title(
        &self,
        user_id: i64,
        session_id: &str,
        title: &str,
    ) -> Result<String, CourierError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CourierError::Validation("title required".into()));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(CourierError::Validation("title too long".into()));
        }
        sessions::update_session_title(&self.db, user_id, session_id, title).await?;
        Ok(title.to_string())
    }

    pub async fn delete_session(
        &self,
        user_id: i64,
        session_id: &str,
    ) -> Result<(), CourierError> {
        sessions::delete_session(&self.db, user_id, session_id).await?;
        info!(session_id, user_id, "session deleted");
        Ok(())
    }

    async fn build_context(
        &self,
        user_id: i64,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, CourierError> {
        build_context(&self.db, self.context_window, user_id, session_id).await
    }
}

/// Read the last `window` messages and reverse them into ascending order so
/// the newest user message sits at the tail.
pub(crate) async fn build_context(
    db: &Database,
    window: usize,
    user_id: i64,
    session_id: &str,
) -> Result<Vec<ChatMessage>, CourierError> {
    let recent =
        messages::list_recent_messages(db, user_id, session_id, window as i64).await?;
    Ok(recent
        .into_iter()
        .rev()
        .map(|m| ChatMessage {
            role: Role::from_str(&m.role).unwrap_or(Role::User),
            content: m.content,
        })
        .collect())
}

fn clamp_limit(limit: i64) -> i64 {
    if limit <= 0 || limit > MAX_LIST_LIMIT {
        DEFAULT_LIST_LIMIT
    } else {
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_test_utils::{MockJobQueue, MockProvider};
    use tempfile::tempdir;

    struct Fixture {
        service: ChatService,
        provider: MockProvider,
        queue: Arc<MockJobQueue>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(window: usize) -> Fixture {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let provider = MockProvider::new();
        let registry = ProviderRegistry::new();
        let handle = provider.clone();
        registry.register("mock", move |_model| {
            Ok(Arc::new(handle.clone()) as Arc<dyn courier_core::Provider>)
        });

        let queue = Arc::new(MockJobQueue::new());
        let service = ChatService::new(db, Arc::new(registry), queue.clone(), window);
        Fixture {
            service,
            provider,
            queue,
            _dir: dir,
        }
    }

    async fn session_for(f: &Fixture, user_id: i64) -> String {
        f.service
            .create_session(user_id, "mock", "test-model")
            .await
            .unwrap()
            .session_id
    }

    #[tokio::test]
    async fn send_message_persists_user_then_assistant() {
        let f = fixture(20).await;
        f.provider.queue_reply("ok");
        let sid = session_for(&f, 1).await;

        let (reply, message_id) = f.service.send_message(1, &sid, "Hello").await.unwrap();
        assert_eq!(reply, "ok");
        assert!(message_id > 0);

        let listed = f.service.list_messages(1, &sid, 10, 0).await.unwrap();
        assert_eq!(listed.len(), 2);
        // Listing is newest-first.
        assert_eq!(listed[0].role, "assistant");
        assert_eq!(listed[0].content, "ok");
        assert_eq!(listed[1].role, "user");
        assert_eq!(listed[1].content, "Hello");
    }

    #[tokio::test]
    async fn context_window_clamps_provider_input() {
        let f = fixture(3).await;
        let sid = session_for(&f, 2).await;

        for i in 0..5 {
            f.provider.queue_reply("seed");
            f.service
                .send_message(2, &sid, &format!("seed {i}"))
                .await
                .unwrap();
        }

        f.provider.queue_reply("done");
        f.service.send_message(2, &sid, "new").await.unwrap();

        let received = f.provider.last_messages().unwrap();
        assert_eq!(received.len(), 3);
        let tail = received.last().unwrap();
        assert_eq!(tail.role, Role::User);
        assert_eq!(tail.content, "new");
    }

    #[tokio::test]
    async fn foreign_sessions_are_not_found() {
        let f = fixture(20).await;
        let sid = session_for(&f, 1).await;

        let err = f.service.send_message(2, &sid, "hi").await.unwrap_err();
        assert!(err.is_not_found());
        let err = f.service.list_messages(2, &sid, 10, 0).await.unwrap_err();
        assert!(err.is_not_found());

        // The provider was never consulted.
        assert_eq!(f.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_keeps_the_user_message() {
        let f = fixture(20).await;
        f.provider.queue_chat_error("backend down");
        let sid = session_for(&f, 1).await;

        let err = f.service.send_message(1, &sid, "Hello").await.unwrap_err();
        assert!(err.to_string().contains("backend down"));

        let listed = f.service.list_messages(1, &sid, 10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].role, "user");
    }

    #[tokio::test]
    async fn submit_job_is_idempotent_over_user_and_key() {
        let f = fixture(20).await;
        let sid = session_for(&f, 1).await;

        let (job_a, created_a) = f
            .service
            .submit_job(1, &sid, "prompt", Some("key-1"))
            .await
            .unwrap();
        let (job_b, created_b) = f
            .service
            .submit_job(1, &sid, "prompt", Some("key-1"))
            .await
            .unwrap();

        assert!(created_a);
        assert!(!created_b);
        assert_eq!(job_a, job_b);
        // Exactly one broker publish for N submissions.
        assert_eq!(f.queue.published(), vec![job_a.clone()]);
        // Exactly one user message row.
        let listed = f.service.list_messages(1, &sid, 10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);

        let job = f.service.get_job(1, &job_a).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.prompt, "prompt");
    }

    #[tokio::test]
    async fn submit_without_key_always_creates() {
        let f = fixture(20).await;
        let sid = session_for(&f, 1).await;

        let (a, _) = f.service.submit_job(1, &sid, "p", None).await.unwrap();
        let (b, _) = f.service.submit_job(1, &sid, "p", None).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(f.queue.published().len(), 2);
    }

    #[tokio::test]
    async fn publish_failure_propagates() {
        let f = fixture(20).await;
        let sid = session_for(&f, 1).await;
        f.queue.set_failing(true);

        let err = f.service.submit_job(1, &sid, "p", None).await.unwrap_err();
        assert!(matches!(err, CourierError::Broker { .. }));
    }

    #[tokio::test]
    async fn get_job_hides_other_users_jobs() {
        let f = fixture(20).await;
        let sid = session_for(&f, 1).await;
        let (job_id, _) = f.service.submit_job(1, &sid, "p", None).await.unwrap();

        let err = f.service.get_job(2, &job_id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn title_updates_are_validated_and_visible() {
        let f = fixture(20).await;
        let sid = session_for(&f, 1).await;

        f.service
            .update_session_title(1, &sid, "  my chat  ")
            .await
            .unwrap();
        let listed = f.service.list_sessions(1, 10, 0).await.unwrap();
        assert_eq!(listed[0].title.as_deref(), Some("my chat"));

        let too_long = "t".repeat(129);
        let err = f
            .service
            .update_session_title(1, &sid, &too_long)
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));

        let err = f.service.update_session_title(1, &sid, "  ").await.unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));
    }

    #[tokio::test]
    async fn list_limit_is_clamped() {
        let f = fixture(20).await;
        let sid = session_for(&f, 1).await;
        for i in 0..60 {
            f.provider.queue_reply("r");
            f.service.send_message(1, &sid, &format!("m{i}")).await.unwrap();
        }

        // 0 and out-of-range limits fall back to 50.
        let listed = f.service.list_messages(1, &sid, 0, 0).await.unwrap();
        assert_eq!(listed.len(), 50);
        let listed = f.service.list_messages(1, &sid, 1000, 0).await.unwrap();
        assert_eq!(listed.len(), 50);
    }
}
