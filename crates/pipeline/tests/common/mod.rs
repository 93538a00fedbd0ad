#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lunara_core::types::DbId;
use lunara_db::models::generation_job::{CreateGenerationJob, GenerationJob, UpdateGenerationJob};
use lunara_db::models::status::GenerationJobStatus;
use lunara_events::EventBus;
use lunara_pipeline::memory::MemoryStore;
use lunara_pipeline::{
    GenerationRunner, JobQueue, JobStore, LocalVideoStorage, RunnerConfig, StoreError,
};
use lunara_provider::extract::parse_operation;
use lunara_provider::{GenerationRequest, OperationStatus, ProviderError, VideoProvider};
use tempfile::TempDir;

pub const OPERATION_NAME: &str = "models/veo-test/operations/op-1";
pub const VIDEO_URI: &str = "https://files.example.test/v1/video.mp4";

// ---------------------------------------------------------------------------
// Scripted provider
// ---------------------------------------------------------------------------

pub enum SubmitScript {
    Accept,
    Reject { status: u16, body: &'static str },
    NoOperation,
}

pub enum PollScript {
    Running,
    Fail(u16),
    Done(serde_json::Value),
}

pub enum FetchScript {
    Bytes(Vec<u8>),
    Status(u16),
}

/// A provider that replays scripted answers and counts calls.
pub struct MockProvider {
    configured: bool,
    submit: SubmitScript,
    polls: Mutex<VecDeque<PollScript>>,
    fetch: FetchScript,
    pub submit_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub last_request: Mutex<Option<GenerationRequest>>,
}

impl MockProvider {
    /// Accepts, finishes on the first poll with a video, serves bytes.
    pub fn happy() -> Self {
        Self::new(
            SubmitScript::Accept,
            vec![PollScript::Done(finished_with_video())],
            FetchScript::Bytes(b"\x00\x00\x00\x18ftypmp42 fake video".to_vec()),
        )
    }

    pub fn new(submit: SubmitScript, polls: Vec<PollScript>, fetch: FetchScript) -> Self {
        Self {
            configured: true,
            submit,
            polls: Mutex::new(polls.into()),
            fetch,
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::happy()
        }
    }

    pub fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

fn api_error(status: u16, body: &str) -> ProviderError {
    ProviderError::Api {
        status,
        body: body.to_string(),
        retry_after_secs: None,
    }
}

#[async_trait]
impl VideoProvider for MockProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.submit {
            SubmitScript::Accept => Ok(OPERATION_NAME.to_string()),
            SubmitScript::Reject { status, body } => Err(api_error(*status, body)),
            SubmitScript::NoOperation => Err(ProviderError::NoOperationId),
        }
    }

    async fn poll(&self, _operation_name: &str) -> Result<OperationStatus, ProviderError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.polls.lock().unwrap().pop_front();
        match next.unwrap_or(PollScript::Running) {
            PollScript::Running => Ok(parse_operation(
                serde_json::json!({ "name": OPERATION_NAME }),
            )),
            PollScript::Fail(status) => Err(api_error(status, "upstream error")),
            PollScript::Done(body) => Ok(parse_operation(body)),
        }
    }

    async fn fetch_asset(&self, locator: &str) -> Result<Vec<u8>, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(locator, VIDEO_URI);
        match &self.fetch {
            FetchScript::Bytes(bytes) => Ok(bytes.clone()),
            FetchScript::Status(status) => Err(api_error(*status, "")),
        }
    }
}

pub fn finished_with_video() -> serde_json::Value {
    serde_json::json!({
        "name": OPERATION_NAME,
        "done": true,
        "response": {
            "generateVideoResponse": {
                "generatedSamples": [{ "video": { "uri": VIDEO_URI } }]
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockProvider>,
    pub events: Arc<EventBus>,
    pub runner: GenerationRunner,
    pub media_dir: TempDir,
}

pub fn test_config(max_poll_attempts: i32) -> RunnerConfig {
    RunnerConfig {
        poll_interval: Duration::ZERO,
        max_poll_attempts,
    }
}

impl Harness {
    pub fn new(provider: MockProvider) -> Self {
        Self::with_config(provider, test_config(5))
    }

    pub fn with_config(provider: MockProvider, config: RunnerConfig) -> Self {
        Self::with_job_store(provider, config, |store| store as Arc<dyn JobStore>)
    }

    /// Build with the runner's job store wrapped, e.g. to inject failures.
    /// Quota and catalog calls still go straight to the memory store.
    pub fn with_job_store(
        provider: MockProvider,
        config: RunnerConfig,
        wrap: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn JobStore>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(provider);
        let events = Arc::new(EventBus::default());
        let media_dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalVideoStorage::new(media_dir.path(), "/media/videos"));

        let runner = GenerationRunner::new(
            wrap(store.clone()),
            store.clone(),
            store.clone(),
            provider.clone(),
            storage,
            events.clone(),
            config,
        );

        Self {
            store,
            provider,
            events,
            runner,
            media_dir,
        }
    }

    pub fn submission(&self, queue: JobQueue) -> lunara_pipeline::SubmissionService {
        lunara_pipeline::SubmissionService::new(
            self.store.clone(),
            self.store.clone(),
            self.provider.clone(),
            queue,
        )
    }

    pub fn job(&self, id: DbId) -> GenerationJob {
        self.store.job(id).expect("job exists")
    }

    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(self.media_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Failing job store
// ---------------------------------------------------------------------------

/// Delegates to a memory store but rejects any update that would mark a
/// job completed.
pub struct RejectCompletion(pub Arc<MemoryStore>);

#[async_trait]
impl JobStore for RejectCompletion {
    async fn create(&self, input: &CreateGenerationJob) -> Result<GenerationJob, StoreError> {
        JobStore::create(self.0.as_ref(), input).await
    }

    async fn get(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError> {
        JobStore::get(self.0.as_ref(), id).await
    }

    async fn get_for_user(
        &self,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<GenerationJob>, StoreError> {
        self.0.get_for_user(id, user_id).await
    }

    async fn list_non_terminal(&self) -> Result<Vec<GenerationJob>, StoreError> {
        self.0.list_non_terminal().await
    }

    async fn list_for_user(
        &self,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        self.0.list_for_user(user_id, limit, offset).await
    }

    async fn update(
        &self,
        id: DbId,
        input: &UpdateGenerationJob,
    ) -> Result<Option<GenerationJob>, StoreError> {
        if input.status_id == Some(GenerationJobStatus::Completed.id()) {
            return Err(StoreError::NotFound {
                entity: "Generation job",
                id,
            });
        }
        self.0.update(id, input).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A persisted job row in an arbitrary lifecycle state.
pub fn staged_job(
    id: DbId,
    user_id: DbId,
    status: GenerationJobStatus,
    operation_name: Option<&str>,
    poll_attempts: i32,
) -> GenerationJob {
    let now = Utc::now();
    GenerationJob {
        id,
        user_id,
        prompt: "aurora over a frozen lake".to_string(),
        enhanced_prompt: None,
        length_secs: 5,
        duration_secs: 6,
        aspect_ratio: "16:9".to_string(),
        style: None,
        status_id: status.id(),
        progress: match status {
            GenerationJobStatus::Pending => 0,
            GenerationJobStatus::Processing => 10,
            _ => 30,
        },
        operation_name: operation_name.map(str::to_string),
        poll_attempts,
        video_url: None,
        error_code: None,
        error_message: None,
        raw_api_response: None,
        credits_charged: 10,
        created_at: now,
        started_at: None,
        completed_at: None,
        updated_at: now,
    }
}

/// Terminal-state invariants every finished job must satisfy.
pub fn assert_terminal_invariants(job: &GenerationJob) {
    match job.status() {
        GenerationJobStatus::Completed => {
            assert!(job.video_url.is_some(), "completed job without video_url");
            assert!(job.error_code.is_none(), "completed job with error_code");
            assert_eq!(job.progress, 100);
            assert!(job.completed_at.is_some());
        }
        GenerationJobStatus::Failed => {
            assert!(job.error_code.is_some(), "failed job without error_code");
            assert!(job.error_message.is_some(), "failed job without error_message");
            assert!(job.video_url.is_none(), "failed job with video_url");
            assert!(job.completed_at.is_some());
        }
        other => panic!("job {} is not terminal: {}", job.id, other.as_str()),
    }
}
