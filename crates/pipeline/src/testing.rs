//! In-memory fakes of the job store and every collaborator.
//!
//! Compiled for this crate's tests and, through the `testing` feature, for
//! downstream crates that drive the engine without Postgres or network
//! access.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use litessay_core::collaborators::{
    CompletionRequest, EmbeddingModel, LanguageModel, SourceMetadata, TextSource, VectorIndex,
    VectorMatch, VectorRecord,
};
use litessay_core::config::PipelineConfig;
use litessay_core::document::{derive_namespace, JOB_TYPE_ESSAY_PIPELINE, SOURCE_TYPE_GUTENBERG};
use litessay_core::error::CollaboratorError;
use litessay_core::hashing::content_hash;
use litessay_core::scheduling::state_machine;
use litessay_core::text::normalize_source_text;
use litessay_core::types::{DbId, JobLease};
use litessay_db::models::artifact::{ArtifactPayload, JobArtifact, NewArtifact};
use litessay_db::models::document::{CreateDocument, Document};
use litessay_db::models::job::Job;
use litessay_db::models::status::{IngestStatus, JobStatus};
use litessay_db::repositories::RequeuePolicy;
use litessay_events::{
    JobProgressView, ProgressError, ProgressPublisher, ProgressReader, ProgressSnapshot,
    ProgressWriter,
};
use uuid::Uuid;

use crate::context::StageContext;
use crate::engine::{Collaborators, PipelineEngine};
use crate::error::PipelineError;
use crate::prompts;
use crate::store::JobStore;

/// A review response approving the essay.
pub const APPROVE: &str = r#"{"approved": true, "feedback": "Well argued."}"#;

/// A review response rejecting the essay.
pub const REJECT: &str = r#"{"approved": false, "feedback": "Cite more evidence for each theme."}"#;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Panics on a transition the Postgres queue could never make.
fn set_status(job: &mut Job, to: JobStatus) {
    if let Err(e) = state_machine::validate_transition(job.status_id, to.id()) {
        panic!("job {}: {e}", job.id);
    }
    job.status_id = to.id();
}

// ---------------------------------------------------------------------------
// MemoryJobStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    next_id: DbId,
    documents: Vec<Document>,
    jobs: Vec<Job>,
    artifacts: HashMap<DbId, Vec<NewArtifact>>,
    progress: HashMap<DbId, Vec<ProgressSnapshot>>,
    heartbeats: HashMap<DbId, usize>,
}

impl MemoryState {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn job_mut(&mut self, job_id: DbId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == job_id)
    }

    fn document_mut(&mut self, document_id: DbId) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id == document_id)
    }

    /// The running job held by `lease`, if the lease is still valid.
    fn leased_job(&mut self, lease: JobLease) -> Option<&mut Job> {
        self.job_mut(lease.job_id).filter(|job| {
            job.status_id == JobStatus::Running.id() && job.lease_token == Some(lease.token)
        })
    }

    fn new_job(&mut self, document_id: DbId, retry_of_job_id: Option<DbId>) -> Job {
        let job = Job {
            id: self.next_id(),
            document_id,
            job_type: JOB_TYPE_ESSAY_PIPELINE.to_string(),
            status_id: JobStatus::Queued.id(),
            progress: None,
            next_attempt_at: None,
            lease_token: None,
            heartbeat_at: None,
            retry_of_job_id,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        self.jobs.push(job.clone());
        job
    }
}

/// Job store, progress writer and progress reader backed by a mutex.
///
/// Applies the same lease rules as the Postgres store: writes from a lease
/// that no longer owns its running job are rejected.
#[derive(Default)]
pub struct MemoryJobStore {
    state: Mutex<MemoryState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document for `text` without going through a text source.
    pub fn add_document(&self, source_ref: &str, text: &str) -> Document {
        let hash = content_hash(&normalize_source_text(text));
        let mut state = lock(&self.state);
        if let Some(existing) = state.documents.iter().find(|d| d.canonical_hash == hash) {
            return existing.clone();
        }
        let document = Document {
            id: state.next_id(),
            source_type: SOURCE_TYPE_GUTENBERG.to_string(),
            source_ref: source_ref.to_string(),
            vector_namespace: derive_namespace(source_ref, &hash),
            canonical_hash: hash,
            title: None,
            author: None,
            summary: None,
            summary_chunk_count: 0,
            ingest_status_id: IngestStatus::Pending.id(),
            created_at: Utc::now(),
        };
        state.documents.push(document.clone());
        document
    }

    pub fn job(&self, job_id: DbId) -> Option<Job> {
        lock(&self.state).jobs.iter().find(|j| j.id == job_id).cloned()
    }

    pub fn job_status(&self, job_id: DbId) -> Option<JobStatus> {
        self.job(job_id).and_then(|j| j.status())
    }

    pub fn document(&self, document_id: DbId) -> Option<Document> {
        lock(&self.state)
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
    }

    pub fn document_ingest_status(&self, document_id: DbId) -> Option<IngestStatus> {
        self.document(document_id).and_then(|d| d.ingest_status())
    }

    pub fn document_count(&self) -> usize {
        lock(&self.state).documents.len()
    }

    pub fn artifacts(&self, job_id: DbId) -> Vec<NewArtifact> {
        lock(&self.state)
            .artifacts
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every snapshot written for the job, oldest first.
    pub fn progress_history(&self, job_id: DbId) -> Vec<ProgressSnapshot> {
        lock(&self.state)
            .progress
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Successful heartbeats recorded for the job.
    pub fn heartbeat_count(&self, job_id: DbId) -> usize {
        lock(&self.state)
            .heartbeats
            .get(&job_id)
            .copied()
            .unwrap_or_default()
    }

    /// Push the job's last heartbeat `secs` into the past.
    pub fn age_heartbeat(&self, job_id: DbId, secs: i64) {
        if let Some(job) = lock(&self.state).job_mut(job_id) {
            job.heartbeat_at = job.heartbeat_at.map(|at| at - chrono::Duration::seconds(secs));
        }
    }

    /// Requeue a running job out from under its owner.
    pub fn revoke_lease(&self, job_id: DbId) {
        let mut state = lock(&self.state);
        if let Some(job) = state
            .job_mut(job_id)
            .filter(|j| j.status_id == JobStatus::Running.id())
        {
            set_status(job, JobStatus::Queued);
            job.lease_token = None;
            job.heartbeat_at = None;
            job.progress = Some(ProgressSnapshot::requeued("operator").to_value());
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, document_id: DbId) -> Result<Job, PipelineError> {
        Ok(lock(&self.state).new_job(document_id, None))
    }

    async fn claim_next(&self) -> Result<Option<Job>, PipelineError> {
        let now = Utc::now();
        let mut state = lock(&self.state);
        let claimed = state
            .jobs
            .iter_mut()
            .filter(|j| j.status_id == JobStatus::Queued.id())
            .filter(|j| j.next_attempt_at.map_or(true, |at| at <= now))
            .min_by_key(|j| (j.created_at, j.id))
            .map(|job| {
                set_status(job, JobStatus::Running);
                job.lease_token = Some(Uuid::new_v4());
                job.started_at = Some(now);
                job.heartbeat_at = Some(now);
                job.next_attempt_at = None;
                job.clone()
            });
        Ok(claimed)
    }

    async fn heartbeat(&self, lease: JobLease) -> Result<bool, PipelineError> {
        let mut state = lock(&self.state);
        let Some(job) = state.leased_job(lease) else {
            return Ok(false);
        };
        job.heartbeat_at = Some(Utc::now());
        *state.heartbeats.entry(lease.job_id).or_default() += 1;
        Ok(true)
    }

    async fn mark_failed(&self, lease: JobLease, message: &str) -> Result<bool, PipelineError> {
        let mut state = lock(&self.state);
        let snapshot = ProgressSnapshot::error(message);
        let Some(job) = state.leased_job(lease) else {
            return Ok(false);
        };
        set_status(job, JobStatus::Failed);
        job.progress = Some(snapshot.to_value());
        job.finished_at = Some(Utc::now());
        state.progress.entry(lease.job_id).or_default().push(snapshot);
        Ok(true)
    }

    async fn persist_results(
        &self,
        lease: JobLease,
        artifacts: &[NewArtifact],
    ) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        let Some(job) = state.leased_job(lease) else {
            return Err(PipelineError::LeaseLost {
                job_id: lease.job_id,
            });
        };
        set_status(job, JobStatus::Succeeded);
        job.finished_at = Some(Utc::now());
        state
            .artifacts
            .entry(lease.job_id)
            .or_default()
            .extend_from_slice(artifacts);
        Ok(())
    }

    async fn requeue(
        &self,
        job_id: DbId,
        reason: &str,
        delay_secs: f64,
        policy: RequeuePolicy,
    ) -> Result<Option<Job>, PipelineError> {
        let now = Utc::now();
        let mut state = lock(&self.state);
        let Some(job) = state
            .job_mut(job_id)
            .filter(|j| j.status_id == JobStatus::Running.id())
        else {
            return Ok(None);
        };
        if let RequeuePolicy::IfStale { stale_after_secs } = policy {
            let cutoff = now - chrono::Duration::milliseconds((stale_after_secs * 1000.0) as i64);
            if job.heartbeat_at.is_some_and(|at| at >= cutoff) {
                return Ok(None);
            }
        }
        set_status(job, JobStatus::Queued);
        job.lease_token = None;
        job.heartbeat_at = None;
        job.next_attempt_at = Some(now + chrono::Duration::milliseconds((delay_secs * 1000.0) as i64));
        job.progress = Some(ProgressSnapshot::requeued(reason).to_value());
        Ok(Some(job.clone()))
    }

    async fn retry(&self, job_id: DbId) -> Result<Option<Job>, PipelineError> {
        let mut state = lock(&self.state);
        let failed = state
            .jobs
            .iter()
            .find(|j| j.id == job_id && j.status_id == JobStatus::Failed.id())
            .map(|j| j.document_id);
        Ok(failed.map(|document_id| state.new_job(document_id, Some(job_id))))
    }

    async fn find_job(&self, job_id: DbId) -> Result<Option<Job>, PipelineError> {
        Ok(self.job(job_id))
    }

    async fn list_stale_running(&self, stale_after_secs: f64) -> Result<Vec<Job>, PipelineError> {
        let cutoff = Utc::now() - chrono::Duration::milliseconds((stale_after_secs * 1000.0) as i64);
        let mut stale: Vec<Job> = lock(&self.state)
            .jobs
            .iter()
            .filter(|j| j.status_id == JobStatus::Running.id())
            .filter(|j| j.heartbeat_at.map_or(true, |at| at < cutoff))
            .cloned()
            .collect();
        stale.sort_by_key(|j| j.started_at);
        Ok(stale)
    }

    async fn list_artifacts(&self, job_id: DbId) -> Result<Vec<JobArtifact>, PipelineError> {
        let created_at = Utc::now();
        let artifacts = self
            .artifacts(job_id)
            .into_iter()
            .enumerate()
            .map(|(i, artifact)| {
                let (blob_json, blob_text) = match artifact.payload {
                    ArtifactPayload::Json(value) => (Some(value), None),
                    ArtifactPayload::Text(text) => (None, Some(text)),
                };
                JobArtifact {
                    id: i as DbId + 1,
                    job_id,
                    artifact_type: artifact.artifact_type.as_str().to_string(),
                    blob_json,
                    blob_text,
                    created_at,
                }
            })
            .collect();
        Ok(artifacts)
    }

    async fn load_document(&self, document_id: DbId) -> Result<Option<Document>, PipelineError> {
        Ok(self.document(document_id))
    }

    async fn find_document_by_hash(
        &self,
        canonical_hash: &str,
    ) -> Result<Option<Document>, PipelineError> {
        Ok(lock(&self.state)
            .documents
            .iter()
            .find(|d| d.canonical_hash == canonical_hash)
            .cloned())
    }

    async fn insert_document(&self, input: &CreateDocument) -> Result<Document, PipelineError> {
        let mut state = lock(&self.state);
        if let Some(existing) = state
            .documents
            .iter()
            .find(|d| d.canonical_hash == input.canonical_hash)
        {
            return Ok(existing.clone());
        }
        let document = Document {
            id: state.next_id(),
            source_type: input.source_type.clone(),
            source_ref: input.source_ref.clone(),
            canonical_hash: input.canonical_hash.clone(),
            title: input.title.clone(),
            author: input.author.clone(),
            summary: None,
            summary_chunk_count: 0,
            ingest_status_id: IngestStatus::Pending.id(),
            vector_namespace: input.vector_namespace.clone(),
            created_at: Utc::now(),
        };
        state.documents.push(document.clone());
        Ok(document)
    }

    async fn backfill_metadata(
        &self,
        document_id: DbId,
        metadata: &SourceMetadata,
    ) -> Result<Document, PipelineError> {
        let mut state = lock(&self.state);
        let document = state
            .document_mut(document_id)
            .ok_or(PipelineError::DocumentNotFound { document_id })?;
        if document.title.is_none() {
            document.title = metadata.title.clone();
        }
        if document.author.is_none() {
            document.author = metadata.author.clone();
        }
        Ok(document.clone())
    }

    async fn set_ingest_status(
        &self,
        document_id: DbId,
        status: IngestStatus,
    ) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        let document = state
            .document_mut(document_id)
            .ok_or(PipelineError::DocumentNotFound { document_id })?;
        document.ingest_status_id = status.id();
        Ok(())
    }

    async fn cache_summary(
        &self,
        document_id: DbId,
        summary: &str,
        chunk_count: usize,
    ) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        let document = state
            .document_mut(document_id)
            .ok_or(PipelineError::DocumentNotFound { document_id })?;
        document.summary = Some(summary.to_string());
        document.summary_chunk_count = i32::try_from(chunk_count).unwrap_or(i32::MAX);
        Ok(())
    }
}

#[async_trait]
impl ProgressWriter for MemoryJobStore {
    async fn write(&self, lease: JobLease, snapshot: &ProgressSnapshot) -> Result<(), ProgressError> {
        let mut state = lock(&self.state);
        let Some(job) = state.leased_job(lease) else {
            return Err(ProgressError::LeaseLost {
                job_id: lease.job_id,
            });
        };
        job.progress = Some(snapshot.to_value());
        state
            .progress
            .entry(lease.job_id)
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }
}

#[async_trait]
impl ProgressReader for MemoryJobStore {
    async fn read(&self, job_id: DbId) -> Result<Option<JobProgressView>, ProgressError> {
        Ok(self.job(job_id).and_then(|job| {
            Some(JobProgressView {
                status: job.status()?,
                progress: job.progress.as_ref().and_then(ProgressSnapshot::from_value),
            })
        }))
    }
}

// ---------------------------------------------------------------------------
// Language model
// ---------------------------------------------------------------------------

/// Answers each prompt kind with canned text, chosen by system prompt.
///
/// Review answers are served in order; the last one repeats.
pub struct ScriptedLanguageModel {
    themes: String,
    reviews: Mutex<VecDeque<String>>,
    summaries: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLanguageModel {
    pub fn new(themes: &str, reviews: &[&str]) -> Self {
        Self {
            themes: themes.to_string(),
            reviews: Mutex::new(reviews.iter().map(|r| r.to_string()).collect()),
            summaries: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn calls_with_system(&self, system: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.system == system)
            .count()
    }

    fn next_review(&self) -> String {
        let mut reviews = lock(&self.reviews);
        if reviews.len() > 1 {
            reviews.pop_front().unwrap_or_default()
        } else {
            reviews.front().cloned().unwrap_or_else(|| APPROVE.to_string())
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CollaboratorError> {
        lock(&self.requests).push(request.clone());
        let response = match request.system.as_str() {
            prompts::SUMMARIZE_CHUNK_SYSTEM => {
                let n = self.summaries.fetch_add(1, Ordering::SeqCst) + 1;
                format!("Summary of passage {n}.")
            }
            prompts::THEME_DISCOVERY_SYSTEM => self.themes.clone(),
            prompts::THEME_INTRO_SYSTEM => "An introduction to the theme.".to_string(),
            prompts::ESSAY_DRAFT_SYSTEM => "# Draft\n\nThe storm foreshadows [p00000].".to_string(),
            prompts::REVIEW_SYSTEM => self.next_review(),
            prompts::REVISE_SYSTEM => "# Revised\n\nFate binds them [p00001].".to_string(),
            other => {
                return Err(CollaboratorError::Decode {
                    service: "scripted model",
                    message: format!("no script for system prompt: {other}"),
                })
            }
        };
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// Dimension of [`HashEmbedder`] vectors.
pub const HASH_EMBEDDING_DIM: usize = 16;

/// Deterministic bag-of-bytes embedding. Equal texts get equal vectors.
#[derive(Default)]
pub struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; HASH_EMBEDDING_DIM];
        for (i, byte) in text.to_lowercase().bytes().enumerate() {
            vector[(byte as usize + i) % HASH_EMBEDDING_DIM] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::embed(t)).collect())
    }
}

// ---------------------------------------------------------------------------
// Vector index
// ---------------------------------------------------------------------------

/// Brute-force cosine similarity index, partitioned by namespace.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    namespaces: Mutex<HashMap<String, Vec<VectorRecord>>>,
    ensure_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self, namespace: &str) -> usize {
        lock(&self.namespaces).get(namespace).map_or(0, Vec::len)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn ensure(&self, _dimension: usize) -> Result<(), CollaboratorError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<(), CollaboratorError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut namespaces = lock(&self.namespaces);
        let stored = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, CollaboratorError> {
        let namespaces = lock(&self.namespaces);
        let mut matches: Vec<VectorMatch> = namespaces
            .get(namespace)
            .into_iter()
            .flatten()
            .map(|record| VectorMatch {
                id: record.id.clone(),
                score: cosine(vector, &record.values),
                metadata: Some(record.metadata.clone()),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }
}

// ---------------------------------------------------------------------------
// Text source
// ---------------------------------------------------------------------------

/// Serves one fixed text for every source reference.
pub struct StaticTextSource {
    text: String,
    metadata: SourceMetadata,
    metadata_fails: bool,
    fail_next: AtomicBool,
    fetches: AtomicUsize,
}

impl StaticTextSource {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            metadata: SourceMetadata::default(),
            metadata_fails: false,
            fail_next: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_metadata(mut self, title: Option<&str>, author: Option<&str>) -> Self {
        self.metadata = SourceMetadata {
            title: title.map(str::to_string),
            author: author.map(str::to_string),
        };
        self
    }

    pub fn failing_metadata(mut self) -> Self {
        self.metadata_fails = true;
        self
    }

    /// Make the next `fetch` fail with a request error.
    pub fn fail_next_fetch(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextSource for StaticTextSource {
    async fn fetch(&self, source_ref: &str) -> Result<String, CollaboratorError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CollaboratorError::Request {
                service: "static source",
                message: format!("connection reset fetching {source_ref}"),
            });
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }

    async fn fetch_metadata(&self, _source_ref: &str) -> Result<SourceMetadata, CollaboratorError> {
        if self.metadata_fails {
            return Err(CollaboratorError::Api {
                service: "static source",
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(self.metadata.clone())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// One document wired to a memory store and scripted collaborators.
pub struct Harness {
    pub store: Arc<MemoryJobStore>,
    pub llm: Arc<ScriptedLanguageModel>,
    pub embedder: Arc<HashEmbedder>,
    pub index: Arc<InMemoryVectorIndex>,
    pub source: Arc<StaticTextSource>,
    pub document: Document,
}

impl Harness {
    /// `themes` is the raw theme-discovery answer; `reviews` the review
    /// answers in order.
    pub fn new(text: &str, themes: &str, reviews: &[&str]) -> Self {
        let store = Arc::new(MemoryJobStore::new());
        let document = store.add_document("1342", text);
        Self {
            store,
            llm: Arc::new(ScriptedLanguageModel::new(themes, reviews)),
            embedder: Arc::new(HashEmbedder::new()),
            index: Arc::new(InMemoryVectorIndex::new()),
            source: Arc::new(StaticTextSource::new(text)),
            document,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            text_source: self.source.clone(),
            llm: self.llm.clone(),
            embedder: self.embedder.clone(),
            index: self.index.clone(),
        }
    }

    pub fn engine(&self, config: PipelineConfig) -> PipelineEngine {
        PipelineEngine::new(
            self.store.clone(),
            ProgressPublisher::new(self.store.clone()),
            self.collaborators(),
            config,
        )
    }

    /// Enqueue a job for the document, claim it, and build its context.
    pub async fn claim_context(&self) -> StageContext {
        let queued = self
            .store
            .enqueue(self.document.id)
            .await
            .expect("enqueue");
        let job = self
            .store
            .claim_next()
            .await
            .expect("claim")
            .expect("a queued job");
        assert_eq!(job.id, queued.id, "harness expects an otherwise idle queue");
        let lease = job.lease().expect("claimed job has a lease");
        let document = self
            .store
            .document(self.document.id)
            .expect("harness document");
        StageContext::new(lease, &document)
    }
}
