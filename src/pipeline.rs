//! SLI pipeline: fetch orders → compose → render → persist → mark the bulk.
//!
//! One run owns its bulk exclusively (`&mut Bulk`) and awaits every stage in
//! sequence. The bulk is only written after the persistence collaborator has
//! returned a file id, so a failed run leaves it exactly as it was.
//!
//! # Major Types
//! - [`SliPipeline`]: holds the collaborators and immutable settings
//! - [`SliReport`]: what a successful run produced
//! - [`SliState`]: stages a run passes through, logged as it advances
//! - [`Exporter`]: create/send surface the bulking workflow drives

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info};

use crate::aggregate::fetch_orders;
use crate::compose::Composer;
use crate::config::{SliConfig, DEFAULT_FILE_TARGET, DEFAULT_REF_COLLECTION};
use crate::contract::{FilePersistence, OrderQuery, PdfConverter, PdfOptions};
use crate::error::{SliError, SliResult};
use crate::model::{Bulk, DocumentType};
use crate::render::{render_sli, TemplateRenderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliState {
    Pending,
    OrdersFetched,
    Composed,
    Rendered,
    Persisted,
    Failed,
}

impl fmt::Display for SliState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SliState::Pending => "pending",
            SliState::OrdersFetched => "orders_fetched",
            SliState::Composed => "composed",
            SliState::Rendered => "rendered",
            SliState::Persisted => "persisted",
            SliState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct SliReport {
    pub bulk_id: String,
    pub filename: String,
    pub file_id: String,
    pub size_bytes: usize,
    /// Every state the run passed through, in order.
    pub states: Vec<SliState>,
}

struct StateTracker {
    bulk_id: String,
    states: Vec<SliState>,
}

impl StateTracker {
    fn new(bulk_id: &str) -> Self {
        Self {
            bulk_id: bulk_id.to_string(),
            states: vec![SliState::Pending],
        }
    }

    fn current(&self) -> SliState {
        self.states.last().copied().unwrap_or(SliState::Pending)
    }

    fn advance(&mut self, next: SliState) {
        debug!(bulk_id = %self.bulk_id, from = %self.current(), to = %next, "SLI state transition");
        self.states.push(next);
    }

    fn fail(&mut self, err: &SliError) {
        error!(
            bulk_id = %self.bulk_id,
            state = %self.current(),
            code = err.code(),
            error = %err,
            "Error in creating UTi SLI"
        );
        self.states.push(SliState::Failed);
    }
}

pub struct SliPipeline<Q, P, C> {
    orders: Q,
    persistence: P,
    converter: C,
    composer: Composer,
    renderer: TemplateRenderer,
    page: PdfOptions,
    file_target: String,
    ref_collection: String,
}

impl<Q, P, C> SliPipeline<Q, P, C>
where
    Q: OrderQuery,
    P: FilePersistence,
    C: PdfConverter,
{
    pub fn new(
        orders: Q,
        persistence: P,
        converter: C,
        composer: Composer,
        renderer: TemplateRenderer,
    ) -> Self {
        Self {
            orders,
            persistence,
            converter,
            composer,
            renderer,
            page: PdfOptions::default(),
            file_target: DEFAULT_FILE_TARGET.to_string(),
            ref_collection: DEFAULT_REF_COLLECTION.to_string(),
        }
    }

    /// Build a pipeline from loaded settings.
    pub fn from_config(config: &SliConfig, orders: Q, persistence: P, converter: C) -> Self {
        Self::new(
            orders,
            persistence,
            converter,
            Composer::new(config.rules.clone(), config.customer_care_email.clone()),
            TemplateRenderer::new(config.template_path.clone()),
        )
        .with_page(config.page)
        .with_storage(config.file_target.clone(), config.ref_collection.clone())
    }

    pub fn with_page(mut self, page: PdfOptions) -> Self {
        self.page = page;
        self
    }

    pub fn with_storage(
        mut self,
        file_target: impl Into<String>,
        ref_collection: impl Into<String>,
    ) -> Self {
        self.file_target = file_target.into();
        self.ref_collection = ref_collection.into();
        self
    }

    /// Generate, persist and record the SLI for `bulk`.
    ///
    /// On success `bulk.files[utisli]` holds filename, target, ref collection
    /// and file id, and `files_created` is set. On failure `bulk` is untouched.
    pub async fn create_sli(&self, bulk: &mut Bulk) -> SliResult<SliReport> {
        let mut tracker = StateTracker::new(&bulk.id);
        info!(bulk_id = %bulk.id, destination = %bulk.destination_country, "Creating UTi SLI");

        match self.run(bulk, &mut tracker).await {
            Ok(report) => {
                info!(
                    bulk_id = %report.bulk_id,
                    filename = %report.filename,
                    file_id = %report.file_id,
                    "UTi SLI created successfully"
                );
                Ok(report)
            }
            Err(e) => {
                tracker.fail(&e);
                Err(e)
            }
        }
    }

    async fn run(&self, bulk: &mut Bulk, tracker: &mut StateTracker) -> SliResult<SliReport> {
        let orders = fetch_orders(&self.orders, bulk).await?;
        tracker.advance(SliState::OrdersFetched);

        let model = self.composer.compose(&orders, bulk);
        tracker.advance(SliState::Composed);

        let rendered = render_sli(
            &self.renderer,
            &self.converter,
            &model,
            self.page,
            Utc::now(),
        )
        .await?;
        tracker.advance(SliState::Rendered);

        let size_bytes = rendered.data.len();
        let file_id = self
            .persistence
            .persist_file(
                &rendered.filename,
                rendered.data,
                &self.ref_collection,
                &bulk.id,
            )
            .await
            .map_err(|e| SliError::Persistence {
                filename: rendered.filename.clone(),
                source: e,
            })?;
        debug!(filename = %rendered.filename, file_id = %file_id, "File persisted");

        let entry = bulk.files.entry(DocumentType::Utisli).or_default();
        entry.filename = Some(rendered.filename.clone());
        entry.target = Some(self.file_target.clone());
        entry.ref_collection = Some(self.ref_collection.clone());
        entry.file_id = Some(file_id.clone());
        bulk.files_created_at = Some(Utc::now());
        bulk.files_created = true;
        tracker.advance(SliState::Persisted);

        Ok(SliReport {
            bulk_id: bulk.id.clone(),
            filename: rendered.filename,
            file_id,
            size_bytes,
            states: tracker.states.clone(),
        })
    }
}

/// Document exporter driven by the bulking workflow.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Assign the MAWB number and create this exporter's files for `bulk`.
    /// The bulk is only updated when everything succeeded.
    async fn create_files(&self, bulk: &mut Bulk, mawb: Option<String>) -> SliResult<SliReport>;

    /// Deliver created files. Returns the bulk as it should be stored.
    async fn send_files(&self, bulk: Bulk) -> SliResult<Bulk>;
}

#[async_trait]
impl<Q, P, C> Exporter for SliPipeline<Q, P, C>
where
    Q: OrderQuery,
    P: FilePersistence,
    C: PdfConverter,
{
    async fn create_files(&self, bulk: &mut Bulk, mawb: Option<String>) -> SliResult<SliReport> {
        let mut working = bulk.clone();
        if mawb.is_some() {
            working.mawb = mawb;
        }
        let report = self.create_sli(&mut working).await?;
        *bulk = working;
        Ok(report)
    }

    async fn send_files(&self, bulk: Bulk) -> SliResult<Bulk> {
        // The SLI is picked up from storage; nothing is sent.
        debug!(bulk_id = %bulk.id, "No delivery step for UTi SLI");
        Ok(bulk)
    }
}
