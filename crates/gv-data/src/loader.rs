//! Runs the load effects of the application state

use std::future::Future;
use std::sync::Arc;

use ahash::AHashMap;
use gv_core::{Effect, FileInfo, LoadErrorKind, LoadEvent, Page, PageRequest, SessionId};
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use tracing::{error, instrument};

use crate::config::ViewerConfig;
use crate::geometry::GeometryMaterializer;
use crate::projection::ProjectionRegistry;
use crate::sources::{GeoParquetSource, HttpRangeReader};
use crate::DataError;

/// Executes `Discover` and `FetchPage` effects against remote files.
///
/// The most recently opened file is kept by URL so pages reuse the metadata
/// read during discovery.
pub struct Loader {
    client: Client,
    footer_prefetch: usize,
    registry: Arc<ProjectionRegistry>,
    materializer: GeometryMaterializer,
    sources: RwLock<AHashMap<String, Arc<GeoParquetSource>>>,
    session: Mutex<Option<SessionId>>,
}

impl Loader {
    pub fn new(config: &ViewerConfig) -> Result<Self, DataError> {
        let client = HttpRangeReader::client(&config.http)?;
        let registry = ProjectionRegistry::new(client.clone(), config.projection_registry_url.clone());
        Ok(Self::with_registry(client, config.http.footer_prefetch_bytes, Arc::new(registry)))
    }

    pub fn with_registry(client: Client, footer_prefetch: usize, registry: Arc<ProjectionRegistry>) -> Self {
        Self {
            client,
            footer_prefetch,
            materializer: GeometryMaterializer::new(Arc::clone(&registry)),
            registry,
            sources: RwLock::new(AHashMap::new()),
            session: Mutex::new(None),
        }
    }

    /// Run a load effect; other effects are for the views and give `None`
    pub async fn run(&self, effect: Effect) -> Option<LoadEvent> {
        match effect {
            Effect::Discover { session, url } => Some(self.discover(session, &url).await),
            Effect::FetchPage {
                session,
                file,
                request,
                columns,
            } => Some(self.fetch_page(session, &file, request, &columns).await),
            Effect::ClearMap | Effect::FitView(_) | Effect::ScrollToRow(_) => None,
        }
    }

    /// Like [`run`](Self::run), but on a task of its own: a panic while
    /// reading or decoding comes back as a failed load.
    pub async fn run_isolated(self: Arc<Self>, effect: Effect) -> Option<LoadEvent> {
        let session = effect.session()?;
        isolate(session, async move { self.run(effect).await }).await
    }

    /// Number of files whose metadata is held
    pub fn open_files(&self) -> usize {
        self.sources.read().len()
    }

    #[instrument(skip(self), fields(session = %session))]
    pub async fn discover(&self, session: SessionId, url: &str) -> LoadEvent {
        self.enter_session(session);
        match self.open(url).await {
            Ok(source) => LoadEvent::Discovered {
                session,
                file: Arc::clone(source.file_info()),
            },
            Err(err) => failed(session, err),
        }
    }

    #[instrument(skip(self, file, columns), fields(session = %session, url = %file.url))]
    pub async fn fetch_page(
        &self,
        session: SessionId,
        file: &FileInfo,
        request: PageRequest,
        columns: &[String],
    ) -> LoadEvent {
        self.enter_session(session);
        match self.read_page(file, request, columns).await {
            Ok(page) => LoadEvent::PageLoaded {
                session,
                request,
                page,
            },
            Err(err) => failed(session, err),
        }
    }

    /// Read and materialize one page
    pub async fn read_page(
        &self,
        file: &FileInfo,
        request: PageRequest,
        columns: &[String],
    ) -> Result<Page, DataError> {
        let source = match self.cached(&file.url) {
            Some(source) => source,
            None => self.open(&file.url).await?,
        };
        let batches = source.read_page(request, columns).await?;
        let materialized = self
            .materializer
            .materialize(file.geo.as_ref(), &batches, request.offset)
            .await?;
        Ok(Page {
            batches,
            features: materialized.features,
            warnings: materialized.warnings,
        })
    }

    async fn open(&self, url: &str) -> Result<Arc<GeoParquetSource>, DataError> {
        let fetch = Arc::new(HttpRangeReader::new(self.client.clone(), url));
        let source = Arc::new(GeoParquetSource::open(fetch, self.footer_prefetch).await?);
        let mut sources = self.sources.write();
        sources.retain(|cached, _| cached == url);
        sources.insert(url.to_owned(), Arc::clone(&source));
        Ok(source)
    }

    /// A new session may retry projections that failed in the last one
    fn enter_session(&self, session: SessionId) {
        let mut current = self.session.lock();
        if *current != Some(session) {
            *current = Some(session);
            self.registry.forget_failures();
        }
    }

    fn cached(&self, url: &str) -> Option<Arc<GeoParquetSource>> {
        self.sources.read().get(url).cloned()
    }
}

/// Run `work` on a spawned task, turning a panic into `LoadEvent::Failed`
async fn isolate<F>(session: SessionId, work: F) -> Option<LoadEvent>
where
    F: Future<Output = Option<LoadEvent>> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(event) => event,
        Err(err) => {
            error!(%session, error = %err, "load task did not finish");
            Some(LoadEvent::Failed {
                session,
                kind: LoadErrorKind::Decode,
                message: format!("load task failed: {err}"),
            })
        }
    }
}

fn failed(session: SessionId, err: DataError) -> LoadEvent {
    error!(kind = %err.kind(), error = %err, "load failed");
    LoadEvent::Failed {
        session,
        kind: err.kind(),
        message: err.to_string(),
    }
}
