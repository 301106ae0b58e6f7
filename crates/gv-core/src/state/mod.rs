//! Application state and its transitions.
//!
//! `AppState` owns every piece of mutable viewer state. User actions go
//! through [`AppState::dispatch`], async completions through
//! [`AppState::apply`]; both return the side effects the host must run.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::events::{LoadEvent, Page, SessionId};
use crate::features::{Extent, FeatureId, FeatureSource, FitOptions};
use crate::modal::{Modal, ModalAction, ModalId, ModalKind, ModalStack};
use crate::pagination::{CompletionRule, PageRequest, Pagination};
use crate::schema::FileInfo;
use crate::sync::SelectionSync;

/// Tunables for loading and map framing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSettings {
    pub page_size: usize,
    pub completion_rule: CompletionRule,
    pub fit: FitOptions,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            completion_rule: CompletionRule::RowCount,
            fit: FitOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Discovering,
    LoadingPage(PageRequest),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// User-visible status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub level: StatusLevel,
    pub text: String,
}

/// User actions
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Reset and load a file from a URL
    Open(String),
    /// Reset and reload the current file from the first row
    Reload,
    LoadMore,
    LoadAll,
    SetPageSize(usize),
    SetColumns(Vec<String>),
    SelectFromTable(usize),
    SelectFromMap(FeatureId),
    ShowModal(ModalKind),
    HideModal(ModalId),
    ModalAction { id: ModalId, action: ModalAction },
    ClearStatus,
}

/// Work the host must carry out after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Look up the file size and read its metadata
    Discover { session: SessionId, url: String },
    /// Read and decode one row window
    FetchPage {
        session: SessionId,
        file: Arc<FileInfo>,
        request: PageRequest,
        columns: Vec<String>,
    },
    /// Drop every feature from the map
    ClearMap,
    FitView(Extent),
    ScrollToRow(usize),
}

impl Effect {
    /// Session of a load effect; view effects have none
    pub fn session(&self) -> Option<SessionId> {
        match self {
            Effect::Discover { session, .. } | Effect::FetchPage { session, .. } => Some(*session),
            Effect::ClearMap | Effect::FitView(_) | Effect::ScrollToRow(_) => None,
        }
    }
}

/// The single owned application state
#[derive(Debug)]
pub struct AppState {
    settings: LoadSettings,
    url: Option<String>,
    session: SessionId,
    phase: LoadPhase,
    file: Option<Arc<FileInfo>>,
    columns: Option<Vec<String>>,
    explicit_columns: bool,
    pagination: Pagination,
    dataset: Dataset,
    features: FeatureSource,
    selection: SelectionSync,
    modals: ModalStack,
    status: Option<Status>,
    fitted: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(LoadSettings::default())
    }
}

impl AppState {
    pub fn new(settings: LoadSettings) -> Self {
        Self {
            settings,
            url: None,
            session: SessionId::default(),
            phase: LoadPhase::Idle,
            file: None,
            columns: None,
            explicit_columns: false,
            pagination: Pagination::new(settings.page_size, settings.completion_rule),
            dataset: Dataset::new(),
            features: FeatureSource::new(),
            selection: SelectionSync::new(),
            modals: ModalStack::new(),
            status: None,
            fitted: false,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, LoadPhase::Discovering | LoadPhase::LoadingPage(_))
    }

    pub fn file(&self) -> Option<&Arc<FileInfo>> {
        self.file.as_ref()
    }

    /// Columns requested from the file
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn features(&self) -> &FeatureSource {
        &self.features
    }

    pub fn selection(&self) -> &SelectionSync {
        &self.selection
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.selection.selected()
    }

    pub fn modals(&self) -> &ModalStack {
        &self.modals
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.pagination.is_complete()
    }

    /// Handle a user action
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<Effect> {
        match command {
            AppCommand::Open(url) => self.open(url),
            AppCommand::Reload => match self.url.clone() {
                Some(url) => self.open(url),
                None => {
                    self.set_status(StatusLevel::Warning, "no file to reload");
                    vec![]
                }
            },
            AppCommand::LoadMore => self.load_more(),
            AppCommand::LoadAll => {
                // A rejected request must leave the page size alone
                if self.reject_if_busy() || self.is_complete() {
                    return vec![];
                }
                self.pagination.set_page_size(0);
                self.load_more()
            }
            AppCommand::SetPageSize(size) => {
                self.pagination.set_page_size(size);
                vec![]
            }
            AppCommand::SetColumns(columns) => self.set_columns(columns),
            AppCommand::SelectFromTable(row) => self
                .selection
                .select_on_map(row, &mut self.features, &self.settings.fit)
                .map(Effect::FitView)
                .into_iter()
                .collect(),
            AppCommand::SelectFromMap(id) => self
                .selection
                .select_in_table(id.row, self.dataset.row_count(), &mut self.features)
                .map(Effect::ScrollToRow)
                .into_iter()
                .collect(),
            AppCommand::ShowModal(kind) => {
                self.show_modal(kind);
                vec![]
            }
            AppCommand::HideModal(id) => {
                self.modals.hide(id);
                vec![]
            }
            AppCommand::ModalAction { id, action } => {
                self.modals.hide(id);
                match action {
                    ModalAction::Close => vec![],
                    ModalAction::SubmitUrl(url) => self.open(url),
                }
            }
            AppCommand::ClearStatus => {
                self.status = None;
                vec![]
            }
        }
    }

    /// Handle the result of a `Discover` or `FetchPage` effect
    pub fn apply(&mut self, event: LoadEvent) -> Vec<Effect> {
        if event.session() != self.session {
            debug!(
                stale = %event.session(),
                current = %self.session,
                "discarding result of a superseded load"
            );
            return vec![];
        }

        match event {
            LoadEvent::Discovered { file, .. } => {
                if self.phase != LoadPhase::Discovering {
                    debug!("discarding unexpected discovery result");
                    return vec![];
                }
                info!(
                    url = %file.url,
                    rows = file.total_rows,
                    columns = file.schema.len(),
                    geo = file.geo.is_some(),
                    "file discovered"
                );
                self.pagination.set_total_rows(Some(file.total_rows));
                if !self.explicit_columns {
                    self.columns = Some(file.column_names());
                }
                self.file = Some(file);
                self.phase = LoadPhase::Idle;
                self.request_next_page()
            }
            LoadEvent::PageLoaded { request, page, .. } => self.page_loaded(request, page),
            LoadEvent::Failed { kind, message, .. } => {
                warn!(%kind, %message, "load failed");
                self.phase = LoadPhase::Failed;
                self.set_status(StatusLevel::Error, format!("{kind}: {message}"));
                vec![]
            }
        }
    }

    fn open(&mut self, url: String) -> Vec<Effect> {
        let url = url.trim().to_owned();
        if url.is_empty() {
            self.set_status(StatusLevel::Error, "URL is empty");
            return vec![];
        }

        let mut effects = self.begin_session();
        if self.url.as_deref() != Some(url.as_str()) {
            self.file = None;
            self.columns = None;
            self.explicit_columns = false;
            self.pagination.set_total_rows(None);
            self.url = Some(url);
        }
        self.status = None;

        if self.file.is_some() {
            effects.extend(self.request_next_page());
        } else {
            effects.extend(self.discover());
        }
        effects
    }

    /// Start a fresh session: everything accumulated so far is dropped and
    /// results still in flight for the old session will be ignored.
    fn begin_session(&mut self) -> Vec<Effect> {
        self.session = self.session.next();
        self.phase = LoadPhase::Idle;
        self.dataset.clear();
        self.pagination.reset();
        self.features.clear();
        self.selection.reset();
        self.fitted = false;
        debug!(session = %self.session, "load session started");
        vec![Effect::ClearMap]
    }

    fn discover(&mut self) -> Vec<Effect> {
        let Some(url) = self.url.clone() else {
            return vec![];
        };
        self.phase = LoadPhase::Discovering;
        vec![Effect::Discover {
            session: self.session,
            url,
        }]
    }

    /// Warn and return true while a load is in flight
    fn reject_if_busy(&mut self) -> bool {
        if self.is_loading() {
            self.set_status(StatusLevel::Warning, "a load is already in progress");
            return true;
        }
        false
    }

    fn load_more(&mut self) -> Vec<Effect> {
        if self.reject_if_busy() {
            return vec![];
        }
        if self.file.is_none() {
            // Discovery never succeeded; retry it
            return self.discover();
        }
        self.request_next_page()
    }

    fn request_next_page(&mut self) -> Vec<Effect> {
        let (Some(file), Some(request)) = (self.file.clone(), self.pagination.next_request()) else {
            return vec![];
        };
        let columns = self
            .columns
            .clone()
            .unwrap_or_else(|| file.column_names());
        self.phase = LoadPhase::LoadingPage(request);
        vec![Effect::FetchPage {
            session: self.session,
            file,
            request,
            columns,
        }]
    }

    fn page_loaded(&mut self, request: PageRequest, page: Page) -> Vec<Effect> {
        if self.phase != LoadPhase::LoadingPage(request) || request.offset != self.pagination.offset() {
            debug!(offset = request.offset, "discarding page that was not requested");
            return vec![];
        }

        let rows = match self.dataset.append(page.batches) {
            Ok(rows) => rows,
            Err(error) => {
                self.phase = LoadPhase::Failed;
                self.set_status(StatusLevel::Error, format!("decode error: {error}"));
                return vec![];
            }
        };

        let ids: Vec<FeatureId> = page.features.iter().map(|f| f.id).collect();
        let first = self.features.append(page.features);
        self.selection.register(first, &ids);

        let outcome = self.pagination.record_page(request, rows);
        self.phase = LoadPhase::Idle;
        debug!(
            offset = request.offset,
            rows,
            features = ids.len(),
            complete = self.pagination.is_complete(),
            "page applied"
        );

        if page.warnings.is_empty() {
            let total = self
                .pagination
                .total_rows()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_owned());
            self.set_status(
                StatusLevel::Info,
                format!("loaded {} of {} rows", self.dataset.row_count(), total),
            );
        } else {
            for warning in &page.warnings {
                warn!(%warning, "page loaded with warnings");
            }
            self.set_status(StatusLevel::Warning, page.warnings.join("; "));
        }
        if outcome.empty {
            debug!("empty page marks the end of the file");
        }

        let mut effects = Vec::new();
        if !self.fitted {
            if let Some(extent) = self.features.extent() {
                self.fitted = true;
                effects.push(Effect::FitView(extent));
            }
        }
        effects
    }

    fn set_columns(&mut self, columns: Vec<String>) -> Vec<Effect> {
        let Some(file) = self.file.clone() else {
            self.set_status(StatusLevel::Error, "no file loaded");
            return vec![];
        };
        if columns.is_empty() {
            self.set_status(StatusLevel::Error, "select at least one column");
            return vec![];
        }
        if let Some(unknown) = columns.iter().find(|c| file.column(c).is_none()) {
            self.set_status(StatusLevel::Error, format!("unknown column {unknown:?}"));
            return vec![];
        }
        self.columns = Some(columns);
        self.explicit_columns = true;
        self.dispatch(AppCommand::Reload)
    }

    fn show_modal(&mut self, kind: ModalKind) {
        let modal = match kind {
            ModalKind::About => Modal::About,
            ModalKind::Load => Modal::Load {
                url: self.url.clone().unwrap_or_default(),
            },
            ModalKind::Metadata => match &self.file {
                Some(file) => Modal::Metadata(Arc::clone(file)),
                None => {
                    self.set_status(StatusLevel::Warning, "no file metadata available yet");
                    return;
                }
            },
        };
        self.modals.show(modal);
    }

    fn set_status(&mut self, level: StatusLevel, text: impl Into<String>) {
        self.status = Some(Status {
            level,
            text: text.into(),
        });
    }
}
