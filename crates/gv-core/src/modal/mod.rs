//! Stack of open dialogs

use std::sync::Arc;

use uuid::Uuid;

use crate::schema::FileInfo;

pub type ModalId = Uuid;

/// The fixed set of dialogs, each with its own payload
#[derive(Debug, Clone, PartialEq)]
pub enum Modal {
    About,
    /// URL prompt, pre-filled with `url`
    Load { url: String },
    Metadata(Arc<FileInfo>),
}

impl Modal {
    pub fn title(&self) -> &'static str {
        match self {
            Modal::About => "About",
            Modal::Load { .. } => "Load GeoParquet",
            Modal::Metadata(_) => "File metadata",
        }
    }

    pub fn kind(&self) -> ModalKind {
        match self {
            Modal::About => ModalKind::About,
            Modal::Load { .. } => ModalKind::Load,
            Modal::Metadata(_) => ModalKind::Metadata,
        }
    }
}

/// Which dialog to open; the state fills in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    About,
    Load,
    Metadata,
}

/// Events a dialog can raise
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalAction {
    Close,
    SubmitUrl(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModalDescriptor {
    pub id: ModalId,
    pub modal: Modal,
}

/// Open dialogs in z-order, bottom first
#[derive(Debug, Default, Clone)]
pub struct ModalStack {
    open: Vec<ModalDescriptor>,
}

impl ModalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, modal: Modal) -> ModalId {
        let id = Uuid::new_v4();
        self.open.push(ModalDescriptor { id, modal });
        id
    }

    /// Remove a dialog; unknown ids are ignored
    pub fn hide(&mut self, id: ModalId) -> Option<ModalDescriptor> {
        let position = self.open.iter().position(|d| d.id == id)?;
        Some(self.open.remove(position))
    }

    pub fn get(&self, id: ModalId) -> Option<&ModalDescriptor> {
        self.open.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModalDescriptor> {
        self.open.iter()
    }

    pub fn top(&self) -> Option<&ModalDescriptor> {
        self.open.last()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
