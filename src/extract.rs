//! Reads the playlist out of the host document.

use tracing::debug;

use crate::config::SelectorSettings;
use crate::dom::{Document, NodeId, Selector, SelectorError};
use crate::duration;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    #[error("playlist container not found")]
    MissingContainer,
    #[error("playlist has no items")]
    MissingItems,
    #[error("no item is marked active")]
    MissingActiveMarker,
    #[error("active item is not among the playlist items")]
    ActiveIndexUnresolvable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistItem {
    pub duration_seconds: u64,
    pub is_active: bool,
}

/// One consistent read of the playlist. Only valid snapshots exist: an
/// extraction that cannot place the active item fails instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSnapshot {
    /// The container the items were read from; the widget anchors on it.
    pub container: NodeId,
    pub items: Vec<PlaylistItem>,
    pub active_index: usize,
}

/// Parsed selectors for the host playlist markup.
#[derive(Debug, Clone)]
pub struct PlaylistSelectors {
    pub container: Selector,
    pub item: Selector,
    pub active: Selector,
    pub duration: Selector,
}

impl PlaylistSelectors {
    pub fn from_settings(settings: &SelectorSettings) -> Result<Self, SelectorError> {
        Ok(Self {
            container: settings.container.parse()?,
            item: settings.item.parse()?,
            active: settings.active.parse()?,
            duration: settings.duration.parse()?,
        })
    }
}

/// Locates the playlist container, if the host has rendered it.
pub fn find_container(doc: &Document, selectors: &PlaylistSelectors) -> Option<NodeId> {
    doc.query_selector(doc.root(), &selectors.container)
}

/// Takes a snapshot of the playlist without touching the document.
pub fn extract(doc: &Document, selectors: &PlaylistSelectors) -> Result<PlaylistSnapshot, ExtractError> {
    let container = find_container(doc, selectors).ok_or(ExtractError::MissingContainer)?;

    let elements = doc.query_selector_all(container, &selectors.item);
    if elements.is_empty() {
        return Err(ExtractError::MissingItems);
    }

    let active = doc
        .query_selector(container, &selectors.active)
        .ok_or(ExtractError::MissingActiveMarker)?;

    let active_index = elements
        .iter()
        .position(|e| *e == active)
        .ok_or(ExtractError::ActiveIndexUnresolvable)?;

    let items = elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let duration_seconds = match doc.query_selector(*element, &selectors.duration) {
                Some(node) => duration::parse(doc.text_content(node).trim()),
                None => {
                    debug!(index, "playlist item has no duration element, counting it as 0s");
                    0
                }
            };
            PlaylistItem {
                duration_seconds,
                is_active: index == active_index,
            }
        })
        .collect();

    Ok(PlaylistSnapshot {
        container,
        items,
        active_index,
    })
}
