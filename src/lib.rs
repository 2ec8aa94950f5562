//! Playlist progress for a video page.
//!
//! Reads the host page's playlist, computes how much of the playlist's total
//! duration precedes the playing item, and keeps a small widget above the
//! playlist up to date as the page changes underneath it.

pub mod config;
pub mod coordinator;
pub mod dom;
pub mod duration;
pub mod extract;
pub mod progress;
pub mod render;
pub mod replay;
pub mod theme;
pub mod watch;

pub use config::{Config, Settings};
pub use coordinator::{Coordinator, Phase, RefreshError, RefreshStats, WatcherStatus};
pub use dom::{Document, SharedDocument};
pub use extract::{ExtractError, PlaylistItem, PlaylistSnapshot};
pub use progress::ProgressMetrics;
pub use render::WidgetView;
pub use theme::ThemeMode;
