//! The progress widget injected above the playlist.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::WidgetSettings;
use crate::dom::{DomError, Document, NodeId};
use crate::duration::format_time;
use crate::progress::ProgressMetrics;
use crate::theme::ThemeMode;

/// The widget's root element and the sub-regions that get rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetHandle {
    pub root: NodeId,
    pub title: NodeId,
    pub index_line: NodeId,
    pub time_line: NodeId,
    pub track: NodeId,
    pub fill: NodeId,
    pub percent_label: NodeId,
}

/// What the widget currently shows, read back from the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetView {
    pub index: String,
    pub time: String,
    pub fill_width: String,
    pub percent: String,
    pub theme: Option<ThemeMode>,
}

/// Owns the single widget for the page session.
#[derive(Debug)]
pub struct Renderer {
    settings: WidgetSettings,
    handle: Option<WidgetHandle>,
    theme: Option<ThemeMode>,
}

impl Renderer {
    pub fn new(settings: WidgetSettings) -> Self {
        Self {
            settings,
            handle: None,
            theme: None,
        }
    }

    pub fn handle(&self) -> Option<&WidgetHandle> {
        self.handle.as_ref()
    }

    pub fn theme(&self) -> Option<ThemeMode> {
        self.theme
    }

    /// Creates the widget on first use, otherwise updates it in place.
    ///
    /// A handle whose root the host has detached is discarded and rebuilt.
    pub fn ensure_widget(
        &mut self,
        doc: &mut Document,
        anchor: NodeId,
        metrics: &ProgressMetrics,
        theme: ThemeMode,
    ) -> Result<WidgetHandle, DomError> {
        if let Some(handle) = self.handle {
            if doc.is_attached(handle.root) {
                self.update(doc, metrics);
                self.apply_theme(doc, theme);
                return Ok(handle);
            }
            debug!("progress widget was detached by the page, rebuilding");
            self.handle = None;
            self.theme = None;
        }

        let handle = self.build(doc)?;
        self.handle = Some(handle);
        self.update(doc, metrics);
        self.apply_theme(doc, theme);
        if let Err(err) = doc.insert_before(anchor, handle.root) {
            self.handle = None;
            self.theme = None;
            return Err(err);
        }
        info!(id = %self.settings.id, "progress widget installed");
        Ok(handle)
    }

    fn build(&self, doc: &mut Document) -> Result<WidgetHandle, DomError> {
        let root = doc.create_element("div");
        doc.set_attribute(root, "id", &self.settings.id);
        for (property, value) in [
            ("border-radius", "4px"),
            ("padding", "10px"),
            ("margin", "10px 0"),
            ("font-size", "14px"),
        ] {
            doc.set_style(root, property, value);
        }

        let title = doc.create_element("div");
        doc.set_style(title, "font-weight", "bold");
        doc.set_style(title, "margin-bottom", "5px");
        doc.set_text(title, &self.settings.title);

        let index_line = doc.create_element("div");
        let time_line = doc.create_element("div");

        let bar = doc.create_element("div");
        doc.set_style(bar, "margin-top", "5px");

        let track = doc.create_element("div");
        doc.set_attribute(track, "class", "progress-bg");
        doc.set_style(track, "border-radius", "2px");
        doc.set_style(track, "height", "8px");

        let fill = doc.create_element("div");
        doc.set_attribute(fill, "class", "progress-bar");
        doc.set_style(fill, "height", "100%");
        doc.set_style(fill, "border-radius", "2px");

        let percent_label = doc.create_element("div");
        doc.set_attribute(percent_label, "class", "progress-text");
        doc.set_style(percent_label, "text-align", "right");
        doc.set_style(percent_label, "font-size", "12px");
        doc.set_style(percent_label, "margin-top", "2px");

        let tree = [
            (track, fill),
            (bar, track),
            (bar, percent_label),
            (root, title),
            (root, index_line),
            (root, time_line),
            (root, bar),
        ];
        for (parent, child) in tree {
            doc.append_child(parent, child)?;
        }

        Ok(WidgetHandle {
            root,
            title,
            index_line,
            time_line,
            track,
            fill,
            percent_label,
        })
    }

    /// Rewrites the four dynamic fields. Returns whether anything changed.
    pub fn update(&mut self, doc: &mut Document, metrics: &ProgressMetrics) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        let percent = metrics.display_percent();
        let index = format!("{}: {}", self.settings.index_label, metrics.display_index());
        let time = format!(
            "{}: {}/{}",
            self.settings.time_label,
            format_time(metrics.watched_seconds),
            format_time(metrics.total_seconds)
        );

        let mut changed = doc.set_text(handle.index_line, &index);
        changed |= doc.set_text(handle.time_line, &time);
        changed |= doc.set_style(handle.fill, "width", &format!("{}%", percent));
        changed |= doc.set_text(handle.percent_label, &format!("{:.1}%", percent));
        changed
    }

    /// Applies the fixed palette for `theme`. Returns false when there is no
    /// widget to paint.
    pub fn apply_theme(&mut self, doc: &mut Document, theme: ThemeMode) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        let palette = theme.palette();
        doc.set_style(handle.root, "background-color", palette.background);
        doc.set_style(handle.root, "color", palette.foreground);
        doc.set_style(handle.index_line, "color", palette.index_label);
        doc.set_style(handle.track, "background-color", palette.track);
        doc.set_style(handle.fill, "background-color", palette.fill);
        doc.set_style(handle.percent_label, "color", palette.percent_label);
        if self.theme != Some(theme) {
            debug!(?theme, "applied widget theme");
        }
        self.theme = Some(theme);
        true
    }

    /// Drops the widget, removing it from the page if it is still there.
    pub fn reset(&mut self, doc: &mut Document) {
        if let Some(handle) = self.handle.take() {
            if doc.is_attached(handle.root) {
                doc.remove(handle.root);
            }
            debug!("progress widget reset");
        }
        self.theme = None;
    }

    pub fn view(&self, doc: &Document) -> Option<WidgetView> {
        let handle = self.handle?;
        Some(WidgetView {
            index: doc.own_text(handle.index_line).to_string(),
            time: doc.own_text(handle.time_line).to_string(),
            fill_width: doc.style(handle.fill, "width").unwrap_or_default().to_string(),
            percent: doc.own_text(handle.percent_label).to_string(),
            theme: self.theme,
        })
    }
}
