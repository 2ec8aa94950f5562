use serde::{Deserialize, Serialize};

use crate::dom::{Document, Selector};

/// Visual theme of the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Dark,
    #[default]
    Light,
}

/// Fixed colors applied to the widget for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub foreground: &'static str,
    pub index_label: &'static str,
    pub track: &'static str,
    pub fill: &'static str,
    pub percent_label: &'static str,
}

const DARK: Palette = Palette {
    background: "#232527",
    foreground: "#e0e0e0",
    index_label: "#aaa",
    track: "#444",
    fill: "#00a1d6",
    percent_label: "#888",
};

const LIGHT: Palette = Palette {
    background: "#f1f2f3",
    foreground: "#212121",
    index_label: "#666",
    track: "#eee",
    fill: "#00a1d6",
    percent_label: "#999",
};

impl ThemeMode {
    pub fn palette(self) -> &'static Palette {
        match self {
            ThemeMode::Dark => &DARK,
            ThemeMode::Light => &LIGHT,
        }
    }
}

/// Locates the host stylesheet link and reads the theme from its address.
#[derive(Debug, Clone)]
pub struct ThemeResolver {
    source: Selector,
    dark_marker: String,
}

impl ThemeResolver {
    pub fn new(source: Selector, dark_marker: &str) -> Self {
        Self {
            source,
            dark_marker: dark_marker.to_string(),
        }
    }

    pub fn source(&self) -> &Selector {
        &self.source
    }

    /// Dark when the style source's `href` contains the dark marker,
    /// light otherwise, including when the source is missing.
    pub fn resolve(&self, doc: &Document) -> ThemeMode {
        let href = doc
            .query_selector(doc.root(), &self.source)
            .and_then(|link| doc.attribute(link, "href"));
        match href {
            Some(href) if href.contains(&self.dark_marker) => ThemeMode::Dark,
            _ => ThemeMode::Light,
        }
    }
}
