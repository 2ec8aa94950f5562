#![allow(dead_code)]

use playlist_progress::dom::{Document, NodeFixture, PageFixture, Selector, SharedDocument};
use serde_json::json;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A playlist container holding one item per duration token.
pub fn playlist(durations: &[&str], active: usize) -> NodeFixture {
    let items: Vec<serde_json::Value> = durations
        .iter()
        .enumerate()
        .map(|(i, duration)| {
            let class = if i == active {
                "simple-base-item video-pod__item active normal"
            } else {
                "simple-base-item video-pod__item normal"
            };
            json!({
                "tag": "div",
                "class": class,
                "children": [
                    {"tag": "div", "class": "title", "text": format!("P{}", i + 1)},
                    {"tag": "div", "class": "stat-item duration", "text": duration}
                ]
            })
        })
        .collect();
    serde_json::from_value(json!({
        "tag": "div",
        "class": "video-pod__list",
        "children": items
    }))
    .expect("valid playlist fixture")
}

/// A video page with an optional theme stylesheet and an optional playlist.
pub fn page(theme_href: Option<&str>, playlist: Option<NodeFixture>) -> SharedDocument {
    let mut head = Vec::new();
    if let Some(href) = theme_href {
        head.push(json!({"tag": "link", "id": "__css-map__", "attrs": {"href": href}}));
    }
    let mut panel = json!({"tag": "div", "class": "video-pod", "children": []});
    if let Some(playlist) = playlist {
        panel["children"] = json!([serde_json::to_value(playlist).expect("serializable fixture")]);
    }
    let fixture: PageFixture = serde_json::from_value(json!({
        "location": "https://www.bilibili.com/video/BV1xx411c7mD",
        "children": [
            {"tag": "head", "children": head},
            {"tag": "body", "children": [panel]}
        ]
    }))
    .expect("valid page fixture");
    SharedDocument::new(Document::from_fixture(&fixture).expect("buildable page"))
}

pub fn widget_count(doc: &SharedDocument) -> usize {
    let selector: Selector = "#playlist-progress-display".parse().expect("valid selector");
    let doc = doc.lock();
    doc.query_selector_all(doc.root(), &selector).len()
}
