//! Compound simple selectors: `tag#id.class[attr="value"]`, no combinators.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

static SELECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^([A-Za-z][\w-]*)?((?:[#.][\w-]+|\[[\w-]+(?:="[^"]*")?\])*)$"#)
        .expect("selector grammar is a valid regex")
});

static PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([#.])([\w-]+)|\[([\w-]+)(?:="([^"]*)")?\]"#)
        .expect("selector part grammar is a valid regex")
});

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unsupported selector syntax: {0:?}")]
    Syntax(String),
    #[error("selector {0:?} names more than one id")]
    DuplicateId(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Selector {
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Attribute constraints; `None` means presence only.
    pub fn attributes(&self) -> &[(String, Option<String>)] {
        &self.attributes
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let source = s.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }
        let caps = SELECTOR
            .captures(source)
            .ok_or_else(|| SelectorError::Syntax(source.to_string()))?;

        let mut selector = Selector {
            source: source.to_string(),
            tag: caps.get(1).map(|m| m.as_str().to_ascii_lowercase()),
            id: None,
            classes: Vec::new(),
            attributes: Vec::new(),
        };

        let rest = caps.get(2).map_or("", |m| m.as_str());
        for part in PART.captures_iter(rest) {
            match (part.get(1).map(|m| m.as_str()), part.get(2), part.get(3)) {
                (Some("#"), Some(name), _) => {
                    if selector.id.is_some() {
                        return Err(SelectorError::DuplicateId(source.to_string()));
                    }
                    selector.id = Some(name.as_str().to_string());
                }
                (Some(_), Some(name), _) => selector.classes.push(name.as_str().to_string()),
                (None, _, Some(attr)) => selector.attributes.push((
                    attr.as_str().to_string(),
                    part.get(4).map(|m| m.as_str().to_string()),
                )),
                _ => return Err(SelectorError::Syntax(source.to_string())),
            }
        }
        Ok(selector)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
