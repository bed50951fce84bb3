//! Typed configuration values
//!
//! Dataset configuration is loosely typed in datasets.xml. Every element is
//! mapped onto one of four shapes so the renderer can reproduce it without
//! guessing: a text scalar, a numeric scalar, a nested block, or an ordered
//! list of blocks for tags that repeat under one parent.

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

/// Ordered element name -> value mapping
pub type Fields = IndexMap<String, Value>;

/// Ordered XML attribute name -> value mapping
pub type Attributes = IndexMap<String, String>;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$")
        .expect("number pattern is valid")
});

/// A numeric scalar.
///
/// Keeps the lexeme exactly as written so `010` or `1.50` render back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Number(String);

impl Number {
    /// Parse a decimal numeric literal, returning `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        NUMBER_RE.is_match(text).then(|| Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An element carrying XML attributes and/or child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Block {
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub children: Fields,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.children.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// True when the block carries neither attributes nor children.
    pub fn is_text_only(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }
}

/// A configuration value.
///
/// `List` holds two or more blocks; a lone element is never a list.
/// Scalars compare by their text, so `Text("5")` equals `Number(5)`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(Number),
    Block(Block),
    List(Vec<Block>),
}

impl Value {
    /// Classify scalar text as a number or plain text.
    pub fn scalar(text: impl Into<String>) -> Self {
        let text = text.into();
        match Number::parse(&text) {
            Some(number) => Self::Number(number),
            None => Self::Text(text),
        }
    }

    /// Text of a scalar value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(number) => Some(number.as_str()),
            Self::Block(_) | Self::List(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Self::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Block]> {
        match self {
            Self::List(blocks) => Some(blocks),
            _ => None,
        }
    }

    /// Convert into one list entry. Scalars become text-only blocks.
    ///
    /// A list flattens into its first entry; callers only pass non-list
    /// values when growing a list.
    pub(crate) fn into_block(self) -> Block {
        match self {
            Self::Text(text) => Block::new().with_text(text),
            Self::Number(number) => Block::new().with_text(number.0),
            Self::Block(block) => block,
            Self::List(blocks) => blocks.into_iter().next().unwrap_or_default(),
        }
    }

    /// One-line description for reports.
    pub fn summary(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
            Self::Block(block) => {
                let mut parts: Vec<String> = block
                    .attributes
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                if !block.children.is_empty() {
                    parts.push(format!("{} children", block.children.len()));
                }
                if !block.text.is_empty() {
                    parts.push(block.text.clone());
                }
                format!("{{{}}}", parts.join(", "))
            }
            Self::List(blocks) => format!("[{} entries]", blocks.len()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Block(a), Self::Block(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (a, b) => match (a.as_text(), b.as_text()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::scalar(text)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::scalar(text)
    }
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        Self::Number(number)
    }
}

impl From<Block> for Value {
    fn from(block: Block) -> Self {
        Self::Block(block)
    }
}

impl From<Vec<Block>> for Value {
    fn from(blocks: Vec<Block>) -> Self {
        Self::List(blocks)
    }
}
