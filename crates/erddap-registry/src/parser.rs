//! datasets.xml parsing
//!
//! Reads one document into an element tree with quick-xml, then maps the
//! tree onto settings and datasets.

use std::ops::Range;
use std::path::Path;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::model::{DATASET_ID_ATTRIBUTE, Dataset, TYPE_ATTRIBUTE};
use crate::value::{Attributes, Block, Fields, Value};
use crate::{Error, Result};

/// Root element of every datasets.xml document and fragment
pub const ROOT_ELEMENT: &str = "erddapDatasets";

/// Element introducing one dataset
pub const DATASET_ELEMENT: &str = "dataset";

/// The content of one parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Top-level children of the root that are not datasets
    pub settings: Fields,
    /// Datasets in document order
    pub datasets: Vec<Dataset>,
}

#[derive(Debug)]
struct Element {
    name: String,
    attributes: Attributes,
    text: String,
    /// Span of `text` between the first and last characters that are not
    /// literal whitespace in the source
    content: Option<Range<usize>>,
    children: Vec<Element>,
}

impl Element {
    fn push_literal(&mut self, raw: &str) {
        self.text.push_str(raw);
    }

    fn push_content(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let start = self.text.len();
        self.text.push_str(text);
        let end = self.text.len();
        self.content = Some(match self.content.take() {
            Some(span) => span.start..end,
            None => start..end,
        });
    }

    /// Drop the literal whitespace around the content. Whitespace written as
    /// character references or inside CDATA is kept.
    fn trim(&mut self) {
        let text = match self.content.take() {
            Some(span) => self.text[span].to_string(),
            None => String::new(),
        };
        self.text = text;
    }
}

pub(crate) fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Parse one datasets.xml document. `path` is only used in error messages.
pub fn parse_document(path: &Path, source: &str) -> Result<Document> {
    let root = parse_tree(path, source)?;
    if root.name != ROOT_ELEMENT {
        return Err(Error::UnexpectedRoot {
            path: path.to_path_buf(),
            found: root.name,
        });
    }

    let mut settings = Elements::default();
    let mut datasets: Vec<Dataset> = Vec::new();

    for child in root.children {
        if child.name != DATASET_ELEMENT {
            settings.push(child);
            continue;
        }

        let dataset = element_to_dataset(path, child)?;
        if datasets.iter().any(|d| d.id == dataset.id) {
            return Err(Error::DuplicateDataset {
                id: dataset.id,
                path: path.to_path_buf(),
            });
        }
        datasets.push(dataset);
    }

    Ok(Document {
        settings: settings.into_fields(),
        datasets,
    })
}

fn parse_tree(path: &Path, source: &str) -> Result<Element> {
    let mut reader = Reader::from_str(source);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::parse(
                path,
                format!("{} (near byte {})", e, reader.buffer_position()),
            )
        })?;

        match event {
            Event::Start(start) => stack.push(open_element(path, &start)?),
            Event::Empty(start) => {
                let element = open_element(path, &start)?;
                attach(path, &mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::parse(path, "unexpected closing tag"))?;
                attach(path, &mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let raw = std::str::from_utf8(&text).map_err(|e| Error::parse(path, e.to_string()))?;
                append_text(path, &mut stack, raw)?;
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                match stack.last_mut() {
                    Some(element) => element.push_content(&text),
                    None => return Err(Error::parse(path, "CDATA outside the root element")),
                }
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::parse(
            path,
            format!("unclosed element <{}>", open.name),
        ));
    }
    root.ok_or_else(|| Error::parse(path, "document has no root element"))
}

fn open_element(path: &Path, start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Attributes::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| {
            Error::parse(path, format!("invalid attribute on <{name}>: {e}"))
        })?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| Error::parse(path, format!("invalid value for {key} on <{name}>: {e}")))?
            .into_owned();
        attributes.insert(key, value);
    }
    Ok(Element {
        name,
        attributes,
        text: String::new(),
        content: None,
        children: Vec::new(),
    })
}

fn attach(
    path: &Path,
    stack: &mut [Element],
    root: &mut Option<Element>,
    mut element: Element,
) -> Result<()> {
    element.trim();

    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_some() {
        Err(Error::parse(
            path,
            format!("second root element <{}>", element.name),
        ))
    } else {
        *root = Some(element);
        Ok(())
    }
}

/// Append one raw (still escaped) text event to the open element.
fn append_text(path: &Path, stack: &mut [Element], raw: &str) -> Result<()> {
    let core = raw.trim_matches(is_xml_whitespace);
    let Some(element) = stack.last_mut() else {
        return if core.is_empty() {
            Ok(())
        } else {
            Err(Error::parse(path, "text outside the root element"))
        };
    };
    if core.is_empty() {
        element.push_literal(raw);
        return Ok(());
    }

    let lead = raw.len() - raw.trim_start_matches(is_xml_whitespace).len();
    let text = unescape(core).map_err(|e| Error::parse(path, e.to_string()))?;
    element.push_literal(&raw[..lead]);
    element.push_content(&text);
    element.push_literal(&raw[lead + core.len()..]);
    Ok(())
}

fn element_to_dataset(path: &Path, element: Element) -> Result<Dataset> {
    let mut attributes = element.attributes;
    let id = attributes
        .shift_remove(DATASET_ID_ATTRIBUTE)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::MissingDatasetId {
            path: path.to_path_buf(),
        })?;
    let kind = attributes.shift_remove(TYPE_ATTRIBUTE).unwrap_or_default();

    let mut fields = Elements::default();
    for child in element.children {
        fields.push(child);
    }

    let dataset = Dataset {
        id,
        kind,
        attributes,
        fields: fields.into_fields(),
    };
    if let Some(name) = dataset.conflicting_name() {
        return Err(Error::AttributeConflict {
            id: dataset.id.clone(),
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(dataset)
}

/// Groups sibling elements by tag, turning repeated tags into lists.
#[derive(Default)]
struct Elements {
    fields: Fields,
}

impl Elements {
    fn push(&mut self, element: Element) {
        let name = element.name.clone();
        let value = element_to_value(element);
        match self.fields.get_mut(&name) {
            None => {
                self.fields.insert(name, value);
            }
            Some(existing) => {
                let previous = std::mem::replace(existing, Value::List(Vec::new()));
                let mut blocks = match previous {
                    Value::List(blocks) => blocks,
                    other => vec![other.into_block()],
                };
                blocks.push(value.into_block());
                *existing = Value::List(blocks);
            }
        }
    }

    fn into_fields(self) -> Fields {
        self.fields
    }
}

fn element_to_value(element: Element) -> Value {
    if element.attributes.is_empty() && element.children.is_empty() {
        return Value::scalar(element.text);
    }

    let mut children = Elements::default();
    for child in element.children {
        children.push(child);
    }
    Value::Block(Block {
        attributes: element.attributes,
        text: element.text,
        children: children.into_fields(),
    })
}
