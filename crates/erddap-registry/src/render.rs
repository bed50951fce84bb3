//! datasets.xml rendering
//!
//! Output is fully determined by the registry: UTF-8, four-space indent,
//! settings before datasets, everything else in stored order. A registry
//! that renders successfully loads back equal to itself, so structures the
//! loader could not reproduce are rejected instead of written.

use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;

use erddap_fs::{NormalizedPath, io};
use quick_xml::escape::{escape, partial_escape};
use regex::Regex;

use crate::model::{DATASET_ID_ATTRIBUTE, Dataset, Registry, TYPE_ATTRIBUTE};
use crate::parser::{DATASET_ELEMENT, ROOT_ELEMENT, is_xml_whitespace};
use crate::value::{Attributes, Block, Value};
use crate::{Error, Result};

/// XML declaration written at the top of every document
pub const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

const INDENT: &str = "    ";

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}_][\p{L}\p{N}._\-:]*$").expect("name pattern is valid")
});

/// Render `registry` as a datasets.xml document.
pub fn render(registry: &Registry) -> Result<Vec<u8>> {
    render_to_string(registry).map(String::into_bytes)
}

pub fn render_to_string(registry: &Registry) -> Result<String> {
    let mut out = Renderer::default();
    out.line(0, DECLARATION);
    out.line(0, &format!("<{ROOT_ELEMENT}>"));

    for (name, value) in registry.settings() {
        if name == DATASET_ELEMENT {
            return Err(Error::render(
                format!("setting <{name}>"),
                "top-level settings cannot use the dataset element name",
            ));
        }
        out.value(1, name, value, &format!("setting <{name}>"))?;
    }

    for (key, dataset) in registry.ids().zip(registry.datasets()) {
        if dataset.id != key {
            return Err(Error::render(
                format!("dataset '{key}'"),
                format!("datasetID was changed to '{}'", dataset.id),
            ));
        }
        out.dataset(dataset)?;
    }

    out.line(0, &format!("</{ROOT_ELEMENT}>"));
    Ok(out.buf)
}

/// Render `registry` and write it to `path` atomically.
///
/// Nothing is written if rendering fails.
pub fn write(registry: &Registry, path: impl AsRef<Path>) -> Result<()> {
    let bytes = render(registry)?;
    let path = NormalizedPath::new(path.as_ref());
    io::write_atomic(&path, &bytes)?;
    tracing::info!(path = %path, datasets = registry.len(), "Wrote datasets document");
    Ok(())
}

#[derive(Default)]
struct Renderer {
    buf: String,
}

impl Renderer {
    fn line(&mut self, depth: usize, content: &str) {
        for _ in 0..depth {
            self.buf.push_str(INDENT);
        }
        self.buf.push_str(content);
        self.buf.push('\n');
    }

    fn dataset(&mut self, dataset: &Dataset) -> Result<()> {
        let location = format!("dataset '{}'", dataset.id);
        if dataset.id.trim().is_empty() {
            return Err(Error::render(location, "empty datasetID"));
        }
        if let Some(name) = dataset.conflicting_name() {
            return Err(Error::render(
                location,
                format!("'{name}' is both an attribute and an element"),
            ));
        }
        if let Some(name) = dataset
            .attributes
            .keys()
            .find(|name| *name == TYPE_ATTRIBUTE || *name == DATASET_ID_ATTRIBUTE)
        {
            return Err(Error::render(location, format!("reserved attribute '{name}'")));
        }

        let mut tag = String::from(DATASET_ELEMENT);
        if !dataset.kind.is_empty() {
            push_attribute(&mut tag, TYPE_ATTRIBUTE, &dataset.kind, &location)?;
        }
        push_attribute(&mut tag, DATASET_ID_ATTRIBUTE, &dataset.id, &location)?;
        push_attributes(&mut tag, &dataset.attributes, &location)?;

        if dataset.fields.is_empty() {
            self.line(1, &format!("<{tag} />"));
            return Ok(());
        }

        self.line(1, &format!("<{tag}>"));
        for (name, value) in &dataset.fields {
            self.value(2, name, value, &format!("{location}, <{name}>"))?;
        }
        self.line(1, &format!("</{DATASET_ELEMENT}>"));
        Ok(())
    }

    fn value(&mut self, depth: usize, name: &str, value: &Value, location: &str) -> Result<()> {
        check_name(name, location)?;
        match value {
            Value::Text(text) => self.scalar(depth, name, text, location),
            Value::Number(number) => self.scalar(depth, name, number.as_str(), location),
            Value::Block(block) => {
                if block.is_text_only() {
                    return Err(Error::render(
                        location,
                        "block without attributes or children would load back as a scalar",
                    ));
                }
                self.block(depth, name, block, location)
            }
            Value::List(blocks) => {
                if blocks.len() < 2 {
                    return Err(Error::render(
                        location,
                        format!("list needs at least two entries, found {}", blocks.len()),
                    ));
                }
                for (index, block) in blocks.iter().enumerate() {
                    self.block(depth, name, block, &format!("{location}[{index}]"))?;
                }
                Ok(())
            }
        }
    }

    fn scalar(&mut self, depth: usize, name: &str, text: &str, location: &str) -> Result<()> {
        if text.is_empty() {
            self.line(depth, &format!("<{name} />"));
        } else {
            let text = escape_text(text, location)?;
            self.line(depth, &format!("<{name}>{text}</{name}>"));
        }
        Ok(())
    }

    fn block(&mut self, depth: usize, name: &str, block: &Block, location: &str) -> Result<()> {
        let mut tag = name.to_string();
        push_attributes(&mut tag, &block.attributes, location)?;
        let text = escape_text(&block.text, location)?;

        if block.children.is_empty() {
            if text.is_empty() {
                self.line(depth, &format!("<{tag} />"));
            } else {
                self.line(depth, &format!("<{tag}>{text}</{name}>"));
            }
            return Ok(());
        }

        self.line(depth, &format!("<{tag}>{text}"));
        for (child, value) in &block.children {
            self.value(depth + 1, child, value, &format!("{location}, <{child}>"))?;
        }
        self.line(depth, &format!("</{name}>"));
        Ok(())
    }
}

fn check_name(name: &str, location: &str) -> Result<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::render(location, format!("'{name}' is not a valid XML name")))
    }
}

fn check_chars(text: &str, location: &str) -> Result<()> {
    match text.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(Error::render(
            location,
            format!("character U+{:04X} is not allowed in XML", c as u32),
        )),
        None => Ok(()),
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..)
}

fn escape_text<'a>(text: &'a str, location: &str) -> Result<Cow<'a, str>> {
    check_chars(text, location)?;
    let core = text.trim_matches(is_xml_whitespace);
    if core.len() == text.len() {
        return Ok(escape_core(text));
    }

    // Leading and trailing whitespace goes out as character references so
    // the loader does not mistake it for indentation.
    let lead = text.len() - text.trim_start_matches(is_xml_whitespace).len();
    let mut out = String::with_capacity(text.len() + 16);
    push_whitespace_refs(&mut out, &text[..lead]);
    out.push_str(&escape_core(core));
    push_whitespace_refs(&mut out, &text[lead + core.len()..]);
    Ok(Cow::Owned(out))
}

fn escape_core(text: &str) -> Cow<'_, str> {
    let escaped = partial_escape(text);
    if escaped.contains('\r') {
        return Cow::Owned(escaped.replace('\r', "&#13;"));
    }
    escaped
}

fn push_whitespace_refs(out: &mut String, whitespace: &str) {
    for c in whitespace.chars() {
        out.push_str(&format!("&#{};", c as u32));
    }
}

fn push_attributes(tag: &mut String, attributes: &Attributes, location: &str) -> Result<()> {
    for (name, value) in attributes {
        push_attribute(tag, name, value, location)?;
    }
    Ok(())
}

fn push_attribute(tag: &mut String, name: &str, value: &str, location: &str) -> Result<()> {
    check_name(name, location)?;
    check_chars(value, location)?;
    // Whitespace other than spaces is written as character references so
    // attribute-value normalization cannot change it on the next load.
    let value = escape(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;");
    tag.push(' ');
    tag.push_str(name);
    tag.push_str("=\"");
    tag.push_str(&value);
    tag.push('"');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn render_one(dataset: Dataset) -> Result<String> {
        render_to_string(&[dataset].into_iter().collect())
    }

    #[test]
    fn test_empty_registry() {
        let out = render_to_string(&Registry::new()).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<erddapDatasets>\n</erddapDatasets>\n"
        );
    }

    #[test]
    fn test_dataset_without_fields_is_self_closing() {
        let out = render_one(Dataset::new("x", "").with_attribute("active", "false")).unwrap();
        assert!(out.contains("    <dataset datasetID=\"x\" active=\"false\" />\n"));
    }

    #[test]
    fn test_attribute_escaping() {
        let out = render_one(
            Dataset::new("x", "EDDGridFromDap").with_field(
                "addAttributes",
                Block::new().with_attribute("note", "a \"b\" <c>\n\td"),
            ),
        )
        .unwrap();
        assert!(out.contains(r#"<addAttributes note="a &quot;b&quot; &lt;c&gt;&#10;&#9;d" />"#));
    }

    #[test]
    fn test_text_escaping() {
        let out = render_one(Dataset::new("x", "").with_field("summary", "T & S <surface>")).unwrap();
        assert!(out.contains("<summary>T &amp; S &lt;surface&gt;</summary>"));
    }

    #[rstest]
    #[case::bad_field_name(Dataset::new("x", "").with_field("1st", "a"))]
    #[case::space_in_name(Dataset::new("x", "").with_field("source url", "a"))]
    #[case::control_char(Dataset::new("x", "").with_field("title", "a\u{1}b"))]
    #[case::short_list(Dataset::new("x", "").with_field("att", vec![Block::new()]))]
    #[case::bare_block(Dataset::new("x", "").with_field("title", Block::new().with_text("a")))]
    #[case::reserved_attribute(Dataset::new("x", "").with_attribute("type", "a"))]
    #[case::conflict(Dataset::new("x", "").with_attribute("active", "true").with_field("active", "false"))]
    #[case::empty_id(Dataset::new(" ", ""))]
    fn test_unrenderable_dataset(#[case] dataset: Dataset) {
        assert!(matches!(render_one(dataset), Err(Error::Render { .. })));
    }

    fn load_back(out: &str) -> Registry {
        let doc = crate::parser::parse_document(Path::new("rendered.xml"), out).unwrap();
        let mut registry: Registry = doc.datasets.into_iter().collect();
        for (name, value) in doc.settings {
            registry.set_setting(name, value);
        }
        registry
    }

    #[test]
    fn test_edge_whitespace_is_written_as_references() {
        let out = render_one(
            Dataset::new("x", "")
                .with_field("summary", " padded ")
                .with_field("blank", " ")
                .with_field("inner", "a  b"),
        )
        .unwrap();
        assert!(out.contains("<summary>&#32;padded&#32;</summary>"));
        assert!(out.contains("<blank>&#32;</blank>"));
        assert!(out.contains("<inner>a  b</inner>"));
    }

    #[test]
    fn test_edge_whitespace_loads_back_unchanged() {
        let mut registry: Registry = [Dataset::new("x", "EDDGridFromDap")
            .with_field("summary", Value::Text(" padded ".into()))
            .with_field(
                "addAttributes",
                Block::new()
                    .with_attribute("name", "title")
                    .with_text("\n SST\t"),
            )]
        .into_iter()
        .collect();
        registry.set_setting(
            "user",
            Block::new().with_attribute("username", "jdoe").with_text("\tadmin\n"),
        );

        let out = render_to_string(&registry).unwrap();
        assert_eq!(load_back(&out), registry);
    }

    #[test]
    fn test_changed_dataset_id_is_rejected() {
        let mut registry: Registry = [Dataset::new("a", ""), Dataset::new("b", "")]
            .into_iter()
            .collect();
        registry.dataset_mut("b").unwrap().id = "a".into();

        let err = render_to_string(&registry).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot render dataset 'b': datasetID was changed to 'a'"
        );
    }

    #[test]
    fn test_setting_named_dataset_is_rejected() {
        let mut registry = Registry::new();
        registry.set_setting("dataset", "x");
        assert!(matches!(render_to_string(&registry), Err(Error::Render { .. })));
    }

    #[test]
    fn test_error_names_location() {
        let err = render_one(Dataset::new("buoy1", "").with_field("att", vec![Block::new()]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot render dataset 'buoy1', <att>: list needs at least two entries, found 1"
        );
    }
}
