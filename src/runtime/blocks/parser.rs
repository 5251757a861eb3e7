//! Parser block: extracts values from a JSON or XML payload into variables
//!
//! Path language: dot-separated segments with optional `$` / `.` root markers
//! and bracketed array indices (`items[0].name`). A leading segment equal to the
//! source variable's name is skipped, so `order.total` and `total` address the
//! same value when the payload lives in `order`. XML paths may end in `@attr`.
//! Paths that do not resolve produce an empty string.

use crate::runtime::executor::{BlockContext, BlockExecutor, BlockOutcome};
use crate::workflow::types::{block_types, Block};
use anyhow::Result;
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use serde_json::Value;

use super::{invalid_config, truncate};

const SUMMARY_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PayloadFormat {
    Json,
    Xml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParserConfig {
    source_variable: String,
    #[serde(default)]
    format: Option<PayloadFormat>,
    #[serde(default)]
    mappings: Vec<Mapping>,
}

#[derive(Debug, Deserialize)]
struct Mapping {
    path: String,
    variable: String,
}

/// Expected config:
/// { "sourceVariable": "response", "format": "Json",
///   "mappings": [{"path": "$.items[0].price", "variable": "price"}] }
#[derive(Debug, Default)]
pub struct ParserExecutor;

/// One path segment: an optional name followed by zero or more indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub name: String,
    pub indices: Vec<usize>,
}

/// Split a path into steps. Returns `None` when an index is not an integer.
pub fn parse_path(path: &str, source_variable: &str) -> Option<Vec<PathStep>> {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);

    let mut steps = Vec::new();
    for segment in trimmed.split('.').filter(|s| !s.is_empty()) {
        let (name, rest) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };

        let mut indices = Vec::new();
        for part in rest.split('[').filter(|p| !p.is_empty()) {
            let index = part.strip_suffix(']')?.trim().parse::<usize>().ok()?;
            indices.push(index);
        }

        steps.push(PathStep { name: name.trim().to_string(), indices });
    }

    if let Some(first) = steps.first_mut() {
        if !source_variable.is_empty() && first.name.eq_ignore_ascii_case(source_variable) {
            first.name.clear();
        }
    }
    steps.retain(|s| !(s.name.is_empty() && s.indices.is_empty()));
    Some(steps)
}

fn is_plain_key(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render steps as a JSONPath expression
fn to_json_path(steps: &[PathStep]) -> String {
    let mut expr = String::from("$");
    for step in steps {
        if !step.name.is_empty() {
            if is_plain_key(&step.name) {
                expr.push('.');
                expr.push_str(&step.name);
            } else {
                expr.push_str(&format!("['{}']", step.name.replace('\'', "\\'")));
            }
        }
        for index in &step.indices {
            expr.push_str(&format!("[{}]", index));
        }
    }
    expr
}

fn json_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn extract_json(document: &Value, steps: &[PathStep]) -> String {
    let expr = to_json_path(steps);
    match jsonpath_lib::select(document, &expr) {
        Ok(found) => found.first().map(|v| json_to_text(v)).unwrap_or_default(),
        Err(e) => {
            tracing::debug!("🔍 JSON path '{}' did not resolve: {:?}", expr, e);
            String::new()
        }
    }
}

/// Minimal element tree for path lookups
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    fn matches(&self, name: &str) -> bool {
        let local = self.name.rsplit(':').next().unwrap_or(&self.name);
        self.name == name || local == name
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Own text followed by descendants' text
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text_content());
        }
        out
    }
}

fn element_from(start: &BytesStart) -> Result<XmlElement> {
    let mut element = XmlElement {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..Default::default()
    };
    for attr in start.attributes() {
        let attr = attr?;
        element.attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()?.into_owned(),
        ));
    }
    Ok(element)
}

pub fn parse_xml(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_none() => *root = Some(element),
            None => {}
        }
    }

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| anyhow::anyhow!("XML document has no root element"))
}

pub fn extract_xml(root: &XmlElement, steps: &[PathStep]) -> String {
    let mut steps = steps;
    if let Some(first) = steps.first() {
        if root.matches(&first.name) && first.indices.iter().all(|i| *i == 0) {
            steps = &steps[1..];
        }
    }

    let mut current = root;
    for (position, step) in steps.iter().enumerate() {
        if let Some(attribute) = step.name.strip_prefix('@') {
            if position + 1 != steps.len() {
                return String::new();
            }
            return current.attribute(attribute).unwrap_or_default().to_string();
        }

        let index = step.indices.first().copied().unwrap_or(0);
        let next = if step.name.is_empty() {
            current.children.get(index)
        } else {
            current.children.iter().filter(|c| c.matches(&step.name)).nth(index)
        };

        match next {
            Some(element) => current = element,
            None => return String::new(),
        }
    }

    current.text_content()
}

enum Document {
    Json(Value),
    Xml(XmlElement),
}

impl Document {
    fn parse(payload: &str, format: Option<PayloadFormat>) -> Result<Self> {
        let format = format.unwrap_or(if payload.trim_start().starts_with('<') {
            PayloadFormat::Xml
        } else {
            PayloadFormat::Json
        });

        match format {
            PayloadFormat::Json => Ok(Document::Json(
                serde_json::from_str(payload).map_err(|e| anyhow::anyhow!("invalid JSON payload: {}", e))?,
            )),
            PayloadFormat::Xml => Ok(Document::Xml(
                parse_xml(payload).map_err(|e| anyhow::anyhow!("invalid XML payload: {}", e))?,
            )),
        }
    }

    fn extract(&self, steps: &[PathStep]) -> String {
        match self {
            Document::Json(value) => extract_json(value, steps),
            Document::Xml(root) => extract_xml(root, steps),
        }
    }
}

#[async_trait]
impl BlockExecutor for ParserExecutor {
    fn name(&self) -> &'static str {
        "Parser"
    }

    fn can_execute(&self, block: &Block) -> bool {
        block.is_type(block_types::PARSER)
    }

    async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome {
        let config: ParserConfig = match block.parse_config() {
            Ok(config) => config,
            Err(e) => return invalid_config(block, e),
        };

        let payload = ctx.variables.get_or_empty(&config.source_variable);
        if payload.trim().is_empty() {
            return BlockOutcome::error(format!(
                "Parser {}: source variable '{}' is empty",
                block.name, config.source_variable
            ));
        }

        let document = match Document::parse(&payload, config.format) {
            Ok(document) => document,
            Err(e) => return BlockOutcome::error(format!("Parser {}: {}", block.name, e)),
        };

        let mut applied = Vec::with_capacity(config.mappings.len());
        for mapping in &config.mappings {
            if mapping.variable.trim().is_empty() {
                continue;
            }
            let value = parse_path(&mapping.path, &config.source_variable)
                .map(|steps| document.extract(&steps))
                .unwrap_or_default();
            applied.push(format!("{} = {}", mapping.variable, value));
            ctx.variables.set(&mapping.variable, value);
        }

        let summary = format!("Parser {}: {}", block.name, applied.join("; "));
        BlockOutcome::success(truncate(&summary, SUMMARY_LIMIT))
    }
}
