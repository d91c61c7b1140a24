//! Content parsing for namespaces published as whole documents.
//!
//! A namespace named `db.yaml` is delivered with its document in a single
//! `content` key. The parser registered for its extension turns that
//! document into flat dotted keys.

use crate::error::{ConfigError, Result};
use config::{Config, File, FileFormat};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Key holding the raw document of a non-properties namespace.
pub const CONTENT_KEY: &str = "content";

/// Namespace format, derived from the namespace name's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFileFormat {
    /// Plain key/value namespace, no extension
    Properties,
    /// `.xml`
    Xml,
    /// `.json`
    Json,
    /// `.yml`
    Yml,
    /// `.yaml`
    Yaml,
    /// `.txt`
    Txt,
}

impl ConfigFileFormat {
    /// Format of `namespace`, by extension. Unknown extensions are properties.
    pub fn from_namespace(namespace: &str) -> Self {
        match namespace.rsplit_once('.').map(|(_, ext)| ext) {
            Some("xml") => Self::Xml,
            Some("json") => Self::Json,
            Some("yml") => Self::Yml,
            Some("yaml") => Self::Yaml,
            Some("txt") => Self::Txt,
            _ => Self::Properties,
        }
    }

    /// Extension including the leading dot, empty for properties.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Properties => "",
            Self::Xml => ".xml",
            Self::Json => ".json",
            Self::Yml => ".yml",
            Self::Yaml => ".yaml",
            Self::Txt => ".txt",
        }
    }
}

/// Turns a namespace document into flat key/value pairs.
pub trait ContentParser: Send + Sync {
    /// Parse `content`. An empty document yields an empty map.
    fn parse(&self, content: &str) -> Result<HashMap<String, Value>>;
}

/// Parses structured documents with the `config` crate and flattens nested
/// tables into dotted keys (`db: {host: x}` becomes `db.host`).
#[derive(Debug, Clone, Copy)]
pub struct StructuredParser {
    format: FileFormat,
}

impl StructuredParser {
    /// Parser for `format`.
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// YAML parser.
    pub fn yaml() -> Self {
        Self::new(FileFormat::Yaml)
    }

    /// JSON parser.
    pub fn json() -> Self {
        Self::new(FileFormat::Json)
    }
}

impl ContentParser for StructuredParser {
    fn parse(&self, content: &str) -> Result<HashMap<String, Value>> {
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let document: Value = Config::builder()
            .add_source(File::from_str(content, self.format))
            .build()
            .and_then(|config| config.try_deserialize::<Value>())
            .map_err(|e| ConfigError::Decode(format!("Failed to parse content: {}", e)))?;

        let mut flat = HashMap::new();
        match document {
            Value::Object(map) => flatten("", map, &mut flat),
            Value::Null => {}
            other => {
                flat.insert(CONTENT_KEY.to_string(), other);
            }
        }
        Ok(flat)
    }
}

fn flatten(prefix: &str, map: Map<String, Value>, out: &mut HashMap<String, Value>) {
    for (key, value) in map {
        let key = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => flatten(&key, nested, out),
            value => {
                out.insert(key, value);
            }
        }
    }
}

/// Registry of content parsers by namespace format.
///
/// By default YAML parsers are registered for `.yaml` and `.yml`
/// namespaces. Namespaces without a registered parser keep their raw
/// `content` key.
///
/// # Examples
///
/// ```rust
/// use apollo_client::sources::{ConfigFileFormat, FormatParsers, StructuredParser};
/// use std::sync::Arc;
///
/// let parsers = FormatParsers::default()
///     .with_parser(ConfigFileFormat::Json, Arc::new(StructuredParser::json()));
/// assert!(parsers.parser_for("feature.json").is_some());
/// ```
#[derive(Clone)]
pub struct FormatParsers {
    parsers: HashMap<ConfigFileFormat, Arc<dyn ContentParser>>,
}

impl FormatParsers {
    /// A registry with no parsers.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register `parser` for `format`, replacing any previous one.
    pub fn with_parser(mut self, format: ConfigFileFormat, parser: Arc<dyn ContentParser>) -> Self {
        self.parsers.insert(format, parser);
        self
    }

    /// Parser for the format of `namespace`.
    pub fn parser_for(&self, namespace: &str) -> Option<&Arc<dyn ContentParser>> {
        self.parsers.get(&ConfigFileFormat::from_namespace(namespace))
    }

    /// Expand the `content` key of `namespace` if a parser is registered.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Decode`] if the document cannot be parsed.
    pub fn expand(
        &self,
        namespace: &str,
        configurations: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>> {
        let Some(parser) = self.parser_for(namespace) else {
            return Ok(configurations);
        };
        match configurations.get(CONTENT_KEY) {
            Some(Value::String(content)) => parser.parse(content),
            Some(Value::Null) | None => Ok(HashMap::new()),
            Some(other) => Err(ConfigError::Decode(format!(
                "content of namespace {} is not a string: {}",
                namespace, other
            ))),
        }
    }
}

impl Default for FormatParsers {
    fn default() -> Self {
        let yaml: Arc<dyn ContentParser> = Arc::new(StructuredParser::yaml());
        Self::empty()
            .with_parser(ConfigFileFormat::Yaml, Arc::clone(&yaml))
            .with_parser(ConfigFileFormat::Yml, yaml)
    }
}

impl std::fmt::Debug for FormatParsers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatParsers")
            .field("formats", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}
