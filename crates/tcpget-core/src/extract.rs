// # Field Extractor
//
// Scans a reply chunk for caller-defined fields.
//
// Each rule names a start-match string, a byte offset counted from the end
// of the match, and either a fixed length or a single terminating byte.
// Rules are applied independently: a missing field never stops the others
// from being extracted.
//
// ## Usage
//
// ```rust,ignore
// use tcpget_core::extract::{ExtractionRule, FieldExtractor};
//
// let extractor = FieldExtractor::new(
//     "\r\n\r\n",
//     vec![ExtractionRule::delimited("temp", "TEMP:", 0, ',')],
// )?;
// let mut results = extractor.results();
// extractor.extract(b"...TEMP:23.5,HUM:60\r\n\r\n", &mut results);
// assert_eq!(results.require("temp")?, "23.5");
// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Size of a field buffer, including room for a trailing NUL
///
/// Extracted data never exceeds `MAX_FIELD_LEN - 1` bytes, whatever the
/// rule asks for and whether or not the terminating byte shows up.
pub const MAX_FIELD_LEN: usize = 256;

/// How many bytes a rule copies once its start match is found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLength {
    /// Exactly this many bytes (bounded by the chunk and the field buffer)
    Fixed(usize),
    /// Everything up to, and excluding, this byte
    Until(u8),
}

/// A recipe for locating and copying one field out of a reply
///
/// A `len` of 0 selects delimiter mode, in which case `terminator` is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// Name used to look the field up in [`ExtractionResults`]
    #[serde(default)]
    pub name: String,

    /// Byte-exact, case-sensitive marker to search for
    pub start_match: String,

    /// Bytes to skip between the end of the match and the data
    #[serde(default)]
    pub offset: usize,

    /// Fixed field length, or 0 to scan until `terminator`
    #[serde(default)]
    pub len: usize,

    /// Terminating character for delimiter mode
    #[serde(default)]
    pub terminator: Option<char>,
}

impl ExtractionRule {
    /// Rule copying a fixed number of bytes
    pub fn fixed(name: impl Into<String>, start_match: impl Into<String>, offset: usize, len: usize) -> Self {
        Self {
            name: name.into(),
            start_match: start_match.into(),
            offset,
            len,
            terminator: None,
        }
    }

    /// Rule copying bytes until `terminator`
    pub fn delimited(
        name: impl Into<String>,
        start_match: impl Into<String>,
        offset: usize,
        terminator: char,
    ) -> Self {
        Self {
            name: name.into(),
            start_match: start_match.into(),
            offset,
            len: 0,
            terminator: Some(terminator),
        }
    }

    /// Resolve the length sentinel into a [`FieldLength`]
    pub fn length(&self) -> Result<FieldLength> {
        if self.len > 0 {
            return Ok(FieldLength::Fixed(self.len));
        }

        match self.terminator {
            Some(c) if c.is_ascii() => Ok(FieldLength::Until(c as u8)),
            Some(c) => Err(Error::invalid_input(format!(
                "Rule '{}': terminator {:?} is not a single byte",
                self.name, c
            ))),
            None => Err(Error::invalid_input(format!(
                "Rule '{}': len 0 requires a terminator",
                self.name
            ))),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.start_match.is_empty() {
            return Err(Error::invalid_input(format!(
                "Rule '{}': start match cannot be empty",
                self.name
            )));
        }
        self.length().map(|_| ())
    }
}

/// Outcome of one rule for the current cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedField {
    name: String,
    found: bool,
    data: Vec<u8>,
}

impl ExtractedField {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            found: false,
            data: Vec::with_capacity(MAX_FIELD_LEN),
        }
    }

    /// Rule name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the start match was seen this cycle
    pub fn found(&self) -> bool {
        self.found
    }

    /// Raw copied bytes (empty when not found)
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copied bytes as UTF-8, if found and valid
    pub fn as_str(&self) -> Option<&str> {
        if !self.found {
            return None;
        }
        std::str::from_utf8(&self.data).ok()
    }

    fn store(&mut self, src: &[u8]) {
        let n = src.len().min(MAX_FIELD_LEN - 1);
        self.data.clear();
        self.data.extend_from_slice(&src[..n]);
        self.found = true;
    }

    fn reset(&mut self) {
        self.found = false;
        self.data.clear();
    }
}

/// One [`ExtractedField`] per rule, in rule order
///
/// Owned by the caller; the extractor only fills it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractionResults {
    fields: Vec<ExtractedField>,
    acquired_at: Option<DateTime<Utc>>,
}

impl ExtractionResults {
    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in rule order
    pub fn iter(&self) -> impl Iterator<Item = &ExtractedField> {
        self.fields.iter()
    }

    /// Field at `index`
    pub fn get(&self, index: usize) -> Option<&ExtractedField> {
        self.fields.get(index)
    }

    /// First field named `name`
    pub fn field(&self, name: &str) -> Option<&ExtractedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Value of a found field, or [`Error::FieldMissing`]
    pub fn require(&self, name: &str) -> Result<&str> {
        self.field(name)
            .and_then(ExtractedField::as_str)
            .ok_or_else(|| Error::field_missing(name))
    }

    /// Number of fields found this cycle
    pub fn found_count(&self) -> usize {
        self.fields.iter().filter(|f| f.found).count()
    }

    /// When the last complete reply was delivered
    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        self.acquired_at
    }

    /// Mark every field not-found and drop stale data
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            field.reset();
        }
        self.acquired_at = None;
    }

    pub(crate) fn mark_acquired(&mut self, at: DateTime<Utc>) {
        self.acquired_at = Some(at);
    }

    /// JSON view for logging and output
    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|f| {
                let value = if f.found {
                    serde_json::Value::String(String::from_utf8_lossy(&f.data).into_owned())
                } else {
                    serde_json::Value::Null
                };
                (f.name.clone(), value)
            })
            .collect();

        serde_json::json!({
            "acquired_at": self.acquired_at.map(|t| t.to_rfc3339()),
            "fields": fields,
        })
    }
}

/// Rule set plus reply terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExtractor {
    terminator: Vec<u8>,
    rules: Vec<ExtractionRule>,
    lengths: Vec<FieldLength>,
}

impl FieldExtractor {
    /// Build an extractor, validating every rule
    pub fn new(terminator: impl Into<Vec<u8>>, rules: Vec<ExtractionRule>) -> Result<Self> {
        let terminator = terminator.into();
        if terminator.is_empty() {
            return Err(Error::invalid_input("Reply terminator cannot be empty"));
        }

        for rule in &rules {
            rule.validate()?;
        }
        let lengths = rules.iter().map(ExtractionRule::length).collect::<Result<Vec<_>>>()?;

        Ok(Self {
            terminator,
            rules,
            lengths,
        })
    }

    /// Parse rules from a JSON array
    pub fn from_json(terminator: impl Into<Vec<u8>>, rules_json: &str) -> Result<Self> {
        let rules: Vec<ExtractionRule> = serde_json::from_str(rules_json)?;
        Self::new(terminator, rules)
    }

    /// Configured rules
    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Reply terminator
    pub fn terminator(&self) -> &[u8] {
        &self.terminator
    }

    /// Fresh, all-not-found results container matching these rules
    pub fn results(&self) -> ExtractionResults {
        ExtractionResults {
            fields: self.rules.iter().map(|r| ExtractedField::new(&r.name)).collect(),
            acquired_at: None,
        }
    }

    /// Apply every rule to `chunk`
    ///
    /// Fields whose start match is absent keep their previous state.
    pub fn extract(&self, chunk: &[u8], results: &mut ExtractionResults) {
        let rules = self.rules.iter().zip(&self.lengths);

        for ((rule, length), field) in rules.zip(results.fields.iter_mut()) {
            let Some(pos) = find(chunk, rule.start_match.as_bytes()) else {
                continue;
            };

            let Some(start) = (pos + rule.start_match.len())
                .checked_add(rule.offset)
                .filter(|s| *s < chunk.len())
            else {
                continue;
            };
            // never look further than one field buffer past the data start
            let rest = &chunk[start..];
            let window = &rest[..rest.len().min(MAX_FIELD_LEN - 1)];

            let end = match *length {
                FieldLength::Fixed(n) => n.min(window.len()),
                FieldLength::Until(t) => window.iter().position(|b| *b == t).unwrap_or(window.len()),
            };

            field.store(&window[..end]);
            debug!(
                "data found = {}",
                String::from_utf8_lossy(field.as_bytes())
            );
        }
    }

    /// Whether `chunk` contains the reply terminator
    pub fn is_terminated(&self, chunk: &[u8]) -> bool {
        find(chunk, &self.terminator).is_some()
    }
}

impl Default for FieldExtractor {
    /// No rules, blank-line terminator
    fn default() -> Self {
        Self {
            terminator: b"\r\n\r\n".to_vec(),
            rules: Vec::new(),
            lengths: Vec::new(),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
