//! Live validation of the emulation JSON edited by device authors.
//!
//! The editor re-validates on every change. An invalid draft blocks export
//! but never reaches the engine: definitions are only rebuilt from a draft
//! that parsed.

use serde_json::error::Category;

use crate::device::DeviceDefinition;
use crate::parser::EmulationSection;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid JSON at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("invalid emulation section: {0}")]
    Shape(String),
}

impl ValidationError {
    /// Short form for a one-line status label.
    pub fn summary(&self, max_chars: usize) -> String {
        let text = self.to_string();
        match text.char_indices().nth(max_chars) {
            Some((end, _)) => text[..end].to_string(),
            None => text,
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(e: serde_json::Error) -> Self {
        match e.classify() {
            Category::Syntax | Category::Eof => ValidationError::Syntax {
                line: e.line(),
                column: e.column(),
                message: e.to_string(),
            },
            Category::Data | Category::Io => ValidationError::Shape(e.to_string()),
        }
    }
}

fn parse_object(text: &str) -> Result<serde_json::Value, ValidationError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(ValidationError::Shape("expected a JSON object".to_string()));
    }
    Ok(value)
}

/// Validate editor text as an `emulation` section.
pub fn validate_emulation_json(text: &str) -> Result<EmulationSection, ValidationError> {
    Ok(serde_json::from_value(parse_object(text)?)?)
}

/// Re-indent valid JSON with two spaces, keeping the author's key order.
pub fn format_emulation_json(text: &str) -> Result<String, ValidationError> {
    let value = parse_object(text)?;
    serde_json::to_string_pretty(&value).map_err(|e| ValidationError::Shape(e.to_string()))
}

/// A validated emulation section waiting to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EmulationDraft {
    pub section: EmulationSection,
}

impl EmulationDraft {
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            section: validate_emulation_json(text)?,
        })
    }

    /// Draft holding a definition's current emulation section.
    pub fn from_definition(def: &DeviceDefinition) -> Self {
        Self {
            section: EmulationSection::from_definition(def),
        }
    }

    pub fn to_json(&self) -> Result<String, ValidationError> {
        serde_json::to_string_pretty(&self.section).map_err(|e| ValidationError::Shape(e.to_string()))
    }

    /// New definition with this draft's emulation section; `def` is left
    /// as it was.
    pub fn apply_to(&self, def: &DeviceDefinition) -> DeviceDefinition {
        let mut updated = def.clone();
        updated.emulation_type = self.section.emulation_type.clone();
        updated.state_vars = self.section.state_vars.clone();
        updated.rules = self.section.rules.clone();
        updated.properties = self.section.properties.clone();
        updated
    }
}
