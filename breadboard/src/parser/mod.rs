//! Device descriptor parsing.
//!
//! A descriptor only fails to parse when it is structurally invalid: not
//! JSON at all, the wrong shape (e.g. `pins` is not a list), or a repeated
//! pin id. Any missing section or field takes its default.

pub mod descriptor;
pub mod library;

use serde_json::error::Category;

use crate::device::DeviceDefinition;

pub use descriptor::{DeviceDescriptor, DeviceSection, EmulationSection, VisualSection};
pub use library::{DeviceLibrary, ImportError, ImportFailure, ImportReport, CATEGORY_ORDER};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid descriptor syntax at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("malformed descriptor: {0}")]
    Structure(String),
    #[error("device '{device}' declares pin '{pin}' more than once")]
    DuplicatePinId { device: String, pin: String },
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        match e.classify() {
            Category::Syntax | Category::Eof => ParseError::Syntax {
                line: e.line(),
                column: e.column(),
                message: e.to_string(),
            },
            Category::Data | Category::Io => ParseError::Structure(e.to_string()),
        }
    }
}

/// Parse descriptor text into a definition.
pub fn parse_device(text: &str) -> Result<DeviceDefinition, ParseError> {
    let descriptor: DeviceDescriptor = serde_json::from_str(text)?;
    finish(descriptor)
}

/// Parse an already-decoded JSON document.
pub fn parse_device_value(value: serde_json::Value) -> Result<DeviceDefinition, ParseError> {
    let descriptor: DeviceDescriptor = serde_json::from_value(value)?;
    finish(descriptor)
}

fn finish(descriptor: DeviceDescriptor) -> Result<DeviceDefinition, ParseError> {
    let def = descriptor.into_definition();
    if let Some(pin) = def.duplicate_pin_id() {
        return Err(ParseError::DuplicatePinId {
            device: def.id.clone(),
            pin: pin.to_string(),
        });
    }
    Ok(def)
}

/// Serialise a definition back to descriptor JSON (2-space indented).
pub fn serialize_device(def: &DeviceDefinition) -> Result<String, ParseError> {
    serde_json::to_string_pretty(&DeviceDescriptor::from_definition(def))
        .map_err(|e| ParseError::Structure(e.to_string()))
}
