//! Serde mirror of the device descriptor document (`.adev`).
//!
//! ```json
//! {
//!   "format_version": "1.0",
//!   "device":  { "id", "name", "category", "description", "author", "version" },
//!   "visual":  { "width", "height", "label", "color", "led_indicators": [], "image_svg" },
//!   "pins":    [ { "id", "label", "x", "y", "side", "type", "direction", "notes" } ],
//!   "emulation": { "type", "state_vars": {}, "rules": [], "properties": {} },
//!   "display": { "type", "width_px", "height_px", "pixel_color", "background_color",
//!                "region": { "x", "y", "w", "h" }, "interface", "address" }
//! }
//! ```
//!
//! Every section and field is optional; absent ones take the defaults below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::device::{DeviceDefinition, DisplayRegion, EmulationType, LedIndicator, Pin, Rule};
use crate::value::Value;

fn default_format_version() -> String {
    "1.0".to_string()
}

fn default_unknown() -> String {
    "?".to_string()
}

fn default_category() -> String {
    "Other".to_string()
}

fn default_size() -> f64 {
    60.0
}

fn default_color() -> String {
    "#555".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(default = "default_format_version")]
    pub format_version: String,
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub visual: VisualSection,
    #[serde(default)]
    pub pins: Vec<Pin>,
    #[serde(default)]
    pub emulation: EmulationSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayRegion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSection {
    #[serde(default = "default_unknown")]
    pub id: String,
    #[serde(default = "default_unknown")]
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_format_version")]
    pub version: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            id: default_unknown(),
            name: default_unknown(),
            category: default_category(),
            description: String::new(),
            author: String::new(),
            version: default_format_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualSection {
    #[serde(default = "default_size")]
    pub width: f64,
    #[serde(default = "default_size")]
    pub height: f64,
    /// Falls back to the device name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub led_indicators: Vec<LedIndicator>,
    #[serde(default, alias = "image", skip_serializing_if = "Option::is_none")]
    pub image_svg: Option<String>,
}

impl Default for VisualSection {
    fn default() -> Self {
        Self {
            width: default_size(),
            height: default_size(),
            label: None,
            color: default_color(),
            led_indicators: Vec::new(),
            image_svg: None,
        }
    }
}

/// The `emulation` section. Also the document edited live by device authors
/// (see [`crate::validation`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmulationSection {
    #[serde(rename = "type", default)]
    pub emulation_type: EmulationType,
    #[serde(default)]
    pub state_vars: BTreeMap<String, Value>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl DeviceDescriptor {
    pub fn into_definition(self) -> DeviceDefinition {
        let DeviceDescriptor {
            format_version,
            device,
            visual,
            pins,
            emulation,
            display,
        } = self;

        DeviceDefinition {
            format_version,
            label: visual.label.unwrap_or_else(|| device.name.clone()),
            id: device.id,
            name: device.name,
            category: device.category,
            description: device.description,
            author: device.author,
            version: device.version,
            width: visual.width,
            height: visual.height,
            color: visual.color,
            image_svg: visual.image_svg,
            pins,
            leds: visual.led_indicators,
            display,
            emulation_type: emulation.emulation_type,
            state_vars: emulation.state_vars,
            rules: emulation.rules,
            properties: emulation.properties,
        }
    }

    pub fn from_definition(def: &DeviceDefinition) -> Self {
        Self {
            format_version: def.format_version.clone(),
            device: DeviceSection {
                id: def.id.clone(),
                name: def.name.clone(),
                category: def.category.clone(),
                description: def.description.clone(),
                author: def.author.clone(),
                version: def.version.clone(),
            },
            visual: VisualSection {
                width: def.width,
                height: def.height,
                label: Some(def.label.clone()),
                color: def.color.clone(),
                led_indicators: def.leds.clone(),
                image_svg: def.image_svg.clone(),
            },
            pins: def.pins.clone(),
            emulation: EmulationSection::from_definition(def),
            display: def.display.clone(),
        }
    }
}

impl EmulationSection {
    pub fn from_definition(def: &DeviceDefinition) -> Self {
        Self {
            emulation_type: def.emulation_type.clone(),
            state_vars: def.state_vars.clone(),
            rules: def.rules.clone(),
            properties: def.properties.clone(),
        }
    }
}
