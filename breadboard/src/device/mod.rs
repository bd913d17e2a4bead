//! Device Definition Data Model
//!
//! A [`DeviceDefinition`] is the immutable template for one kind of part:
//! its pins, LED indicators, optional display region, emulation rules and
//! initial state variables. Definitions are loaded once (see
//! [`crate::parser`]) and shared behind an `Arc` by every placed instance.
//!
//! Keyword fields (pin side/type/direction, rule trigger/action, emulation
//! type) are enums with an `Other` variant so that keywords unknown to this
//! version survive a parse/serialise round trip unchanged.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::router::Point;
use crate::value::Value;

macro_rules! keyword_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// Keyword not recognised by this version, kept verbatim.
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Other(s) => s.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                match s.as_str() {
                    $($text => $name::$variant,)+
                    _ => $name::Other(s),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name::from(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                match value {
                    $name::Other(s) => s,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum! {
    /// Edge of the device body a pin sits on; decides the wire stub direction.
    PinSide {
        Left => "left",
        Right => "right",
        Top => "top",
        Bottom => "bottom",
    }
}

impl PinSide {
    /// Unit vector pointing away from the device body.
    pub fn outward(&self) -> (f64, f64) {
        match self {
            PinSide::Left => (-1.0, 0.0),
            PinSide::Right => (1.0, 0.0),
            PinSide::Top => (0.0, -1.0),
            PinSide::Bottom => (0.0, 1.0),
            PinSide::Other(_) => (0.0, 0.0),
        }
    }
}

impl Default for PinSide {
    fn default() -> Self {
        PinSide::Left
    }
}

keyword_enum! {
    /// Signal class of a pin.
    PinType {
        Digital => "digital",
        Analog => "analog",
        Power => "power",
        Ground => "ground",
        Signal => "signal",
        Passive => "passive",
        I2cSda => "i2c_sda",
        I2cScl => "i2c_scl",
        SpiMosi => "spi_mosi",
        SpiMiso => "spi_miso",
        SpiSck => "spi_sck",
        SerialTx => "serial_tx",
        SerialRx => "serial_rx",
    }
}

impl Default for PinType {
    fn default() -> Self {
        PinType::Digital
    }
}

keyword_enum! {
    PinDirection {
        InOut => "io",
        In => "in",
        Out => "out",
    }
}

impl Default for PinDirection {
    fn default() -> Self {
        PinDirection::InOut
    }
}

keyword_enum! {
    /// Condition half of an emulation rule.
    Trigger {
        PinHigh => "pin_high",
        PinLow => "pin_low",
        PinPwm => "pin_pwm",
        AnalogRead => "analog_read",
        UserPress => "user_press",
        UserRelease => "user_release",
        UserAdjust => "user_adjust",
        Tone => "tone",
        NoTone => "no_tone",
        I2cCommand => "i2c_command",
        I2cData => "i2c_data",
        DisplayPrint => "display_print",
        DisplayClear => "display_clear",
        CircuitUpdate => "circuit_update",
        ServoWrite => "servo_write",
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Trigger::Other(String::new())
    }
}

keyword_enum! {
    /// Effect half of an emulation rule.
    Action {
        SetState => "set_state",
        Compute => "compute",
        ReturnValue => "return_value",
        VisualUpdate => "visual_update",
        RenderText => "render_text",
        SetPixel => "set_pixel",
        ClearFramebuffer => "clear_framebuffer",
        ProcessCommand => "process_command",
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::Other(String::new())
    }
}

keyword_enum! {
    EmulationType {
        Passive => "passive",
        Active => "active",
        Microcontroller => "microcontroller",
        Display => "display",
    }
}

impl Default for EmulationType {
    fn default() -> Self {
        EmulationType::Passive
    }
}

/// A connection point on a device, in device-local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub side: PinSide,
    #[serde(rename = "type", default)]
    pub pin_type: PinType,
    #[serde(default)]
    pub direction: PinDirection,
    #[serde(default)]
    pub notes: String,
}

impl Pin {
    pub fn new(id: impl Into<String>, x: f64, y: f64, side: PinSide) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            x,
            y,
            side,
            pin_type: PinType::default(),
            direction: PinDirection::default(),
            notes: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_type(mut self, pin_type: PinType) -> Self {
        self.pin_type = pin_type;
        self
    }

    pub fn with_direction(mut self, direction: PinDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Position relative to the device origin.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

fn default_led_radius() -> f64 {
    8.0
}

fn default_led_color() -> String {
    "#ff3344".to_string()
}

fn default_on_value() -> Value {
    Value::Bool(true)
}

/// A lamp drawn on the device body, lit while `state[state_var] == on_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedIndicator {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_led_radius")]
    pub radius: f64,
    #[serde(default = "default_led_color")]
    pub color: String,
    /// Name of the state variable watched. Not checked against `state_vars`.
    #[serde(default)]
    pub state_var: String,
    #[serde(default = "default_on_value")]
    pub on_value: Value,
}

impl LedIndicator {
    pub fn new(label: impl Into<String>, state_var: impl Into<String>, on_value: Value) -> Self {
        Self {
            label: label.into(),
            x: 0.0,
            y: 0.0,
            radius: default_led_radius(),
            color: default_led_color(),
            state_var: state_var.into(),
            on_value,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

/// Rectangle in device-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Default for Rect {
    fn default() -> Self {
        Self {
            x: 10.0,
            y: 10.0,
            w: 80.0,
            h: 40.0,
        }
    }
}

fn default_width_px() -> u32 {
    128
}

fn default_height_px() -> u32 {
    64
}

fn default_pixel_color() -> String {
    "#00aaff".to_string()
}

fn default_background_color() -> String {
    "#000510".to_string()
}

fn default_interface() -> String {
    "i2c".to_string()
}

fn default_address() -> String {
    "0x3C".to_string()
}

/// Screen area of a display device. Descriptive only; never simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRegion {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default = "default_width_px")]
    pub width_px: u32,
    #[serde(default = "default_height_px")]
    pub height_px: u32,
    #[serde(default = "default_pixel_color")]
    pub pixel_color: String,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default)]
    pub region: Rect,
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for DisplayRegion {
    fn default() -> Self {
        Self {
            kind: String::new(),
            width_px: default_width_px(),
            height_px: default_height_px(),
            pixel_color: default_pixel_color(),
            background_color: default_background_color(),
            region: Rect::default(),
            interface: default_interface(),
            address: default_address(),
        }
    }
}

/// One trigger/action pair of a device's emulation behaviour.
///
/// Only `pin_high` + `set_state` is interpreted by the engine; every other
/// combination is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub value: Value,
}

impl Rule {
    pub fn new(trigger: Trigger, action: Action, target: impl Into<String>, value: Value) -> Self {
        Self {
            trigger,
            pin: None,
            action,
            target: target.into(),
            value,
        }
    }

    pub fn on_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    /// True for the one rule shape the tick engine evaluates.
    pub fn drives_state_on_high(&self) -> bool {
        self.trigger == Trigger::PinHigh && self.action == Action::SetState && !self.target.is_empty()
    }
}

/// Raster image referenced by a device's SVG wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub mime: String,
    /// Base64 payload exactly as found in the data URI (not decoded).
    pub base64: String,
}

fn data_uri_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"data:(image/[^;]+);base64,([A-Za-z0-9+/=\s]+)").ok())
        .as_ref()
}

/// Immutable template for one kind of device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDefinition {
    pub format_version: String,
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub author: String,
    pub version: String,
    pub width: f64,
    pub height: f64,
    pub label: String,
    pub color: String,
    pub image_svg: Option<String>,
    pub pins: Vec<Pin>,
    pub leds: Vec<LedIndicator>,
    pub display: Option<DisplayRegion>,
    pub emulation_type: EmulationType,
    /// Initial values copied into each new instance.
    pub state_vars: BTreeMap<String, Value>,
    pub rules: Vec<Rule>,
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl DeviceDefinition {
    /// A bare definition with the same defaults the descriptor parser applies.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            format_version: "1.0".to_string(),
            id: id.into(),
            label: name.clone(),
            name,
            category: "Other".to_string(),
            description: String::new(),
            author: String::new(),
            version: "1.0".to_string(),
            width: 60.0,
            height: 60.0,
            color: "#555".to_string(),
            image_svg: None,
            pins: Vec::new(),
            leds: Vec::new(),
            display: None,
            emulation_type: EmulationType::default(),
            state_vars: BTreeMap::new(),
            rules: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_pin(mut self, pin: Pin) -> Self {
        self.pins.push(pin);
        self
    }

    pub fn with_led(mut self, led: LedIndicator) -> Self {
        self.leds.push(led);
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_state_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.state_vars.insert(name.into(), value);
        self
    }

    pub fn with_emulation_type(mut self, emulation_type: EmulationType) -> Self {
        self.emulation_type = emulation_type;
        self
    }

    pub fn with_display(mut self, display: DisplayRegion) -> Self {
        self.display = Some(display);
        self
    }

    pub fn pin(&self, id: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.id == id)
    }

    /// First pin id that occurs more than once, if any.
    pub fn duplicate_pin_id(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.pins
            .iter()
            .find(|p| !seen.insert(p.id.as_str()))
            .map(|p| p.id.as_str())
    }

    /// Rules the tick engine evaluates.
    pub fn active_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.drives_state_on_high())
    }

    /// Whether a world-space point falls inside the body placed at `origin`.
    pub fn contains(&self, origin: Point, p: Point) -> bool {
        origin.x <= p.x && p.x <= origin.x + self.width && origin.y <= p.y && p.y <= origin.y + self.height
    }

    pub fn embedded_image(&self) -> Option<EmbeddedImage> {
        let svg = self.image_svg.as_deref()?;
        let caps = data_uri_regex()?.captures(svg)?;
        Some(EmbeddedImage {
            mime: caps[1].to_string(),
            base64: caps[2].split_whitespace().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_roundtrip_preserves_unknown() {
        assert_eq!(PinType::from("i2c_sda"), PinType::I2cSda);
        assert_eq!(PinType::from("gnd"), PinType::Other("gnd".to_string()));
        assert_eq!(String::from(PinType::Other("gnd".into())), "gnd");
        assert_eq!(Trigger::from("servo_write").as_str(), "servo_write");
    }

    #[test]
    fn test_side_outward() {
        assert_eq!(PinSide::Left.outward(), (-1.0, 0.0));
        assert_eq!(PinSide::Bottom.outward(), (0.0, 1.0));
        assert_eq!(PinSide::from("diagonal").outward(), (0.0, 0.0));
    }

    #[test]
    fn test_active_rules() {
        let def = DeviceDefinition::new("led", "LED")
            .with_rule(Rule::new(Trigger::PinHigh, Action::SetState, "led_on", Value::Bool(true)))
            .with_rule(Rule::new(Trigger::PinLow, Action::SetState, "led_on", Value::Bool(false)))
            .with_rule(Rule::new(Trigger::PinHigh, Action::Compute, "x", Value::Number(1.0)))
            .with_rule(Rule::new(Trigger::PinHigh, Action::SetState, "", Value::Bool(true)));

        assert_eq!(def.active_rules().count(), 1);
    }

    #[test]
    fn test_duplicate_pin_id() {
        let def = DeviceDefinition::new("r", "Resistor")
            .with_pin(Pin::new("a", 0.0, 10.0, PinSide::Left))
            .with_pin(Pin::new("b", 60.0, 10.0, PinSide::Right));
        assert_eq!(def.duplicate_pin_id(), None);

        let def = def.with_pin(Pin::new("a", 30.0, 0.0, PinSide::Top));
        assert_eq!(def.duplicate_pin_id(), Some("a"));
    }

    #[test]
    fn test_embedded_image() {
        let mut def = DeviceDefinition::new("x", "X");
        assert!(def.embedded_image().is_none());

        def.image_svg = Some(
            "<svg xmlns='http://www.w3.org/2000/svg' width='60' height='60'>\
             <image href='data:image/png;base64,iVBORw0K\nGgo=' width='60' height='60'/></svg>"
                .to_string(),
        );
        let image = def.embedded_image().unwrap();
        assert_eq!(image.mime, "image/png");
        assert_eq!(image.base64, "iVBORw0KGgo=");
    }

    #[test]
    fn test_contains() {
        let def = DeviceDefinition::new("x", "X").with_size(40.0, 20.0);
        let origin = Point::new(100.0, 100.0);
        assert!(def.contains(origin, Point::new(120.0, 110.0)));
        assert!(!def.contains(origin, Point::new(141.0, 110.0)));
    }
}
