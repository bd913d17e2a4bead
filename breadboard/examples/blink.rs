//! Build a two-part circuit in code, run a blink program for a few ticks
//! and print what a front-end would draw.
//!
//! ```text
//! cargo run -p breadboard --example blink
//! ```

use breadboard::prelude::*;
use breadboard::{Action, LedIndicator, Pin, PinSide, PinType, Rule, Trigger};

const PROGRAM: &str = r#"
void setup() {
  pinMode(13, OUTPUT);
  Serial.println("hello from the board");
}

void loop() {
  digitalWrite(13, HIGH);
  delay(500);
  digitalWrite(13, LOW);
  delay(500);
}
"#;

fn led() -> DeviceDefinition {
    DeviceDefinition::new("led_green", "Green LED")
        .with_category("Output")
        .with_size(40.0, 60.0)
        .with_pin(Pin::new("anode", 0.0, 40.0, PinSide::Left).with_label("+"))
        .with_pin(
            Pin::new("cathode", 40.0, 40.0, PinSide::Right)
                .with_label("-")
                .with_type(PinType::Ground),
        )
        .with_state_var("led_on", Value::Bool(false))
        .with_led(LedIndicator::new("D1", "led_on", Value::Bool(true)).at(20.0, 20.0))
        .with_rule(
            Rule::new(Trigger::PinHigh, Action::SetState, "led_on", Value::Bool(true))
                .on_pin("anode"),
        )
}

fn board() -> DeviceDefinition {
    DeviceDefinition::new("mini_board", "Mini Board")
        .with_category("Boards")
        .with_size(120.0, 80.0)
        .with_pin(Pin::new("d13", 120.0, 20.0, PinSide::Right))
        .with_pin(Pin::new("gnd", 120.0, 60.0, PinSide::Right).with_type(PinType::Ground))
}

fn main() -> Result<(), BreadboardError> {
    let mut wb = Workbench::with_options(WorkbenchOptions::default().with_placement_seed(7));
    wb.library_mut().insert(led());
    wb.library_mut().insert(board());

    let b = wb.place_at("mini_board", Point::new(0.0, 0.0))?;
    let l = wb.place_at("led_green", Point::new(220.0, 40.0))?;
    wb.connect(PinRef::new(&b, "d13"), PinRef::new(&l, "anode"))?;
    wb.connect(PinRef::new(&l, "cathode"), PinRef::new(&b, "gnd"))?;

    let report = wb.start_simulation(PROGRAM)?;
    println!(
        "sketch: {} bytes ({}%), blink: {}",
        report.sketch_bytes, report.storage_percent, report.policy.blink_enabled
    );

    for _ in 0..4 {
        if let Some(tick) = wb.tick() {
            let snap = wb.snapshot();
            println!("tick {}: lit = {:?}", tick.tick, snap.lit_leds());
        }
    }

    for wire in wb.snapshot().wires {
        let points: Vec<String> = wire
            .route
            .unwrap_or_default()
            .iter()
            .map(|p| format!("({}, {})", p.x, p.y))
            .collect();
        println!("{} {} -> {}: {}", wire.id, wire.a, wire.b, points.join(" "));
    }

    wb.stop_simulation();
    for entry in wb.console().entries() {
        println!("{entry}");
    }

    Ok(())
}
