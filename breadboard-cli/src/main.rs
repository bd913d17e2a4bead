//! Breadboard CLI - inspect device definitions and run simulations from the command line.

use anyhow::{anyhow, bail, Context};
use breadboard::emulation::check_program;
use breadboard::parser::DeviceLibrary;
use breadboard::router::{route, PinAnchor};
use breadboard::{
    DeviceDefinition, EmulationError, PinRef, PinSide, Point, ProgramReport, Workbench,
    WorkbenchOptions,
};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "breadboard")]
#[command(about = "Virtual breadboard: device definitions, wire routing and simulation", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load device descriptors and print a summary of each
    Inspect {
        /// Descriptor files (.adev/.json) or directories containing them
        #[arg(value_name = "PATHS", required = true)]
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Run the structural checks on a program without simulating it
    Check {
        /// Program source file
        #[arg(value_name = "PROGRAM")]
        program: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Place devices, wire them, and run a fixed number of ticks
    Simulate {
        /// Descriptor files or directories to load
        #[arg(long, value_name = "PATHS", num_args = 1.., required = true)]
        devices: Vec<PathBuf>,

        /// Device ids to place, in order (instance 0, 1, ...)
        #[arg(long, value_name = "ID", num_args = 1.., required = true)]
        place: Vec<String>,

        /// Program source file
        #[arg(long, value_name = "FILE")]
        program: PathBuf,

        /// Wire between two placed pins, e.g. 0:d13=1:anode
        #[arg(long, value_name = "A:PIN=B:PIN")]
        wire: Vec<String>,

        /// Number of ticks to run
        #[arg(long, default_value_t = 4)]
        ticks: u32,

        /// Placement seed
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Route a single wire between two pin positions
    Route {
        /// Start pin as X,Y,SIDE (e.g. 0,0,right)
        #[arg(value_name = "FROM", allow_hyphen_values = true)]
        from: String,

        /// End pin as X,Y,SIDE
        #[arg(value_name = "TO", allow_hyphen_values = true)]
        to: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Inspect { paths, format } => handle_inspect(&paths, &format),
        Commands::Check { program, format } => handle_check(&program, &format),
        Commands::Simulate {
            devices,
            place,
            program,
            wire,
            ticks,
            seed,
            format,
        } => handle_simulate(&devices, &place, &program, &wire, ticks, seed, &format),
        Commands::Route { from, to, format } => handle_route(&from, &to, &format),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

// ----------------------------------------------------------------------
// inspect
// ----------------------------------------------------------------------

fn handle_inspect(paths: &[PathBuf], format: &OutputFormat) -> anyhow::Result<i32> {
    let mut library = DeviceLibrary::new();
    let report = library.import_files(paths);

    match format {
        OutputFormat::Human => {
            for (category, devices) in library.by_category() {
                println!("\n{}", category);
                println!("{}", "─".repeat(60));
                for def in devices {
                    print_definition(&def);
                }
            }
            for failure in &report.failures {
                eprintln!("Failed: {}: {}", failure.source, failure.error);
            }
            println!(
                "\nLoaded {} device(s), {} failed",
                report.loaded.len(),
                report.failures.len()
            );
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "devices": library.iter().map(|d| definition_json(d)).collect::<Vec<_>>(),
                "failures": report.failures.iter().map(|f| serde_json::json!({
                    "source": f.source,
                    "error": f.error.to_string(),
                })).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(if report.is_clean() { 0 } else { 1 })
}

fn print_definition(def: &DeviceDefinition) {
    println!("  {}  {}  ({})", def.id, def.name, def.emulation_type);
    if !def.description.is_empty() {
        println!("    {}", def.description);
    }
    let pins: Vec<String> = def
        .pins
        .iter()
        .map(|p| format!("{}[{}, {}]", p.id, p.pin_type, p.side))
        .collect();
    println!("    pins:  {}", if pins.is_empty() { "-".to_string() } else { pins.join(" ") });
    for led in &def.leds {
        println!("    led:   {} -> {} == {}", led.label, led.state_var, led.on_value);
    }
    for rule in &def.rules {
        let pin = rule.pin.as_deref().map(|p| format!("({p})")).unwrap_or_default();
        println!(
            "    rule:  {}{} -> {} {} = {}",
            rule.trigger, pin, rule.action, rule.target, rule.value
        );
    }
    if let Some(image) = def.embedded_image() {
        println!("    image: {} ({} base64 chars)", image.mime, image.base64.len());
    }
}

fn definition_json(def: &DeviceDefinition) -> serde_json::Value {
    serde_json::json!({
        "id": def.id,
        "name": def.name,
        "category": def.category,
        "emulation_type": def.emulation_type.as_str(),
        "pins": def.pins,
        "leds": def.leds,
        "rules": def.rules,
        "state_vars": def.state_vars,
    })
}

// ----------------------------------------------------------------------
// check
// ----------------------------------------------------------------------

fn read_program(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn handle_check(program: &Path, format: &OutputFormat) -> anyhow::Result<i32> {
    let text = read_program(program)?;
    let report = match check_program(&text) {
        Ok(report) => report,
        Err(EmulationError::EmptyProgram) => {
            eprintln!("Error: no program loaded ({} is empty)", program.display());
            return Ok(1);
        }
    };

    match format {
        OutputFormat::Human => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

fn print_report(report: &ProgramReport) {
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }
    println!(
        "Sketch uses ~{} bytes ({}% of storage).",
        report.sketch_bytes, report.storage_percent
    );
    println!(
        "Blink: {}",
        if report.policy.blink_enabled { "on" } else { "off" }
    );
    for msg in &report.serial_messages {
        println!("Serial: {}", msg);
    }
}

// ----------------------------------------------------------------------
// simulate
// ----------------------------------------------------------------------

/// `0:d13` -> (placement index, pin id)
fn parse_endpoint(text: &str) -> anyhow::Result<(usize, String)> {
    let (index, pin) = text
        .split_once(':')
        .ok_or_else(|| anyhow!("endpoint '{}' must look like INDEX:PIN", text))?;
    let index = index
        .trim()
        .parse()
        .with_context(|| format!("bad instance index in '{}'", text))?;
    Ok((index, pin.trim().to_string()))
}

fn parse_wire(text: &str, instances: &[String]) -> anyhow::Result<(PinRef, PinRef)> {
    let (a, b) = text
        .split_once('=')
        .ok_or_else(|| anyhow!("wire '{}' must look like A:PIN=B:PIN", text))?;
    let resolve = |(index, pin): (usize, String)| -> anyhow::Result<PinRef> {
        let id = instances
            .get(index)
            .ok_or_else(|| anyhow!("wire '{}' names instance {} but only {} placed", text, index, instances.len()))?;
        Ok(PinRef::new(id.clone(), pin))
    };
    Ok((resolve(parse_endpoint(a)?)?, resolve(parse_endpoint(b)?)?))
}

fn handle_simulate(
    devices: &[PathBuf],
    place: &[String],
    program: &Path,
    wires: &[String],
    ticks: u32,
    seed: u64,
    format: &OutputFormat,
) -> anyhow::Result<i32> {
    let mut wb = Workbench::with_options(WorkbenchOptions::default().with_placement_seed(seed));
    let report = wb.import_paths(devices);
    for failure in &report.failures {
        eprintln!("Failed: {}: {}", failure.source, failure.error);
    }

    let mut instances = Vec::with_capacity(place.len());
    for device in place {
        instances.push(wb.place(device)?);
    }
    debug!(instances = ?instances, "placed devices");
    for wire in wires {
        let (a, b) = parse_wire(wire, &instances)?;
        wb.connect(a, b).with_context(|| format!("wire '{}'", wire))?;
    }

    let text = read_program(program)?;
    let report = wb.start_simulation(&text)?;
    info!(ticks, blink = report.policy.blink_enabled, "running simulation");

    let mut frames = Vec::with_capacity(ticks as usize);
    let mut serial = Vec::new();
    for _ in 0..ticks {
        let Some(tick) = wb.tick() else { break };
        serial.extend(tick.serial_output.iter().cloned());
        frames.push((tick, wb.snapshot()));
    }

    match format {
        OutputFormat::Human => {
            print_report(&report);
            for (tick, snap) in &frames {
                let states: Vec<String> = snap
                    .instances
                    .iter()
                    .map(|i| {
                        let vars: Vec<String> =
                            i.state.iter().map(|(k, v)| format!("{k}={v}")).collect();
                        format!("{} {{{}}}", i.id, vars.join(", "))
                    })
                    .collect();
                let lit = snap.lit_leds();
                println!(
                    "tick {}: {}  lit: {}",
                    tick.tick,
                    states.join("  "),
                    if lit.is_empty() { "-".to_string() } else { lit.join(" ") }
                );
                for line in &tick.serial_output {
                    println!("  > {}", line);
                }
            }
            println!("\nRoutes:");
            for wire in wb.snapshot().wires {
                let points = match &wire.route {
                    Some(points) => points
                        .iter()
                        .map(|p| format!("({}, {})", p.x, p.y))
                        .collect::<Vec<_>>()
                        .join(" "),
                    None => "(dangling)".to_string(),
                };
                println!("  {} {} -> {}: {}", wire.id, wire.a, wire.b, points);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "report": report,
                "ticks": frames.iter().map(|(tick, snap)| serde_json::json!({
                    "tick": tick.tick,
                    "lit": snap.lit_leds(),
                    "instances": snap.instances.iter().map(|i| serde_json::json!({
                        "id": i.id,
                        "device": i.device,
                        "state": i.state,
                    })).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
                "serial": serial,
                "wires": wb.snapshot().wires,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    wb.stop_simulation();
    Ok(0)
}

// ----------------------------------------------------------------------
// route
// ----------------------------------------------------------------------

fn parse_anchor(text: &str) -> anyhow::Result<PinAnchor> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let [x, y, side] = parts.as_slice() else {
        bail!("pin '{}' must look like X,Y,SIDE", text);
    };
    let x: f64 = x.parse().with_context(|| format!("bad x in '{}'", text))?;
    let y: f64 = y.parse().with_context(|| format!("bad y in '{}'", text))?;
    let side = PinSide::from(*side);
    if let PinSide::Other(s) = &side {
        bail!("unknown side '{}' (expected left, right, top or bottom)", s);
    }
    Ok(PinAnchor::new(Point::new(x, y), side))
}

fn handle_route(from: &str, to: &str, format: &OutputFormat) -> anyhow::Result<i32> {
    let a = parse_anchor(from)?;
    let b = parse_anchor(to)?;
    let r = route(&a, &b, &[]);

    match format {
        OutputFormat::Human => {
            let points: Vec<String> = r.points.iter().map(|p| format!("({}, {})", p.x, p.y)).collect();
            println!("{}", points.join(" -> "));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&r)?),
    }
    Ok(0)
}
