//! Program text checks.
//!
//! Nothing here parses the program. The "compile" step is a handful of
//! substring tests: structural markers, brace balance, a size estimate and
//! the string literals passed to `Serial.print`/`Serial.println`. The blink
//! policy is a textual heuristic standing in for timing analysis.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Flash size the storage percentage is reported against.
pub const STORAGE_BYTES: usize = 32768;

const SETUP_MARKER: &str = "void setup()";
const LOOP_MARKER: &str = "void loop()";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmulationError {
    #[error("no program loaded")]
    EmptyProgram,
}

/// Non-fatal problem found in program text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralWarning {
    MissingSetup,
    MissingLoop,
    UnbalancedBraces { open: usize, close: usize },
}

impl std::fmt::Display for StructuralWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuralWarning::MissingSetup => write!(f, "missing setup()"),
            StructuralWarning::MissingLoop => write!(f, "missing loop()"),
            StructuralWarning::UnbalancedBraces { open, close } => {
                write!(f, "mismatched braces ({open} '{{' vs {close} '}}')")
            }
        }
    }
}

/// How the tick engine drives `pin_high`/`set_state` rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimulationPolicy {
    /// Toggle rule values tick by tick instead of holding them.
    pub blink_enabled: bool,
}

/// Blink is assumed iff the program both writes a digital pin and delays.
pub fn derive_simulation_policy(program: &str) -> SimulationPolicy {
    SimulationPolicy {
        blink_enabled: program.contains("digitalWrite") && program.contains("delay("),
    }
}

/// Result of checking a program before a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramReport {
    pub warnings: Vec<StructuralWarning>,
    /// Rough flash estimate: twice the UTF-8 length.
    pub sketch_bytes: usize,
    pub storage_percent: usize,
    /// Literals echoed to the serial monitor, in source order.
    pub serial_messages: Vec<String>,
    pub policy: SimulationPolicy,
}

impl ProgramReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub fn structural_warnings(program: &str) -> Vec<StructuralWarning> {
    let mut warnings = Vec::new();
    if !program.contains(SETUP_MARKER) {
        warnings.push(StructuralWarning::MissingSetup);
    }
    if !program.contains(LOOP_MARKER) {
        warnings.push(StructuralWarning::MissingLoop);
    }
    let open = program.matches('{').count();
    let close = program.matches('}').count();
    if open != close {
        warnings.push(StructuralWarning::UnbalancedBraces { open, close });
    }
    warnings
}

fn serial_print_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"Serial\.println?\(\s*"([^"]+)"\s*\)"#).ok())
        .as_ref()
}

pub fn serial_messages(program: &str) -> Vec<String> {
    serial_print_regex()
        .map(|re| {
            re.captures_iter(program)
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Check a program. Only an empty (or all-whitespace) program is an error.
pub fn check_program(program: &str) -> Result<ProgramReport, EmulationError> {
    if program.trim().is_empty() {
        return Err(EmulationError::EmptyProgram);
    }
    let sketch_bytes = program.len() * 2;
    Ok(ProgramReport {
        warnings: structural_warnings(program),
        sketch_bytes,
        storage_percent: sketch_bytes * 100 / STORAGE_BYTES,
        serial_messages: serial_messages(program),
        policy: derive_simulation_policy(program),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLINK: &str = r#"
void setup() {
  pinMode(13, OUTPUT);
  Serial.begin(9600);
  Serial.println("ready");
}

void loop() {
  digitalWrite(13, HIGH);
  delay(500);
  Serial.print( "tick" );
  digitalWrite(13, LOW);
  delay(500);
}
"#;

    #[test]
    fn test_blink_program() {
        let report = check_program(BLINK).unwrap();
        assert!(report.is_clean());
        assert!(report.policy.blink_enabled);
        assert_eq!(report.serial_messages, ["ready", "tick"]);
        assert_eq!(report.sketch_bytes, BLINK.len() * 2);
        assert_eq!(report.storage_percent, BLINK.len() * 200 / 32768);
    }

    #[test]
    fn test_empty_program_rejected() {
        assert_eq!(check_program(""), Err(EmulationError::EmptyProgram));
        assert_eq!(check_program("  \n\t"), Err(EmulationError::EmptyProgram));
    }

    #[test]
    fn test_warnings_do_not_block() {
        let report = check_program("int x = 1; {").unwrap();
        assert_eq!(
            report.warnings,
            vec![
                StructuralWarning::MissingSetup,
                StructuralWarning::MissingLoop,
                StructuralWarning::UnbalancedBraces { open: 1, close: 0 },
            ]
        );
    }

    #[test]
    fn test_policy_needs_both_calls() {
        assert!(!derive_simulation_policy("digitalWrite(13, HIGH);").blink_enabled);
        assert!(!derive_simulation_policy("delay(10);").blink_enabled);
        assert!(!derive_simulation_policy("digitalWrite(1,1); delay 5").blink_enabled);
        assert!(derive_simulation_policy("delay(1); digitalWrite(1,1);").blink_enabled);
    }

    #[test]
    fn test_serial_messages_skip_non_literals() {
        let msgs = serial_messages(r#"Serial.println(x); Serial.println(""); Serial.print("a b")"#);
        assert_eq!(msgs, ["a b"]);
    }

    #[test]
    fn test_storage_percent_rounds_down() {
        let program = "x".repeat(1000);
        let report = check_program(&program).unwrap();
        assert_eq!(report.sketch_bytes, 2000);
        assert_eq!(report.storage_percent, 6);
    }
}
