//! Identifier generation for placed instances and wires.
//!
//! Each [`CircuitGraph`](super::CircuitGraph) owns its generator, so two
//! graphs (or two tests) never share a counter.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStyle {
    /// `i1`, `w2`, `i3`, ... from one counter per graph.
    #[default]
    Sequential,
    /// Random v4 UUID strings.
    Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    style: IdStyle,
    counter: u64,
}

impl IdGenerator {
    pub fn new(style: IdStyle) -> Self {
        Self { style, counter: 0 }
    }

    pub fn sequential() -> Self {
        Self::new(IdStyle::Sequential)
    }

    pub fn uuid() -> Self {
        Self::new(IdStyle::Uuid)
    }

    pub fn style(&self) -> IdStyle {
        self.style
    }

    pub fn next_instance_id(&mut self) -> String {
        self.next("i")
    }

    pub fn next_wire_id(&mut self) -> String {
        self.next("w")
    }

    fn next(&mut self, prefix: &str) -> String {
        match self.style {
            IdStyle::Sequential => {
                self.counter += 1;
                format!("{}{}", prefix, self.counter)
            }
            IdStyle::Uuid => Uuid::new_v4().to_string(),
        }
    }
}
