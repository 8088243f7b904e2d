use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default confidence an image match must reach to count as found.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;

/// An absolute screen position in pixels.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A template image to look for on screen.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImagePattern {
    /// Base64-encoded image bytes (PNG, JPEG, ...).
    pub base64_data: String,
    /// Minimum confidence in `[0, 1]` for a match to be accepted (inclusive).
    /// Unset patterns take the script's `defaultImageMatchThreshold`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_threshold: Option<f64>,
}

impl ImagePattern {
    pub fn new(base64_data: impl Into<String>, match_threshold: f64) -> Self {
        Self {
            base64_data: base64_data.into(),
            match_threshold: Some(match_threshold),
        }
    }

    /// Effective threshold; [`DEFAULT_MATCH_THRESHOLD`] when unset.
    pub fn threshold(&self) -> f64 {
        self.match_threshold.unwrap_or(DEFAULT_MATCH_THRESHOLD)
    }
}

/// Abstract reference to an on-screen element, resolved to a coordinate at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementIdentifier {
    /// A fixed position; always resolves.
    ByCoordinate(Coordinate),
    /// A template image searched for in a fresh screen capture.
    ByImage(ImagePattern),
}

impl ElementIdentifier {
    pub fn at(x: i32, y: i32) -> Self {
        Self::ByCoordinate(Coordinate::new(x, y))
    }
}

/// Boolean predicate over the live screen.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    ElementExists { identifier: ElementIdentifier },
    ElementNotExists { identifier: ElementIdentifier },
    And { conditions: Vec<Condition> },
    Or { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

impl Condition {
    pub fn exists(identifier: ElementIdentifier) -> Self {
        Self::ElementExists { identifier }
    }

    pub fn not_exists(identifier: ElementIdentifier) -> Self {
        Self::ElementNotExists { identifier }
    }

    pub fn negate(condition: Condition) -> Self {
        Self::Not {
            condition: Box::new(condition),
        }
    }

    /// Visit every element identifier referenced by this condition, depth first.
    pub fn for_each_identifier<'a>(&'a self, f: &mut dyn FnMut(&'a ElementIdentifier)) {
        match self {
            Condition::ElementExists { identifier } | Condition::ElementNotExists { identifier } => {
                f(identifier)
            }
            Condition::And { conditions } | Condition::Or { conditions } => {
                for c in conditions {
                    c.for_each_identifier(f);
                }
            }
            Condition::Not { condition } => condition.for_each_identifier(f),
        }
    }

    pub fn for_each_identifier_mut(&mut self, f: &mut dyn FnMut(&mut ElementIdentifier)) {
        match self {
            Condition::ElementExists { identifier } | Condition::ElementNotExists { identifier } => {
                f(identifier)
            }
            Condition::And { conditions } | Condition::Or { conditions } => {
                for c in conditions {
                    c.for_each_identifier_mut(f);
                }
            }
            Condition::Not { condition } => condition.for_each_identifier_mut(f),
        }
    }
}
