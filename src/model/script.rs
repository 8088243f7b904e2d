use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::{DEFAULT_MATCH_THRESHOLD, ElementIdentifier};
use super::step::Step;
use crate::utils::tree;

/// Root container of an automation script.
///
/// A script is treated as read-only while it runs; editors replace it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct Script {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub settings: ScriptSettings,
}

impl Script {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps,
            settings: ScriptSettings::default(),
        }
    }

    /// Fill every unset step delay and image threshold from `settings`.
    ///
    /// Values written in the script itself are kept.
    pub fn apply_settings(&mut self) {
        let Script { steps, settings, .. } = self;
        tree::for_each_mut(steps, |step| {
            step.fill_delays(settings.default_delay_before, settings.default_delay_after);
            let mut fill = |identifier: &mut ElementIdentifier| {
                if let ElementIdentifier::ByImage(pattern) = identifier {
                    pattern
                        .match_threshold
                        .get_or_insert(settings.default_image_match_threshold);
                }
            };
            match step {
                Step::Action(s) => s.action.targets_mut().into_iter().for_each(&mut fill),
                Step::Conditional(b) => b.condition.for_each_identifier_mut(&mut fill),
                Step::Observer(b) => b.condition.for_each_identifier_mut(&mut fill),
                Step::Group(_) => {}
            }
        });
    }
}

/// Per-script defaults, applied by [`Script::apply_settings`] when a run starts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSettings {
    #[serde(default)]
    pub default_delay_before: u64,
    #[serde(default)]
    pub default_delay_after: u64,
    /// Delay between observer ticks, in milliseconds. Unset uses the engine configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observer_check_delay: Option<u64>,
    #[serde(default = "default_threshold")]
    pub default_image_match_threshold: f64,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            default_delay_before: 0,
            default_delay_after: 0,
            observer_check_delay: None,
            default_image_match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}
