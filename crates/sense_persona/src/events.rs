//! Scenario event triggers.
//!
//! Events ratchet: once active for a session they stay active. The predicate
//! is pure apart from the injected random source.

use rand::{Rng, RngCore};
use sense_core::{EventTrigger, ScenarioEvent};

/// All present predicates must hold. Keywords match case-insensitively as
/// substrings; a probability below 1.0 costs one draw from `rng`.
pub fn is_triggered(
    trigger: &EventTrigger,
    turn: u32,
    trust: i32,
    message: &str,
    rng: &mut dyn RngCore,
) -> bool {
    if matches!(trigger.turn_gte, Some(n) if turn < n) {
        return false;
    }
    if matches!(trigger.trust_gte, Some(n) if trust < n) {
        return false;
    }
    if !trigger.keyword_any.is_empty() {
        let text = message.to_lowercase();
        let hit = trigger
            .keyword_any
            .iter()
            .map(|k| k.to_lowercase())
            .any(|k| !k.is_empty() && text.contains(&k));
        if !hit {
            return false;
        }
    }
    let probability = trigger.probability();
    if probability < 1.0 && rng.gen::<f64>() > probability {
        return false;
    }
    true
}

/// Ids of events in `catalog` that are not yet in `active` and fire now.
pub fn newly_triggered(
    catalog: &[ScenarioEvent],
    active: &[String],
    turn: u32,
    trust: i32,
    message: &str,
    rng: &mut dyn RngCore,
) -> Vec<String> {
    let mut fired: Vec<String> = Vec::new();
    for event in catalog {
        if active.contains(&event.id) || fired.contains(&event.id) {
            continue;
        }
        if is_triggered(&event.trigger, turn, trust, message, rng) {
            fired.push(event.id.clone());
        }
    }
    fired
}
