//! Release identifier and version string generation.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::error::{Error, Result};

/// Computes the canary version string for a commit and sequence number.
///
/// Deterministic in its inputs; distinct sequence numbers for the same
/// commit never collide.
pub fn canary_version(sha: &str, sequence: u64) -> String {
    let shorthash = short_sha(sha);
    format!("0.0.0-canary.{shorthash}.{sequence}")
}

/// First seven characters of a commit hash.
pub fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(7)]
}

/// Produces a hyphen-joined adjective-noun release id absent from
/// `existing`.
///
/// Both word lists are shuffled independently, then every adjective-noun
/// combination is tried: the adjective index cycles, and the noun index
/// advances each time the adjectives wrap around.
///
/// # Errors
///
/// Returns [`Error::IdSpaceExhausted`] once every combination is taken.
pub fn random_id(existing: &HashSet<String>) -> Result<String> {
    let mut rng = thread_rng();
    let mut adjectives: Vec<&str> = ADJECTIVES.to_vec();
    let mut nouns: Vec<&str> = NOUNS.to_vec();
    adjectives.shuffle(&mut rng);
    nouns.shuffle(&mut rng);

    let mut adj_index = 0;
    let mut noun_index = 0;
    while noun_index < nouns.len() {
        let id = format!("{}-{}", adjectives[adj_index], nouns[noun_index]);
        if !existing.contains(&id) {
            return Ok(id);
        }
        adj_index += 1;
        if adj_index == adjectives.len() {
            adj_index = 0;
            noun_index += 1;
        }
    }
    Err(Error::IdSpaceExhausted)
}

#[rustfmt::skip]
const ADJECTIVES: &[&str] = &[
    "aged", "ancient", "astonishing", "autumn", "bewildered", "billowing",
    "bitter", "blue", "bold", "bored", "brainy", "brave", "bright", "broken",
    "calm", "capricious", "careful", "cheerful", "clever", "cold", "cool",
    "coordinated", "crimson", "curated", "curious", "curly", "damp", "dapper",
    "dark", "dawn", "dazzling", "deep", "delicate", "delightful", "determined",
    "divine", "dry", "elegant", "empty", "enchanted", "energetic", "enthusiastic",
    "exuberant", "fabulous", "falling", "famous", "fancy", "festive", "fierce",
    "flat", "floral", "fragrant", "fresh", "frosty", "gaudy", "gentle",
    "gleaming", "glorious", "green", "happy", "hidden", "honorable", "humble",
    "icy", "jolly", "late", "lingering", "little", "lively", "long", "lucky",
    "magnificent", "majestic", "marvelous", "mighty", "misty", "morning", "muddy",
    "mysterious", "nameless", "neat", "noisy", "oblivious", "old", "orange",
    "patient", "plain", "polished", "polite", "proud", "purple", "quick", "quiet",
    "rapid", "restless", "rough", "round", "royal", "shiny", "shrill", "shy",
    "silent", "small", "snowy", "soft", "solitary", "sour", "sparkling", "spiffy",
    "spring", "square", "steep", "still", "strong", "summer", "super", "sweet",
    "swift", "thundering", "tidy", "twilight", "upbeat", "vivid", "wandering",
    "weathered", "whimsical", "wild", "winter", "windy", "wispy", "withered",
    "worried", "young",
];

#[rustfmt::skip]
const NOUNS: &[&str] = &[
    "art", "band", "bar", "base", "bird", "block", "boat", "bonus", "bread",
    "breeze", "brook", "butterfly", "cake", "cloud", "credit", "darkness",
    "dawn", "dew", "disk", "dream", "dust", "feather", "field", "fire", "firefly",
    "flower", "fog", "forest", "frog", "frost", "glade", "glitter", "grass",
    "hall", "hat", "haze", "heart", "hill", "lab", "lake", "leaf", "limit",
    "math", "meadow", "mode", "moon", "morning", "mountain", "mouse", "mud",
    "night", "paper", "pine", "poetry", "pond", "rain", "recipe", "resonance",
    "rice", "river", "salad", "scene", "sea", "shadow", "shape", "silence", "sky",
    "smoke", "snow", "snowflake", "sound", "star", "sun", "sunset", "surf",
    "term", "thunder", "tooth", "tree", "truth", "union", "unit", "violet",
    "voice", "water", "waterfall", "wave", "wildflower", "wind",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canary_version_is_deterministic() {
        let sha = "0123456789abcdef";
        assert_eq!(canary_version(sha, 3), canary_version(sha, 3));
        assert_eq!(canary_version(sha, 3), "0.0.0-canary.0123456.3");
        assert_ne!(canary_version(sha, 3), canary_version(sha, 4));
    }

    #[test]
    fn word_lists_have_no_duplicate_pairs() {
        // The exhaustion bound assumes |adjectives| * |nouns| distinct ids.
        let adjectives: HashSet<_> = ADJECTIVES.iter().collect();
        assert_eq!(adjectives.len(), ADJECTIVES.len());
        let nouns: HashSet<_> = NOUNS.iter().collect();
        assert_eq!(nouns.len(), NOUNS.len());
    }

    #[test]
    fn full_id_space_is_an_error() {
        let existing: HashSet<String> = ADJECTIVES
            .iter()
            .flat_map(|adj| NOUNS.iter().map(move |noun| format!("{adj}-{noun}")))
            .collect();
        let err = random_id(&existing).unwrap_err();
        assert!(matches!(err, Error::IdSpaceExhausted));
    }
}
