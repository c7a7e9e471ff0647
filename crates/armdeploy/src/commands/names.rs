//! Default resource group names

use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "azure", "brisk", "calm", "dusky", "early", "fleet", "gentle", "hardy", "icy", "jolly",
    "lofty", "misty", "noble", "polar", "quiet", "rapid", "sunny", "tidal", "upper", "windy",
];

const NOUNS: &[&str] = &[
    "basin", "cirrus", "delta", "fjord", "glacier", "haven", "island", "lagoon", "meadow",
    "nimbus", "orchard", "prairie", "ridge", "summit", "thicket", "tundra", "valley", "willow",
    "canyon", "estuary",
];

/// Generate a name like "misty-glacier-2847"; always a valid resource group name.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let number: u16 = rng.gen_range(1000..10000);
    format!("{}-{}-{}", adjective, noun, number)
}
