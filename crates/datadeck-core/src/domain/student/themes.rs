//! Character themes and their name pools

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Closed set of character themes a session's roster draws names from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterTheme {
    Animals,
    Superheroes,
    Fantasy,
    Space,
}

impl CharacterTheme {
    /// Create from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "animals" => Some(Self::Animals),
            "superheroes" => Some(Self::Superheroes),
            "fantasy" => Some(Self::Fantasy),
            "space" => Some(Self::Space),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Animals => "animals",
            Self::Superheroes => "superheroes",
            Self::Fantasy => "fantasy",
            Self::Space => "space",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Animals, Self::Superheroes, Self::Fantasy, Self::Space]
    }

    /// The theme's full name pool
    pub fn name_pool(&self) -> &'static [String] {
        match self {
            Self::Animals => &ANIMALS,
            Self::Superheroes => &SUPERHEROES,
            Self::Fantasy => &FANTASY,
            Self::Space => &SPACE,
        }
    }

    /// Relative path of the avatar image for a character name
    pub fn avatar_path(&self, character_name: &str) -> String {
        let slug = character_name.to_lowercase().replace(' ', "-");
        format!("avatars/{}/{}.png", self.as_str(), slug)
    }
}

impl fmt::Display for CharacterTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static ANIMALS: LazyLock<Vec<String>> = LazyLock::new(|| {
    [
        "Otter", "Badger", "Falcon", "Panther", "Dolphin", "Hedgehog", "Lynx", "Raccoon",
        "Gazelle", "Puffin", "Wolverine", "Ocelot", "Heron", "Mongoose", "Ibex", "Koala",
        "Wombat", "Toucan", "Armadillo", "Cheetah", "Narwhal", "Pelican", "Marmot", "Jackal",
        "Kestrel", "Lemur", "Meerkat", "Newt", "Osprey", "Platypus", "Quokka", "Salamander",
        "Tapir", "Urchin", "Vole", "Walrus", "Axolotl", "Bison", "Condor", "Dingo",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
});

static FANTASY: LazyLock<Vec<String>> = LazyLock::new(|| {
    [
        "Griffin", "Phoenix", "Sprite", "Kelpie", "Dryad", "Basilisk", "Chimera", "Wyvern",
        "Selkie", "Banshee", "Golem", "Kraken", "Naiad", "Pixie", "Roc", "Sphinx",
        "Troll", "Unicorn", "Valkyrie", "Wraith", "Djinn", "Faun", "Gorgon", "Hydra",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
});

static SUPERHEROES: LazyLock<Vec<String>> = LazyLock::new(|| {
    compose_pool(
        &[
            "Captain", "Doctor", "Agent", "Professor", "Major", "Shadow", "Iron", "Silver",
            "Crimson", "Thunder",
        ],
        &["Bolt", "Comet", "Falcon", "Nova", "Storm"],
    )
});

static SPACE: LazyLock<Vec<String>> = LazyLock::new(|| {
    compose_pool(
        &[
            "Nebula", "Quasar", "Pulsar", "Orion", "Vega", "Andromeda", "Cosmic", "Lunar",
            "Solar", "Stellar",
        ],
        &["Pilot", "Ranger", "Scout", "Voyager", "Navigator"],
    )
});

fn compose_pool(prefixes: &[&str], suffixes: &[&str]) -> Vec<String> {
    let mut pool = Vec::with_capacity(prefixes.len() * suffixes.len());
    for prefix in prefixes {
        for suffix in suffixes {
            pool.push(format!("{} {}", prefix, suffix));
        }
    }
    pool
}
