use std::collections::HashMap;
use std::sync::OnceLock;

/// Subgenre families. Two different genres in the same family count as
/// related when scoring a transition.
pub const FAMILIES: &[(&str, &[&str])] = &[
    (
        "Trance",
        &[
            "Trance",
            "Progressive Trance",
            "Psytrance",
            "Tech Trance",
            "Uplifting Trance",
            "Vocal Trance",
        ],
    ),
    (
        "House",
        &[
            "Afro House",
            "Deep House",
            "House",
            "Progressive House",
            "Tech House",
        ],
    ),
    (
        "Techno",
        &["Deep Techno", "Dub Techno", "Hard Techno", "Minimal", "Techno"],
    ),
    ("Breaks", &["Breakbeat", "Electro", "UK Bass"]),
    ("Drum & Bass", &["Drum & Bass", "Jungle"]),
];

/// Alias spellings seen in tags, mapped to the family member name.
/// Keys must be lowercase. Sorted alphabetically by key.
pub const ALIASES: &[(&str, &str)] = &[
    ("breaks", "Breakbeat"),
    ("d&b", "Drum & Bass"),
    ("dnb", "Drum & Bass"),
    ("drum and bass", "Drum & Bass"),
    ("drum n bass", "Drum & Bass"),
    ("hard trance", "Trance"),
    ("melodic house & techno", "Deep Techno"),
    ("psy-trance", "Psytrance"),
    ("psychedelic trance", "Psytrance"),
    ("tech-house", "Tech House"),
    ("trance (main floor)", "Trance"),
    ("uplifting", "Uplifting Trance"),
];

fn alias_map() -> &'static HashMap<String, &'static str> {
    static MAP: OnceLock<HashMap<String, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        ALIASES
            .iter()
            .map(|&(alias, canonical)| (alias.to_string(), canonical))
            .collect()
    })
}

/// Family member with matching casing, if the genre is known.
pub fn canonical_casing(genre: &str) -> Option<&'static str> {
    FAMILIES
        .iter()
        .flat_map(|(_, members)| members.iter())
        .find(|g| g.eq_ignore_ascii_case(genre))
        .copied()
}

/// Clean a raw tag genre: trim, collapse whitespace, resolve known aliases
/// and casing. Unknown genres pass through trimmed. Empty yields `None`.
pub fn tidy_genre(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    if let Some(canonical) = alias_map().get(&collapsed.to_lowercase()) {
        return Some(canonical.to_string());
    }
    Some(
        canonical_casing(&collapsed)
            .map(str::to_string)
            .unwrap_or(collapsed),
    )
}

/// Every unordered pair of distinct genres sharing a family.
pub fn default_related_pairs() -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (_, members) in FAMILIES {
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                pairs.push((a.to_string(), b.to_string()));
            }
        }
    }
    pairs
}
