//! Camelot wheel arithmetic.
//!
//! A code is a sector 1-12 plus a letter (`A` minor, `B` major). Sector
//! arithmetic is modulo 12 with 0 wrapping to 12. Codes print zero-padded
//! (`08A`) and parse with or without the padding.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Letter {
    A,
    B,
}

impl Letter {
    pub fn as_char(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
        }
    }

    pub fn from_char(ch: char) -> Option<Self> {
        match ch.to_ascii_uppercase() {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            _ => None,
        }
    }
}

pub fn flip_letter(letter: Letter) -> Letter {
    match letter {
        Letter::A => Letter::B,
        Letter::B => Letter::A,
    }
}

/// Wrap any signed sector number onto 1..=12.
pub fn wrap_sector(n: i32) -> u8 {
    match n.rem_euclid(12) {
        0 => 12,
        s => s as u8,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CamelotCode {
    sector: u8,
    letter: Letter,
}

impl CamelotCode {
    pub fn new(sector: i32, letter: Letter) -> Self {
        Self {
            sector: wrap_sector(sector),
            letter,
        }
    }

    /// Move around the wheel keeping the letter.
    pub fn shifted(self, delta: i32) -> Self {
        Self::new(self.sector as i32 + delta, self.letter)
    }

    pub fn flipped(self) -> Self {
        Self {
            sector: self.sector,
            letter: flip_letter(self.letter),
        }
    }

    /// Canonical lowercase key name for this code.
    pub fn key_name(&self) -> &'static str {
        let idx = (self.sector - 1) as usize;
        match self.letter {
            Letter::A => MINOR_KEYS[idx],
            Letter::B => MAJOR_KEYS[idx],
        }
    }
}

impl fmt::Display for CamelotCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{}", self.sector, self.letter.as_char())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid Camelot code '{0}'")]
pub struct ParseCamelotError(pub String);

impl FromStr for CamelotCode {
    type Err = ParseCamelotError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let err = || ParseCamelotError(raw.to_string());
        if trimmed.len() < 2 || !trimmed.is_ascii() {
            return Err(err());
        }
        let (number, letter) = trimmed.split_at(trimmed.len() - 1);
        let letter = letter.chars().next().and_then(Letter::from_char).ok_or_else(err)?;
        let sector: u8 = number.parse().map_err(|_| err())?;
        if !(1..=12).contains(&sector) {
            return Err(err());
        }
        Ok(Self { sector, letter })
    }
}

impl Serialize for CamelotCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CamelotCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for CamelotCode {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("CamelotCode")
    }

    fn json_schema(_gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": "string",
            "pattern": "^(0?[1-9]|1[0-2])[ABab]$",
            "description": "Camelot code, e.g. 08A"
        })
    }
}

/// Kind of key relationship between a reference and a candidate, from the
/// strongest affinity down. The numeric values order the variants and feed
/// the Camelot scoring factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CamelotPriority {
    SameKey,
    MajorMinorRelative,
    OneKeyStep,
    AdjacentSectorWithLetterFlip,
    OneOctaveJump,
    TwoSectorJump,
}

impl CamelotPriority {
    #[cfg(test)]
    pub const ALL: [Self; 6] = [
        Self::SameKey,
        Self::MajorMinorRelative,
        Self::OneKeyStep,
        Self::AdjacentSectorWithLetterFlip,
        Self::OneOctaveJump,
        Self::TwoSectorJump,
    ];

    pub const fn value(self) -> u8 {
        match self {
            Self::SameKey => 6,
            Self::MajorMinorRelative => 5,
            Self::OneKeyStep => 4,
            Self::AdjacentSectorWithLetterFlip => 3,
            Self::OneOctaveJump => 2,
            Self::TwoSectorJump => 1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SameKey => "same_key",
            Self::MajorMinorRelative => "major_minor_relative",
            Self::OneKeyStep => "one_key_step",
            Self::AdjacentSectorWithLetterFlip => "adjacent_sector_with_letter_flip",
            Self::OneOctaveJump => "one_octave_jump",
            Self::TwoSectorJump => "two_sector_jump",
        }
    }
}

impl PartialOrd for CamelotPriority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CamelotPriority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value().cmp(&other.value())
    }
}

impl fmt::Display for CamelotPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every code a track in `code` can hand over to, tagged with the kind of
/// transition. The adjacent letter-flip relationship contributes two codes.
pub fn harmonic_codes(code: CamelotCode) -> [(CamelotCode, CamelotPriority); 7] {
    let relative_delta = match code.letter {
        Letter::A => 3,
        Letter::B => -3,
    };
    let adjacent_delta = match code.letter {
        Letter::B => 1,
        Letter::A => -1,
    };
    [
        (code, CamelotPriority::SameKey),
        (code.shifted(1), CamelotPriority::OneKeyStep),
        (code.shifted(2), CamelotPriority::TwoSectorJump),
        (code.shifted(7), CamelotPriority::OneOctaveJump),
        (
            code.shifted(relative_delta).flipped(),
            CamelotPriority::MajorMinorRelative,
        ),
        (
            code.shifted(adjacent_delta).flipped(),
            CamelotPriority::AdjacentSectorWithLetterFlip,
        ),
        (code.flipped(), CamelotPriority::AdjacentSectorWithLetterFlip),
    ]
}

const MINOR_KEYS: [&str; 12] = [
    "g#m", "d#m", "bbm", "fm", "cm", "gm", "dm", "am", "em", "bm", "f#m", "c#m",
];
const MAJOR_KEYS: [&str; 12] = [
    "b", "f#", "db", "ab", "eb", "bb", "f", "c", "g", "d", "a", "e",
];

/// Map either a Camelot code or a musical key name to a Camelot code.
pub fn key_to_camelot(raw_key: &str) -> Option<CamelotCode> {
    raw_key
        .parse::<CamelotCode>()
        .ok()
        .or_else(|| standard_key_to_camelot(raw_key))
}

/// Canonical lowercase key (`c#m`, `ab`) for any accepted spelling.
pub fn canonical_key(raw_key: &str) -> Option<String> {
    if let Ok(code) = raw_key.parse::<CamelotCode>() {
        return Some(code.key_name().to_string());
    }
    let (root, is_minor) = split_key(raw_key)?;
    let mut out = root.to_ascii_lowercase();
    if is_minor {
        out.push('m');
    }
    Some(out)
}

pub fn standard_key_to_camelot(raw_key: &str) -> Option<CamelotCode> {
    let (root, is_minor) = split_key(raw_key)?;

    let number = if is_minor {
        match root.as_str() {
            "G#" | "Ab" => 1,
            "D#" | "Eb" => 2,
            "A#" | "Bb" => 3,
            "F" => 4,
            "C" => 5,
            "G" => 6,
            "D" => 7,
            "A" => 8,
            "E" => 9,
            "B" => 10,
            "F#" | "Gb" => 11,
            "C#" | "Db" => 12,
            _ => return None,
        }
    } else {
        match root.as_str() {
            "B" => 1,
            "F#" | "Gb" => 2,
            "C#" | "Db" => 3,
            "G#" | "Ab" => 4,
            "D#" | "Eb" => 5,
            "A#" | "Bb" => 6,
            "F" => 7,
            "C" => 8,
            "G" => 9,
            "D" => 10,
            "A" => 11,
            "E" => 12,
            _ => return None,
        }
    };
    let letter = if is_minor { Letter::A } else { Letter::B };
    Some(CamelotCode::new(number, letter))
}

/// Split a key name into a normalized root (`C#`, `Bb`) and a minor flag.
fn split_key(raw_key: &str) -> Option<(String, bool)> {
    let normalized = raw_key.trim().replace('\u{266F}', "#").replace('\u{266D}', "b");
    if normalized.is_empty() {
        return None;
    }
    let lower = normalized.to_ascii_lowercase();

    let (root_raw, is_minor) = if lower.ends_with("minor") && normalized.len() > 5 {
        (&normalized[..normalized.len() - 5], true)
    } else if lower.ends_with("min") && normalized.len() > 3 {
        (&normalized[..normalized.len() - 3], true)
    } else if lower.ends_with('m') && normalized.len() > 1 {
        (&normalized[..normalized.len() - 1], true)
    } else if lower.ends_with("major") && normalized.len() > 5 {
        (&normalized[..normalized.len() - 5], false)
    } else if lower.ends_with("maj") && normalized.len() > 3 {
        (&normalized[..normalized.len() - 3], false)
    } else {
        (normalized.as_str(), false)
    };
    Some((normalize_key_root(root_raw)?, is_minor))
}

fn normalize_key_root(root: &str) -> Option<String> {
    let stripped: String = root.chars().filter(|ch| !ch.is_whitespace()).collect();
    let mut chars = stripped.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !matches!(letter, 'A' | 'B' | 'C' | 'D' | 'E' | 'F' | 'G') {
        return None;
    }

    let accidental = chars.next();
    if chars.next().is_some() {
        return None;
    }

    match accidental {
        Some('#') => Some(format!("{letter}#")),
        Some('b') | Some('B') => Some(format!("{letter}b")),
        Some(_) => None,
        None => Some(letter.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn code(raw: &str) -> CamelotCode {
        raw.parse().unwrap()
    }

    #[test]
    fn flip_letter_swaps() {
        assert_eq!(flip_letter(Letter::A), Letter::B);
        assert_eq!(flip_letter(Letter::B), Letter::A);
    }

    #[test]
    fn wrap_sector_stays_on_the_wheel() {
        assert_eq!(wrap_sector(0), 12);
        assert_eq!(wrap_sector(13), 1);
        assert_eq!(wrap_sector(-3), 9);
        assert_eq!(CamelotCode::new(15, Letter::A).to_string(), "03A");
    }

    #[test]
    fn parse_accepts_padded_and_unpadded() {
        assert_eq!(code("8A"), code("08A"));
        assert_eq!(code(" 12b ").to_string(), "12B");
        assert!("13A".parse::<CamelotCode>().is_err());
        assert!("00B".parse::<CamelotCode>().is_err());
        assert!("8C".parse::<CamelotCode>().is_err());
        assert!("A".parse::<CamelotCode>().is_err());
    }

    #[test]
    fn serde_uses_padded_string() {
        let json = serde_json::to_value(code("8A")).unwrap();
        assert_eq!(json, serde_json::json!("08A"));
        let back: CamelotCode = serde_json::from_value(serde_json::json!("11b")).unwrap();
        assert_eq!(back, code("11B"));
    }

    #[test]
    fn priority_order_is_fixed() {
        let mut sorted = CamelotPriority::ALL.to_vec();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(sorted, CamelotPriority::ALL.to_vec());
        assert!(CamelotPriority::SameKey > CamelotPriority::MajorMinorRelative);
        assert!(CamelotPriority::OneOctaveJump > CamelotPriority::TwoSectorJump);
    }

    #[test]
    fn harmonic_codes_for_08a() {
        let codes: Vec<(String, CamelotPriority)> = harmonic_codes(code("08A"))
            .iter()
            .map(|(c, p)| (c.to_string(), *p))
            .collect();
        assert_eq!(
            codes,
            vec![
                ("08A".to_string(), CamelotPriority::SameKey),
                ("09A".to_string(), CamelotPriority::OneKeyStep),
                ("10A".to_string(), CamelotPriority::TwoSectorJump),
                ("03A".to_string(), CamelotPriority::OneOctaveJump),
                ("11B".to_string(), CamelotPriority::MajorMinorRelative),
                ("07B".to_string(), CamelotPriority::AdjacentSectorWithLetterFlip),
                ("08B".to_string(), CamelotPriority::AdjacentSectorWithLetterFlip),
            ]
        );
    }

    #[test]
    fn harmonic_codes_wrap_at_the_top_of_the_wheel() {
        let codes: Vec<String> = harmonic_codes(code("12B"))
            .iter()
            .map(|(c, _)| c.to_string())
            .collect();
        assert_eq!(codes, vec!["12B", "01B", "02B", "07B", "09A", "01A", "12A"]);

        let codes: Vec<String> = harmonic_codes(code("01A"))
            .iter()
            .map(|(c, _)| c.to_string())
            .collect();
        assert_eq!(codes, vec!["01A", "02A", "03A", "08A", "04B", "12B", "01B"]);
    }

    #[test]
    fn harmonic_codes_match_the_full_wheel() {
        let expected: [(&str, [&str; 7]); 24] = [
            ("01A", ["01A", "02A", "03A", "08A", "04B", "12B", "01B"]),
            ("01B", ["01B", "02B", "03B", "08B", "10A", "02A", "01A"]),
            ("02A", ["02A", "03A", "04A", "09A", "05B", "01B", "02B"]),
            ("02B", ["02B", "03B", "04B", "09B", "11A", "03A", "02A"]),
            ("03A", ["03A", "04A", "05A", "10A", "06B", "02B", "03B"]),
            ("03B", ["03B", "04B", "05B", "10B", "12A", "04A", "03A"]),
            ("04A", ["04A", "05A", "06A", "11A", "07B", "03B", "04B"]),
            ("04B", ["04B", "05B", "06B", "11B", "01A", "05A", "04A"]),
            ("05A", ["05A", "06A", "07A", "12A", "08B", "04B", "05B"]),
            ("05B", ["05B", "06B", "07B", "12B", "02A", "06A", "05A"]),
            ("06A", ["06A", "07A", "08A", "01A", "09B", "05B", "06B"]),
            ("06B", ["06B", "07B", "08B", "01B", "03A", "07A", "06A"]),
            ("07A", ["07A", "08A", "09A", "02A", "10B", "06B", "07B"]),
            ("07B", ["07B", "08B", "09B", "02B", "04A", "08A", "07A"]),
            ("08A", ["08A", "09A", "10A", "03A", "11B", "07B", "08B"]),
            ("08B", ["08B", "09B", "10B", "03B", "05A", "09A", "08A"]),
            ("09A", ["09A", "10A", "11A", "04A", "12B", "08B", "09B"]),
            ("09B", ["09B", "10B", "11B", "04B", "06A", "10A", "09A"]),
            ("10A", ["10A", "11A", "12A", "05A", "01B", "09B", "10B"]),
            ("10B", ["10B", "11B", "12B", "05B", "07A", "11A", "10A"]),
            ("11A", ["11A", "12A", "01A", "06A", "02B", "10B", "11B"]),
            ("11B", ["11B", "12B", "01B", "06B", "08A", "12A", "11A"]),
            ("12A", ["12A", "01A", "02A", "07A", "03B", "11B", "12B"]),
            ("12B", ["12B", "01B", "02B", "07B", "09A", "01A", "12A"]),
        ];
        for (reference, row) in expected {
            let got: Vec<String> = harmonic_codes(code(reference))
                .iter()
                .map(|(c, _)| c.to_string())
                .collect();
            assert_eq!(got, row, "harmonic codes for {reference}");
            let priorities: Vec<CamelotPriority> =
                harmonic_codes(code(reference)).iter().map(|(_, p)| *p).collect();
            assert_eq!(
                priorities,
                vec![
                    CamelotPriority::SameKey,
                    CamelotPriority::OneKeyStep,
                    CamelotPriority::TwoSectorJump,
                    CamelotPriority::OneOctaveJump,
                    CamelotPriority::MajorMinorRelative,
                    CamelotPriority::AdjacentSectorWithLetterFlip,
                    CamelotPriority::AdjacentSectorWithLetterFlip,
                ]
            );
        }
    }

    #[test]
    fn harmonic_codes_are_distinct_for_all_24_codes() {
        for sector in 1..=12 {
            for letter in [Letter::A, Letter::B] {
                let reference = CamelotCode::new(sector, letter);
                let codes = harmonic_codes(reference);
                let unique: HashSet<CamelotCode> = codes.iter().map(|(c, _)| *c).collect();
                assert_eq!(unique.len(), codes.len(), "duplicates for {reference}");
                assert!(codes.iter().all(|(c, _)| (1..=12).contains(&c.sector)));
            }
        }
    }

    #[test]
    fn relative_and_octave_invert() {
        for sector in 1..=12 {
            for letter in [Letter::A, Letter::B] {
                let start = CamelotCode::new(sector, letter);
                let relative = harmonic_codes(start)[4].0;
                assert_eq!(harmonic_codes(relative)[4].0, start);
                assert_eq!(start.shifted(7).shifted(-7), start);
            }
        }
    }

    #[test]
    fn standard_keys_map_to_the_wheel() {
        assert_eq!(key_to_camelot("Am"), Some(code("8A")));
        assert_eq!(key_to_camelot("a minor"), Some(code("8A")));
        assert_eq!(key_to_camelot("C"), Some(code("8B")));
        assert_eq!(key_to_camelot("c#m"), Some(code("12A")));
        assert_eq!(key_to_camelot("D\u{266D}"), Some(code("3B")));
        assert_eq!(key_to_camelot("Ebmaj"), Some(code("5B")));
        assert_eq!(key_to_camelot("10A"), Some(code("10A")));
        assert_eq!(key_to_camelot("H"), None);
        assert_eq!(key_to_camelot(""), None);
    }

    #[test]
    fn canonical_key_is_lowercase() {
        assert_eq!(canonical_key("C#m").as_deref(), Some("c#m"));
        assert_eq!(canonical_key("Ab Major").as_deref(), Some("ab"));
        assert_eq!(canonical_key("08A").as_deref(), Some("am"));
        assert_eq!(canonical_key("3B").as_deref(), Some("db"));
        assert_eq!(canonical_key("xyz"), None);
    }

    #[test]
    fn key_names_roundtrip_through_the_wheel() {
        for sector in 1..=12 {
            for letter in [Letter::A, Letter::B] {
                let c = CamelotCode::new(sector, letter);
                assert_eq!(key_to_camelot(c.key_name()), Some(c), "{}", c.key_name());
            }
        }
    }
}
