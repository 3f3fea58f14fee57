use std::path::Path;

/// Normalize a string for matching: lowercase, keep alphanumeric chars and
/// single spaces, strip everything else.
pub fn normalize_for_matching(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized file stem of a path, e.g. `/m/Artist - Title (Mix).flac`
/// becomes `artist title mix`.
pub fn normalized_file_stem(path: &str) -> Option<String> {
    let stem = Path::new(path).file_stem()?.to_str()?;
    let normalized = normalize_for_matching(stem);
    (!normalized.is_empty()).then_some(normalized)
}

/// Split a tag's artist string into individual names on the usual
/// separators (`, `, ` & `, ` feat. `, ` ft. `, ` x `, `;`). Duplicates
/// collapse to the first occurrence.
pub fn split_artists(raw: &str) -> Vec<String> {
    const SEPARATORS: &[&str] = &[
        " feat. ", " Feat. ", " feat ", " Feat ", " ft. ", " Ft. ", " & ", " x ", ", ", ";",
    ];
    let mut parts = vec![raw.to_string()];
    for sep in SEPARATORS {
        parts = parts
            .iter()
            .flat_map(|part| part.split(sep).map(str::to_string).collect::<Vec<_>>())
            .collect();
    }
    let mut names: Vec<String> = Vec::new();
    for name in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
