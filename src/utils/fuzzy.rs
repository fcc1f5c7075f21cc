// Fuzzy matching for mistyped stage and enum values

/// Levenshtein edit distance (insertions, deletions, substitutions)
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    if s1_chars.is_empty() {
        return s2_chars.len();
    }
    if s2_chars.is_empty() {
        return s1_chars.len();
    }

    // single rolling row
    let mut row: Vec<usize> = (0..=s2_chars.len()).collect();
    for (i, c1) in s1_chars.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != c2);
            let next = (row[j + 1] + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[s2_chars.len()]
}

/// Closest candidates to `input`, at most `limit`, nearest first.
///
/// Case-insensitive; a candidate that starts with the input always matches.
pub fn suggest<'a>(input: &str, candidates: &[&'a str], max_distance: usize, limit: usize) -> Vec<&'a str> {
    let needle = input.trim().to_lowercase();
    let mut matches: Vec<(&'a str, usize)> = candidates
        .iter()
        .filter_map(|candidate| {
            let hay = candidate.to_lowercase();
            if !needle.is_empty() && hay.starts_with(&needle) {
                return Some((*candidate, 0));
            }
            let distance = levenshtein_distance(&needle, &hay);
            (distance <= max_distance).then_some((*candidate, distance))
        })
        .collect();
    matches.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    matches.into_iter().take(limit).map(|(c, _)| c).collect()
}

/// "did you mean" hint for an unknown value, or an empty string
pub fn did_you_mean(input: &str, candidates: &[&str]) -> String {
    let near = suggest(input, candidates, 3, 3);
    if near.is_empty() {
        String::new()
    } else {
        format!(" Did you mean: {}?", near.join(", "))
    }
}
