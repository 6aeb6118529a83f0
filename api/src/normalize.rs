//! Map free-text team names from chat onto the tournament's canonical names.

const QUOTES: [char; 3] = ['"', '\u{201C}', '\u{201D}'];

/// Strip straight and curly double quotes plus surrounding whitespace.
pub fn clean_input(input: &str) -> String {
    input.replace(QUOTES, "").trim().to_owned()
}

/// True when every character of `needle` occurs in `haystack`, in order.
fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut rest = haystack.chars();
    needle.chars().all(|c| rest.any(|h| h == c))
}

/// Best canonical name for one input, case-insensitively.
///
/// Candidates are the names containing the input's characters in order. A
/// single candidate wins outright; among several, an exact match is preferred,
/// then the smallest edit distance, then the earliest listed.
pub fn closest_team<'a>(input: &str, valid: &'a [String]) -> Option<&'a str> {
    let needle = clean_input(input).to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let candidates: Vec<(&'a str, String)> = valid
        .iter()
        .map(|name| (name.as_str(), name.to_lowercase()))
        .filter(|(_, lower)| is_subsequence(&needle, lower))
        .collect();

    if let Some((name, _)) = candidates.iter().find(|(_, lower)| *lower == needle) {
        return Some(name);
    }
    candidates
        .iter()
        .min_by_key(|(_, lower)| strsim::levenshtein(&needle, lower))
        .map(|(name, _)| *name)
}

/// Normalize a whole submission. All-or-nothing: any unmatched input makes the
/// result an `Err` carrying every input that could not be matched.
pub fn normalize_teams(inputs: &[String], valid: &[String]) -> Result<Vec<String>, Vec<String>> {
    let mut matched = Vec::with_capacity(inputs.len());
    let mut invalid = Vec::new();
    for input in inputs {
        match closest_team(input, valid) {
            Some(name) => matched.push(name.to_owned()),
            None => invalid.push(clean_input(input)),
        }
    }
    if invalid.is_empty() { Ok(matched) } else { Err(invalid) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teams(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matching_ignores_case() {
        let valid = teams(&["FaZe Clan", "Natus Vincere", "G2 Esports"]);
        assert_eq!(
            normalize_teams(&teams(&["faze clan", "NATUS VINCERE", "g2 EsPoRtS"]), &valid),
            Ok(valid.clone())
        );
    }

    #[test]
    fn abbreviations_match_by_subsequence() {
        let valid = teams(&["FaZe Clan", "Natus Vincere", "G2 Esports", "Team Vitality"]);
        assert_eq!(closest_team("FaZe", &valid), Some("FaZe Clan"));
        assert_eq!(closest_team("navi", &valid), Some("Natus Vincere"));
        assert_eq!(closest_team("vita", &valid), Some("Team Vitality"));
    }

    #[test]
    fn exact_match_beats_longer_candidates() {
        let valid = teams(&["Cloud9 Blue", "Cloud9", "Cloud9 White"]);
        assert_eq!(closest_team("cloud9", &valid), Some("Cloud9"));
    }

    #[test]
    fn closest_by_edit_distance_when_no_exact_match() {
        let valid = teams(&["Team Liquid", "Liquid Academy"]);
        assert_eq!(closest_team("liquid", &valid), Some("Team Liquid"));
    }

    #[test]
    fn quotes_are_stripped() {
        let valid = teams(&["The MongolZ"]);
        assert_eq!(closest_team("\u{201C}The MongolZ\u{201D}", &valid), Some("The MongolZ"));
        assert_eq!(clean_input(" \"Team Spirit\" "), "Team Spirit");
    }

    #[test]
    fn unmatched_inputs_fail_the_whole_submission() {
        let valid = teams(&["Team A", "Team B", "Team C"]);
        assert_eq!(
            normalize_teams(&teams(&["Team A", "InvalidTeam", "Team B", "AnotherInvalid"]), &valid),
            Err(teams(&["InvalidTeam", "AnotherInvalid"]))
        );
        assert_eq!(closest_team("\"\"", &valid), None);
    }
}
