use crate::Format;
use crate::client::{ApiError, ApiResult};
use regex::Regex;
use std::sync::LazyLock;

static FORMAT_SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)==\s*Format\s*==\s*(.*)").expect("valid format section regex"));

static MATCHLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{\s*Matchlist\s*\|([^}]*)\}\}").expect("valid matchlist regex")
});

static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{\s*Bracket\s*\|([^}]*)\}\}").expect("valid bracket regex"));

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));

/// Read the tournament format from the page's `==Format==` section.
/// A page describing both stages is treated as single-elimination.
pub fn detect_format(wikitext: &str) -> Option<Format> {
    let caps = FORMAT_SECTION_RE.captures(wikitext)?;
    let section = caps[1].to_lowercase();
    let swiss = section.contains("swiss");
    let elimination = section.contains("single-elimination");
    match (swiss, elimination) {
        (_, true) => Some(Format::SingleElimination),
        (true, false) => Some(Format::Swiss),
        (false, false) => None,
    }
}

/// Bracket ids of every match table on the page, in page order, plus the page's format.
///
/// Swiss stages list their tables as `{{Matchlist|id=...}}`; playoffs use
/// `{{Bracket|...|id=...}}`. Only the first `id=` of each template counts.
pub fn extract_bracket_ids(wikitext: &str) -> ApiResult<(Vec<String>, Format)> {
    let format = detect_format(wikitext)
        .ok_or_else(|| ApiError::Wikitext("unknown tournament format".into()))?;
    let template = match format {
        Format::Swiss => &*MATCHLIST_RE,
        Format::SingleElimination => &*BRACKET_RE,
    };

    let ids: Vec<String> = template
        .captures_iter(wikitext)
        .filter_map(|caps| template_id(&caps[1]))
        .collect();

    if ids.is_empty() {
        return Err(ApiError::Wikitext("no identifiers found".into()));
    }
    Ok((ids, format))
}

fn template_id(params: &str) -> Option<String> {
    let raw = params
        .split('|')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("id="))?;
    let id = COMMENT_RE.replace_all(raw, "");
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_owned())
}
