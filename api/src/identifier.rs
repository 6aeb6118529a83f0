use crate::error::EngineError;
use regex::Regex;
use std::sync::LazyLock;

/// `<bracket id>_R<round>-M<match>`, e.g. `RSTxQ88PoQ_R03-M001`.
static MATCH_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_R(\d+)-M(\d+)$").expect("valid match id regex"));

/// Recover `(round, match)` from a match identifier. Zero padding is ignored.
pub fn decode_identifier(id: &str) -> Result<(u32, u32), EngineError> {
    let malformed = || EngineError::MalformedIdentifier(id.to_owned());
    let caps = MATCH_ID_RE.captures(id).ok_or_else(malformed)?;
    let round = caps[1].parse::<u32>().map_err(|_| malformed())?;
    let game = caps[2].parse::<u32>().map_err(|_| malformed())?;
    Ok((round, game))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_zero_padded_suffix() {
        assert_eq!(decode_identifier("RSTxQ88PoQ_R03-M001"), Ok((3, 1)));
        assert_eq!(decode_identifier("abc_R01-M012"), Ok((1, 12)));
    }

    #[test]
    fn bracket_id_may_contain_underscores() {
        assert_eq!(decode_identifier("Major_2025_Playoffs_R02-M002"), Ok((2, 2)));
    }

    #[test]
    fn rejects_anything_without_the_suffix() {
        for id in ["", "RSTxQ88PoQ", "x_R03M001", "x_R03-M001-extra", "x_Rab-M001", "x-R01-M001"] {
            assert_eq!(
                decode_identifier(id),
                Err(EngineError::MalformedIdentifier(id.to_owned())),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn oversized_numbers_are_malformed_not_panics() {
        let id = "x_R99999999999999999999-M001";
        assert_eq!(decode_identifier(id), Err(EngineError::MalformedIdentifier(id.to_owned())));
    }
}
