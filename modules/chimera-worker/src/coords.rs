use regex::Regex;
use std::sync::OnceLock;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"))
}

/// Pull `(x, y)` tile-center pairs out of a vision agent's free-text reply,
/// robust to both `x,y` and `x y` formats (SPEC_FULL.md §4.5): every two
/// consecutive numbers found in the text form one pair.
pub fn parse_coordinate_pairs(text: &str) -> Vec<(f64, f64)> {
    let numbers: Vec<f64> = number_pattern()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect();
    numbers.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_pairs() {
        let pairs = parse_coordinate_pairs("click tiles at 120,340 and 410,220");
        assert_eq!(pairs, vec![(120.0, 340.0), (410.0, 220.0)]);
    }

    #[test]
    fn parses_space_separated_pairs() {
        let pairs = parse_coordinate_pairs("coordinates: 50 60\nthen 70 80");
        assert_eq!(pairs, vec![(50.0, 60.0), (70.0, 80.0)]);
    }

    #[test]
    fn odd_trailing_number_is_dropped() {
        let pairs = parse_coordinate_pairs("120,340 then just 99");
        assert_eq!(pairs, vec![(120.0, 340.0)]);
    }

    #[test]
    fn empty_text_yields_no_pairs() {
        assert!(parse_coordinate_pairs("no coordinates here").is_empty());
    }
}
