/// Similarity between two normalized entity names, in [0, 1].
///
/// Tiers, checked in order: exact equality 1.0; substring containment
/// (either direction) `0.85 + ratio * 0.15`; equality ignoring whitespace
/// 0.95; containment ignoring whitespace `0.85 + ratio * 0.10`; otherwise
/// the positional character-match ratio. `ratio` is shorter/longer in
/// characters.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();

    if a.contains(b) || b.contains(a) {
        return 0.85 + length_ratio(len_a, len_b) * 0.15;
    }

    let a_compact: String = a.chars().filter(|c| !c.is_whitespace()).collect();
    let b_compact: String = b.chars().filter(|c| !c.is_whitespace()).collect();
    if a_compact == b_compact {
        return 0.95;
    }
    if a_compact.contains(&b_compact) || b_compact.contains(&a_compact) {
        let ca = a_compact.chars().count();
        let cb = b_compact.chars().count();
        return 0.85 + length_ratio(ca, cb) * 0.10;
    }

    let matching = a
        .chars()
        .zip(b.chars())
        .filter(|(x, y)| x == y)
        .count();
    matching as f64 / len_a.max(len_b) as f64
}

fn length_ratio(len_a: usize, len_b: usize) -> f64 {
    let shorter = len_a.min(len_b) as f64;
    let longer = len_a.max(len_b) as f64;
    shorter / longer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_one() {
        assert_eq!(similarity("openai", "openai"), 1.0);
    }

    #[test]
    fn containment_scales_with_length_ratio() {
        let score = similarity("openai", "openai inc");
        assert!(score > 0.85 && score < 1.0);
        // 6/10 of the way between 0.85 and 1.0.
        assert!((score - (0.85 + 0.6 * 0.15)).abs() < 1e-9);
    }

    #[test]
    fn space_insensitive_equality_is_095() {
        assert_eq!(similarity("open ai", "openai"), 0.95);
    }

    #[test]
    fn space_insensitive_containment() {
        let score = similarity("open ai", "openai incorporated");
        assert!(score > 0.85 && score < 0.95);
    }

    #[test]
    fn unrelated_names_score_low() {
        assert!(similarity("microsoft", "openai") < 0.5);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(similarity("", "openai"), 0.0);
        assert_eq!(similarity("openai", ""), 0.0);
    }
}
