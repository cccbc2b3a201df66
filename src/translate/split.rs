//! Splitting one translation back across the halves of a merge group.

/// Characters treated as sentence boundaries when splitting.
const BREAK_CHARS: [char; 5] = ['。', '.', '!', '?', '\n'];

/// Distance (in chars) searched on either side of the proportional cut.
const SEARCH_RADIUS: usize = 80;

/// Split `text` in two at roughly `ratio` of its length.
///
/// The cut lands just after the nearest sentence boundary within the
/// search radius, checking forward before backward at each distance, and
/// falls back to the exact proportional position. Both halves are trimmed.
pub fn split_by_ratio(text: &str, ratio: f64) -> (String, String) {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.5
    };
    let target = ((len as f64 * ratio).round() as usize).min(len);

    let is_break = |i: usize| BREAK_CHARS.contains(&chars[i]);
    let mut split = target;
    for offset in 0..SEARCH_RADIUS {
        let forward = target + offset;
        if forward < len && is_break(forward) {
            split = forward + 1;
            break;
        }
        if let Some(backward) = target.checked_sub(offset) {
            if backward > 0 && backward < len && is_break(backward) {
                split = backward + 1;
                break;
            }
        }
    }

    let split = split.min(len);
    let first: String = chars[..split].iter().collect();
    let second: String = chars[split..].iter().collect();
    (first.trim().to_string(), second.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_at_sentence_boundary() {
        let (a, b) = split_by_ratio("最初の文。次の文。", 0.5);
        assert_eq!(a, "最初の文。");
        assert_eq!(b, "次の文。");
    }

    #[test]
    fn test_split_searches_backward() {
        let (a, b) = split_by_ratio("One. Two three four", 0.6);
        assert_eq!(a, "One.");
        assert_eq!(b, "Two three four");
    }

    #[test]
    fn test_split_falls_back_to_ratio() {
        let (a, b) = split_by_ratio("X Y", 0.5);
        assert_eq!(a, "X");
        assert_eq!(b, "Y");
    }

    #[test]
    fn test_split_edge_ratios() {
        assert_eq!(
            split_by_ratio("", 0.5),
            (String::new(), String::new())
        );
        assert_eq!(
            split_by_ratio("ab", 1.0),
            ("ab".to_string(), String::new())
        );
        assert_eq!(
            split_by_ratio("ab", 0.0),
            (String::new(), "ab".to_string())
        );
        assert_eq!(
            split_by_ratio("ab", f64::NAN),
            ("a".to_string(), "b".to_string())
        );
    }

    #[test]
    fn test_fallback_cut_rounds_half_up() {
        // 5 × 0.5 = 2.5 cuts after the third char.
        assert_eq!(
            split_by_ratio("abcde", 0.5),
            ("abc".to_string(), "de".to_string())
        );
        // 10 × 0.34 = 3.4 cuts after the third char.
        assert_eq!(
            split_by_ratio("abcdefghij", 0.34),
            ("abc".to_string(), "defghij".to_string())
        );
    }

    #[test]
    fn test_split_preserves_content() {
        let text = "第一段落の訳文です。ここで文が続きます。第二段落の訳文。";
        let (a, b) = split_by_ratio(text, 0.4);
        assert_eq!(format!("{}{}", a, b), text);
    }
}
