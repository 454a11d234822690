//! Display-time sanitizer: the last line of defense against internal
//! routing vocabulary or truncation artifacts reaching the customer.

const ROUTE_LEAK_REPLACEMENT: &str = "Is there anything else I can help you with?";

/// Characters that legitimately end a complete reply. Includes the
/// ellipsis so repair itself is a fixed point.
const TERMINAL_CHARS: &[char] = &['.', '?', '!', '"', '\'', '…'];

/// Minimum length before missing terminal punctuation is treated as a
/// truncation artifact rather than a deliberately short reply.
const TRUNCATION_MIN_CHARS: usize = 200;

/// Clean a piece of assistant text for display. Idempotent: applying this
/// twice yields the same string as applying it once, and text without
/// trigger patterns passes through untouched.
pub fn present(text: &str) -> String {
    let trimmed = text.trim();
    if leaks_route_vocabulary(trimmed) {
        return ROUTE_LEAK_REPLACEMENT.to_string();
    }
    repair_truncation(trimmed)
}

fn leaks_route_vocabulary(text: &str) -> bool {
    let lower = text.to_lowercase();
    if lower.contains("route")
        && (lower.contains("has been set") || lower.contains("set to ") || lower.contains("set the route"))
    {
        return true;
    }
    ["set to end", "set to retention", "set to cancel", "set to billing", "set to tech"]
        .iter()
        .any(|leak| lower.contains(leak))
}

fn repair_truncation(text: &str) -> String {
    if text.chars().count() < TRUNCATION_MIN_CHARS {
        return text.to_string();
    }
    match text.chars().last() {
        Some(last) if !TERMINAL_CHARS.contains(&last) => format!("{text}…"),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{present, ROUTE_LEAK_REPLACEMENT};

    #[test]
    fn clean_text_passes_through() {
        let text = "Your Care+ plan has been canceled. Anything else?";
        assert_eq!(present(text), text);
    }

    #[test]
    fn route_leak_is_replaced_wholesale() {
        assert_eq!(present("Your route has been set to end."), ROUTE_LEAK_REPLACEMENT);
        assert_eq!(present("Okay — set to retention now"), ROUTE_LEAK_REPLACEMENT);
        assert_eq!(present("I have set the route to billing for you"), ROUTE_LEAK_REPLACEMENT);
    }

    #[test]
    fn long_text_without_terminal_punctuation_gets_ellipsis() {
        let chopped = "word ".repeat(50) + "and then it stops mid senten";
        let repaired = present(&chopped);
        assert!(repaired.ends_with('…'));
    }

    #[test]
    fn short_text_is_never_treated_as_truncated() {
        assert_eq!(present("One moment"), "One moment");
    }

    #[test]
    fn sanitizer_is_idempotent() {
        let samples = [
            "Your route has been set to end.".to_string(),
            "word ".repeat(50) + "and then it stops mid senten",
            "A perfectly normal sentence.".to_string(),
            "short".to_string(),
            String::new(),
        ];
        for sample in samples {
            let once = present(&sample);
            let twice = present(&once);
            assert_eq!(once, twice, "not idempotent for: {sample}");
        }
    }
}
