use regex_lite::Regex;

/// `true` if `pattern` contains any wildcard character (§4.5 `get_many`).
pub fn contains_wildcard(pattern: &str) -> bool {
    pattern.contains(['%', '_', '[', ']'])
}

/// Translate a SQL-`LIKE`-style pattern (`%` = any run of characters, `_` =
/// exactly one character, `[...]` classes pass through) into an anchored
/// [`Regex`]. Every other regex metacharacter in the pattern is escaped so it
/// matches itself literally.
pub fn wildcard_to_regex(pattern: &str) -> Regex {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '[' => {
                out.push('[');
                while let Some(&next) = chars.peek() {
                    out.push(next);
                    chars.next();
                    if next == ']' {
                        break;
                    }
                }
            }
            '.' | '+' | '*' | '?' | '(' | ')' | '|' | '^' | '$' | '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    Regex::new(&out).expect("wildcard translation always produces a valid regex")
}

/// Expand a (possibly wildcarded) pattern against `live_keys`, an iterator of
/// keys in their current enumeration order. A non-wildcard pattern is treated
/// as a single literal key lookup, not a regex match, so keys containing
/// regex metacharacters always work as exact matches.
pub fn expand<'a>(pattern: &str, live_keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    if !contains_wildcard(pattern) {
        return live_keys
            .filter(|&key| key == pattern)
            .map(str::to_owned)
            .collect();
    }
    let regex = wildcard_to_regex(pattern);
    live_keys
        .filter(|key| regex.is_match(key))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_matches_any_run() {
        let re = wildcard_to_regex("user:%:profile");
        assert!(re.is_match("user:42:profile"));
        assert!(re.is_match("user::profile"));
        assert!(!re.is_match("user:42:settings"));
    }

    #[test]
    fn underscore_matches_exactly_one_char() {
        let re = wildcard_to_regex("row_0");
        assert!(re.is_match("rowA0"));
        assert!(!re.is_match("row0"));
        assert!(!re.is_match("rowAB0"));
    }

    #[test]
    fn bracket_alone_is_detected_as_a_wildcard() {
        assert!(contains_wildcard("item[0-9]"));
        assert!(!contains_wildcard("item5"));
    }

    #[test]
    fn bracket_classes_are_preserved() {
        let re = wildcard_to_regex("item[0-9]");
        assert!(re.is_match("item5"));
        assert!(!re.is_match("itemA"));
    }

    #[test]
    fn metacharacters_outside_wildcards_are_escaped() {
        let re = wildcard_to_regex("a.b+c");
        assert!(re.is_match("a.b+c"));
        assert!(!re.is_match("aXbYc"));
    }

    #[test]
    fn expand_without_wildcard_is_an_exact_key_lookup() {
        let keys = vec!["a.b", "a.b+c", "other"];
        let found = expand("a.b", keys.into_iter());
        assert_eq!(found, vec!["a.b".to_string()]);
    }

    #[test]
    fn expand_with_wildcard_preserves_enumeration_order() {
        let keys = vec!["z:1", "a:1", "m:1", "a:2"];
        let found = expand("%:1", keys.into_iter());
        assert_eq!(found, vec!["z:1", "a:1", "m:1"]);
    }
}
