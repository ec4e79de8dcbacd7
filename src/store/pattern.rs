//! Glob pattern matching for store keys.
//!
//! Supports the subset of Redis KEYS patterns the facade produces and callers
//! commonly use: `*` (any sequence), `?` (any single character) and `\` to
//! escape the next character.

/// Checks if a key matches a glob pattern.
///
/// # Examples
///
/// ```
/// use redis_helpers::store::pattern_matches;
///
/// assert!(pattern_matches("app:user*", "app:user:42"));
/// assert!(pattern_matches("app:?", "app:a"));
/// assert!(!pattern_matches("app:user*", "other:user:42"));
/// assert!(pattern_matches(r"app:\*", "app:*"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    matches_from(&pattern, &key)
}

fn matches_from(pattern: &[char], key: &[char]) -> bool {
    let (mut p, mut k) = (0, 0);
    // Position to resume from after the last `*`: (pattern index, key index)
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p).copied() {
            Some('*') => {
                backtrack = Some((p + 1, k));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                k += 1;
                continue;
            }
            Some('\\') if p + 1 < pattern.len() => {
                if pattern[p + 1] == key[k] {
                    p += 2;
                    k += 1;
                    continue;
                }
            }
            Some(c) if c == key[k] => {
                p += 1;
                k += 1;
                continue;
            }
            _ => {}
        }

        // Mismatch: let the last `*` swallow one more character
        match backtrack {
            Some((bp, bk)) => {
                backtrack = Some((bp, bk + 1));
                p = bp;
                k = bk + 1;
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
