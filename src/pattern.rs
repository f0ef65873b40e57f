//! Glob matching for SCAN `MATCH` patterns.
//!
//! Supports the Redis subset: `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\x`
//! escapes. Matching is done on bytes.

const META: &[u8] = b"*?[]\\";

/// Escapes every glob metacharacter so `s` only ever matches itself.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii() && META.contains(&(c as u8)) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The bytes every match of `pattern` must start with.
pub fn literal_prefix(pattern: &str) -> Vec<u8> {
    let bytes = pattern.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'*' | b'?' | b'[' => break,
            b'\\' if i + 1 < bytes.len() => {
                out.push(bytes[i + 1]);
                i += 2;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

pub fn matches(pattern: &str, key: &[u8]) -> bool {
    match_bytes(pattern.as_bytes(), key)
}

fn match_bytes(mut p: &[u8], mut s: &[u8]) -> bool {
    while let Some(&pc) = p.first() {
        match pc {
            b'*' => {
                while p.len() > 1 && p[1] == b'*' {
                    p = &p[1..];
                }
                if p.len() == 1 {
                    return true;
                }
                for i in 0..=s.len() {
                    if match_bytes(&p[1..], &s[i..]) {
                        return true;
                    }
                }
                return false;
            }
            b'?' => {
                if s.is_empty() {
                    return false;
                }
                s = &s[1..];
                p = &p[1..];
            }
            b'[' => {
                let Some(&c) = s.first() else {
                    return false;
                };
                let (matched, rest) = match_class(&p[1..], c);
                if !matched {
                    return false;
                }
                p = rest;
                s = &s[1..];
            }
            b'\\' if p.len() >= 2 => {
                if s.first() != Some(&p[1]) {
                    return false;
                }
                s = &s[1..];
                p = &p[2..];
            }
            _ => {
                if s.first() != Some(&pc) {
                    return false;
                }
                s = &s[1..];
                p = &p[1..];
            }
        }
    }
    s.is_empty()
}

/// Matches `c` against the class body following `[`. Returns whether it
/// matched and the pattern remaining after the closing `]`.
fn match_class(mut p: &[u8], c: u8) -> (bool, &[u8]) {
    let negate = p.first() == Some(&b'^');
    if negate {
        p = &p[1..];
    }
    let mut matched = false;
    loop {
        match p {
            [] => break,
            [b']', rest @ ..] => {
                p = rest;
                break;
            }
            [b'\\', x, rest @ ..] => {
                matched |= *x == c;
                p = rest;
            }
            [lo, b'-', hi, rest @ ..] if *hi != b']' => {
                let (lo, hi) = if lo <= hi { (*lo, *hi) } else { (*hi, *lo) };
                matched |= (lo..=hi).contains(&c);
                p = rest;
            }
            [x, rest @ ..] => {
                matched |= *x == c;
                p = rest;
            }
        }
    }
    (matched != negate, p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_question() {
        assert!(matches("ns:*", b"ns:1"));
        assert!(matches("ns:*", b"ns:"));
        assert!(!matches("ns:*", b"ns-vec_num"));
        assert!(!matches("ns:*", b"nsx:1"));
        assert!(matches("*", b"anything"));
        assert!(matches("n?:*", b"ns:1"));
        assert!(!matches("n?", b"n"));
        assert!(matches("a*b*c", b"aXXbYYc"));
        assert!(!matches("a*b*c", b"aXXbYY"));
    }

    #[test]
    fn test_classes() {
        assert!(matches("k[abc]", b"kb"));
        assert!(!matches("k[abc]", b"kd"));
        assert!(matches("k[0-9]", b"k7"));
        assert!(matches("k[^0-9]", b"kx"));
        assert!(!matches("k[^0-9]", b"k1"));
    }

    #[test]
    fn test_escape_makes_pattern_literal() {
        let ns = "we*ird?[ns]";
        let pattern = format!("{}:*", escape(ns));
        assert!(matches(&pattern, b"we*ird?[ns]:1"));
        assert!(!matches(&pattern, b"weXXird?[ns]:1"));
        assert!(!matches(&pattern, b"we*irdX[ns]:1"));
        assert_eq!(literal_prefix(&pattern), b"we*ird?[ns]:".to_vec());
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("ns:*"), b"ns:".to_vec());
        assert_eq!(literal_prefix("*"), Vec::<u8>::new());
        assert_eq!(literal_prefix("a\\*b?c"), b"a*b".to_vec());
        assert_eq!(literal_prefix("exact"), b"exact".to_vec());
    }
}
