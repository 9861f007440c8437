//! Shell-glob matching for route patterns, one `/` segment at a time.
//!
//! Pattern grammar:
//! ```text
//! pattern:      { term }
//! term:         '*'          any run of non-'/' characters
//!               '?'          any single non-'/' character
//!               '[' [ '^' ] { range } ']'
//!               c            matches c (c != '*', '?', '\\', '[')
//!               '\\' c       matches c
//! range:        c | lo '-' hi   (c, lo, hi may be escaped with '\\')
//! ```
//! A malformed pattern is reported as [`PatternError::BadPattern`] even if the
//! name stopped matching before the malformed part was reached.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternError {
    #[error("syntax error in pattern")]
    BadPattern,
}

/// Characters that turn a pattern segment into a positional parameter.
/// Class syntax (`-`, `^`) counts even outside brackets.
const META: &[char] = &['*', '?', '[', ']', '-', '\\', '^'];

/// True when `segment` holds any wildcard, class or escape character.
pub fn has_meta(segment: &str) -> bool {
    segment.contains(META)
}

/// Report whether `name` matches the whole of `pattern`.
pub fn match_pattern(pattern: &str, name: &str) -> Result<bool, PatternError> {
    let mut pattern = pattern.as_bytes();
    let mut name = name.as_bytes();

    'chunks: while !pattern.is_empty() {
        let (star, chunk, rest) = scan_chunk(pattern);
        pattern = rest;
        if star && chunk.is_empty() {
            // Trailing star eats the rest of the segment.
            return Ok(!name.contains(&b'/'));
        }

        // Try at the current position first.
        let attempt = match_chunk(chunk, name);
        if let Ok(Some(tail)) = attempt {
            if tail.is_empty() || !pattern.is_empty() {
                name = tail;
                continue;
            }
        }
        attempt?;

        if star {
            // The star may skip ahead, but never across '/'.
            let mut i = 0;
            while i < name.len() && name[i] != b'/' {
                if let Some(tail) = match_chunk(chunk, &name[i + 1..])? {
                    if !(pattern.is_empty() && !tail.is_empty()) {
                        name = tail;
                        continue 'chunks;
                    }
                }
                i += 1;
            }
        }

        // No match; still reject a malformed remainder.
        while !pattern.is_empty() {
            let (_, chunk, rest) = scan_chunk(pattern);
            pattern = rest;
            match_chunk(chunk, b"")?;
        }
        return Ok(false);
    }
    Ok(name.is_empty())
}

/// Split off leading stars and the literal/class run that follows them.
fn scan_chunk(pattern: &[u8]) -> (bool, &[u8], &[u8]) {
    let mut pattern = pattern;
    let mut star = false;
    while let [b'*', rest @ ..] = pattern {
        pattern = rest;
        star = true;
    }

    let mut in_range = false;
    let mut i = 0;
    while i < pattern.len() {
        match pattern[i] {
            b'\\' => {
                if i + 1 < pattern.len() {
                    i += 1;
                }
            }
            b'[' => in_range = true,
            b']' => in_range = false,
            b'*' if !in_range => break,
            _ => {}
        }
        i += 1;
    }
    (star, &pattern[..i], &pattern[i..])
}

/// Match `chunk` against a prefix of `s`, returning the unmatched tail.
///
/// Once the match has failed the chunk is still walked to the end so that a
/// malformed class or escape is always reported.
fn match_chunk<'a>(chunk: &[u8], s: &'a [u8]) -> Result<Option<&'a [u8]>, PatternError> {
    let mut chunk = chunk;
    let mut s = s;
    let mut failed = false;

    while !chunk.is_empty() {
        if !failed && s.is_empty() {
            failed = true;
        }
        match chunk[0] {
            b'[' => {
                let mut r = None;
                if !failed {
                    let (c, n) = decode_char(s);
                    r = Some(c);
                    s = &s[n..];
                }
                chunk = &chunk[1..];

                let negated = chunk.first() == Some(&b'^');
                if negated {
                    chunk = &chunk[1..];
                }

                let mut matched = false;
                let mut ranges = 0;
                loop {
                    if chunk.first() == Some(&b']') && ranges > 0 {
                        chunk = &chunk[1..];
                        break;
                    }
                    let (lo, rest) = get_esc(chunk)?;
                    chunk = rest;
                    let mut hi = lo;
                    if chunk[0] == b'-' {
                        let (c, rest) = get_esc(&chunk[1..])?;
                        hi = c;
                        chunk = rest;
                    }
                    if r.is_some_and(|r| lo <= r && r <= hi) {
                        matched = true;
                    }
                    ranges += 1;
                }
                if matched == negated {
                    failed = true;
                }
            }
            b'?' => {
                if !failed {
                    if s[0] == b'/' {
                        failed = true;
                    }
                    let (_, n) = decode_char(s);
                    s = &s[n..];
                }
                chunk = &chunk[1..];
            }
            c => {
                let mut c = c;
                if c == b'\\' {
                    chunk = &chunk[1..];
                    c = *chunk.first().ok_or(PatternError::BadPattern)?;
                }
                if !failed {
                    if c != s[0] {
                        failed = true;
                    }
                    s = &s[1..];
                }
                chunk = &chunk[1..];
            }
        }
    }

    if failed {
        return Ok(None);
    }
    Ok(Some(s))
}

/// Read one possibly escaped class endpoint.
fn get_esc(chunk: &[u8]) -> Result<(char, &[u8]), PatternError> {
    let mut chunk = chunk;
    match chunk.first() {
        None | Some(b'-') | Some(b']') => return Err(PatternError::BadPattern),
        Some(b'\\') => {
            chunk = &chunk[1..];
            if chunk.is_empty() {
                return Err(PatternError::BadPattern);
            }
        }
        Some(_) => {}
    }
    let (c, n) = decode_char(chunk);
    if c == char::REPLACEMENT_CHARACTER && n == 1 {
        return Err(PatternError::BadPattern);
    }
    let rest = &chunk[n..];
    if rest.is_empty() {
        return Err(PatternError::BadPattern);
    }
    Ok((c, rest))
}

/// Decode the first UTF-8 character of `s`; invalid input counts as one byte.
fn decode_char(s: &[u8]) -> (char, usize) {
    let width = match s.first() {
        None => return (char::REPLACEMENT_CHARACTER, 0),
        Some(b) if *b < 0x80 => 1,
        Some(b) if *b >= 0xF0 => 4,
        Some(b) if *b >= 0xE0 => 3,
        Some(b) if *b >= 0xC0 => 2,
        Some(_) => 1,
    };
    s.get(..width)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .and_then(|text| text.chars().next())
        .map(|c| (c, width))
        .unwrap_or((char::REPLACEMENT_CHARACTER, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_wildcards() {
        assert_eq!(match_pattern("/users/1", "/users/1"), Ok(true));
        assert_eq!(match_pattern("/users/1", "/users/2"), Ok(false));
        assert_eq!(match_pattern("/users/*", "/users/42"), Ok(true));
        assert_eq!(match_pattern("/users/*", "/users/"), Ok(true));
        assert_eq!(match_pattern("/users/*", "/users/1/"), Ok(false));
        assert_eq!(match_pattern("/users/?", "/users/1"), Ok(true));
        assert_eq!(match_pattern("/users/?", "/users/11"), Ok(false));
        assert_eq!(match_pattern("*.json", "a.json"), Ok(true));
        assert_eq!(match_pattern("a*b*c", "axxbyyc"), Ok(true));
        assert_eq!(match_pattern("a*b*c", "axxbyy"), Ok(false));
    }

    #[test]
    fn star_does_not_cross_slash() {
        assert_eq!(match_pattern("/a/*", "/a/b/c"), Ok(false));
        assert_eq!(match_pattern("/a/*c", "/a/b/c"), Ok(false));
        assert_eq!(match_pattern("/*/c", "/b/c"), Ok(true));
    }

    #[test]
    fn classes() {
        assert_eq!(match_pattern("[0-9]", "7"), Ok(true));
        assert_eq!(match_pattern("[0-9]", "a"), Ok(false));
        assert_eq!(match_pattern("[^a-z]", "1"), Ok(true));
        assert_eq!(match_pattern("[^a-z]", "a"), Ok(false));
        assert_eq!(match_pattern("[hjk]oge", "hoge"), Ok(true));
        assert_eq!(match_pattern("[\\123]", "1"), Ok(true));
        assert_eq!(match_pattern("[\\]]", "]"), Ok(true));
        assert_eq!(match_pattern("[α-ω]", "λ"), Ok(true));
        assert_eq!(match_pattern("?", "λ"), Ok(true));
    }

    #[test]
    fn escapes() {
        assert_eq!(match_pattern("\\*", "*"), Ok(true));
        assert_eq!(match_pattern("\\*", "a"), Ok(false));
        assert_eq!(match_pattern("/users/\\1", "/users/1"), Ok(true));
    }

    #[test]
    fn malformed_patterns() {
        assert_eq!(match_pattern("[", "a"), Err(PatternError::BadPattern));
        assert_eq!(match_pattern("[a-", "a"), Err(PatternError::BadPattern));
        assert_eq!(match_pattern("[]", "a"), Err(PatternError::BadPattern));
        assert_eq!(match_pattern("a\\", "a"), Err(PatternError::BadPattern));
        assert_eq!(match_pattern("/users/[", "/users/1"), Err(PatternError::BadPattern));
    }

    #[test]
    fn malformed_remainder_reported_after_mismatch() {
        assert_eq!(match_pattern("x*[", "abc"), Err(PatternError::BadPattern));
        assert_eq!(match_pattern("a*b[", "zzz"), Err(PatternError::BadPattern));
    }

    #[test]
    fn meta_detection() {
        assert!(has_meta("*"));
        assert!(has_meta("[hjk]oge"));
        assert!(has_meta("\\1"));
        assert!(has_meta("?"));
        assert!(!has_meta("users"));
        assert!(has_meta("api-v1"));
        assert!(has_meta("^caret"));
    }
}
