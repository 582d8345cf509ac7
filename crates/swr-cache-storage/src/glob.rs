//! Redis-compatible glob matching for `SCAN MATCH` patterns
//!
//! Supports `*`, `?`, `[abc]`, `[^abc]`, `[a-z]` and `\` escapes.

/// Whether `text` matches `pattern` using Redis glob rules
pub fn glob_match(pattern: &str, text: &str) -> bool {
    matches(pattern.as_bytes(), text.as_bytes())
}

/// Iterative matcher: on a mismatch, retry from the most recent `*` with
/// one more text byte consumed by it. Every other token consumes exactly
/// one byte, so only the last star ever needs revisiting.
fn matches(p: &[u8], t: &[u8]) -> bool {
    let (mut pi, mut ti) = (0, 0);
    // Pattern index after the last `*`, and the text index it resumes at
    let mut resume: Option<(usize, usize)> = None;

    while ti < t.len() {
        if p.get(pi) == Some(&b'*') {
            pi += 1;
            resume = Some((pi, ti));
            continue;
        }
        if let Some(next) = match_one(p, pi, t[ti]) {
            pi = next;
            ti += 1;
            continue;
        }
        match resume {
            Some((star_p, star_t)) => {
                pi = star_p;
                ti = star_t + 1;
                resume = Some((star_p, ti));
            }
            None => return false,
        }
    }

    p[pi..].iter().all(|&c| c == b'*')
}

/// Pattern index after the token at `pi`, if that token matches `ch`
fn match_one(p: &[u8], pi: usize, ch: u8) -> Option<usize> {
    match p.get(pi)? {
        b'?' => Some(pi + 1),
        b'[' => {
            let (hit, rest) = match_class(&p[pi + 1..], ch);
            hit.then(|| p.len() - rest.len())
        }
        b'\\' if pi + 1 < p.len() => (p[pi + 1] == ch).then_some(pi + 2),
        c => (*c == ch).then_some(pi + 1),
    }
}

/// Match one byte against a `[...]` class; `p` starts after the `[`.
/// Returns the outcome and the pattern after the closing `]`.
fn match_class(mut p: &[u8], ch: u8) -> (bool, &[u8]) {
    let negate = p.first() == Some(&b'^');
    if negate {
        p = &p[1..];
    }

    let mut hit = false;
    loop {
        match p {
            // Unterminated class runs to the end of the pattern
            [] => break,
            [b']', rest @ ..] => {
                p = rest;
                break;
            }
            [b'\\', escaped, rest @ ..] => {
                hit |= *escaped == ch;
                p = rest;
            }
            [lo, b'-', hi, rest @ ..] if *hi != b']' => {
                let (lo, hi) = if lo <= hi { (*lo, *hi) } else { (*hi, *lo) };
                hit |= (lo..=hi).contains(&ch);
                p = rest;
            }
            [c, rest @ ..] => {
                hit |= *c == ch;
                p = rest;
            }
        }
    }

    (hit != negate, p)
}
