//! Text canonicalization
//!
//! Every content check in the crate reads the output of [`canonicalize`],
//! never the raw input. Any encoding trick the canonicalizer strips - escape
//! sequences, HTML entities, multi-level percent encoding, fullwidth
//! lookalikes, zero-width padding - is therefore neutralized for the whole
//! pipeline at once.
//!
//! The transform sequence is fixed:
//!
//! 1. decode `\uXXXX` / `\xNN` escape sequences
//! 2. NFKC normalization, fullwidth fold, zero-width strip
//! 3. HTML entity decode (named, decimal, hex)
//! 4. guarded multi-pass percent decode
//! 5. NFKC again (decoded bytes may reveal fullwidth forms)
//! 6. unicode whitespace unification
//! 7. final zero-width sweep
//!
//! The whole sequence is re-run until it reaches a fixpoint (bounded), so the
//! function is idempotent: `canonicalize(canonicalize(s)) == canonicalize(s)`.

use unicode_normalization::UnicodeNormalization;

/// Upper bound on whole-sequence repetitions before giving up on a fixpoint.
const MAX_ROUNDS: usize = 4;

/// Upper bound on percent-decode passes within one round.
const MAX_DECODE_PASSES: usize = 8;

/// Canonicalize a string for content inspection.
///
/// Total and panic-free: any input produces some output, and the output
/// length is bounded by a small constant times the input length.
pub fn canonicalize(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_ROUNDS {
        let next = canonicalize_round(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn canonicalize_round(input: &str) -> String {
    let s = decode_escape_sequences(input);
    let s = fold_unicode(&s);
    let s = decode_html_entities(&s);
    let s = decode_percent_guarded(&s);
    let s = fold_unicode(&s);
    let s = unify_whitespace(&s);
    strip_zero_width(&s)
}

/// Decode `\uXXXX` and `\xNN` escape sequences wherever they appear.
fn decode_escape_sequences(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            match chars[i + 1] {
                'u' if i + 6 <= chars.len() => {
                    if let Some(cp) = hex_value(&chars[i + 2..i + 6]) {
                        if let Some(ch) = char::from_u32(cp) {
                            out.push(ch);
                            i += 6;
                            continue;
                        }
                    }
                    out.push(chars[i]);
                    i += 1;
                }
                'x' if i + 4 <= chars.len() => {
                    if let Some(cp) = hex_value(&chars[i + 2..i + 4]) {
                        // \xNN is a byte escape; values above 0x7F read as Latin-1
                        out.push(cp as u8 as char);
                        i += 4;
                        continue;
                    }
                    out.push(chars[i]);
                    i += 1;
                }
                _ => {
                    out.push(chars[i]);
                    i += 1;
                }
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn hex_value(chars: &[char]) -> Option<u32> {
    let mut value = 0u32;
    for &c in chars {
        value = value.checked_mul(16)?.checked_add(c.to_digit(16)?)?;
    }
    Some(value)
}

/// NFKC, fullwidth-to-ASCII fold, and zero-width strip.
///
/// NFKC already folds the fullwidth block; the explicit fold keeps the
/// guarantee even for code points NFKC leaves alone on some Unicode versions.
fn fold_unicode(input: &str) -> String {
    let normalized: String = input.nfkc().collect();
    let mut out = String::with_capacity(normalized.len());
    for ch in normalized.chars() {
        let cp = ch as u32;
        if is_zero_width(cp) {
            continue;
        }
        if (0xFF01..=0xFF5E).contains(&cp) {
            // Fullwidth ASCII block maps 1:1 onto U+0021..U+007E
            if let Some(folded) = char::from_u32(cp - 0xFEE0) {
                out.push(folded);
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn is_zero_width(cp: u32) -> bool {
    matches!(cp, 0x200B..=0x200D | 0x2060 | 0xFEFF | 0x202E)
}

fn strip_zero_width(input: &str) -> String {
    input.chars().filter(|c| !is_zero_width(*c as u32)).collect()
}

/// Decode named, decimal, and hex HTML entities.
fn decode_html_entities(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'&' {
            if let Some(end) = input[i..].find(';').map(|off| i + off) {
                // Entities are short; anything long is not an entity
                if end > i + 1 && end - i <= 12 {
                    let body = &input[i + 1..end];
                    if let Some(decoded) = decode_entity_body(body) {
                        out.push(decoded);
                        i = end + 1;
                        continue;
                    }
                }
            }
        }
        // Advance one full UTF-8 char
        let ch_len = utf8_len(bytes[i]);
        out.push_str(&input[i..i + ch_len]);
        i += ch_len;
    }
    out
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b < 0xE0 => 2,
        b if b < 0xF0 => 3,
        _ => 4,
    }
}

fn decode_entity_body(body: &str) -> Option<char> {
    if let Some(num) = body.strip_prefix('#') {
        let cp = if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            num.parse::<u32>().ok()?
        };
        return char::from_u32(cp);
    }
    match body {
        "amp" | "AMP" => Some('&'),
        "lt" | "LT" => Some('<'),
        "gt" | "GT" => Some('>'),
        "quot" | "QUOT" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        "sol" => Some('/'),
        "bsol" => Some('\\'),
        "colon" => Some(':'),
        "semi" => Some(';'),
        "comma" => Some(','),
        "num" => Some('#'),
        "percnt" => Some('%'),
        "plus" => Some('+'),
        "equals" => Some('='),
        "grave" => Some('`'),
        "excl" => Some('!'),
        "dollar" => Some('$'),
        "lpar" => Some('('),
        "rpar" => Some(')'),
        "lbrace" => Some('{'),
        "rbrace" => Some('}'),
        "lowbar" => Some('_'),
        "Tab" => Some('\t'),
        "NewLine" => Some('\n'),
        _ => None,
    }
}

/// Guarded multi-pass percent decoding.
///
/// Each pass decodes one level, so `%252e` collapses to `%2e` and then to
/// `.` across passes. Targeted rewrites handle non-standard encodings a
/// strict decoder would leave alone (IIS `%u` escapes, overlong UTF-8).
/// The loop stops at a fixpoint or after [`MAX_DECODE_PASSES`] iterations.
fn decode_percent_guarded(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_DECODE_PASSES {
        let rewritten = rewrite_high_risk_tokens(&current);
        let decoded = percent_decode_once(&rewritten);
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

/// Single-encoding rewrites for tokens strict decoding cannot reach.
fn rewrite_high_risk_tokens(input: &str) -> String {
    // (encoded form, replacement); matched case-insensitively
    const REWRITES: &[(&str, &str)] = &[
        ("%u002e", "."),
        ("%u002f", "/"),
        ("%u005c", "\\"),
        ("%c0%ae", "."),
        ("%c0%af", "/"),
        ("%c1%9c", "\\"),
        ("%e0%80%ae", "."),
        ("%e0%80%af", "/"),
    ];
    let mut out = input.to_string();
    for (token, replacement) in REWRITES {
        if out.to_ascii_lowercase().contains(token) {
            out = replace_case_insensitive(&out, token, replacement);
        }
    }
    out
}

fn replace_case_insensitive(haystack: &str, needle_lower: &str, replacement: &str) -> String {
    let lower = haystack.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut pos = 0;
    while let Some(found) = lower[pos..].find(needle_lower) {
        let start = pos + found;
        out.push_str(&haystack[pos..start]);
        out.push_str(replacement);
        pos = start + needle_lower.len();
    }
    out.push_str(&haystack[pos..]);
    out
}

/// One strict percent-decode pass.
///
/// If the decoded byte stream is not valid UTF-8 the pass is retried
/// decoding only ASCII escapes, so legitimate multibyte characters in the
/// input are never corrupted by a stray high byte.
fn percent_decode_once(input: &str) -> String {
    match percent_decode_bytes(input, false) {
        Some(decoded) => decoded,
        None => percent_decode_bytes(input, true).unwrap_or_else(|| input.to_string()),
    }
}

fn percent_decode_bytes(input: &str, ascii_only: bool) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 3 <= bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                let byte = (hi * 16 + lo) as u8;
                if !ascii_only || byte < 0x80 {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).ok()
}

/// Replace unicode space separators with ASCII space and line separators
/// with `\n`.
fn unify_whitespace(input: &str) -> String {
    input
        .chars()
        .map(|ch| match ch as u32 {
            0x00A0 | 0x1680 | 0x2000..=0x200A | 0x205F | 0x3000 => ' ',
            0x2028 | 0x2029 => '\n',
            _ => ch,
        })
        .collect()
}
