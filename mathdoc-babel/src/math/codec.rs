//! Protecting math spans behind placeholder tokens and restoring them
//!
//! Detection is a single left-to-right regex scan. At any position a display span (`$$...$$`)
//! is tried before an inline one (`$...$`); both are non-greedy, so the first closing
//! delimiter ends the span and spans never nest. Inline spans stay on one line. A `$` with no
//! partner is literal text.
//!
//! Escaped dollars (`\$`) get no special treatment: currency amounts that happen to pair up
//! are protected like math. Protection is still lossless for them, since restoring puts the
//! exact bytes back.

use super::{MathSpan, SpanTable, TOKEN_PREFIX};
use crate::error::{Conversion, PipelineError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

static MATH_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\$\$(.+?)\$\$|\$([^$\n]+?)\$").expect("math span pattern is valid")
});

/// Replace every math span in `text` with a placeholder token.
///
/// Returns the shielded text and the table needed to undo it. The same input
/// always produces the same output.
pub fn protect(text: &str) -> (String, SpanTable) {
    let mut table = SpanTable::with_nonce(choose_nonce(text));
    let mut shielded = String::with_capacity(text.len());
    let mut last = 0;

    for caps in MATH_SPAN.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let span = if let Some(body) = caps.get(1) {
            MathSpan::display(body.as_str())
        } else if let Some(body) = caps.get(2) {
            MathSpan::inline(body.as_str())
        } else {
            continue;
        };

        shielded.push_str(&text[last..whole.start()]);
        shielded.push_str(&table.push(span));
        last = whole.end();
    }
    shielded.push_str(&text[last..]);

    tracing::debug!(spans = table.len(), "protected math spans");
    (shielded, table)
}

/// Put every span of `table` back into `text` in canonical form.
///
/// Never drops text. The returned issues are `UnresolvedPlaceholder` reports:
/// - a table token that is absent (`occurrences: 0`),
/// - a table token found more than once (each copy is restored),
/// - token-shaped text carrying this table's nonce but no known index (left verbatim).
pub fn restore(text: &str, table: &SpanTable) -> Conversion<String> {
    if table.is_empty() {
        return Conversion::clean(text.to_string());
    }

    let prefix = table.token_prefix();
    let mut counts = vec![0usize; table.len()];
    let mut issues = Vec::new();
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(&prefix) {
        output.push_str(&rest[..pos]);
        let after = &rest[pos + prefix.len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let token_len = if digits > 0 && after[digits..].starts_with('E') {
            prefix.len() + digits + 1
        } else {
            prefix.len()
        };
        let candidate = &rest[pos..pos + token_len];

        match table.position(candidate) {
            Some(idx) => {
                counts[idx] += 1;
                output.push_str(&table.entries()[idx].span.canonical());
            }
            None => {
                output.push_str(candidate);
                issues.push(PipelineError::UnresolvedPlaceholder {
                    token: candidate.to_string(),
                    occurrences: 1,
                });
            }
        }
        rest = &rest[pos + token_len..];
    }
    output.push_str(rest);

    for (entry, count) in table.iter().zip(counts) {
        if count != 1 {
            issues.push(PipelineError::UnresolvedPlaceholder {
                token: entry.token.clone(),
                occurrences: count,
            });
        }
    }

    Conversion::with_issues(output, issues)
}

/// Pick an eight-hex-digit nonce whose token prefix does not occur in `text`.
fn choose_nonce(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let mut seed = hasher.finish() as u32;
    loop {
        let nonce = format!("{seed:08x}");
        if !text.contains(&format!("{TOKEN_PREFIX}{nonce}")) {
            return nonce;
        }
        seed = seed.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::SpanKind;

    fn kinds(table: &SpanTable) -> Vec<(SpanKind, &str)> {
        table
            .iter()
            .map(|entry| (entry.span.kind, entry.span.content.as_str()))
            .collect()
    }

    #[test]
    fn protects_inline_and_display_spans() {
        let text = r"Energy: $E=mc^2$ and $$\int_0^1 x\,dx$$ done.";
        let (shielded, table) = protect(text);

        assert_eq!(
            kinds(&table),
            vec![
                (SpanKind::Inline, "E=mc^2"),
                (SpanKind::Display, r"\int_0^1 x\,dx")
            ]
        );
        assert!(!shielded.contains('$'));
        assert!(shielded.starts_with("Energy: 0MSPAN"));
        assert!(shielded.ends_with(" done."));
    }

    #[test]
    fn first_closing_delimiter_ends_the_span() {
        let (_, table) = protect("$a$ b $c$");
        assert_eq!(
            kinds(&table),
            vec![(SpanKind::Inline, "a"), (SpanKind::Inline, "c")]
        );

        let (_, table) = protect("$$x$$ and $$y$$");
        assert_eq!(
            kinds(&table),
            vec![(SpanKind::Display, "x"), (SpanKind::Display, "y")]
        );
    }

    #[test]
    fn display_math_may_span_lines() {
        let text = "Before\n$$\na + b\n$$\nAfter";
        let (shielded, table) = protect(text);
        assert_eq!(kinds(&table), vec![(SpanKind::Display, "\na + b\n")]);
        assert_eq!(shielded.lines().count(), 3);
    }

    #[test]
    fn inline_math_does_not_cross_lines() {
        let (shielded, table) = protect("costs $5\nnext line $");
        assert!(table.is_empty());
        assert_eq!(shielded, "costs $5\nnext line $");
    }

    #[test]
    fn unmatched_dollar_is_literal() {
        let (shielded, table) = protect("The price is $5 today.");
        assert!(table.is_empty());
        assert_eq!(shielded, "The price is $5 today.");

        let restored = restore(&shielded, &table);
        assert!(restored.is_clean());
        assert_eq!(restored.value, "The price is $5 today.");
    }

    #[test]
    fn unmatched_display_opener_is_literal() {
        let (shielded, table) = protect("open $$ never closed");
        assert!(table.is_empty());
        assert_eq!(shielded, "open $$ never closed");
    }

    #[test]
    fn restore_is_exact() {
        let text = r"Mixed $a_1 * b_2$ text $$\frac{<x>}{&y}$$ end $z$";
        let (shielded, table) = protect(text);
        let restored = restore(&shielded, &table);
        assert!(restored.is_clean());
        assert_eq!(restored.value, text);
    }

    #[test]
    fn tokens_cannot_start_a_tag_or_entity_name() {
        let (shielded, table) = protect("0<$x$ and &$y$;");
        assert_eq!(table.len(), 2);
        for entry in table.iter() {
            assert!(entry.token.starts_with(|c: char| c.is_ascii_digit()));
        }
        assert!(shielded.starts_with("0<0MSPAN"));

        let restored = restore(&shielded, &table);
        assert!(restored.is_clean());
        assert_eq!(restored.value, "0<$x$ and &$y$;");
    }

    #[test]
    fn protect_is_deterministic() {
        let text = "same $x$ input";
        assert_eq!(protect(text), protect(text));
    }

    #[test]
    fn nonce_avoids_text_collisions() {
        let (first, table) = protect("$x$");
        let planted = format!("{first} $y$");
        let (_, second) = protect(&planted);
        assert_ne!(table.nonce(), second.nonce());
    }

    #[test]
    fn missing_token_is_reported_and_text_kept() {
        let (shielded, table) = protect("keep $a$ drop $b$");
        let token_b = table.entries()[1].token.clone();
        let edited = shielded.replace(&token_b, "");

        let restored = restore(&edited, &table);
        assert_eq!(restored.value, "keep $a$ drop ");
        assert_eq!(
            restored.issues,
            vec![PipelineError::UnresolvedPlaceholder {
                token: token_b,
                occurrences: 0
            }]
        );
    }

    #[test]
    fn duplicated_token_restores_every_copy() {
        let (shielded, table) = protect("$a$");
        let doubled = format!("{shielded} {shielded}");

        let restored = restore(&doubled, &table);
        assert_eq!(restored.value, "$a$ $a$");
        assert_eq!(
            restored.issues,
            vec![PipelineError::UnresolvedPlaceholder {
                token: table.entries()[0].token.clone(),
                occurrences: 2
            }]
        );
    }

    #[test]
    fn unknown_token_is_left_verbatim() {
        let (shielded, table) = protect("$a$");
        let stray = format!("{}7E", table.token_prefix());
        let text = format!("{shielded} {stray}");

        let restored = restore(&text, &table);
        assert_eq!(restored.value, format!("$a$ {stray}"));
        assert_eq!(
            restored.issues,
            vec![PipelineError::UnresolvedPlaceholder {
                token: stray,
                occurrences: 1
            }]
        );
    }
}
