//! Property tests: math content survives the structured round trip untouched.

use mathdoc_babel::math::protect;
use mathdoc_babel::{MarkupToStructured, MathSpan, PipelineError, StructuredToMarkup};
use proptest::prelude::*;

/// Prose that markdown and HTML both have opinions about.
fn markup_prose() -> impl Strategy<Value = String> {
    r"[a-zA-Z ,.*_#<>()|\[\]`\\-]{0,16}"
}

/// Any content a delimiter pair can hold, markup-significant characters included.
fn math_span() -> impl Strategy<Value = MathSpan> {
    prop_oneof![
        "[^$\n]{1,24}".prop_map(|content| MathSpan::inline(content)),
        "[^$]{1,24}".prop_map(|content| MathSpan::display(content)),
    ]
}

fn compose(segments: &[(String, MathSpan)], tail: &str) -> String {
    let mut markup = String::new();
    for (prose, span) in segments {
        markup.push_str(prose);
        markup.push_str(&span.canonical());
    }
    markup.push_str(tail);
    markup
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_span_survives_structured_round_trip(
        segments in prop::collection::vec((markup_prose(), math_span()), 0..6),
        tail in markup_prose(),
    ) {
        let markup = compose(&segments, &tail);

        // A render that cannot be trusted may fall back to plain text, never lose math
        let forward = MarkupToStructured::default().convert(&markup);
        prop_assert!(
            forward.issues.iter().all(|issue| matches!(issue, PipelineError::ConversionFailed(_))),
            "forward issues: {:?}",
            forward.issues
        );
        let doc = forward.value;
        prop_assert_eq!(doc.spans.len(), segments.len());

        let back = StructuredToMarkup::default().convert(&doc.html, &doc.spans);
        prop_assert!(back.is_clean(), "backward issues: {:?}", back.issues);
        for (_, span) in &segments {
            prop_assert!(
                back.value.contains(&span.canonical()),
                "lost {:?} in {:?}",
                span,
                back.value
            );
        }
    }

    #[test]
    fn shielded_text_has_no_markup_syntax(content in "[^$\n]{1,32}") {
        let (shielded, table) = protect(&format!("x ${content}$"));

        prop_assert_eq!(table.len(), 1);
        let token = &shielded["x ".len()..];
        prop_assert!(token.chars().all(|c| c.is_ascii_alphanumeric()), "token {}", token);
        prop_assert_eq!(table.get(token), Some(&MathSpan::inline(content)));
    }

    #[test]
    fn single_dollar_is_never_math(before in markup_prose(), after in markup_prose()) {
        let markup = format!("{before}${after}");
        let (shielded, table) = protect(&markup);
        prop_assert!(table.is_empty());
        prop_assert_eq!(&shielded, &markup);

        let forward = MarkupToStructured::default().convert(&markup);
        prop_assert!(forward.is_clean());
        let back = StructuredToMarkup::default().convert(&forward.value.html, &forward.value.spans);
        prop_assert!(back.is_clean());
    }
}
