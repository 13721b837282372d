use mathdoc_babel::{MarkupToStructured, PipelineError, StructuredToMarkup};

#[test]
fn bold_edit_around_inline_math() {
    let forward = MarkupToStructured::default().convert("Energy: $E=mc^2$ and more.");
    assert!(forward.is_clean());
    let doc = forward.value;
    assert!(doc.html.starts_with("<p>Energy: "));

    // The widget wraps the first word in bold
    let edited = doc.html.replacen("Energy", "<strong>Energy</strong>", 1);
    let back = StructuredToMarkup::default().convert(&edited, &doc.spans);

    assert!(back.is_clean());
    assert_eq!(back.value, "**Energy**: $E=mc^2$ and more.\n");
}

#[test]
fn display_math_with_backslashes_survives() {
    let markup = "Area:\n\n$$\\int_0^1 x\\,dx$$\n";
    let doc = MarkupToStructured::default().convert(markup).value;
    assert!(!doc.html.contains('\\'));

    let back = StructuredToMarkup::default().convert(&doc.html, &doc.spans);
    assert!(back.is_clean());
    assert_eq!(back.value, markup);
}

#[test]
fn deleting_a_token_drops_the_span_quietly() {
    let forward = MarkupToStructured::default().convert("Keep $a$ but drop $b$ please.");
    let doc = forward.value;
    let dropped = doc.spans.entries()[1].token.clone();

    let edited = doc.html.replace(&dropped, "");
    let back = StructuredToMarkup::default().convert(&edited, &doc.spans);

    assert_eq!(back.value, "Keep $a$ but drop please.\n");
    assert_eq!(
        back.issues,
        vec![PipelineError::SpanTableMismatch {
            token: dropped,
            content: "b".to_string(),
        }]
    );
    assert!(back.issues.iter().all(|issue| !issue.is_fatal()));
}

#[test]
fn lists_and_headings_drift_but_math_does_not() {
    let markup = "Heading\n=======\n\n* one $x_1$\n* two $$y^2$$\n";
    let doc = MarkupToStructured::default().convert(markup).value;

    let back = StructuredToMarkup::default().convert(&doc.html, &doc.spans);
    assert!(back.is_clean());
    assert_eq!(back.value, "# Heading\n\n- one $x_1$\n- two $$y^2$$\n");
}

#[test]
fn unmatched_dollar_goes_through_the_whole_pipeline() {
    let markup = "The price is $5 today.\n";
    let forward = MarkupToStructured::default().convert(markup);
    assert!(forward.is_clean());
    assert!(forward.value.spans.is_empty());

    let back = StructuredToMarkup::default().convert(&forward.value.html, &forward.value.spans);
    assert!(back.is_clean());
    assert!(back.value.contains("$5 today"));
}

#[test]
fn rich_widget_html_with_quill_lists() {
    let (shielded, spans) = mathdoc_babel::math::protect("$a+b$");
    let html = format!(
        "<ol><li data-list=\"bullet\"><span class=\"ql-ui\"></span>sum {shielded}</li>\
         <li data-list=\"bullet\">next</li></ol><p><br></p>"
    );

    let back = StructuredToMarkup::default().convert(&html, &spans);
    assert!(back.is_clean());
    assert_eq!(back.value, "- sum $a+b$\n- next\n");
}

#[test]
fn comparisons_around_math_keep_every_span() {
    let markup = "We have 0<$x$ and $y$>1 here.\n";
    let forward = MarkupToStructured::default().convert(markup);
    assert!(forward.is_clean());
    let doc = forward.value;

    let back = StructuredToMarkup::default().convert(&doc.html, &doc.spans);
    assert!(back.is_clean(), "{:?}", back.issues);
    assert!(back.value.contains("$x$"), "{}", back.value);
    assert!(back.value.contains("$y$"), "{}", back.value);
}
