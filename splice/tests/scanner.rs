use splice::scanner::{
    Directive, DirectiveKind, Placement, ScanError, Span, SpanKind, reconstruct, scan,
};

fn directives(source: &str) -> Vec<Directive> {
    scan(source)
        .expect("scan failed")
        .into_iter()
        .filter_map(|span| match span.kind {
            SpanKind::Directive(d) => Some(d),
            SpanKind::Literal | SpanKind::Comment => None,
        })
        .collect()
}

fn only_directive(source: &str) -> Directive {
    let mut found = directives(source);
    assert_eq!(found.len(), 1, "expected one directive in {:?}: {:?}", source, found);
    found.remove(0)
}

fn texts<'s>(source: &'s str, spans: &[Span]) -> Vec<&'s str> {
    spans.iter().map(|s| s.text(source)).collect()
}

#[test]
fn spans_reconstruct_the_source() {
    let sources = [
        "",
        "plain text only",
        "Value %x, expr %(a + b):.2f; block %{y = 1;}\n%%%md{a.md}\n",
        "%%%mdifformat{ html: a.md; docx: b.md; } trailing",
        "head `%code` $%math$ <!-- %c --> \\%esc %%n.attr(1)[0]. tail",
        "ünïcode %x ünïcode %%(\"é\") done",
    ];
    for source in sources {
        let spans = scan(source).expect("scan failed");
        assert_eq!(reconstruct(source, &spans), source);
        let mut cursor = 0;
        for span in &spans {
            assert_eq!(span.range.start, cursor, "spans must be contiguous");
            assert!(span.range.end > span.range.start);
            cursor = span.range.end;
        }
        assert_eq!(cursor, source.len());
    }
}

#[test]
fn brackets_inside_strings_are_not_structural() {
    let d = only_directive("%{f(\"(\")}");
    assert_eq!(d.kind, DirectiveKind::StructuredBlock);
    assert_eq!(d.payload, "f(\"(\")");
    assert!(!d.suppressed);

    let d = only_directive("%{ s = \"\"\" } \"\"\" }");
    assert_eq!(d.payload, " s = \"\"\" } \"\"\" ");

    let d = only_directive("%{ x = 1 # ) unbalanced in a comment\n}");
    assert_eq!(d.payload, " x = 1 # ) unbalanced in a comment\n");
}

#[test]
fn trailing_semicolon_suppresses() {
    let d = only_directive("%{x = 1;}");
    assert!(d.suppressed);
    assert_eq!(d.payload, "x = 1");

    let d = only_directive("%{x = 1};");
    assert!(d.suppressed);
    assert_eq!(d.payload, "x = 1");

    let d = only_directive("%(f(); )");
    assert!(d.suppressed);
    assert_eq!(d.payload, "f()");

    let d = only_directive("%x; and more");
    assert!(d.suppressed);
    assert_eq!(d.payload, "x");
}

#[test]
fn semicolon_inside_a_trailing_comment_does_not_suppress() {
    let d = only_directive("%{\nx = 1\n# tidy up;\n}");
    assert!(!d.suppressed);
    assert_eq!(d.payload, "\nx = 1\n# tidy up;\n");

    let d = only_directive("%{\nx = 1; # quiet\n}");
    assert!(d.suppressed);
    assert_eq!(d.payload, "\nx = 1");

    let d = only_directive("%{s = \"#\";}");
    assert!(d.suppressed);
    assert_eq!(d.payload, "s = \"#\"");
}

#[test]
fn shorthand_ends_at_primary_expression() {
    let source = "see %a.b(1)[2]. Next";
    let spans = scan(source).expect("scan failed");
    assert_eq!(texts(source, &spans), vec!["see ", "%a.b(1)[2]", ". Next"]);
    let d = spans[1].directive().expect("directive");
    assert_eq!(d.kind, DirectiveKind::InlineValue { structured: false });
    assert_eq!(d.payload, "a.b(1)[2]");
}

#[test]
fn format_spec_after_colon() {
    let d = only_directive("%x:.3f rest");
    assert_eq!(d.payload, "x");
    assert_eq!(d.format_spec.as_ref().map(|s| s.as_str()), Some(".3f"));

    let d = only_directive("%(a * b):>8,d;");
    assert_eq!(d.payload, "a * b");
    assert_eq!(d.format_spec.as_ref().map(|s| s.as_str()), Some(">8,d"));
    assert!(d.suppressed);
}

#[test]
fn colon_without_format_is_literal() {
    let source = "%x: the value";
    let spans = scan(source).expect("scan failed");
    assert_eq!(texts(source, &spans), vec!["%x", ": the value"]);
    assert!(spans[0].directive().expect("directive").format_spec.is_none());

    let source = "%x:fancy";
    let spans = scan(source).expect("scan failed");
    assert_eq!(texts(source, &spans), vec!["%x", ":fancy"]);
}

#[test]
fn protected_regions_are_not_scanned() {
    let d = only_directive("`%x` and $%y$ and $$%z$$ and <!-- %c --> then %w");
    assert_eq!(d.payload, "w");

    let source = "```\n%{ not code }\n```\n";
    assert!(directives(source).is_empty());
}

#[test]
fn html_comments_get_their_own_span() {
    let source = "a <!-- %c\n multi --> b %x";
    let spans = scan(source).expect("scan failed");
    assert_eq!(texts(source, &spans), vec!["a ", "<!-- %c\n multi -->", " b ", "%x"]);
    assert_eq!(spans[1].kind, SpanKind::Comment);

    let spans = scan("tail <!-- never closed %x").expect("scan failed");
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[1].kind, SpanKind::Comment);

    let source = "```\n<!-- kept -->\n```\n";
    assert!(scan(source).expect("scan failed").iter().all(Span::is_literal));
}

#[test]
fn escapes_and_non_directives() {
    assert!(directives("\\%x").is_empty());
    assert!(directives("a%20b and 100% done").is_empty());
    assert!(directives("%%%other").len() == 1);

    let source = "%%%other";
    let spans = scan(source).expect("scan failed");
    assert_eq!(texts(source, &spans), vec!["%", "%%other"]);
    assert_eq!(
        spans[1].directive().expect("directive").kind,
        DirectiveKind::InlineValue { structured: true }
    );
}

#[test]
fn structured_forms() {
    let d = only_directive("%%x");
    assert_eq!(d.kind, DirectiveKind::InlineValue { structured: true });

    let d = only_directive("%%(a + b)");
    assert_eq!(d.kind, DirectiveKind::InlineExpr { structured: true });
    assert_eq!(d.payload, "a + b");
}

#[test]
fn file_includes() {
    let d = only_directive("%%%py{ setup.py }");
    assert_eq!(
        d.kind,
        DirectiveKind::FileInclude {
            path: "setup.py".into(),
            structured: false
        }
    );

    let d = only_directive("%%%md{chapters/{format}/intro.md};");
    assert_eq!(
        d.kind,
        DirectiveKind::FileInclude {
            path: "chapters/{format}/intro.md".into(),
            structured: true
        }
    );
    assert!(d.suppressed);
}

#[test]
fn conditional_include_entries() {
    let d = only_directive("%%%mdifformat{ html, latex : a.md; docx: b.md; }");
    let DirectiveKind::ConditionalInclude { entries } = d.kind else {
        panic!("expected a conditional include, got {:?}", d.kind);
    };
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].labels, vec!["html", "latex"]);
    assert_eq!(entries[0].path, "a.md");
    assert!(entries[0].matches("latex"));
    assert!(!entries[0].matches("HTML"));
    assert_eq!(entries[1].labels, vec!["docx"]);
    assert_eq!(entries[1].path, "b.md");
}

#[test]
fn malformed_conditional_is_an_error() {
    let err = scan("%%%mdifformat{ html: a.md; oops }").unwrap_err();
    assert!(matches!(err, ScanError::MalformedConditional { ref entry, .. } if entry == "oops"));
}

#[test]
fn unterminated_constructs_name_their_start() {
    let err = scan("text %{ x = (1 +").unwrap_err();
    assert_eq!(
        err,
        ScanError::UnterminatedBracket {
            offset: 6,
            delimiter: '{'
        }
    );

    let err = scan("%{ s = \"abc }").unwrap_err();
    assert_eq!(err, ScanError::UnterminatedString { offset: 7 });

    let err = scan("%{ (] }").unwrap_err();
    assert_eq!(
        err,
        ScanError::MismatchedBracket {
            offset: 4,
            expected: ')',
            found: ']'
        }
    );
}

#[test]
fn macro_calls() {
    let d = only_directive("%%emph{hello *world*}{{raw {x}}}");
    let DirectiveKind::MacroCall {
        structured,
        name,
        args,
    } = d.kind
    else {
        panic!("expected a macro call, got {:?}", d.kind);
    };
    assert!(structured);
    assert_eq!(name, "emph");
    assert_eq!(args.len(), 2);
    assert_eq!(args[0].text, "hello *world*");
    assert!(!args[0].raw);
    assert_eq!(args[1].text, "raw {x}");
    assert!(args[1].raw);
}

#[test]
fn placement_prefix() {
    let d = only_directive("b%%x");
    assert_eq!(d.placement, Some(Placement::Block));

    let d = only_directive("i%%(y)");
    assert_eq!(d.placement, Some(Placement::Inline));

    let source = "ab%x";
    let spans = scan(source).expect("scan failed");
    assert_eq!(texts(source, &spans), vec!["ab", "%x"]);
    assert_eq!(spans[1].directive().expect("directive").placement, None);
}

#[test]
fn standalone_detection() {
    let d = only_directive("text\n  %%x  \nmore");
    assert!(d.standalone);

    let d = only_directive("a %%x b");
    assert!(!d.standalone);
}

#[test]
fn rescanning_literal_text_is_a_no_op() {
    let source = "Already expanded: 42 and $x^{2}$ and \\%y.";
    let spans = scan(source).expect("scan failed");
    assert!(spans.iter().all(Span::is_literal));
    assert_eq!(reconstruct(source, &spans), source);
}
