use expander::{
    ErrorKind, EvalError, Expansion, ExpandError, ScriptEngine, Segment, Session, Settings,
};
use splice::document::{Block, Inline, Node};
use splice::format::FormatError;
use splice::units::UnitError;

fn session() -> Session<ScriptEngine> {
    Session::new(ScriptEngine::new(), Settings::default()).expect("default settings")
}

fn expand(source: &str) -> Expansion {
    session()
        .expand_str("test.md", source)
        .unwrap_or_else(|e| panic!("expansion of {source:?} failed: {e}"))
}

fn run(source: &str) -> String {
    expand(source).to_string()
}

fn run_err(source: &str) -> ExpandError {
    match session().expand_str("test.md", source) {
        Ok(out) => panic!("expected an error, got {:?}", out.to_string()),
        Err(e) => e,
    }
}

#[test]
fn literals_pass_through() {
    let source = "# Title\n\nNo directives here, 100% sure. `%code` and $%math$.\n";
    assert_eq!(run(source), source);
}

#[test]
fn html_comments_are_removed() {
    assert_eq!(run("a <!-- %missing --> b"), "a  b");
    assert_eq!(run("keep\n<!--\nmulti\nline\n-->\nafter"), "keep\n\nafter");
    assert_eq!(run("`<!-- code -->` stays"), "`<!-- code -->` stays");
}

#[test]
fn values_and_expressions() {
    assert_eq!(run("%{x = 2;}The value is %x."), "The value is 2.");
    assert_eq!(run("%{n = 3}Total: %(n * 2)."), "Total: 6.");
    assert_eq!(run("%(7 / 2) and %(7 // 2)"), "3.5 and 3");
    assert_eq!(run("%(1 < 2), %(1 > 2), [%(None)]"), "True, False, []");
    assert_eq!(run("%(0.1 + 0.2)"), "0.3");
    assert_eq!(run("%(\"text\")"), "text");
}

#[test]
fn format_specs_apply_to_values() {
    assert_eq!(run("%{pi_ish = 3.14159}%pi_ish:.2f"), "3.14");
    assert_eq!(run("%(1234567):,d"), "1,234,567");
    assert_eq!(run("%(\"ab\"):>4"), "  ab");
}

#[test]
fn suppression_discards_output_but_keeps_effects() {
    assert_eq!(run("%{a = 3}%(a + 1);|%a"), "|3");
    assert_eq!(run("%{print(\"hi\");}"), "");
    assert_eq!(run("%{print(\"hi\")}"), "hi");
    assert_eq!(run("%(b = 5);%b"), "5");
}

#[test]
fn blocks_splice_printed_output() {
    let source = "%{\nfor_each = [1, 2, 3]\nprint(len(for_each), \"items\")\n}\nend";
    assert_eq!(run(source), "3 items\nend");
}

#[test]
fn printed_output_drops_one_trailing_newline() {
    assert_eq!(run("A %{print(\"x\")} B"), "A x B");
    assert_eq!(run("A %{print(\"x\", end=\"\")} B"), "A x B");
    assert_eq!(run("A %{print(\"x\\n\")} B"), "A x\n B");
    assert_eq!(run("%{print(1)\nprint(2)}|"), "1\n2|");
}

#[test]
fn format_errors_inside_nested_renders_abort_expansion() {
    let err = run_err("A %{print(str(Quantity(1.5, format=\"d\")))} B");
    assert!(matches!(err.kind, ErrorKind::Format(_)), "got {:?}", err.kind);

    let err = run_err("%{print(Quantity(2.5, format=\"d\"))}");
    assert!(matches!(err.kind, ErrorKind::Format(_)), "got {:?}", err.kind);

    let err = run_err("%(str(sym(\"a\") + Quantity(0.5, format=\"d\")))");
    assert!(matches!(err.kind, ErrorKind::Format(_)), "got {:?}", err.kind);

    let err = run_err("%%(bold(Quantity(1.5, format=\"d\")))");
    assert!(matches!(err.kind, ErrorKind::Format(_)), "got {:?}", err.kind);
}

#[test]
fn structured_expression_becomes_math() {
    let out = expand("Here %%(sym(\"a\") + sym(\"b\")) is.");
    assert_eq!(out.to_string(), "Here $a+b$ is.");
    let nodes: Vec<&Node> = out.nodes().collect();
    assert_eq!(nodes, vec![&Node::Inline(Inline::math("a+b", false))]);
}

#[test]
fn pythagoras_in_prose() {
    let source = "%{a = Variable(\"a\"); b = Variable(\"b\"); c = Variable(\"c\")}\n%%(a**2 + b**2 == c**2)\n";
    let out = expand(source);
    assert_eq!(out.to_string(), "\n${a}^{2}+{b}^{2}={c}^{2}$\n");

    // Alone on its line, the result is a paragraph.
    let node = out.nodes().next().expect("a node");
    assert_eq!(
        node,
        &Node::Block(Block::Para(vec![Inline::math("{a}^{2}+{b}^{2}={c}^{2}", false)]))
    );
}

#[test]
fn plain_directive_renders_latex_text() {
    assert_eq!(run("%(sym(\"x\") * sym(\"y\"))"), "xy");
    assert_eq!(run("%(frac(1, 2))"), "\\frac{1}{2}");
}

#[test]
fn quantities_with_units() {
    let source = "%{a = Quantity(3, \"cm\"); b = Quantity(4, \"inch\")}%(sqrt(a()**2 + b()**2).value):.2f";
    assert_eq!(run(source), "10.59");

    let rendered = run("%{a = Quantity(3, \"cm\"); b = Quantity(4, \"inch\")}%(sqrt(a()**2 + b()**2))");
    assert!(rendered.starts_with("\\sqrt{"), "got {rendered}");

    assert_eq!(
        run("%{d = Quantity(1, \"inch\")}%(d(\".2f\", unit=\"cm\"))"),
        "2.54\\,\\mathrm{cm}"
    );
    assert_eq!(run("%{q = Quantity(3, \"cm\")}%q"), "3\\,\\mathrm{cm}");
}

#[test]
fn placement_prefixes() {
    let out = expand("b%%(sym(\"x\"))");
    assert_eq!(
        out.nodes().next(),
        Some(&Node::Block(Block::Para(vec![Inline::math("x", true)])))
    );
    assert_eq!(out.to_string(), "$$x$$");

    let out = expand("see i%%(equation(sym(\"y\"))) here");
    assert_eq!(
        out.nodes().next(),
        Some(&Node::Inline(Inline::Span(vec![Inline::math("y", true)])))
    );
}

#[test]
fn macro_calls_expand_arguments_first() {
    assert_eq!(run("%bold{hello}"), "**hello**");
    assert_eq!(run("%{name = \"Ada\"}%bold{Hi %name}"), "**Hi Ada**");
    assert_eq!(run("x %%bold{*hi*} y"), "x ***hi*** y");
    assert_eq!(run("%code{{%not_expanded}}"), "`%not_expanded`");
}

#[test]
fn expansion_serializes_to_json() {
    let out = expand("Area %%(sym(\"r\")**2).");
    let json = serde_json::to_value(&out).expect("json");
    assert_eq!(json[0]["t"], "Text");
    assert_eq!(json[0]["c"], "Area ");
    assert_eq!(json[1]["t"], "Node");
    assert_eq!(json[1]["c"]["t"], "Math");
    assert_eq!(json[2]["c"], ".");
    assert!(matches!(out.segments()[1], Segment::Node(_)));
}

#[test]
fn expanding_expanded_output_is_a_no_op() {
    let once = run("%{n = 3}Total: %(n * 2). Ratio %(n / 4).");
    assert_eq!(once, "Total: 6. Ratio 0.75.");
    assert_eq!(run(&once), once);
}

#[test]
fn target_format_is_visible_to_scripts() {
    let settings = Settings {
        target: "latex".into(),
        ..Settings::default()
    };
    let mut session = Session::new(ScriptEngine::new(), settings).expect("settings");
    let out = session.expand_str("t.md", "%target_format").expect("expand");
    assert_eq!(out.to_string(), "latex");

    let out = session.expand_str("t.md", "%%(raw(\"\\\\newpage\"))").expect("expand");
    assert_eq!(
        out.nodes().next(),
        Some(&Node::Block(Block::RawBlock {
            format: "latex".into(),
            text: "\\newpage".into()
        }))
    );
}

#[test]
fn default_format_setting() {
    let settings = Settings::from_toml("[format]\ndefault = \".3f\"\n").expect("settings");
    let mut session = Session::new(ScriptEngine::new(), settings).expect("settings");
    let out = session.expand_str("t.md", "%(1 / 3)").expect("expand");
    assert_eq!(out.to_string(), "0.333");
}

#[test]
fn evaluation_errors_point_into_the_payload() {
    let source = "ok %(1 + missing) end";
    let err = run_err(source);
    assert_eq!(err.kind, ErrorKind::Eval("name 'missing' is not defined".into()));
    assert_eq!(&source[err.span.clone()], "missing");
    assert!(err.notes.iter().any(|n| n.contains("inline expression")));

    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.code.as_deref(), Some("eval"));
}

#[test]
fn unit_errors_are_fatal() {
    let err = run_err("%{a = Quantity(1, \"m\"); b = Quantity(1, \"s\")}%(a + b)");
    assert!(matches!(err.kind, ErrorKind::Unit(UnitError::Incompatible { .. })));

    let err = run_err("%(Quantity(1, \"furlong\"))");
    assert!(matches!(err.kind, ErrorKind::Unit(UnitError::Unknown(_))));
}

#[test]
fn format_spec_on_a_node_is_an_error() {
    let err = run_err("%%(bold(\"x\")):.2f");
    assert!(matches!(err.kind, ErrorKind::Format(FormatError::StructuredValue(_))));
}

#[test]
fn scan_errors_carry_offsets() {
    let err = run_err("text %{ x = (1 +");
    assert!(matches!(err.kind, ErrorKind::Scan(_)));
    assert_eq!(err.span.start, 6);
}

#[test]
fn evaluator_errors_convert() {
    let err: EvalError = UnitError::Unknown("zz".into()).into();
    assert!(err.span.is_none());
    assert_eq!(err.to_string(), "unknown unit `zz`");
}
