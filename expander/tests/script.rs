use expander::script::Namespace;
use expander::{DocumentContext, EvalErrorKind, HostValue, ScriptEngine, ScriptEvaluator};
use splice::document::{
    Block, Citation, CitationMode, Inline, ListDelimiter, ListStyle, Node,
};
use splice::expr::Expr;
use splice::format::FormatSettings;
use splice::number::Number;

fn setup() -> (ScriptEngine, Namespace) {
    let engine = ScriptEngine::new();
    let ctx = DocumentContext {
        target_format: "html".into(),
        format: FormatSettings::default(),
    };
    let ns = engine.new_namespace(&ctx);
    (engine, ns)
}

fn eval(source: &str) -> HostValue {
    let (mut engine, mut ns) = setup();
    engine
        .eval(source, &mut ns)
        .unwrap_or_else(|e| panic!("eval of {source:?} failed: {e}"))
}

fn eval_err(source: &str) -> expander::EvalError {
    let (mut engine, mut ns) = setup();
    match engine.eval(source, &mut ns) {
        Ok(value) => panic!("expected an error from {source:?}, got {value:?}"),
        Err(e) => e,
    }
}

fn latex(source: &str) -> String {
    match eval(source) {
        HostValue::Expr(e) => render(&e),
        other => panic!("expected an expression from {source:?}, got {other:?}"),
    }
}

fn render(e: &Expr) -> String {
    e.render(&FormatSettings::default(), None).expect("render")
}

fn int(n: i64) -> HostValue {
    HostValue::Number(Number::Int(n))
}

#[test]
fn arithmetic_follows_host_rules() {
    assert_eq!(eval("1 + 2 * 3"), int(7));
    assert_eq!(eval("(1 + 2) * 3"), int(9));
    assert_eq!(eval("7 // 2"), int(3));
    assert_eq!(eval("-7 // 2"), int(-4));
    assert_eq!(eval("7 % 3"), int(1));
    assert_eq!(eval("7 / 2"), HostValue::Number(Number::Float(3.5)));
    assert_eq!(eval("2 ** 10"), int(1024));
    assert_eq!(eval("2 ** 3 ** 2"), int(512));
    assert_eq!(eval("-2 ** 2"), int(-4));
    assert_eq!(eval("2 ** -1"), HostValue::Number(Number::Float(0.5)));
    assert_eq!(eval("1_000 + .5"), HostValue::Number(Number::Float(1000.5)));
}

#[test]
fn logic_and_comparisons() {
    assert_eq!(eval("1 < 2 < 3"), HostValue::Bool(true));
    assert_eq!(eval("3 > 2 > 5"), HostValue::Bool(false));
    assert_eq!(eval("1 == 1.0"), HostValue::Bool(true));
    assert_eq!(eval("not 0"), HostValue::Bool(true));
    assert_eq!(eval("0 or 'x'"), HostValue::Text("x".into()));
    assert_eq!(eval("1 and None"), HostValue::None);
    assert_eq!(eval("not 1 == 2"), HostValue::Bool(true));
}

#[test]
fn strings_and_lists() {
    assert_eq!(eval("'ab' + \"c\""), HostValue::Text("abc".into()));
    assert_eq!(eval("'ab' * 2"), HostValue::Text("abab".into()));
    assert_eq!(eval("'a' 'b'"), HostValue::Text("ab".into()));
    assert_eq!(eval("r'\\frac'"), HostValue::Text("\\frac".into()));
    assert_eq!(eval("'\\alpha\\n'"), HostValue::Text("\\alpha\n".into()));
    assert_eq!(eval("\"\"\"a\nb\"\"\""), HostValue::Text("a\nb".into()));
    assert_eq!(eval("[1, 2, 3][-1]"), int(3));
    assert_eq!(eval("len([1, 2] + [3])"), int(3));
    assert_eq!(eval("str([1, 'a'])"), HostValue::Text("[1, 'a']".into()));
    assert_eq!(eval("round(2.5)"), int(2));
    assert_eq!(eval("round(2.25, 1)"), HostValue::Number(Number::Float(2.2)));
    assert_eq!(eval("max(3, 9, 4)"), int(9));
    assert_eq!(eval("int('42') + int(2.9)"), int(44));
}

#[test]
fn statements_share_the_namespace() {
    let (mut engine, mut ns) = setup();
    let out = engine
        .exec("x = 41\n# a comment\ny = x + 1; print('y is', y)", &mut ns)
        .expect("exec");
    assert_eq!(out, "y is 42");
    assert_eq!(engine.eval("y * 2", &mut ns).expect("eval"), int(84));

    let out = engine
        .exec("print('a', 1, sep='-', end='')\nprint(2.5)", &mut ns)
        .expect("exec");
    assert_eq!(out, "a-12.5");

    let out = engine.exec("print('two')\nprint()", &mut ns).expect("exec");
    assert_eq!(out, "two\n");
}

#[test]
fn expression_operators_build_nodes() {
    assert_eq!(latex("sym('a') + sym('b')"), "a+b");
    assert_eq!(latex("(sym('a') + sym('b')) * sym('c')"), "\\left(a+b\\right)c");
    assert_eq!(latex("sym('a') * sym('b') + sym('c')"), "ab+c");
    assert_eq!(latex("2 * sym('x')"), "2x");
    assert_eq!(latex("sym('x') @ sym('y')"), "x\\times y");
    assert_eq!(latex("sym('x') / 2"), "\\frac{x}{2}");
    assert_eq!(latex("alpha + beta"), "\\alpha+\\beta");
    assert_eq!(latex("index(sym('x'), 0)"), "{x}_{0}");
    assert_eq!(latex("sym('x')[0]"), "{x}_{0}");
}

#[test]
fn decorations_and_latex_commands() {
    assert_eq!(latex("hat(sym('x'))"), "\\hat{x}");
    assert_eq!(latex("widetilde(alpha) + vec('v')"), "\\widetilde{\\alpha}+\\vec{v}");
    assert_eq!(latex("dot(sym('q')) - ddot(sym('q'))"), "\\dot{q}-\\ddot{q}");
    assert_eq!(latex("Macro('mathrm', 'd') * sym('x')"), "\\mathrm{d}x");
    assert_eq!(latex("Macro('sqrt', sym('x'), optional=3)"), "\\sqrt[3]{x}");
    assert_eq!(latex("Macro('infty')"), "\\infty");
    assert_eq!(
        latex("Environment('matrix', content=[sym('a'), ' & ', sym('b')])"),
        "\\begin{matrix}a & b\\end{matrix}"
    );
    assert_eq!(
        latex("Environment('array', 'cc', content=sym('x'))"),
        "\\begin{array}{cc}x\\end{array}"
    );
}

#[test]
fn scripts_and_sequences() {
    assert_eq!(latex("supsub(sym('x'), 2, sym('i'))"), "{x}^{2}_{i}");
    assert_eq!(latex("math_sup(2)"), "{}^{2}");
    assert_eq!(latex("math_sub('n')"), "{}_{n}");
    assert_eq!(latex("seq(sym('i'), sym('j'))"), "i, j");
    assert_eq!(latex("sym('T')[[sym('i'), sym('j')]]"), "{T}_{i, j}");
    assert_eq!(latex("literal([1, 2, 3])"), "1, 2, 3");
    assert_eq!(latex("literal([sym('x')])"), "\\left[x\\right]");
}

#[test]
fn greek_names_are_predefined() {
    assert_eq!(latex("lambda_ + varpi"), "\\lambda+\\varpi");
    assert_eq!(latex("varrho * varsigma"), "\\varrho\\varsigma");
    assert_eq!(latex("2 * i"), "2i");
}

#[test]
fn relations_with_bare_numbers_are_mirrored() {
    assert_eq!(latex("3 < sym('x')"), "x>3");
    assert_eq!(latex("sym('x') <= 3"), "x\\leq3");
}

#[test]
fn chained_relations_keep_the_last_pair() {
    assert_eq!(latex("sym('x') < sym('y') < sym('z')"), "y<z");
}

#[test]
fn concatenation_returns_text() {
    assert_eq!(
        eval("sym('x') & 'is positive'"),
        HostValue::Text("x is positive".into())
    );
    assert_eq!(eval("True & False"), HostValue::Bool(false));
}

#[test]
fn quantities_and_variables() {
    let (mut engine, mut ns) = setup();
    engine
        .exec("a = Variable('a', 3, unit='cm'); b = Quantity(4, 'inch', format='.1f')", &mut ns)
        .expect("exec");

    assert_eq!(engine.eval("a.value", &mut ns).expect("eval"), int(3));
    assert_eq!(
        engine.eval("a.name", &mut ns).expect("eval"),
        HostValue::Text("a".into())
    );
    assert_eq!(
        engine.eval("a.unit", &mut ns).expect("eval"),
        HostValue::Text("cm".into())
    );
    assert_eq!(engine.eval("b.name", &mut ns).expect("eval"), HostValue::None);

    let HostValue::Expr(e) = engine.eval("a", &mut ns).expect("eval") else {
        panic!("expected an expression");
    };
    assert_eq!(render(&e), "a");

    let HostValue::Expr(e) = engine.eval("a()", &mut ns).expect("eval") else {
        panic!("expected an expression");
    };
    assert_eq!(render(&e), "3\\,\\mathrm{cm}");

    let HostValue::Expr(e) = engine.eval("b()", &mut ns).expect("eval") else {
        panic!("expected an expression");
    };
    assert_eq!(render(&e), "4.0\\,\\mathrm{inch}");

    let HostValue::Expr(e) = engine.eval("set_unit(a, 'm')", &mut ns).expect("eval") else {
        panic!("expected an expression");
    };
    assert_eq!(e.as_quantity().and_then(|q| q.value), Some(Number::Int(3)));

    let HostValue::Number(n) = engine
        .eval("sqrt(a()**2 + b()**2).value", &mut ns)
        .expect("eval")
    else {
        panic!("expected a number");
    };
    assert!((n.as_f64() - 10.5936).abs() < 1e-3, "got {n}");
}

#[test]
fn format_builtin() {
    assert_eq!(eval("format(3.14159, '.2f')"), HostValue::Text("3.14".into()));
    assert_eq!(eval("format('x', '>3')"), HostValue::Text("  x".into()));
    assert_eq!(
        eval("format(Quantity(2.5, 'm'), '.2f')"),
        HostValue::Text("2.50\\,\\mathrm{m}".into())
    );
}

#[test]
fn document_builtins() {
    assert_eq!(
        eval("bold('hi')"),
        HostValue::Node(Node::Inline(Inline::Strong(vec![Inline::text("hi")])))
    );
    assert_eq!(
        eval("math(sym('x') ** 2)"),
        HostValue::Node(Node::Inline(Inline::math("{x}^{2}", false)))
    );
    assert_eq!(
        eval("header('Intro', level=2)"),
        HostValue::Node(Node::Block(Block::Header {
            level: 2,
            content: vec![Inline::text("Intro")]
        }))
    );
    assert_eq!(
        eval("link('docs', url='https://example.org')"),
        HostValue::Node(Node::Inline(Inline::Link {
            content: vec![Inline::text("docs")],
            url: "https://example.org".into()
        }))
    );
    assert_eq!(
        eval("raw_inline('<br>')"),
        HostValue::Node(Node::Inline(Inline::RawInline {
            format: "html".into(),
            text: "<br>".into()
        }))
    );
    assert_eq!(
        eval("paragraph('a', italic('b'))"),
        HostValue::Node(Node::Block(Block::Para(vec![
            Inline::text("a"),
            Inline::Space,
            Inline::Emph(vec![Inline::text("b")])
        ])))
    );
}

#[test]
fn markdown_inline_builtins() {
    let inline = |source: &str| match eval(source) {
        HostValue::Node(Node::Inline(inline)) => inline,
        other => panic!("expected an inline from {source:?}, got {other:?}"),
    };
    let w = || vec![Inline::text("w")];
    assert_eq!(inline("underline('w')"), Inline::Underline(w()));
    assert_eq!(inline("superscript('w')"), Inline::Superscript(w()));
    assert_eq!(inline("subscript('w')"), Inline::Subscript(w()));
    assert_eq!(inline("small_caps('w')"), Inline::SmallCaps(w()));
    assert_eq!(
        inline("footnote('w')"),
        Inline::Note(vec![Block::Plain(w())])
    );
    assert_eq!(
        inline("image('a.png', title='A', description='alt')"),
        Inline::Image {
            description: vec![Inline::text("alt")],
            url: "a.png".into(),
            title: "A".into()
        }
    );
    assert_eq!(
        inline("cite('see', ['a', 'b'])"),
        Inline::Cite {
            citations: vec![Citation::new("a"), Citation::new("b")],
            content: vec![Inline::text("see")]
        }
    );
    let Inline::Cite { citations, content } = inline("cite(None, 'doe', mode='author_in_text')") else {
        panic!("expected a citation");
    };
    assert!(content.is_empty());
    assert_eq!(citations[0].mode, CitationMode::AuthorInText);

    let err = eval_err("cite('x', 'y', mode='loud')");
    assert!(err.to_string().contains("unknown mode"), "got {err}");
}

#[test]
fn markdown_block_builtins() {
    let block = |source: &str| match eval(source) {
        HostValue::Node(Node::Block(block)) => block,
        other => panic!("expected a block from {source:?}, got {other:?}"),
    };
    let plain = |text: &str| Block::Plain(vec![Inline::text(text)]);

    assert_eq!(block("rule()"), Block::HorizontalRule);
    assert_eq!(
        block("block_quote('q')"),
        Block::BlockQuote(vec![Block::Para(vec![Inline::text("q")])])
    );
    assert_eq!(
        block("code_block('x = 1', classes='.python numbered')"),
        Block::CodeBlock {
            language: Some("python".into()),
            text: "x = 1".into()
        }
    );
    assert_eq!(
        block("figure('p.png', caption='Plot', identifier='fig:p')"),
        Block::Figure {
            url: "p.png".into(),
            caption: vec![Inline::text("Plot")],
            identifier: "fig:p".into()
        }
    );
    assert_eq!(
        block("bullet_list(['a', ['b', 'c'], 'd'])"),
        Block::BulletList(vec![
            vec![plain("a"), Block::BulletList(vec![vec![plain("b")], vec![plain("c")]])],
            vec![plain("d")],
        ])
    );
    assert_eq!(
        block("ordered_list(['x', 'y'], style='lower_roman', start=2, delimiter='one_paren')"),
        Block::OrderedList {
            start: 2,
            style: ListStyle::LowerRoman,
            delimiter: ListDelimiter::OneParen,
            items: vec![vec![plain("x")], vec![plain("y")]],
        }
    );
    assert_eq!(
        block("ordered_list(['x', ['y']])").to_string(),
        "1. x\n   1. y"
    );
    assert_eq!(
        block("bullet_list([bold('a'), ordered_list(['b'])])").to_string(),
        "- **a**\n  1. b"
    );

    let err = eval_err("bullet_list('a')");
    assert!(err.to_string().contains("expects a list of items"), "got {err}");
}

#[test]
fn calls_from_the_host() {
    let (mut engine, mut ns) = setup();
    let value = engine
        .call("frac", vec![int(1), int(2)], &mut ns)
        .expect("call");
    let HostValue::Expr(e) = value else {
        panic!("expected an expression, got {value:?}");
    };
    assert_eq!(render(&e), "\\frac{1}{2}");

    let err = engine.call("nope", vec![], &mut ns).unwrap_err();
    assert_eq!(err.to_string(), "name 'nope' is not defined");
}

#[test]
fn errors_carry_fragment_spans() {
    let err = eval_err("1 + undefined_name");
    assert_eq!(err.span, Some(4..18));
    assert_eq!(err.kind, EvalErrorKind::Raised("name 'undefined_name' is not defined".into()));

    let err = eval_err("1 / 0");
    assert_eq!(err.to_string(), "division by zero");
    assert_eq!(err.span, Some(0..5));

    let err = eval_err("f(");
    assert!(err.to_string().contains("invalid syntax"), "got {err}");

    let err = eval_err("'open");
    assert_eq!(err.to_string(), "unterminated string literal");

    let err = eval_err("Quantity(2) ** Quantity(2, 'm')");
    assert!(matches!(err.kind, EvalErrorKind::Unit(_)));

    let err = eval_err("bold('x', color='red')");
    assert!(err.to_string().contains("unexpected keyword argument 'color'"));
}
