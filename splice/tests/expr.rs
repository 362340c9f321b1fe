use splice::expr::{
    BinaryOp, CommandArg, Evaluation, Expr, GroupKind, Operand, Quantity, Relation, UnaryOp,
};
use splice::format::{FormatSettings, FormatSpec};
use splice::number::Number;
use splice::units::{SiRegistry, UnitError, UnitSystem};

const UNITS: SiRegistry = SiRegistry;

fn render(expr: &Expr) -> String {
    expr.render(&FormatSettings::default(), None)
        .expect("render failed")
}

fn sym(name: &str) -> Expr {
    Expr::symbol(name)
}

fn int(n: i64) -> Expr {
    Expr::number(Number::Int(n))
}

fn bin(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::binary(op, left, right, &UNITS).expect("binary failed")
}

fn var(name: &str, value: i64) -> Expr {
    Expr::variable(name, Quantity::new(Some(Number::Int(value))))
}

fn quantity(value: f64, unit: &str) -> Expr {
    let unit = UNITS.resolve(unit).expect("unit");
    Expr::quantity(Quantity::new(Some(Number::Float(value))).with_unit(Some(unit)))
}

fn magnitude(expr: &Expr) -> f64 {
    match expr.value() {
        Some(Evaluation::Measure(m)) => m.magnitude.as_f64(),
        other => panic!("expected a measure, got {:?}", other),
    }
}

#[test]
fn pythagoras_renders_and_evaluates() {
    let square = |e: Expr| bin(BinaryOp::Pow, e, int(2));
    let lhs = bin(
        BinaryOp::Add,
        square(var("a", 3)),
        square(var("b", 4)),
    );
    let eq = bin(BinaryOp::Relation(Relation::Eq), lhs, square(var("c", 5)));
    assert_eq!(render(&eq), "{a}^{2}+{b}^{2}={c}^{2}");
    assert_eq!(eq.value(), Some(&Evaluation::Truth(true)));
}

#[test]
fn grouping_follows_precedence() {
    let sum_times = bin(BinaryOp::Mul, bin(BinaryOp::Add, sym("a"), sym("b")), sym("c"));
    assert_eq!(render(&sum_times), "\\left(a+b\\right)c");

    let product_plus = bin(BinaryOp::Add, bin(BinaryOp::Mul, sym("a"), sym("b")), sym("c"));
    assert_eq!(render(&product_plus), "ab+c");

    let nested_sub = bin(BinaryOp::Sub, sym("a"), bin(BinaryOp::Sub, sym("b"), sym("c")));
    assert_eq!(render(&nested_sub), "a-\\left(b-c\\right)");

    let left_sub = bin(BinaryOp::Sub, bin(BinaryOp::Sub, sym("a"), sym("b")), sym("c"));
    assert_eq!(render(&left_sub), "a-b-c");

    let power_of_sum = bin(BinaryOp::Pow, bin(BinaryOp::Add, sym("a"), sym("b")), int(2));
    assert_eq!(render(&power_of_sum), "{\\left(a+b\\right)}^{2}");
}

#[test]
fn fractions_and_explicit_times() {
    let frac = bin(BinaryOp::Div, bin(BinaryOp::Add, sym("a"), sym("b")), sym("c"));
    assert_eq!(render(&frac), "\\frac{a+b}{c}");

    let dfrac = bin(BinaryOp::FloorDiv, sym("x"), int(2));
    assert_eq!(render(&dfrac), "\\dfrac{x}{2}");

    let times = bin(BinaryOp::Times, sym("a"), sym("b"));
    assert_eq!(render(&times), "a\\times b");

    let frac_times = bin(BinaryOp::Mul, frac, sym("d"));
    assert_eq!(render(&frac_times), "\\left(\\frac{a+b}{c}\\right)d");
}

#[test]
fn implicit_multiplication_spacing() {
    assert_eq!(render(&bin(BinaryOp::Mul, int(2), int(3))), "2\\cdot3");
    assert_eq!(render(&bin(BinaryOp::Mul, int(2), sym("x"))), "2x");
    assert_eq!(
        render(&bin(BinaryOp::Mul, sym("\\alpha"), sym("x"))),
        "\\alpha x"
    );
    assert_eq!(
        render(&bin(BinaryOp::Mul, int(2), int(-3))),
        "2\\left(-3\\right)"
    );
}

#[test]
fn unary_and_functions() {
    let neg = Expr::unary(UnaryOp::Minus, bin(BinaryOp::Add, sym("a"), sym("b")), &UNITS)
        .expect("unary");
    assert_eq!(render(&neg), "-\\left(a+b\\right)");

    let sin2 = Expr::unary(
        UnaryOp::Function {
            name: "sin".into(),
            power: Some(Number::Int(2)),
        },
        sym("x"),
        &UNITS,
    )
    .expect("unary");
    assert_eq!(render(&sin2), "\\sin^{2}\\left(x\\right)");

    let cube_root = Expr::unary(UnaryOp::Sqrt { root: Some(3) }, int(27), &UNITS).expect("unary");
    assert_eq!(render(&cube_root), "\\sqrt[3]{27}");
    assert!((magnitude(&cube_root) - 3.0).abs() < 1e-12);
}

#[test]
fn subscripts_and_explicit_groupings() {
    let x1 = Expr::index(sym("x"), int(1));
    assert_eq!(render(&x1), "{x}_{1}");
    assert_eq!(render(&bin(BinaryOp::Pow, x1, int(2))), "{x}_{1}^{2}");

    let set = Expr::grouping(GroupKind::Brace, vec![sym("a"), sym("b")], false);
    assert_eq!(render(&set), "\\lbrace a, b\\rbrace");
    assert_eq!(set.value(), None);

    let scaled = Expr::grouping(GroupKind::Paren, vec![var("n", 4)], true);
    assert_eq!(render(&scaled), "\\left(n\\right)");
    assert_eq!(magnitude(&scaled), 4.0);
}

#[test]
fn commands_environments_and_scripts() {
    let hat = Expr::command("hat", vec![CommandArg::required(sym("x"))]);
    assert_eq!(render(&hat), "\\hat{x}");
    assert_eq!(render(&bin(BinaryOp::Mul, int(2), hat.clone())), "2\\hat{x}");

    let root = Expr::command(
        "sqrt",
        vec![CommandArg::optional(int(3)), CommandArg::required(sym("y"))],
    );
    assert_eq!(render(&root), "\\sqrt[3]{y}");

    let bare = Expr::command("infty", Vec::new());
    assert_eq!(render(&bin(BinaryOp::Mul, bare, sym("n"))), "\\infty n");

    let matrix = Expr::environment(
        "pmatrix",
        Vec::new(),
        vec![sym("a"), sym(" & "), sym("b")],
    );
    assert_eq!(render(&matrix), "\\begin{pmatrix}a & b\\end{pmatrix}");

    let both = Expr::scripts(Some(sym("x")), Some(int(2)), Some(sym("i")));
    assert_eq!(render(&both), "{x}^{2}_{i}");
    assert_eq!(render(&Expr::scripts(None, Some(sym("n")), None)), "{}^{n}");
    assert_eq!(render(&Expr::scripts(None, None, Some(int(0)))), "{}_{0}");

    let seq = Expr::index(sym("T"), Expr::sequence(vec![sym("i"), sym("j")]));
    assert_eq!(render(&seq), "{T}_{i, j}");
}

#[test]
fn mixed_units_propagate_through_sqrt() {
    let a = quantity(3.0, "cm");
    let b = quantity(4.0, "inch");
    let sum = bin(
        BinaryOp::Add,
        bin(BinaryOp::Pow, a, int(2)),
        bin(BinaryOp::Pow, b, int(2)),
    );
    let hyp = Expr::unary(UnaryOp::Sqrt { root: None }, sum, &UNITS).expect("sqrt");
    assert!((magnitude(&hyp) - 10.5936).abs() < 1e-3);

    let Some(Evaluation::Measure(m)) = hyp.value() else {
        panic!("no value");
    };
    assert_eq!(m.unit.as_ref().map(|u| u.to_string()), Some("cm".to_string()));
}

#[test]
fn sums_require_compatible_units() {
    let err = Expr::binary(
        BinaryOp::Add,
        quantity(1.0, "cm"),
        quantity(1.0, "s"),
        &UNITS,
    )
    .unwrap_err();
    assert!(matches!(err, UnitError::Incompatible { .. }));

    let speed = bin(BinaryOp::Div, quantity(10.0, "m"), quantity(2.0, "s"));
    assert_eq!(magnitude(&speed), 5.0);
}

#[test]
fn exponents_must_be_dimensionless() {
    let err = Expr::binary(BinaryOp::Pow, int(2), quantity(1.0, "m"), &UNITS).unwrap_err();
    assert!(matches!(err, UnitError::DimensionedExponent(_)));
}

#[test]
fn unknown_values_do_not_block_rendering() {
    let zero_div = bin(BinaryOp::Div, int(1), int(0));
    assert_eq!(render(&zero_div), "\\frac{1}{0}");
    assert_eq!(zero_div.value(), None);

    let symbolic = bin(BinaryOp::Add, sym("x"), int(1));
    assert_eq!(symbolic.value(), None);
}

#[test]
fn host_relation_swaps_bare_left_operand() {
    let rel = Expr::relation_from_host(
        Operand::Number(Number::Int(3)),
        Relation::Lt,
        Operand::Expr(var("a", 5)),
        &UNITS,
    )
    .expect("relation");
    assert_eq!(render(&rel), "a>3");
    assert_eq!(rel.value(), Some(&Evaluation::Truth(true)));
}

#[test]
fn concat_joins_rendered_operands() {
    let text = Expr::concat(
        &Operand::Expr(bin(BinaryOp::Pow, sym("x"), int(2))),
        &Operand::Text("where".into()),
        &FormatSettings::default(),
    )
    .expect("concat");
    assert_eq!(text, "{x}^{2} where");
}

#[test]
fn quantity_formats_and_overrides() {
    let spec = |s: &str| FormatSpec::parse(s).expect("spec");
    let q = Expr::quantity(
        Quantity::new(Some(Number::Float(1234.5678)))
            .with_unit(Some(UNITS.resolve("m").expect("unit")))
            .with_format(Some(spec(".2f"))),
    );
    let settings = FormatSettings::default();
    assert_eq!(
        q.render(&settings, None).expect("render"),
        "1234.57\\,\\mathrm{m}"
    );
    assert_eq!(
        q.render(&settings, Some(&spec(".1f"))).expect("render"),
        "1234.6\\,\\mathrm{m}"
    );

    let literal = Expr::literal(
        splice::expr::LiteralValue::Number(Number::Float(0.5)),
        Some(spec(".3f")),
    );
    let product = bin(BinaryOp::Mul, literal, q);
    assert_eq!(
        product.render(&settings, Some(&spec(".0f"))).expect("render"),
        "0.500\\cdot1235\\,\\mathrm{m}"
    );
}

#[test]
fn reassigning_a_unit_keeps_the_magnitude() {
    let q = quantity(2.0, "m");
    let moved = q
        .with_unit(Some(UNITS.resolve("s").expect("unit")))
        .expect("quantity");
    assert_eq!(magnitude(&moved), 2.0);
    assert_eq!(render(&moved), "2.0\\,\\mathrm{s}");
    assert!(sym("x").with_unit(None).is_none());
}
