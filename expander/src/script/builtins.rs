use splice::document::{
    Block, Citation, CitationMode, Inline, ListDelimiter, ListStyle, Node, raw_output_format,
};
use splice::expr::{BinaryOp, CommandArg, Expr, GroupKind, LiteralValue, Quantity, UnaryOp};
use splice::format::{FormatError, FormatSpec, format_number, format_str};
use splice::number::Number;

use crate::error::EvalError;
use crate::script::interpreter::Interpreter;
use crate::script::value::Value;

const BUILTINS: &[&str] = &[
    // Output and conversion
    "print", "str", "repr", "format", "len", "abs", "round", "int", "float", "min", "max",
    // Expression nodes
    "sym", "literal", "Quantity", "Variable", "set_unit", "sqrt", "frac", "dfrac", "times",
    "power", "index", "paren", "bracket", "brace", "angle", "seq", "supsub", "math_sup",
    "math_sub", "Macro", "Environment",
    // Decorations
    "dot", "ddot", "hat", "bar", "vec", "tilde", "widehat", "overline", "widetilde",
    // Named functions
    "sin", "cos", "tan", "csc", "sec", "cot", "sinh", "cosh", "tanh", "coth", "arcsin",
    "arccos", "arctan", "exp", "ln", "log", "lg",
    // Document nodes
    "math", "equation", "bold", "italic", "strikethrough", "code", "raw", "raw_inline",
    "paragraph", "header", "link", "underline", "superscript", "subscript", "small_caps",
    "footnote", "image", "figure", "cite", "code_block", "block_quote", "bullet_list",
    "ordered_list", "rule",
];

const DECORATIONS: &[&str] = &[
    "dot", "ddot", "hat", "bar", "vec", "tilde", "widehat", "overline", "widetilde",
];

const FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "csc", "sec", "cot", "sinh", "cosh", "tanh", "coth", "arcsin",
    "arccos", "arctan", "exp", "ln", "log", "lg",
];

const VARIADIC: usize = usize::MAX;

pub(crate) fn lookup(name: &str) -> Option<&'static str> {
    BUILTINS.iter().copied().find(|b| *b == name)
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    pub(crate) fn positional(values: Vec<Value>) -> Self {
        Args {
            positional: values,
            keywords: Vec::new(),
        }
    }

    pub(crate) fn check(
        &self,
        name: &str,
        keywords: &[&str],
        max_positional: usize,
    ) -> Result<(), EvalError> {
        if self.positional.len() > max_positional {
            return Err(EvalError::raised(format!(
                "{name}() takes at most {max_positional} positional argument{} ({} given)",
                if max_positional == 1 { "" } else { "s" },
                self.positional.len()
            )));
        }
        if let Some((key, _)) = self.keywords.iter().find(|(k, _)| !keywords.contains(&k.as_str())) {
            return Err(EvalError::raised(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        }
        Ok(())
    }

    /// The argument at `index` or named `key`. An explicit `None` counts as absent.
    pub(crate) fn get(&self, index: usize, key: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .or_else(|| self.positional.get(index))
            .filter(|v| !matches!(v, Value::None))
    }

    pub(crate) fn require(&self, index: usize, key: &str, name: &str) -> Result<&Value, EvalError> {
        self.get(index, key).ok_or_else(|| {
            EvalError::raised(format!("{name}() missing required argument '{key}'"))
        })
    }

    pub(crate) fn get_str(&self, index: usize, key: &str) -> Result<Option<String>, EvalError> {
        match self.get(index, key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(EvalError::raised(format!(
                "argument '{key}' must be str, not {}",
                other.type_name()
            ))),
        }
    }

    fn get_number(&self, index: usize, key: &str) -> Result<Option<Number>, EvalError> {
        match self.get(index, key) {
            None => Ok(None),
            Some(value) => value.as_number().map(Some).ok_or_else(|| {
                EvalError::raised(format!(
                    "argument '{key}' must be a number, not {}",
                    value.type_name()
                ))
            }),
        }
    }

    fn get_bool(&self, index: usize, key: &str) -> bool {
        self.get(index, key).is_some_and(Value::truthy)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub(crate) fn call(interp: &mut Interpreter<'_>, name: &str, args: Args) -> Result<Value, EvalError> {
    if FUNCTIONS.contains(&name) {
        args.check(name, &["x", "power"], 2)?;
        let operand = expr_arg(args.require(0, "x", name)?, name)?;
        let power = args.get_number(1, "power")?;
        let op = UnaryOp::Function {
            name: name.to_string(),
            power,
        };
        return Ok(Value::Expr(Expr::unary(op, operand, interp.units)?));
    }
    if DECORATIONS.contains(&name) {
        args.check(name, &[], 1)?;
        let operand = expr_arg(args.require(0, "x", name)?, name)?;
        return Ok(Value::Expr(Expr::command(name, vec![CommandArg::required(operand)])));
    }

    match name {
        "print" => {
            args.check(name, &["sep", "end"], VARIADIC)?;
            let sep = args.get_str(usize::MAX, "sep")?.unwrap_or_else(|| " ".to_string());
            let end = args.get_str(usize::MAX, "end")?.unwrap_or_else(|| "\n".to_string());
            let settings = interp.ns.format_settings().clone();
            let parts = args
                .positional
                .iter()
                .map(|v| v.to_text(&settings))
                .collect::<Result<Vec<_>, _>>()?;
            let line = format!("{}{end}", parts.join(&sep));
            interp.ns.write(&line);
            Ok(Value::None)
        }
        "str" => {
            args.check(name, &[], 1)?;
            let text = match args.positional.first() {
                Some(value) => value.to_text(interp.ns.format_settings())?,
                None => String::new(),
            };
            Ok(Value::Str(text))
        }
        "repr" => {
            args.check(name, &[], 1)?;
            Ok(Value::Str(args.require(0, "obj", name)?.repr()))
        }
        "format" => {
            args.check(name, &["spec"], 2)?;
            let value = args.require(0, "value", name)?;
            let spec = FormatSpec::parse(&args.get_str(1, "spec")?.unwrap_or_default())?;
            let text = match value {
                Value::Str(s) => format_str(s, &spec)?,
                Value::Expr(e) => e.render(interp.ns.format_settings(), Some(&spec))?,
                Value::Node(_) => return Err(FormatError::StructuredValue(spec.to_string()).into()),
                other => match other.as_number() {
                    Some(n) if spec.is_empty() => interp.ns.format_settings().plain(n),
                    Some(n) => format_number(n, &spec)?,
                    None if spec.is_empty() => other.to_string(),
                    None => {
                        return Err(EvalError::raised(format!(
                            "unsupported format string passed to {}.__format__",
                            other.type_name()
                        )));
                    }
                },
            };
            Ok(Value::Str(text))
        }
        "len" => {
            args.check(name, &[], 1)?;
            match args.require(0, "obj", name)? {
                Value::Str(s) => Ok(int(s.chars().count() as i64)),
                Value::List(items) => Ok(int(items.len() as i64)),
                other => Err(EvalError::raised(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                ))),
            }
        }
        "abs" => {
            args.check(name, &[], 1)?;
            Ok(Value::Number(number_arg(args.require(0, "x", name)?, name)?.abs()))
        }
        "round" => {
            args.check(name, &["ndigits"], 2)?;
            let x = number_arg(args.require(0, "number", name)?, name)?;
            match args.get_number(1, "ndigits")? {
                None => match x {
                    Number::Int(_) => Ok(Value::Number(x)),
                    Number::Float(f) if f.is_finite() => Ok(int(f.round_ties_even() as i64)),
                    Number::Float(_) => Err(EvalError::raised("cannot convert float to integer")),
                },
                Some(digits) => {
                    let factor = 10f64.powi(digits.as_f64() as i32);
                    let rounded = (x.as_f64() * factor).round_ties_even() / factor;
                    Ok(match x {
                        Number::Int(_) if digits.as_f64() >= 0.0 => Value::Number(x),
                        Number::Int(_) => int(rounded as i64),
                        Number::Float(_) => Value::Number(Number::Float(rounded)),
                    })
                }
            }
        }
        "int" => {
            args.check(name, &[], 1)?;
            match args.require(0, "x", name)? {
                Value::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(int)
                    .map_err(|_| EvalError::raised(format!("invalid literal for int(): '{s}'"))),
                other => match number_arg(other, name)? {
                    Number::Float(f) => Ok(int(f.trunc() as i64)),
                    n => Ok(Value::Number(n)),
                },
            }
        }
        "float" => {
            args.check(name, &[], 1)?;
            match args.require(0, "x", name)? {
                Value::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(|f| Value::Number(Number::Float(f)))
                    .map_err(|_| {
                        EvalError::raised(format!("could not convert string to float: '{s}'"))
                    }),
                other => Ok(Value::Number(Number::Float(number_arg(other, name)?.as_f64()))),
            }
        }
        "min" | "max" => {
            args.check(name, &[], VARIADIC)?;
            let items = spread(&args.positional);
            let mut best: Option<Number> = None;
            for item in items {
                let n = number_arg(item, name)?;
                best = Some(match best {
                    None => n,
                    Some(b) if name == "min" && n.as_f64() < b.as_f64() => n,
                    Some(b) if name == "max" && n.as_f64() > b.as_f64() => n,
                    Some(b) => b,
                });
            }
            best.map(Value::Number)
                .ok_or_else(|| EvalError::raised(format!("{name}() arg is an empty sequence")))
        }

        // ------------------------------------------------------------------
        // Expression nodes
        // ------------------------------------------------------------------
        "sym" => {
            args.check(name, &[], 1)?;
            match args.require(0, "text", name)? {
                Value::Str(s) => Ok(Value::Expr(Expr::symbol(s.clone()))),
                other => Ok(Value::Expr(expr_arg(other, name)?)),
            }
        }
        "literal" => {
            args.check(name, &["value", "format"], 2)?;
            let format = spec_arg(&args, 1)?;
            let value = match args.require(0, "value", name)? {
                Value::Str(s) => LiteralValue::Text(s.clone()),
                Value::List(items) => return Ok(Value::Expr(list_literal(items, name)?)),
                other => LiteralValue::Number(number_arg(other, name)?),
            };
            Ok(Value::Expr(Expr::literal(value, format)))
        }
        "Quantity" => {
            args.check(name, &["value", "unit", "format"], 3)?;
            let quantity = quantity_arg(interp, &args, 0)?;
            Ok(Value::Expr(Expr::quantity(quantity)))
        }
        "Variable" => {
            args.check(name, &["name", "value", "unit", "format"], 4)?;
            let Some(var_name) = args.get_str(0, "name")? else {
                return Err(EvalError::raised("Variable() missing required argument 'name'"));
            };
            let quantity = quantity_arg(interp, &args, 1)?;
            Ok(Value::Expr(Expr::variable(var_name, quantity)))
        }
        "set_unit" => {
            args.check(name, &["x", "unit"], 2)?;
            let Value::Expr(e) = args.require(0, "x", name)? else {
                return Err(EvalError::raised("set_unit() expects a Quantity or Variable"));
            };
            let unit = match args.get_str(1, "unit")? {
                Some(descriptor) => Some(interp.units.resolve(&descriptor)?),
                None => None,
            };
            e.with_unit(unit)
                .map(Value::Expr)
                .ok_or_else(|| EvalError::raised("set_unit() expects a Quantity or Variable"))
        }
        "sqrt" => {
            args.check(name, &["x", "root"], 2)?;
            let operand = expr_arg(args.require(0, "x", name)?, name)?;
            let root = match args.get_number(1, "root")? {
                None | Some(Number::Int(2)) => None,
                Some(Number::Int(n)) if n > 0 => Some(n as u32),
                Some(other) => {
                    return Err(EvalError::raised(format!(
                        "sqrt() root must be a positive integer, got {other}"
                    )));
                }
            };
            Ok(Value::Expr(Expr::unary(UnaryOp::Sqrt { root }, operand, interp.units)?))
        }
        "frac" | "dfrac" | "times" | "power" => {
            args.check(name, &[], 2)?;
            let left = expr_arg(args.require(0, "a", name)?, name)?;
            let right = expr_arg(args.require(1, "b", name)?, name)?;
            let op = match name {
                "frac" => BinaryOp::Div,
                "dfrac" => BinaryOp::FloorDiv,
                "times" => BinaryOp::Times,
                _ => BinaryOp::Pow,
            };
            Ok(Value::Expr(Expr::binary(op, left, right, interp.units)?))
        }
        "index" => {
            args.check(name, &[], 2)?;
            let base = expr_arg(args.require(0, "base", name)?, name)?;
            let subscript = expr_arg(args.require(1, "subscript", name)?, name)?;
            Ok(Value::Expr(Expr::index(base, subscript)))
        }
        "paren" | "bracket" | "brace" | "angle" => {
            args.check(name, &["scale"], VARIADIC)?;
            let kind = match name {
                "paren" => GroupKind::Paren,
                "bracket" => GroupKind::Bracket,
                "brace" => GroupKind::Brace,
                _ => GroupKind::Angle,
            };
            let children = spread(&args.positional)
                .into_iter()
                .map(|v| expr_arg(v, name))
                .collect::<Result<Vec<_>, _>>()?;
            let scale = args.get_bool(usize::MAX, "scale");
            Ok(Value::Expr(Expr::grouping(kind, children, scale)))
        }
        "seq" => {
            args.check(name, &[], VARIADIC)?;
            let children = spread(&args.positional)
                .into_iter()
                .map(|v| expr_arg(v, name))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Expr(Expr::sequence(children)))
        }
        "supsub" => {
            args.check(name, &[], 3)?;
            let base = expr_arg(args.require(0, "base", name)?, name)?;
            let sup = expr_arg(args.require(1, "superscript", name)?, name)?;
            let sub = expr_arg(args.require(2, "subscript", name)?, name)?;
            Ok(Value::Expr(Expr::scripts(Some(base), Some(sup), Some(sub))))
        }
        "math_sup" | "math_sub" => {
            args.check(name, &[], 1)?;
            let script = expr_arg(args.require(0, "x", name)?, name)?;
            Ok(Value::Expr(if name == "math_sup" {
                Expr::scripts(None, Some(script), None)
            } else {
                Expr::scripts(None, None, Some(script))
            }))
        }
        "Macro" => {
            args.check(name, &["optional"], VARIADIC)?;
            let command = command_name(&args, name)?;
            let arguments = command_args(&args, name)?;
            Ok(Value::Expr(Expr::command(command, arguments)))
        }
        "Environment" => {
            args.check(name, &["optional", "content"], VARIADIC)?;
            let env = command_name(&args, name)?;
            let arguments = command_args(&args, name)?;
            let body = match args.get(usize::MAX, "content") {
                Some(content) => spread(std::slice::from_ref(content))
                    .into_iter()
                    .map(|v| expr_arg(v, name))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Ok(Value::Expr(Expr::environment(env, arguments, body)))
        }

        // ------------------------------------------------------------------
        // Document nodes
        // ------------------------------------------------------------------
        "math" => {
            args.check(name, &["x", "display"], 2)?;
            let latex = latex_arg(interp, args.require(0, "x", name)?)?;
            let display = args.get_bool(1, "display");
            Ok(node(Inline::math(latex, display)))
        }
        "equation" => {
            args.check(name, &[], 1)?;
            let latex = latex_arg(interp, args.require(0, "x", name)?)?;
            Ok(node(Block::Para(vec![Inline::math(latex, true)])))
        }
        "bold" | "italic" | "strikethrough" => {
            args.check(name, &[], VARIADIC)?;
            let content = inlines_arg(interp, &args.positional)?;
            Ok(node(match name {
                "bold" => Inline::Strong(content),
                "italic" => Inline::Emph(content),
                _ => Inline::Strikeout(content),
            }))
        }
        "code" => {
            args.check(name, &[], 1)?;
            let text = args.require(0, "text", name)?.to_text(interp.ns.format_settings())?;
            Ok(node(Inline::Code(text)))
        }
        "raw" | "raw_inline" => {
            args.check(name, &["text", "format"], 2)?;
            let text = args.require(0, "text", name)?.to_text(interp.ns.format_settings())?;
            let format = match args.get_str(1, "format")? {
                Some(format) => format,
                None => raw_output_format(&interp.ns.target_format).to_string(),
            };
            Ok(if name == "raw" {
                node(Block::RawBlock { format, text })
            } else {
                node(Inline::RawInline { format, text })
            })
        }
        "paragraph" => {
            args.check(name, &[], VARIADIC)?;
            let mut content = Vec::new();
            for (i, item) in args.positional.iter().enumerate() {
                if i > 0 {
                    content.push(Inline::Space);
                }
                content.extend(inlines_arg(interp, std::slice::from_ref(item))?);
            }
            Ok(node(Block::Para(content)))
        }
        "header" => {
            args.check(name, &["text", "level"], 2)?;
            let content = inlines_arg(interp, std::slice::from_ref(args.require(0, "text", name)?))?;
            let level = match args.get_number(1, "level")? {
                None => 1,
                Some(Number::Int(n)) if (1..=6).contains(&n) => n as u8,
                Some(other) => {
                    return Err(EvalError::raised(format!(
                        "header() level must be between 1 and 6, got {other}"
                    )));
                }
            };
            Ok(node(Block::Header { level, content }))
        }
        "link" => {
            args.check(name, &["text", "url"], 2)?;
            let content = inlines_arg(interp, std::slice::from_ref(args.require(0, "text", name)?))?;
            let Some(url) = args.get_str(1, "url")? else {
                return Err(EvalError::raised("link() missing required argument 'url'"));
            };
            Ok(node(Inline::Link { content, url }))
        }
        "underline" | "superscript" | "subscript" | "small_caps" => {
            args.check(name, &[], VARIADIC)?;
            let content = inlines_arg(interp, &args.positional)?;
            Ok(node(match name {
                "underline" => Inline::Underline(content),
                "superscript" => Inline::Superscript(content),
                "subscript" => Inline::Subscript(content),
                _ => Inline::SmallCaps(content),
            }))
        }
        "footnote" => {
            args.check(name, &[], VARIADIC)?;
            let content = inlines_arg(interp, &args.positional)?;
            Ok(node(Inline::Note(vec![Block::Plain(content)])))
        }
        "image" => {
            args.check(name, &["url", "title", "description"], 3)?;
            let Some(url) = args.get_str(0, "url")? else {
                return Err(EvalError::raised("image() missing required argument 'url'"));
            };
            let title = args.get_str(1, "title")?.unwrap_or_default();
            let description = match args.get(2, "description") {
                Some(value) => inlines_arg(interp, std::slice::from_ref(value))?,
                None => Vec::new(),
            };
            Ok(node(Inline::Image {
                description,
                url,
                title,
            }))
        }
        "figure" => {
            args.check(name, &["url", "caption", "identifier"], 3)?;
            let Some(url) = args.get_str(0, "url")? else {
                return Err(EvalError::raised("figure() missing required argument 'url'"));
            };
            let caption = match args.get(1, "caption") {
                Some(value) => inlines_arg(interp, std::slice::from_ref(value))?,
                None => Vec::new(),
            };
            let identifier = args.get_str(2, "identifier")?.unwrap_or_default();
            Ok(node(Block::Figure {
                url,
                caption,
                identifier,
            }))
        }
        "cite" => {
            args.check(name, &["contents", "citations", "mode"], 3)?;
            let content = match args.get(0, "contents") {
                Some(value) => inlines_arg(interp, std::slice::from_ref(value))?,
                None => Vec::new(),
            };
            let mode = match args.get_str(2, "mode")?.as_deref() {
                None | Some("normal") => CitationMode::NormalCitation,
                Some("author_in_text") => CitationMode::AuthorInText,
                Some("suppress_author") => CitationMode::SuppressAuthor,
                Some(other) => {
                    return Err(EvalError::raised(format!("cite() unknown mode '{other}'")));
                }
            };
            let citations = spread(std::slice::from_ref(args.require(1, "citations", name)?))
                .into_iter()
                .map(|value| match value {
                    Value::Str(id) => Ok(Citation {
                        mode,
                        ..Citation::new(id.clone())
                    }),
                    other => Err(EvalError::raised(format!(
                        "cite() citation ids must be str, not {}",
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(node(Inline::Cite { citations, content }))
        }
        "code_block" => {
            args.check(name, &["text", "language", "classes"], 3)?;
            let text = args.require(0, "text", name)?.to_text(interp.ns.format_settings())?;
            let language = match args.get_str(1, "language")? {
                Some(language) => Some(language),
                None => args.get_str(2, "classes")?.and_then(|classes| {
                    classes
                        .split_whitespace()
                        .next()
                        .map(|class| class.trim_start_matches('.').to_string())
                }),
            };
            Ok(node(Block::CodeBlock { language, text }))
        }
        "block_quote" => {
            args.check(name, &[], VARIADIC)?;
            let blocks = args
                .positional
                .iter()
                .map(|value| block_arg(interp, value))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(node(Block::BlockQuote(blocks)))
        }
        "bullet_list" => {
            args.check(name, &["items"], 1)?;
            let items = items_arg(args.require(0, "items", name)?, name)?;
            Ok(node(Block::BulletList(list_items(interp, items, &Block::BulletList)?)))
        }
        "ordered_list" => {
            args.check(name, &["items", "style", "start", "delimiter"], 4)?;
            let items = items_arg(args.require(0, "items", name)?, name)?;
            let style = list_style(args.get_str(1, "style")?.as_deref())?;
            let start = match args.get_number(2, "start")? {
                None => 1,
                Some(Number::Int(n)) if n >= 0 => n as u32,
                Some(other) => {
                    return Err(EvalError::raised(format!(
                        "ordered_list() start must be a non-negative integer, got {other}"
                    )));
                }
            };
            let delimiter = list_delimiter(args.get_str(3, "delimiter")?.as_deref())?;
            let items = list_items(interp, items, &default_ordered)?;
            Ok(node(Block::OrderedList {
                start,
                style,
                delimiter,
                items,
            }))
        }
        "rule" => {
            args.check(name, &[], 0)?;
            Ok(node(Block::HorizontalRule))
        }

        other => Err(EvalError::raised(format!("name '{other}' is not defined"))),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn int(n: i64) -> Value {
    Value::Number(Number::Int(n))
}

fn node(n: impl Into<Node>) -> Value {
    Value::Node(n.into())
}

/// A single list argument stands for its items.
fn spread(values: &[Value]) -> Vec<&Value> {
    match values {
        [Value::List(items)] => items.iter().collect(),
        _ => values.iter().collect(),
    }
}

fn number_arg(value: &Value, name: &str) -> Result<Number, EvalError> {
    value.as_number().ok_or_else(|| {
        EvalError::raised(format!(
            "{name}() expects a number, got {}",
            value.type_name()
        ))
    })
}

fn expr_arg(value: &Value, name: &str) -> Result<Expr, EvalError> {
    value.as_operand().map(|op| op.into_expr()).ok_or_else(|| {
        EvalError::raised(format!(
            "{name}() cannot use a {} as an expression",
            value.type_name()
        ))
    })
}

fn spec_arg(args: &Args, index: usize) -> Result<Option<FormatSpec>, EvalError> {
    match args.get_str(index, "format")? {
        Some(text) => Ok(Some(FormatSpec::parse(&text)?)),
        None => Ok(None),
    }
}

/// `value, unit, format` starting at positional `first`.
fn quantity_arg(interp: &Interpreter<'_>, args: &Args, first: usize) -> Result<Quantity, EvalError> {
    let value = args.get_number(first, "value")?;
    let unit = match args.get_str(first + 1, "unit")? {
        Some(descriptor) => Some(interp.units.resolve(&descriptor)?),
        None => None,
    };
    let format = spec_arg(args, first + 2)?;
    Ok(Quantity::new(value).with_unit(unit).with_format(format))
}

fn latex_arg(interp: &Interpreter<'_>, value: &Value) -> Result<String, EvalError> {
    let settings = interp.ns.format_settings();
    match value {
        Value::Expr(e) => Ok(e.render(settings, None)?),
        Value::Node(_) => Err(EvalError::raised("math() expects an expression or text")),
        other => other.to_text(settings),
    }
}

fn inlines_arg(interp: &Interpreter<'_>, values: &[Value]) -> Result<Vec<Inline>, EvalError> {
    let mut content = Vec::new();
    for value in values {
        match value {
            Value::Node(n) => content.push(n.clone().into_inline()),
            Value::Expr(e) => content.push(Inline::math(e.render(interp.ns.format_settings(), None)?, false)),
            Value::List(items) => content.extend(inlines_arg(interp, items)?),
            other => content.push(Inline::text(other.to_text(interp.ns.format_settings())?)),
        }
    }
    Ok(content)
}

/// A list literal: one item is a scaled bracket, more is a sequence.
fn list_literal(items: &[Value], name: &str) -> Result<Expr, EvalError> {
    let children = items
        .iter()
        .map(|v| expr_arg(v, name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(match children.len() {
        1 => Expr::grouping(GroupKind::Bracket, children, true),
        _ => Expr::sequence(children),
    })
}

fn command_name(args: &Args, name: &str) -> Result<String, EvalError> {
    match args.positional.first() {
        Some(Value::Str(s)) => Ok(s.trim_start_matches('\\').to_string()),
        Some(other) => Err(EvalError::raised(format!(
            "{name}() name must be str, not {}",
            other.type_name()
        ))),
        None => Err(EvalError::raised(format!("{name}() missing required argument 'name'"))),
    }
}

/// Optional arguments first, then the positional ones after the name.
fn command_args(args: &Args, name: &str) -> Result<Vec<CommandArg>, EvalError> {
    let mut out = Vec::new();
    if let Some(optional) = args.get(usize::MAX, "optional") {
        for value in spread(std::slice::from_ref(optional)) {
            out.push(CommandArg::optional(expr_arg(value, name)?));
        }
    }
    for value in args.positional.iter().skip(1) {
        out.push(CommandArg::required(expr_arg(value, name)?));
    }
    Ok(out)
}

fn block_arg(interp: &Interpreter<'_>, value: &Value) -> Result<Block, EvalError> {
    match value {
        Value::Node(n) => Ok(n.clone().into_block()),
        other => Ok(Block::Para(inlines_arg(interp, std::slice::from_ref(other))?)),
    }
}

fn items_arg<'v>(value: &'v Value, name: &str) -> Result<&'v [Value], EvalError> {
    match value {
        Value::List(items) => Ok(items.as_slice()),
        other => Err(EvalError::raised(format!(
            "{name}() expects a list of items, got {}",
            other.type_name()
        ))),
    }
}

fn default_ordered(items: Vec<Vec<Block>>) -> Block {
    Block::OrderedList {
        start: 1,
        style: ListStyle::DefaultStyle,
        delimiter: ListDelimiter::DefaultDelim,
        items,
    }
}

/// List items; a list right after an item nests under it, built by `nest`.
fn list_items(
    interp: &Interpreter<'_>,
    values: &[Value],
    nest: &dyn Fn(Vec<Vec<Block>>) -> Block,
) -> Result<Vec<Vec<Block>>, EvalError> {
    let mut items = Vec::new();
    let mut values = values.iter().peekable();
    while let Some(value) = values.next() {
        let mut item = match value {
            Value::List(sub) => vec![Block::Plain(Vec::new()), nest(list_items(interp, sub, nest)?)],
            Value::Node(Node::Block(block)) => vec![block.clone()],
            Value::Node(Node::Inline(inline)) => vec![Block::Plain(vec![inline.clone()])],
            other => vec![Block::Plain(inlines_arg(interp, std::slice::from_ref(other))?)],
        };
        match values.peek() {
            Some(Value::List(sub)) => {
                item.push(nest(list_items(interp, sub, nest)?));
                values.next();
            }
            Some(Value::Node(Node::Block(
                block @ (Block::BulletList(_) | Block::OrderedList { .. }),
            ))) => {
                item.push(block.clone());
                values.next();
            }
            _ => {}
        }
        items.push(item);
    }
    Ok(items)
}

fn list_style(style: Option<&str>) -> Result<ListStyle, EvalError> {
    Ok(match style {
        None | Some("default") => ListStyle::DefaultStyle,
        Some("decimal" | "arabic") => ListStyle::Decimal,
        Some("lower_alpha") => ListStyle::LowerAlpha,
        Some("upper_alpha") => ListStyle::UpperAlpha,
        Some("lower_roman") => ListStyle::LowerRoman,
        Some("upper_roman") => ListStyle::UpperRoman,
        Some("example") => ListStyle::Example,
        Some(other) => return Err(EvalError::raised(format!("unknown list style '{other}'"))),
    })
}

fn list_delimiter(delimiter: Option<&str>) -> Result<ListDelimiter, EvalError> {
    Ok(match delimiter {
        None | Some("default") => ListDelimiter::DefaultDelim,
        Some("period") => ListDelimiter::Period,
        Some("one_paren") => ListDelimiter::OneParen,
        Some("two_parens") => ListDelimiter::TwoParens,
        Some(other) => {
            return Err(EvalError::raised(format!("unknown list delimiter '{other}'")));
        }
    })
}
