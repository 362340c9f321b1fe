use std::collections::HashMap;

use splice::expr::Expr;
use splice::format::FormatSettings;

use crate::evaluator::DocumentContext;
use crate::script::value::Value;

const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "pi", "varpi", "rho", "varrho",
    "sigma", "varsigma", "tau", "upsilon", "phi", "varphi", "chi", "psi", "omega", "Gamma",
    "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi", "Psi", "Omega", "nabla",
];

/// Variables of one document, plus output captured from `print`.
#[derive(Debug, Clone)]
pub struct Namespace {
    vars: HashMap<String, Value>,
    output: String,
    pub(crate) format: FormatSettings,
    pub(crate) target_format: String,
}

impl Namespace {
    pub fn new(ctx: &DocumentContext) -> Self {
        let mut vars = HashMap::new();
        for name in GREEK {
            vars.insert(name.to_string(), Value::Expr(Expr::symbol(format!("\\{name}"))));
        }
        vars.insert("lambda_".to_string(), Value::Expr(Expr::symbol("\\lambda")));
        vars.insert("i".to_string(), Value::Expr(Expr::symbol("i")));
        vars.insert(
            "target_format".to_string(),
            Value::Str(ctx.target_format.clone()),
        );
        Namespace {
            vars,
            output: String::new(),
            format: ctx.format.clone(),
            target_format: ctx.target_format.clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn format_settings(&self) -> &FormatSettings {
        &self.format
    }

    pub(crate) fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Take everything printed since the last call, minus one trailing newline.
    pub(crate) fn take_output(&mut self) -> String {
        let mut output = std::mem::take(&mut self.output);
        if output.ends_with('\n') {
            output.pop();
        }
        output
    }
}
