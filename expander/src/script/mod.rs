//! A small Python-flavoured script evaluator.
//!
//! Covers expressions, assignments, calls, and the builtins needed to build
//! expression trees and document nodes from prose directives. There is no
//! control flow.

mod ast;
mod builtins;
mod interpreter;
mod lexer;
mod namespace;
mod parser;
mod value;

use splice::units::{SiRegistry, UnitSystem};

use crate::error::EvalError;
use crate::evaluator::{DocumentContext, HostValue, ScriptEvaluator};

pub use namespace::Namespace;
pub use value::Value;

use builtins::Args;
use interpreter::Interpreter;

/// The bundled evaluator, with SI units.
#[derive(Debug, Default)]
pub struct ScriptEngine<U = SiRegistry> {
    units: U,
}

impl ScriptEngine {
    pub fn new() -> Self {
        ScriptEngine {
            units: SiRegistry::new(),
        }
    }
}

impl<U: UnitSystem> ScriptEngine<U> {
    pub fn with_units(units: U) -> Self {
        ScriptEngine { units }
    }
}

impl<U: UnitSystem> ScriptEvaluator for ScriptEngine<U> {
    type Namespace = Namespace;

    fn new_namespace(&self, ctx: &DocumentContext) -> Namespace {
        Namespace::new(ctx)
    }

    fn eval(&mut self, source: &str, ns: &mut Namespace) -> Result<HostValue, EvalError> {
        let stmts = parser::parse_program(source)?;
        let value = Interpreter::new(&self.units, ns).run(&stmts)?;
        let stray = ns.take_output();
        if !stray.is_empty() {
            tracing::debug!(output = %stray, "discarding output printed by an expression");
        }
        Ok(value.into_host())
    }

    fn exec(&mut self, source: &str, ns: &mut Namespace) -> Result<String, EvalError> {
        let stmts = parser::parse_program(source)?;
        let result = Interpreter::new(&self.units, ns).run(&stmts);
        let output = ns.take_output();
        result.map(|_| output)
    }

    fn call(
        &mut self,
        name: &str,
        args: Vec<HostValue>,
        ns: &mut Namespace,
    ) -> Result<HostValue, EvalError> {
        let mut interp = Interpreter::new(&self.units, ns);
        let callee = match interp.ns.get(name) {
            Some(value) => value.clone(),
            None => match builtins::lookup(name) {
                Some(builtin) => Value::Builtin(builtin),
                None => return Err(EvalError::raised(format!("name '{name}' is not defined"))),
            },
        };
        let args = Args::positional(args.into_iter().map(Value::from_host).collect());
        let value = interp.call(callee, args)?;
        Ok(value.into_host())
    }
}
