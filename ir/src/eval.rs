//! Reference interpreter.
//!
//! Executes a module over named `f64` buffers. Every loop runs serially in
//! program order, which is one valid execution of any race-free schedule, so
//! comparing buffers before and after a rewrite checks that the rewrite kept
//! the program's meaning. Tensors without an input start zero-filled.

use std::collections::HashMap;

use snafu::ensure;
use tracing::trace;

use crate::error::*;
use crate::expr::{Expr, Var};
use crate::module::ModuleExpr;
use crate::simplify::fold_binary;
use crate::stmt::Stmt;
use crate::types::{BinaryOp, ConstValue, UnaryOp};

/// Evaluate a unary operation on a constant value.
///
/// Float operations follow IEEE 754; `Not` is logical negation.
pub fn eval_unary_op(op: UnaryOp, v: ConstValue) -> ConstValue {
    match (op, v) {
        (UnaryOp::Neg, ConstValue::Int(i)) => ConstValue::Int(i.wrapping_neg()),
        (UnaryOp::Abs, ConstValue::Int(i)) => ConstValue::Int(i.wrapping_abs()),
        (UnaryOp::Not, v) => ConstValue::Bool(!v.is_truthy()),
        (UnaryOp::Neg, v) => ConstValue::Float(-v.as_f64()),
        (UnaryOp::Abs, v) => ConstValue::Float(v.as_f64().abs()),
        (UnaryOp::Exp, v) => ConstValue::Float(v.as_f64().exp()),
        (UnaryOp::Log, v) => ConstValue::Float(v.as_f64().ln()),
        (UnaryOp::Sqrt, v) => ConstValue::Float(v.as_f64().sqrt()),
    }
}

/// Row-major storage for one tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    pub shape: Vec<i64>,
    pub data: Vec<f64>,
}

impl Buffer {
    pub fn zeros(shape: &[i64]) -> Self {
        let numel = shape.iter().product::<i64>().max(0) as usize;
        Self { shape: shape.to_vec(), data: vec![0.0; numel] }
    }

    fn offset(&self, tensor: &str, indices: &[i64]) -> Result<usize> {
        let in_bounds = indices.len() == self.shape.len() && indices.iter().zip(&self.shape).all(|(i, s)| (0..*s).contains(i));
        ensure!(
            in_bounds,
            OutOfBoundsSnafu { tensor, indices: indices.to_vec(), shape: self.shape.clone() }
        );
        Ok(indices.iter().zip(&self.shape).fold(0i64, |acc, (i, s)| acc * s + i) as usize)
    }
}

/// Run `module` with the given inputs and return every buffer it touched.
pub fn run(module: &ModuleExpr, inputs: &HashMap<String, Vec<f64>>) -> Result<HashMap<String, Buffer>> {
    let mut buffers = HashMap::new();
    for tensor in module.tensors() {
        let mut buffer = Buffer::zeros(tensor.shape());
        if let Some(data) = inputs.get(tensor.name()) {
            ensure!(
                data.len() == buffer.data.len(),
                InputSizeMismatchSnafu { name: tensor.name(), expected: buffer.data.len(), actual: data.len() }
            );
            buffer.data.clone_from(data);
        }
        buffers.insert(tensor.name().to_string(), buffer);
    }

    let mut interp = Interpreter { buffers };
    for root in module.exprs() {
        interp.exec(root, &mut HashMap::new())?;
    }
    trace!(buffers = interp.buffers.len(), "module evaluated");
    Ok(interp.buffers)
}

struct Interpreter {
    buffers: HashMap<String, Buffer>,
}

impl Interpreter {
    fn exec(&mut self, stmt: &Stmt, env: &mut HashMap<Var, i64>) -> Result<()> {
        match stmt {
            Stmt::For(l) => {
                let min = self.eval_int(&l.min, env, "loop min")?;
                let extent = self.eval_int(&l.extent, env, "loop extent")?;
                for i in 0..extent.max(0) {
                    env.insert(l.var.clone(), min + i);
                    self.exec(&l.body, env)?;
                }
                env.remove(&l.var);
            }
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.exec(s, env)?;
                }
            }
            Stmt::IfThenElse { cond, then_case, else_case } => {
                if self.eval(cond, env)?.is_truthy() {
                    self.exec(then_case, env)?;
                } else if let Some(e) = else_case {
                    self.exec(e, env)?;
                }
            }
            Stmt::ScheduleBlock(b) => {
                let mut block_env = HashMap::with_capacity(b.iter_vars.len());
                let mut first_reduce_step = true;
                for (iv, value) in b.iter_vars.iter().zip(&b.iter_values) {
                    let v = self.eval_int(value, env, "block binding")?;
                    first_reduce_step &= !iv.is_reduce() || v == 0;
                    block_env.insert(iv.var.clone(), v);
                }
                if let Some(init) = &b.init
                    && first_reduce_step
                {
                    self.exec(init, &mut block_env)?;
                }
                self.exec(&b.body, &mut block_env)?;
            }
            Stmt::Store { tensor, indices, value } => {
                let idx = indices.iter().map(|i| self.eval_int(i, env, "store index")).collect::<Result<Vec<_>>>()?;
                let value = self.eval(value, env)?.as_f64();
                let buffer = self.buffer_mut(tensor.name())?;
                let offset = buffer.offset(tensor.name(), &idx)?;
                buffer.data[offset] = value;
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr, env: &HashMap<Var, i64>) -> Result<ConstValue> {
        Ok(match expr {
            Expr::Const(c) => *c,
            Expr::Var(v) => ConstValue::Int(*env.get(v).ok_or_else(|| UnboundVarSnafu { name: v.name() }.build())?),
            Expr::Unary(op, a) => eval_unary_op(*op, self.eval(a, env)?),
            Expr::Binary(op, a, b) => {
                let (a, b) = (self.eval(a, env)?, self.eval(b, env)?);
                let zero_divisor = matches!(op, BinaryOp::Div | BinaryOp::Mod)
                    && matches!(b, ConstValue::Int(0) | ConstValue::Bool(false))
                    && !matches!(a, ConstValue::Float(_));
                ensure!(!zero_divisor, DivisionByZeroSnafu);
                fold_binary(*op, a, b).ok_or_else(|| DivisionByZeroSnafu.build())?
            }
            Expr::Select { cond, on_true, on_false } => {
                if self.eval(cond, env)?.is_truthy() {
                    self.eval(on_true, env)?
                } else {
                    self.eval(on_false, env)?
                }
            }
            Expr::Load { tensor, indices } => {
                let idx = indices.iter().map(|i| self.eval_int(i, env, "load index")).collect::<Result<Vec<_>>>()?;
                let buffer = self.buffers.get(tensor.name()).ok_or_else(|| UnknownTensorSnafu { name: tensor.name() }.build())?;
                ConstValue::Float(buffer.data[buffer.offset(tensor.name(), &idx)?])
            }
        })
    }

    fn eval_int(&self, expr: &Expr, env: &HashMap<Var, i64>, context: &'static str) -> Result<i64> {
        self.eval(expr, env)?.as_i64().ok_or_else(|| NonIntegerValueSnafu { context }.build())
    }

    fn buffer_mut(&mut self, name: &str) -> Result<&mut Buffer> {
        self.buffers.get_mut(name).ok_or_else(|| UnknownTensorSnafu { name }.build())
    }
}
