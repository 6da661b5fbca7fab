//! C-like pseudo code rendering.
//!
//! ```text
//! parallel for (C_i0, 0, 24) {
//!   for (C_i1, 0, 5) {
//!     ScheduleBlock(C) {
//!       i0, i1 = axis.bind(C_i0, C_i1)
//!       C[i0, i1] = (A[i0, i1] + B[i0, i1])
//!     }
//!   }
//! }
//! ```

use std::fmt::{self, Display, Formatter, Write};

use crate::expr::Expr;
use crate::module::ModuleExpr;
use crate::stmt::{ScheduleBlock, Stmt};
use crate::types::{ForKind, MemoryScope};

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(c) => write!(f, "{c}"),
            Self::Var(v) => write!(f, "{v}"),
            Self::Unary(op, a) => write!(f, "{}({a})", <&'static str>::from(*op)),
            Self::Binary(op, a, b) => match op.symbol() {
                Some(sym) => write!(f, "({a} {sym} {b})"),
                None => write!(f, "{}({a}, {b})", format!("{op:?}").to_lowercase()),
            },
            Self::Select { cond, on_true, on_false } => write!(f, "select({cond}, {on_true}, {on_false})"),
            Self::Load { tensor, indices } => {
                write!(f, "{}[", tensor.name())?;
                write_list(f, indices)?;
                write!(f, "]")
            }
        }
    }
}

fn write_list(f: &mut impl Write, items: &[impl Display]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

impl Display for ModuleExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for expr in self.exprs() {
            write_stmt(f, expr, 0)?;
        }
        Ok(())
    }
}

fn write_stmt(f: &mut Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    match stmt {
        Stmt::For(l) => {
            let prefix = match l.kind {
                ForKind::Serial => String::new(),
                kind => format!("{kind} "),
            };
            writeln!(f, "{pad}{prefix}for ({}, {}, {}) {{", l.var, l.min, l.extent)?;
            write_stmt(f, &l.body, depth + 1)?;
            writeln!(f, "{pad}}}")
        }
        Stmt::Block(stmts) => stmts.iter().try_for_each(|s| write_stmt(f, s, depth)),
        Stmt::IfThenElse { cond, then_case, else_case } => {
            writeln!(f, "{pad}if {cond} {{")?;
            write_stmt(f, then_case, depth + 1)?;
            if let Some(e) = else_case {
                writeln!(f, "{pad}}} else {{")?;
                write_stmt(f, e, depth + 1)?;
            }
            writeln!(f, "{pad}}}")
        }
        Stmt::ScheduleBlock(b) => write_block(f, b, depth),
        Stmt::Store { tensor, indices, value } => {
            write!(f, "{pad}{}[", tensor.name())?;
            write_list(f, indices)?;
            writeln!(f, "] = {value}")
        }
    }
}

fn write_block(f: &mut Formatter<'_>, b: &ScheduleBlock, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    match b.scope {
        MemoryScope::Global => writeln!(f, "{pad}ScheduleBlock({}) {{", b.name)?,
        scope => writeln!(f, "{pad}ScheduleBlock({}, scope={scope}) {{", b.name)?,
    }
    if !b.iter_vars.is_empty() {
        let vars: Vec<String> = b
            .iter_vars
            .iter()
            .map(|iv| if iv.is_reduce() { format!("{}:r", iv.var) } else { iv.var.to_string() })
            .collect();
        write!(f, "{pad}  {} = axis.bind(", vars.join(", "))?;
        write_list(f, &b.iter_values)?;
        writeln!(f, ")")?;
    }
    if let Some(init) = &b.init {
        writeln!(f, "{pad}  init {{")?;
        write_stmt(f, init, depth + 2)?;
        writeln!(f, "{pad}  }}")?;
    }
    write_stmt(f, &b.body, depth + 1)?;
    writeln!(f, "{pad}}}")
}
