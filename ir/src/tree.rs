//! Loop-structure outline rendering via `ptree`.
//!
//! ```text
//! for C_i0 in [0, 24) parallel #L3
//! └── for C_i1 in [0, 5) #L4
//!     └── block C -> C[24, 5]:float32
//! ```

use std::borrow::Cow;
use std::io;
use std::sync::Arc;

use ptree::{Style, TreeItem};

use crate::module::ModuleExpr;
use crate::stmt::Stmt;
use crate::types::ForKind;

#[derive(Clone)]
struct StmtTree {
    stmt: Arc<Stmt>,
}

impl TreeItem for StmtTree {
    type Child = StmtTree;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &Style) -> io::Result<()> {
        match self.stmt.as_ref() {
            Stmt::For(l) => {
                write!(f, "for {} in [{}, {})", l.var, l.min, l.extent)?;
                if l.kind != ForKind::Serial {
                    write!(f, " {}", l.kind)?;
                }
                write!(f, " #{}", l.id)
            }
            Stmt::Block(stmts) => write!(f, "seq({})", stmts.len()),
            Stmt::IfThenElse { cond, .. } => write!(f, "if {cond}"),
            Stmt::ScheduleBlock(b) => write!(f, "block {} -> {}", b.name, b.write),
            Stmt::Store { tensor, .. } => write!(f, "store {}", tensor.name()),
        }
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Owned(self.stmt.children().into_iter().map(|c| StmtTree { stmt: c.clone() }).collect())
    }
}

fn render(stmt: &Arc<Stmt>) -> io::Result<String> {
    let mut buf = Vec::new();
    ptree::write_tree(&StmtTree { stmt: stmt.clone() }, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

impl Stmt {
    /// Render the loop structure as an ASCII tree.
    pub fn tree(self: &Arc<Self>) -> String {
        render(self).unwrap_or_else(|e| format!("<tree rendering failed: {e}>"))
    }
}

impl ModuleExpr {
    pub fn tree(&self) -> String {
        self.exprs().iter().map(|e| e.tree()).collect()
    }
}
