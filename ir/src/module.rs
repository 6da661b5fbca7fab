//! Module: the ordered list of loop-nest roots a schedule operates on.
//!
//! Lookup never hands out live references into the tree. Blocks are found by
//! name and loops by [`LoopId`]; every call walks the current tree, so a
//! handle obtained before a rewrite resolves to the rewritten node after it.
//! [`ModuleExpr::replace`] is the one identity-based operation and fails on a
//! stale handle.

use std::collections::HashSet;
use std::sync::Arc;

use snafu::ensure;

use crate::error::*;
use crate::expr::Var;
use crate::stmt::Stmt;
use crate::tensor::Tensor;
use crate::types::LoopId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleExpr {
    exprs: Vec<Arc<Stmt>>,
}

/// Root-to-node path to a statement.
///
/// `nodes[0]` is the module root at index `root`; the last node is the target.
#[derive(Debug, Clone)]
pub struct NodePath {
    pub root: usize,
    pub nodes: Vec<Arc<Stmt>>,
}

impl NodePath {
    pub fn target(&self) -> &Arc<Stmt> {
        // Paths are never empty: construction always pushes the root.
        &self.nodes[self.nodes.len() - 1]
    }

    /// Enclosing loops of the target, outer to inner (target excluded).
    pub fn loops(&self) -> Vec<Arc<Stmt>> {
        self.nodes[..self.nodes.len() - 1].iter().filter(|n| n.as_for().is_some()).cloned().collect()
    }

    pub fn contains_loop(&self, id: LoopId) -> bool {
        self.nodes.iter().any(|n| n.as_for().is_some_and(|f| f.id == id))
    }

    /// Index of the outermost node holding no schedule block besides the
    /// target's: where the target's own nest starts.
    pub fn own_depth(&self) -> usize {
        self.nodes.iter().position(|n| n.schedule_blocks().len() <= 1).unwrap_or(self.nodes.len() - 1)
    }
}

impl ModuleExpr {
    pub fn new(exprs: impl IntoIterator<Item = Arc<Stmt>>) -> Self {
        Self { exprs: exprs.into_iter().collect() }
    }

    pub fn exprs(&self) -> &[Arc<Stmt>] {
        &self.exprs
    }

    pub fn set_exprs(&mut self, exprs: Vec<Arc<Stmt>>) {
        self.exprs = exprs;
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// All schedule blocks, depth-first in program order.
    pub fn get_all_blocks(&self) -> Vec<Arc<Stmt>> {
        let mut blocks = Vec::new();
        for root in &self.exprs {
            collect_blocks(root, &mut blocks);
        }
        blocks
    }

    /// The unique schedule block called `name`.
    pub fn get_block(&self, name: &str) -> Result<Arc<Stmt>> {
        let matches: Vec<_> = self
            .get_all_blocks()
            .into_iter()
            .filter(|b| b.as_schedule_block().is_some_and(|b| &*b.name == name))
            .collect();
        ensure!(matches.len() <= 1, AmbiguousBlockSnafu { name, count: matches.len() });
        matches.into_iter().next().ok_or_else(|| BlockNotFoundSnafu { name }.build())
    }

    /// Enclosing loops of block `name`, outer to inner.
    pub fn get_loops(&self, name: &str) -> Result<Vec<Arc<Stmt>>> {
        Ok(self.block_path(name)?.loops())
    }

    pub fn get_loop(&self, id: LoopId) -> Result<Arc<Stmt>> {
        Ok(self.loop_path(id)?.target().clone())
    }

    pub fn block_path(&self, name: &str) -> Result<NodePath> {
        // Resolve through get_block first so ambiguity is reported.
        self.get_block(name)?;
        self.find_path(|s| s.as_schedule_block().is_some_and(|b| &*b.name == name))
            .ok_or_else(|| BlockNotFoundSnafu { name }.build())
    }

    pub fn loop_path(&self, id: LoopId) -> Result<NodePath> {
        self.find_path(|s| s.as_for().is_some_and(|f| f.id == id)).ok_or_else(|| LoopNotFoundSnafu { id }.build())
    }

    /// Resolve a caller handle to its current path.
    ///
    /// Loops resolve by id and blocks by name; other nodes by identity.
    pub fn locate(&self, node: &Arc<Stmt>) -> Result<NodePath> {
        match node.as_ref() {
            Stmt::For(f) => self.loop_path(f.id),
            Stmt::ScheduleBlock(b) => self.block_path(&b.name),
            _ => self.find_path(|s| std::ptr::eq(s, node.as_ref())).ok_or_else(|| ReplaceTargetNotFoundSnafu.build()),
        }
    }

    /// The module root containing `node`.
    pub fn root_of(&self, node: &Arc<Stmt>) -> Result<Arc<Stmt>> {
        let path = self.locate(node)?;
        Ok(self.exprs[path.root].clone())
    }

    fn find_path(&self, pred: impl Fn(&Stmt) -> bool) -> Option<NodePath> {
        self.exprs.iter().enumerate().find_map(|(root, expr)| {
            let mut nodes = Vec::new();
            find_in(expr, &pred, &mut nodes).then_some(NodePath { root, nodes })
        })
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Swap the subtree `old` (by identity) for `new`.
    pub fn replace(&mut self, old: &Arc<Stmt>, new: Arc<Stmt>) -> Result<()> {
        let mut found = false;
        for root in &mut self.exprs {
            let updated = root.transform(&mut |node| {
                if Arc::ptr_eq(node, old) {
                    found = true;
                    Some(new.clone())
                } else {
                    None
                }
            });
            *root = updated;
        }
        ensure!(found, ReplaceTargetNotFoundSnafu);
        Ok(())
    }

    /// Remove `node` and prune ancestors left empty.
    pub fn remove(&mut self, node: &Arc<Stmt>) -> Result<()> {
        self.replace(node, Stmt::block([]))?;
        self.exprs = self.exprs.iter().filter_map(|root| root.prune()).collect();
        Ok(())
    }

    /// Insert `stmt` next to the own nest of the block at the end of `anchor`.
    ///
    /// The own nest is the outermost statement on the path holding no other
    /// schedule block. `stmt` joins the sequence that statement sits in; a
    /// branch is turned into a sequence first.
    pub fn insert_beside(&mut self, anchor: &NodePath, stmt: Arc<Stmt>, after: bool) -> Result<()> {
        ensure!(anchor.root < self.exprs.len(), ReplaceTargetNotFoundSnafu);
        let own = anchor.own_depth();
        let node = &anchor.nodes[own];

        let Some(parent) = own.checked_sub(1).map(|p| &anchor.nodes[p]) else {
            self.exprs.insert(if after { anchor.root + 1 } else { anchor.root }, stmt);
            return Ok(());
        };
        match parent.as_ref() {
            Stmt::Block(children) => {
                let pos = children
                    .iter()
                    .position(|c| Arc::ptr_eq(c, node))
                    .ok_or_else(|| ReplaceTargetNotFoundSnafu.build())?;
                let mut children = children.clone();
                children.insert(if after { pos + 1 } else { pos }, stmt);
                self.replace(parent, Stmt::block(children))
            }
            _ => {
                let pair = if after { [node.clone(), stmt] } else { [stmt, node.clone()] };
                self.replace(node, Stmt::block(pair))
            }
        }
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Every tensor written or read, in first-appearance order.
    pub fn tensors(&self) -> Vec<Tensor> {
        let mut tensors: Vec<Tensor> = Vec::new();
        let mut add = |t: &Tensor| {
            if !tensors.iter().any(|x| x.name() == t.name()) {
                tensors.push(t.clone());
            }
        };
        for block in self.get_all_blocks() {
            if let Some(b) = block.as_schedule_block() {
                add(&b.write);
                for t in b.reads() {
                    add(&t);
                }
            }
        }
        tensors
    }

    /// Fresh-name generator aware of every name in use.
    pub fn name_gen(&self) -> NameGen {
        let mut names = NameGen::default();
        for root in &self.exprs {
            root.walk(&mut |s| match s {
                Stmt::For(f) => {
                    names.vars.insert(f.var.name().to_string());
                }
                Stmt::ScheduleBlock(b) => {
                    names.blocks.insert(b.name.to_string());
                }
                _ => {}
            });
        }
        names.tensors.extend(self.tensors().iter().map(|t| t.name().to_string()));
        names
    }
}

fn collect_blocks(stmt: &Arc<Stmt>, out: &mut Vec<Arc<Stmt>>) {
    if matches!(stmt.as_ref(), Stmt::ScheduleBlock(_)) {
        out.push(stmt.clone());
    }
    for child in stmt.children() {
        collect_blocks(child, out);
    }
}

fn find_in(stmt: &Arc<Stmt>, pred: &impl Fn(&Stmt) -> bool, nodes: &mut Vec<Arc<Stmt>>) -> bool {
    nodes.push(stmt.clone());
    if pred(stmt) {
        return true;
    }
    for child in stmt.children() {
        if find_in(child, pred, nodes) {
            return true;
        }
    }
    nodes.pop();
    false
}

/// Generates names not yet used for loop variables, blocks or tensors.
#[derive(Debug, Clone, Default)]
pub struct NameGen {
    vars: HashSet<String>,
    blocks: HashSet<String>,
    tensors: HashSet<String>,
}

impl NameGen {
    pub fn var(&mut self, base: &str) -> Var {
        Var::new(fresh(&mut self.vars, base, |_| true))
    }

    /// A name free both as a block and as a tensor name.
    pub fn block_and_tensor(&mut self, base: &str) -> String {
        let tensors = self.tensors.clone();
        let name = fresh(&mut self.blocks, base, |n| !tensors.contains(n));
        self.tensors.insert(name.clone());
        name
    }

    pub fn block(&mut self, base: &str) -> String {
        fresh(&mut self.blocks, base, |_| true)
    }
}

fn fresh(used: &mut HashSet<String>, base: &str, also_free: impl Fn(&str) -> bool) -> String {
    let mut candidate = base.to_string();
    let mut n = 0;
    while used.contains(&candidate) || !also_free(&candidate) {
        n += 1;
        candidate = format!("{base}_{n}");
    }
    used.insert(candidate.clone());
    candidate
}
