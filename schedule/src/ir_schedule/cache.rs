//! Storage staging: cache_read and cache_write.

use std::sync::Arc;

use snafu::ensure;
use strata_ir::{Expr, ScheduleBlock, Stmt};
use tracing::trace;

use super::{IrSchedule, copy_nest};
use crate::error::*;

impl IrSchedule {
    /// Stage the `read_index`-th tensor `block` reads through a new buffer in
    /// `scope`.
    ///
    /// A copy block `<tensor>_<scope>` is inserted right before the
    /// consumer's own loop nest, inside any loop it shares with other blocks,
    /// and only `block` is redirected to the copy.
    /// Returns the new block.
    pub fn cache_read(&mut self, block: &Arc<Stmt>, read_index: usize, scope: &str) -> Result<Arc<Stmt>> {
        let scope = self.parse_scope("cache_read", scope)?;
        let (path, consumer) = self.resolve_block(block)?;
        let reads = consumer.reads();
        let source = reads.get(read_index).cloned().ok_or_else(|| {
            ReadIndexOutOfRangeSnafu { block: consumer.name.to_string(), index: read_index, count: reads.len() }.build()
        })?;
        ensure!(
            source.name() != consumer.write.name(),
            InvalidArgumentSnafu { op: "cache_read", reason: format!("{} is the block's own output", source.name()) }
        );

        let mut names = self.module.name_gen();
        let cache_name = names.block_and_tensor(&format!("{}_{scope}", source.name()));
        let cache = source.renamed(cache_name.as_str());
        let nest = copy_nest(&mut names, &cache_name, &cache, &source, scope);

        let redirected = consumer
            .map_loads(&mut |t, idx| (t.name() == source.name()).then(|| Expr::load(&cache, idx.iter().cloned())));

        let mut module = self.module.clone();
        module.replace(path.target(), Arc::new(Stmt::ScheduleBlock(redirected)))?;
        let anchor = module.block_path(&consumer.name)?;
        module.insert_beside(&anchor, nest, false)?;
        self.module = module;

        trace!(block = %consumer.name, cache = %cache_name, %scope, module.tree = %self.module.tree(), "cache_read complete");
        Ok(self.module.get_block(&cache_name)?)
    }

    /// Compute the output of `block` into a new buffer in `scope`.
    ///
    /// The block is renamed `<tensor>_<scope>` and writes the staged buffer;
    /// a copy block keeping the original name writes the original tensor
    /// back right after the producer's own loop nest. Returns the renamed
    /// compute block.
    pub fn cache_write(&mut self, block: &Arc<Stmt>, write_index: usize, scope: &str) -> Result<Arc<Stmt>> {
        let scope = self.parse_scope("cache_write", scope)?;
        let (path, producer) = self.resolve_block(block)?;
        ensure!(
            write_index == 0,
            InvalidArgumentSnafu { op: "cache_write", reason: format!("block writes one tensor, index {write_index}") }
        );

        let output = producer.write.clone();
        let mut names = self.module.name_gen();
        let cache_name = names.block_and_tensor(&format!("{}_{scope}", output.name()));
        let cache = output.renamed(cache_name.as_str());

        let staged = ScheduleBlock { name: cache_name.as_str().into(), scope, ..producer.retarget(output.name(), &cache) };
        let write_back = copy_nest(&mut names, &producer.name, &output, &cache, producer.scope);

        let mut module = self.module.clone();
        module.replace(path.target(), Arc::new(Stmt::ScheduleBlock(staged)))?;
        let anchor = module.block_path(&cache_name)?;
        module.insert_beside(&anchor, write_back, true)?;
        self.module = module;

        trace!(block = %producer.name, cache = %cache_name, %scope, module.tree = %self.module.tree(), "cache_write complete");
        Ok(self.module.get_block(&cache_name)?)
    }
}
