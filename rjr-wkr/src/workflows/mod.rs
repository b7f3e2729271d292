//! Workflow implementations, one per job kind.
//!
//! Each workflow is a script of subprocess calls over the engine
//! primitives in `rjr-common`; the interesting machinery (log pipeline,
//! diff collection, rendering) lives there. Unknown kinds never reach
//! this table — the metadata parse rejects them explicitly.

mod backport;
mod benchmark;
mod build_diff;
mod fuzz;
mod git;
mod rebase;

use anyhow::Result;
use rjr_common::types::JobKind;

use crate::executor::JobContext;

/// Dispatch table from job kind to workflow entry point.
pub async fn dispatch(kind: JobKind, ctx: &JobContext) -> Result<()> {
    match kind {
        JobKind::BuildDiff => build_diff::run(ctx).await,
        JobKind::Fuzz => fuzz::run(ctx).await,
        JobKind::Benchmark => benchmark::run(ctx).await,
        JobKind::Rebase => rebase::run(ctx).await,
        JobKind::Backport => backport::run(ctx).await,
    }
}
