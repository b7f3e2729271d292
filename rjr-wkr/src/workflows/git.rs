//! Git plumbing shared by the workflows.
//!
//! Baseline and candidate revisions are pinned under `refs/rjr/` right
//! after the clone so later steps never depend on remote-tracking state.

use std::path::Path;

use anyhow::{Context, Result};

use crate::executor::JobContext;
use rjr_common::process::capture_buffer;

/// Local ref the base branch is pinned to.
pub const BASE_REF: &str = "refs/rjr/base";
/// Local ref the candidate branch is pinned to.
pub const CANDIDATE_REF: &str = "refs/rjr/candidate";

pub async fn clone(ctx: &JobContext, repo: &str, dest: &Path) -> Result<()> {
    let dest_str = dest.to_string_lossy().to_string();
    ctx.runner
        .run_checked("git", &["clone", "--quiet", repo, &dest_str], None, None)
        .await
        .with_context(|| format!("clone {repo}"))?;
    // Merge and cherry-pick commits need an identity.
    ctx.runner
        .run_checked(
            "git",
            &["config", "user.email", "runner@rjr.local"],
            Some(dest),
            None,
        )
        .await?;
    ctx.runner
        .run_checked("git", &["config", "user.name", "rjr runner"], Some(dest), None)
        .await?;
    Ok(())
}

/// Fetch `branch` from origin and pin it under a local ref.
pub async fn fetch_into(
    ctx: &JobContext,
    checkout: &Path,
    branch: &str,
    local_ref: &str,
) -> Result<()> {
    let refspec = format!("+refs/heads/{branch}:{local_ref}");
    ctx.runner
        .run_checked(
            "git",
            &["fetch", "--quiet", "origin", &refspec],
            Some(checkout),
            None,
        )
        .await
        .with_context(|| format!("fetch {branch}"))
}

pub async fn checkout(ctx: &JobContext, checkout: &Path, rev: &str) -> Result<()> {
    ctx.runner
        .run_checked(
            "git",
            &["checkout", "--quiet", "--force", rev],
            Some(checkout),
            None,
        )
        .await
        .with_context(|| format!("checkout {rev}"))
}

/// Paths changed between two pinned revisions.
pub async fn changed_files(
    ctx: &JobContext,
    checkout: &Path,
    base: &str,
    head: &str,
) -> Result<Vec<String>> {
    let capture = capture_buffer();
    ctx.runner
        .run_checked(
            "git",
            &["diff", "--name-only", base, head],
            Some(checkout),
            Some(capture.clone()),
        )
        .await
        .context("diff --name-only")?;
    let lines = capture.lock().clone();
    Ok(lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Merge the optional `repo;branch` dependency list into the current
/// checkout, in metadata order.
pub async fn merge_dependencies(ctx: &JobContext, checkout: &Path) -> Result<()> {
    for dep in ctx.metadata.dependency_list("mergebranches")? {
        ctx.channel
            .push(format!("[git] merging {};{}", dep.repo, dep.branch));
        ctx.runner
            .run_checked(
                "git",
                &["pull", "--quiet", "--no-rebase", &dep.repo, &dep.branch],
                Some(checkout),
                None,
            )
            .await
            .with_context(|| format!("merge {};{}", dep.repo, dep.branch))?;
    }
    Ok(())
}
