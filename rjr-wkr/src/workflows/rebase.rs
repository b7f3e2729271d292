//! Rebase workflow: replay the source branch onto the base branch and
//! push the result back.

use anyhow::{Context, Result};

use super::git::{self, BASE_REF, CANDIDATE_REF};
use crate::executor::JobContext;

pub async fn run(ctx: &JobContext) -> Result<()> {
    let repo = ctx.metadata.require("repo")?;
    let branch = ctx.metadata.require("branch")?;
    let base_branch = ctx.metadata.require("basebranch")?;

    let checkout = ctx.work_dir.join("repo");
    git::clone(ctx, repo, &checkout).await?;
    git::fetch_into(ctx, &checkout, base_branch, BASE_REF).await?;
    git::fetch_into(ctx, &checkout, branch, CANDIDATE_REF).await?;

    ctx.runner
        .run_checked(
            "git",
            &["checkout", "--quiet", "-B", branch, CANDIDATE_REF],
            Some(&checkout),
            None,
        )
        .await?;

    let rebase = ctx
        .runner
        .run("git", &["rebase", BASE_REF], Some(&checkout), None)
        .await?;
    if rebase != 0 {
        // Leave the tree clean before failing the job.
        let _ = ctx
            .runner
            .run("git", &["rebase", "--abort"], Some(&checkout), None)
            .await;
        anyhow::bail!("rebase of {branch} onto {base_branch} hit conflicts");
    }

    ctx.runner
        .run_checked(
            "git",
            &["push", "--force-with-lease", "origin", branch],
            Some(&checkout),
            None,
        )
        .await
        .context("push rebased branch")?;

    ctx.channel
        .push(format!("[rebase] {branch} now based on {base_branch}"));
    Ok(())
}
