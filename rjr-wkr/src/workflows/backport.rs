//! Backport workflow: cherry-pick the source branch's commits onto the
//! base branch and push them as a new branch.

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

    let backport_branch = format!("backport/{branch}");
    ctx.runner
        .run_checked(
            "git",
            &["checkout", "--quiet", "-B", &backport_branch, BASE_REF],
            Some(&checkout),
            None,
        )
        .await?;

    let range = format!("{BASE_REF}..{CANDIDATE_REF}");
    let pick = ctx
        .runner
        .run("git", &["cherry-pick", &range], Some(&checkout), None)
        .await?;
    if pick != 0 {
        let _ = ctx
            .runner
            .run("git", &["cherry-pick", "--abort"], Some(&checkout), None)
            .await;
        anyhow::bail!("backport of {branch} onto {base_branch} hit conflicts");
    }

    let push_ref = format!("HEAD:refs/heads/{backport_branch}");
    ctx.runner
        .run_checked(
            "git",
            &["push", "origin", &push_ref],
            Some(&checkout),
            None,
        )
        .await
        .context("push backport branch")?;

    ctx.channel.push(format!(
        "[backport] {branch} cherry-picked onto {base_branch} as {backport_branch}"
    ));
    Ok(())
}
