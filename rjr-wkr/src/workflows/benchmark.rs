//! Benchmark workflow: run the benchmark suite on both revisions and
//! upload the raw results.

use anyhow::{Context, Result};
use regex::Regex;
use rjr_common::process::capture_buffer;

use super::git::{self, BASE_REF, CANDIDATE_REF};
use crate::executor::JobContext;

pub async fn run(ctx: &JobContext) -> Result<()> {
    let repo = ctx.metadata.require("repo")?;
    let branch = ctx.metadata.require("branch")?;
    let base_branch = ctx.metadata.require("basebranch")?;
    let custom_args = ctx.metadata.require("customarguments")?;

    let checkout = ctx.work_dir.join("repo");
    git::clone(ctx, repo, &checkout).await?;
    git::fetch_into(ctx, &checkout, base_branch, BASE_REF).await?;
    git::fetch_into(ctx, &checkout, branch, CANDIDATE_REF).await?;

    let score_line = Regex::new(r"^Score:\s+([0-9.]+)$").expect("static regex");
    for (label, rev) in [("baseline", BASE_REF), ("candidate", CANDIDATE_REF)] {
        git::checkout(ctx, &checkout, rev).await?;
        if label == "candidate" {
            git::merge_dependencies(ctx, &checkout).await?;
        }
        ctx.runner
            .run_checked(
                "./build.sh",
                &["-configuration", "Release"],
                Some(&checkout),
                None,
            )
            .await
            .with_context(|| format!("build {label}"))?;

        let capture = capture_buffer();
        let mut args: Vec<&str> = vec!["--json"];
        args.extend(custom_args.split_whitespace());
        ctx.runner
            .run_checked("./bench.sh", &args, Some(&checkout), Some(capture.clone()))
            .await
            .with_context(|| format!("bench {label}"))?;

        let lines = capture.lock().clone();
        if let Some(score) = lines
            .iter()
            .filter_map(|line| score_line.captures(line))
            .map(|caps| caps[1].to_string())
            .next_back()
        {
            ctx.channel.push(format!("[bench] {label} score: {score}"));
        }
        ctx.uploader
            .upload_text(&format!("bench-{label}.txt"), lines.join("\n") + "\n");
    }
    Ok(())
}
