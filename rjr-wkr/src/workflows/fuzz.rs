//! Fuzz workflow: build the candidate revision and run the fuzzing tool
//! for the configured duration.

use anyhow::{Result, bail};
use regex::Regex;
use rjr_common::process::capture_buffer;

use super::git::{self, CANDIDATE_REF};
use crate::executor::JobContext;

pub async fn run(ctx: &JobContext) -> Result<()> {
    let repo = ctx.metadata.require("repo")?;
    let branch = ctx.metadata.require("branch")?;
    let seconds = ctx.metadata.get("fuzzseconds").unwrap_or("3600");

    let checkout = ctx.work_dir.join("repo");
    git::clone(ctx, repo, &checkout).await?;
    git::fetch_into(ctx, &checkout, branch, CANDIDATE_REF).await?;
    git::checkout(ctx, &checkout, CANDIDATE_REF).await?;
    git::merge_dependencies(ctx, &checkout).await?;

    ctx.runner
        .run_checked(
            "./build.sh",
            &["-configuration", "Release"],
            Some(&checkout),
            None,
        )
        .await?;

    let capture = capture_buffer();
    let code = ctx
        .runner
        .run(
            "./fuzz.sh",
            &["--seconds", seconds],
            Some(&checkout),
            Some(capture.clone()),
        )
        .await?;

    // The fuzzer reports each reproducer on its own line.
    let crash_line = Regex::new(r"^Found crash: (.+)$").expect("static regex");
    let crashes: Vec<String> = capture
        .lock()
        .iter()
        .filter_map(|line| crash_line.captures(line))
        .map(|caps| caps[1].to_string())
        .collect();

    ctx.channel
        .push(format!("[fuzz] {} crash(es) reported", crashes.len()));

    let findings = checkout.join("artifacts/crashes");
    if findings.is_dir() {
        ctx.uploader
            .upload_directory(&ctx.runner, "crashes", &findings)
            .await?;
    }
    if !crashes.is_empty() {
        ctx.uploader
            .upload_text("crashes.txt", crashes.join("\n") + "\n");
    }

    // A nonzero exit with reported crashes is the fuzzer doing its job; a
    // nonzero exit with none means the tool itself broke.
    if code != 0 && crashes.is_empty() {
        bail!("fuzzer exited with code {code} without reporting crashes");
    }
    Ok(())
}
