//! Build-and-diff workflow: build both revisions, run the code generator
//! over the pattern corpus on each, and report the codegen differences.

use std::path::Path;

use anyhow::{Context, Result};
use rjr_common::diff::collect::DiffCollector;
use rjr_common::diff::render::ReportRenderer;
use rjr_common::diff::store;
use rjr_common::rebuild::RebuildPlan;

use super::git::{self, BASE_REF, CANDIDATE_REF};
use crate::executor::JobContext;

/// Corpus of real-world patterns, checked into the repo under test.
const CORPUS_PATH: &str = "patterns/corpus.json";

pub async fn run(ctx: &JobContext) -> Result<()> {
    let repo = ctx.metadata.require("repo")?;
    let branch = ctx.metadata.require("branch")?;
    let base_branch = ctx.metadata.require("basebranch")?;
    let custom_args = ctx.metadata.require("customarguments")?;

    let checkout = ctx.work_dir.join("repo");
    git::clone(ctx, repo, &checkout).await?;
    git::fetch_into(ctx, &checkout, base_branch, BASE_REF).await?;
    git::fetch_into(ctx, &checkout, branch, CANDIDATE_REF).await?;

    let changed = git::changed_files(ctx, &checkout, BASE_REF, CANDIDATE_REF).await?;
    let plan = RebuildPlan::from_changed_paths(changed.iter().map(String::as_str));
    ctx.channel.push(format!(
        "[build] {} changed files; candidate rebuild plan: runtime={} libraries={}",
        changed.len(),
        plan.runtime,
        plan.libraries
    ));

    // The baseline always builds everything; only the candidate side gets
    // to skip components.
    git::checkout(ctx, &checkout, BASE_REF).await?;
    build(ctx, &checkout, RebuildPlan::everything(), custom_args).await?;
    generate(ctx, &checkout, "baseline").await?;

    git::checkout(ctx, &checkout, CANDIDATE_REF).await?;
    git::merge_dependencies(ctx, &checkout).await?;
    build(ctx, &checkout, plan, custom_args).await?;
    generate(ctx, &checkout, "candidate").await?;

    let baseline =
        store::load_generated(&store::branch_results_path(&ctx.work_dir, "baseline"))
            .context("load baseline results")?;
    let candidate =
        store::load_generated(&store::branch_results_path(&ctx.work_dir, "candidate"))
            .context("load candidate results")?;

    let mut entries = DiffCollector::correlate(baseline, candidate);
    DiffCollector::extract_literals(&mut entries).await;

    let changed_count = entries.iter().filter(|e| e.changed()).count();
    ctx.channel.push(format!(
        "[diff] {} correlated entries, {} changed",
        entries.len(),
        changed_count
    ));

    let (short, long) = ReportRenderer::render_tiers(&entries);
    if short.is_empty() {
        ctx.uploader
            .upload_text("report.md", "No codegen differences found.\n".to_string());
    } else {
        ctx.uploader.upload_text("report.md", short);
    }
    if let Some(long) = long {
        ctx.uploader.upload_text("report-full.md", long);
    }

    // Full-context diffs travel as a raw artifact rather than inside the
    // size-budgeted report.
    let mut patch = String::new();
    for entry in entries.iter().filter(|e| e.changed()) {
        if let Some(diff) = &entry.full_diff {
            patch.push_str(&format!("==== {} ====\n{diff}\n", entry.pattern.pattern));
        }
    }
    if !patch.is_empty() {
        ctx.uploader.upload_text("codegen.patch", patch);
    }
    Ok(())
}

async fn build(
    ctx: &JobContext,
    checkout: &Path,
    plan: RebuildPlan,
    custom_args: &str,
) -> Result<()> {
    if plan.rebuild_nothing() {
        ctx.channel
            .push("[build] no components affected, skipping rebuild");
        return Ok(());
    }
    let mut subsets = Vec::new();
    if plan.runtime {
        subsets.push("runtime");
    }
    if plan.libraries {
        subsets.push("libs");
    }
    let subset = subsets.join("+");
    let mut args: Vec<&str> = vec!["-subset", &subset, "-configuration", "Release"];
    args.extend(custom_args.split_whitespace());
    ctx.runner
        .run_checked("./build.sh", &args, Some(checkout), None)
        .await
        .context("build")?;
    Ok(())
}

/// Run the generator over the corpus; it leaves its results at the path
/// we hand it, in the persisted record shape.
async fn generate(ctx: &JobContext, checkout: &Path, branch_label: &str) -> Result<()> {
    let out_path = store::branch_results_path(&ctx.work_dir, branch_label);
    let out_str = out_path.to_string_lossy().to_string();
    ctx.runner
        .run_checked(
            "./generate.sh",
            &["--corpus", CORPUS_PATH, "--output", &out_str],
            Some(checkout),
            None,
        )
        .await
        .with_context(|| format!("generate {branch_label}"))?;
    Ok(())
}
