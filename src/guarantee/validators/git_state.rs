//! Git-state validator.
//!
//! Shells out to git in the resolved project directory. Every git
//! invocation that fails is surfaced as a guarantee error, not a crash.

use std::path::Path;
use std::process::Command;

use crate::guarantee::context::ValidationContext;
use crate::guarantee::result::{Evidence, GuaranteeResult};
use crate::registry::guarantee::{GitStateCheck, GitStateSpec, Guarantee};

/// Cap on file names listed in error messages.
const ERROR_FILE_CAP: usize = 10;

pub fn validate(guarantee: &Guarantee, spec: &GitStateSpec, ctx: &ValidationContext) -> GuaranteeResult {
    let repo = &ctx.project_path;
    match spec.check {
        GitStateCheck::NoUncommitted => check_no_uncommitted(guarantee, spec, repo),
        GitStateCheck::NoUnpushed => check_no_unpushed(guarantee, spec, repo),
        GitStateCheck::BranchPushed => check_branch_pushed(guarantee, spec, repo),
        GitStateCheck::WorktreeClean => check_worktree_clean(guarantee, repo),
    }
}

/// Run git with the given args, returning stdout on success.
fn run_git(repo: &Path, args: &[&str]) -> Result<String, String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .map_err(|e| format!("Failed to execute git: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("git {} failed: {}", args.join(" "), stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Paths from `git status --porcelain` output, excluding declared prefixes.
fn dirty_paths(porcelain: &str, exclude_patterns: &[String]) -> Vec<String> {
    porcelain
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| line[3..].trim().to_string())
        .filter(|path| !exclude_patterns.iter().any(|prefix| path.starts_with(prefix.as_str())))
        .collect()
}

fn check_no_uncommitted(guarantee: &Guarantee, spec: &GitStateSpec, repo: &Path) -> GuaranteeResult {
    let porcelain = match run_git(repo, &["status", "--porcelain"]) {
        Ok(out) => out,
        Err(e) => return GuaranteeResult::fail(guarantee).with_error(e),
    };

    let dirty = dirty_paths(&porcelain, &spec.exclude_patterns);
    if dirty.is_empty() {
        return GuaranteeResult::pass(guarantee).with_evidence(Evidence::new(
            "git_status",
            serde_json::json!({ "clean": true, "excluded": spec.exclude_patterns }),
        ));
    }

    let listed: Vec<&str> = dirty.iter().take(ERROR_FILE_CAP).map(String::as_str).collect();
    GuaranteeResult::fail(guarantee)
        .with_error(format!("Uncommitted changes: {}", listed.join(", ")))
        .with_evidence(Evidence::new(
            "git_status",
            serde_json::json!({ "clean": false, "dirtyCount": dirty.len(), "files": listed }),
        ))
}

fn check_no_unpushed(guarantee: &Guarantee, spec: &GitStateSpec, repo: &Path) -> GuaranteeResult {
    let upstream = match upstream_ref(spec, repo) {
        Ok(u) => u,
        // No upstream is ambiguous; the warning behavior is deliberate
        Err(_) => {
            return GuaranteeResult::pass(guarantee)
                .with_warning("No upstream configured for the current branch; unpushed state was not checked");
        }
    };

    let range = format!("{}..HEAD", upstream);
    let count = match run_git(repo, &["rev-list", "--count", &range]) {
        Ok(out) => out.trim().parse::<u64>().unwrap_or(0),
        Err(e) => return GuaranteeResult::fail(guarantee).with_error(e),
    };

    if count == 0 {
        GuaranteeResult::pass(guarantee).with_evidence(Evidence::new(
            "git_unpushed",
            serde_json::json!({ "upstream": upstream, "ahead": 0 }),
        ))
    } else {
        GuaranteeResult::fail(guarantee).with_error(format!(
            "{} unpushed commit(s) ahead of {}",
            count, upstream
        ))
    }
}

fn check_branch_pushed(guarantee: &Guarantee, spec: &GitStateSpec, repo: &Path) -> GuaranteeResult {
    let branch = match &spec.branch {
        Some(b) => b.clone(),
        None => match run_git(repo, &["rev-parse", "--abbrev-ref", "HEAD"]) {
            Ok(out) => out.trim().to_string(),
            Err(e) => return GuaranteeResult::fail(guarantee).with_error(e),
        },
    };

    let local = match run_git(repo, &["rev-parse", "HEAD"]) {
        Ok(out) => out.trim().to_string(),
        Err(e) => return GuaranteeResult::fail(guarantee).with_error(e),
    };

    let remote_ref = format!("{}/{}", spec.remote, branch);
    let remote = match run_git(repo, &["rev-parse", &remote_ref]) {
        Ok(out) => out.trim().to_string(),
        Err(e) => return GuaranteeResult::fail(guarantee).with_error(e),
    };

    if local == remote {
        GuaranteeResult::pass(guarantee).with_evidence(Evidence::new(
            "git_branch",
            serde_json::json!({ "branch": branch, "commit": local }),
        ))
    } else {
        GuaranteeResult::fail(guarantee).with_error(format!(
            "Branch {} not fully pushed: local {} != {} {}",
            branch, local, remote_ref, remote
        ))
    }
}

fn check_worktree_clean(guarantee: &Guarantee, repo: &Path) -> GuaranteeResult {
    let listing = match run_git(repo, &["worktree", "list", "--porcelain"]) {
        Ok(out) => out,
        Err(e) => return GuaranteeResult::fail(guarantee).with_error(e),
    };

    let mut result = GuaranteeResult::pass(guarantee);
    let mut checked = 0usize;

    for line in listing.lines() {
        let Some(path_str) = line.strip_prefix("worktree ") else {
            continue;
        };
        let worktree = Path::new(path_str);

        match run_git(worktree, &["status", "--porcelain"]) {
            Ok(porcelain) => {
                checked += 1;
                let dirty = dirty_paths(&porcelain, &[]);
                if !dirty.is_empty() {
                    result.passed = false;
                    result.errors.push(format!(
                        "Worktree {} has uncommitted changes: {}",
                        worktree.display(),
                        dirty.iter().take(ERROR_FILE_CAP).cloned().collect::<Vec<_>>().join(", ")
                    ));
                }
            }
            // Registered but inaccessible worktrees are tolerated
            Err(e) => {
                result
                    .warnings
                    .push(format!("Worktree {} not accessible: {}", worktree.display(), e));
            }
        }
    }

    result.evidence.push(Evidence::new(
        "git_worktrees",
        serde_json::json!({ "checked": checked }),
    ));
    result
}

fn upstream_ref(spec: &GitStateSpec, repo: &Path) -> Result<String, String> {
    if let Some(branch) = &spec.branch {
        let remote_ref = format!("{}/{}", spec.remote, branch);
        // Verify the remote-tracking ref exists before diffing against it
        run_git(repo, &["rev-parse", "--verify", &remote_ref])?;
        return Ok(remote_ref);
    }
    run_git(repo, &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"])
        .map(|out| out.trim().to_string())
}
