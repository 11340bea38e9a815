use std::fmt::Write;

use crate::gitea::{CommitSha, PullRequestNumber, RepoName};
use crate::review::{FileChange, FileStatus};
use crate::utils::text::truncate_chars;

pub(super) const SYSTEM_PROMPT: &str = r#"You are an experienced code reviewer.
Review the changes you are given and point out bugs, security problems, performance issues and hard to maintain code.
Do not comment on formatting or on code that was not changed.
Answer with a single JSON object and nothing else, using this structure:
{"summary": "<overall review in Markdown>", "comments": [{"path": "<file path>", "line": <line number in the new version of the file>, "comment": "<review comment>"}]}
Use an empty "comments" array if there is nothing to point out."#;

fn format_files(out: &mut String, files: &[FileChange]) {
    for file in files {
        let status = match file.status {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Removed => "removed",
        };
        let _ = writeln!(
            out,
            "- {} ({status}, +{} -{})",
            file.filename, file.additions, file.deletions
        );
    }
}

pub(super) fn pull_request_prompt(
    repo: &RepoName,
    pr: PullRequestNumber,
    head_sha: &CommitSha,
    files: &[FileChange],
    diff: &str,
    max_diff_chars: usize,
) -> String {
    let mut prompt = format!("Pull request {repo}#{pr} (head commit {head_sha}).\n\nChanged files:\n");
    format_files(&mut prompt, files);

    let (diff, truncated) = truncate_chars(diff, max_diff_chars);
    prompt.push_str("\nUnified diff:\n```diff\n");
    prompt.push_str(diff);
    if !diff.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```\n");
    if truncated {
        prompt.push_str("\nThe diff was truncated, review only the part shown above.\n");
    }
    prompt
}

pub(super) fn commit_prompt(repo: &RepoName, sha: &CommitSha, files: &[FileChange]) -> String {
    let mut prompt = format!("Commit {sha} in {repo}.\n\nChanged files:\n");
    format_files(&mut prompt, files);
    prompt.push_str(
        "\nOnly the list of changed files is available for this commit, line statistics are unknown. \
Summarize the risks of the change and only add line comments if you are sure about the line.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_prompt_lists_files() {
        let prompt = commit_prompt(
            &RepoName::new("acme", "widgets"),
            &CommitSha("abc".to_string()),
            &[
                FileChange::without_stats("src/main.rs", FileStatus::Modified),
                FileChange::without_stats("README.md", FileStatus::Removed),
            ],
        );
        insta::assert_snapshot!(prompt, @r###"
        Commit abc in acme/widgets.

        Changed files:
        - src/main.rs (modified, +0 -0)
        - README.md (removed, +0 -0)

        Only the list of changed files is available for this commit, line statistics are unknown. Summarize the risks of the change and only add line comments if you are sure about the line.
        "###);
    }

    #[test]
    fn pull_request_prompt_truncates_diff() {
        let prompt = pull_request_prompt(
            &RepoName::new("acme", "widgets"),
            PullRequestNumber(3),
            &CommitSha("abc".to_string()),
            &[],
            "+0123456789",
            5,
        );
        assert!(prompt.contains("```diff\n+0123\n```"));
        assert!(prompt.contains("The diff was truncated"));
    }
}
