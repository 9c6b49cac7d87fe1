use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::matching::{MatchDiagnostic, MatchStatus};
use crate::summary::{AssignmentSummary, CohortStats};

const STATUSES: [(MatchStatus, &str); 5] = [
    (MatchStatus::Direct, "Direct URL match"),
    (MatchStatus::Recovered, "Recovered by handle and keyword"),
    (MatchStatus::KeywordFail, "No step number in label"),
    (MatchStatus::PartialFail, "Handle found, no pull with keyword"),
    (MatchStatus::CompleteFail, "No handle for student"),
];

pub fn count_by_status(diagnostics: &[MatchDiagnostic]) -> BTreeMap<MatchStatus, usize> {
    let mut counts = BTreeMap::new();
    for diagnostic in diagnostics {
        *counts.entry(diagnostic.status).or_insert(0) += 1;
    }
    counts
}

fn link(url: &str) -> String {
    if url.is_empty() {
        "-".to_string()
    } else {
        format!("[{url}]({url})")
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn check(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Markdown report of every match attempt.
pub fn build_matching_report(
    title: &str,
    generated_at: DateTime<Utc>,
    diagnostics: &[MatchDiagnostic],
) -> String {
    let counts = count_by_status(diagnostics);
    let mut output = String::new();

    let _ = writeln!(output, "# {title}");
    let _ = writeln!(output, "Generated at {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "{} match attempts", diagnostics.len());
    let _ = writeln!(output);

    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "| Status | Meaning | Count |");
    let _ = writeln!(output, "|--------|---------|-------|");
    for (status, meaning) in STATUSES {
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            status,
            meaning,
            counts.get(&status).copied().unwrap_or(0)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attempts");
    if diagnostics.is_empty() {
        let _ = writeln!(output, "No submissions to match.");
    } else {
        let _ = writeln!(
            output,
            "| Student | Assignment | Original URL | Normalized URL | Pull # | Handle | Keyword | Handle pulls | Keyword pulls | Status | Matched URL |"
        );
        let _ = writeln!(
            output,
            "|---------|------------|--------------|----------------|--------|--------|---------|--------------|---------------|--------|-------------|"
        );
        for d in diagnostics {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                d.student,
                d.assignment,
                link(&d.original_url),
                d.normalized_url,
                or_dash(d.pull_number),
                or_dash(d.handle.as_deref()),
                or_dash(d.keyword.as_deref()),
                or_dash(d.handle_pull_count),
                or_dash(d.keyword_pull_count),
                d.status,
                d.matched_url.as_deref().map(link).unwrap_or_else(|| "-".to_string()),
            );
        }
    }

    let mut seen_handles: Vec<&str> = Vec::new();
    let mut with_candidates: Vec<&MatchDiagnostic> = Vec::new();
    for d in diagnostics {
        let Some(handle) = d.handle.as_deref() else {
            continue;
        };
        if d.handle_pulls.is_empty() || seen_handles.contains(&handle) {
            continue;
        }
        seen_handles.push(handle);
        with_candidates.push(d);
    }

    if !with_candidates.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Pulls per Handle");
        for d in with_candidates {
            let _ = writeln!(output);
            let _ = writeln!(output, "### {} ({})", d.student, or_dash(d.handle.as_deref()));
            let _ = writeln!(output, "Keyword: `{}`", or_dash(d.keyword.as_deref()));
            let _ = writeln!(output);
            let _ = writeln!(output, "| # | Pull URL | Has keyword |");
            let _ = writeln!(output, "|---|----------|-------------|");
            for (idx, candidate) in d.handle_pulls.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "| {} | {} | {} |",
                    idx + 1,
                    link(&candidate.url),
                    check(candidate.has_keyword)
                );
            }
        }
    }

    let with_similar: Vec<&MatchDiagnostic> = diagnostics
        .iter()
        .filter(|d| !d.similar_pulls.is_empty())
        .collect();

    if !with_similar.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Same Pull Number Elsewhere");
        for d in with_similar {
            let _ = writeln!(output);
            let _ = writeln!(output, "### {} - pull #{}", d.student, or_dash(d.pull_number));
            let _ = writeln!(output, "Original URL: {}", d.original_url);
            let _ = writeln!(output);
            let _ = writeln!(output, "| URL | Author |");
            let _ = writeln!(output, "|-----|--------|");
            for similar in &d.similar_pulls {
                let _ = writeln!(output, "| {} | {} |", link(&similar.url), similar.login);
            }
        }
    }

    output
}

pub fn build_summary_report(summaries: &[AssignmentSummary], stats: &CohortStats) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Assignment Summary");
    let _ = writeln!(
        output,
        "{} assignments, {} submissions, {} best practices, average pass rate {:.1}%",
        stats.total_assignments,
        stats.total_submissions,
        stats.total_best_practices,
        stats.average_pass_rate
    );
    let _ = writeln!(output);

    if summaries.is_empty() {
        let _ = writeln!(output, "No assignments recorded.");
        return output;
    }

    for summary in summaries {
        let _ = writeln!(output, "## {} - {}", summary.chapter, summary.title);
        let _ = writeln!(output, "Repository: {}", link(&summary.url));
        let _ = writeln!(
            output,
            "- {} submissions, {} passed ({:.1}%)",
            summary.total_submissions, summary.passed_count, summary.pass_rate
        );
        if summary.best_practice_users.is_empty() {
            let _ = writeln!(output, "- No best practices selected");
        } else {
            let _ = writeln!(output, "- Best practices:");
            for entry in &summary.best_practice_users {
                let _ = writeln!(
                    output,
                    "  - {} ({}): {}",
                    entry.user_name,
                    entry.login,
                    link(&entry.pull_url)
                );
            }
        }
        let _ = writeln!(output);
    }

    output
}
