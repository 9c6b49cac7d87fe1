use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::aggregate::{should_replace, AttemptKey};
use crate::models::AppData;
use crate::url::repository;

static CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"chapter([\d-]+)").expect("valid chapter pattern"));
static CHAPTER_PARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:-(\d+))?").expect("valid chapter parts pattern"));

const OTHER_CHAPTER: &str = "Other";

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionEntry {
    pub id: u64,
    pub passed: bool,
    pub the_best: bool,
    pub login: String,
    pub user_name: String,
    pub pull_url: String,
    key: AttemptKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentSummary {
    pub title: String,
    pub chapter: String,
    pub repository: String,
    pub url: String,
    pub total_submissions: usize,
    pub passed_count: usize,
    pub best_practice_count: usize,
    pub pass_rate: f64,
    pub best_practice_users: Vec<SubmissionEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohortStats {
    pub total_assignments: usize,
    pub total_submissions: usize,
    pub total_best_practices: usize,
    pub average_pass_rate: f64,
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn chapter_label(repository: &str) -> String {
    CHAPTER
        .captures(repository)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("Chapter {}", m.as_str()))
        .unwrap_or_else(|| OTHER_CHAPTER.to_string())
}

fn chapter_order(chapter: &str) -> (u32, u32) {
    let Some(caps) = CHAPTER_PARTS.captures(chapter) else {
        return (999, 999);
    };
    let major = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(999);
    let minor = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    (major, minor)
}

struct Bucket {
    title: String,
    submissions: Vec<SubmissionEntry>,
}

/// Per-repository submission statistics, one submission per student.
pub fn summarize(app: &AppData) -> Vec<AssignmentSummary> {
    let mut buckets: HashMap<String, Bucket> = HashMap::new();

    for (login, user) in &app.users {
        for assignment in &user.assignments {
            let Some(repository) = repository(&assignment.url) else {
                continue;
            };

            let id = app
                .assignment_details
                .get(&assignment.url)
                .map(|detail| detail.id)
                .unwrap_or(assignment.pull_id);
            let entry = SubmissionEntry {
                id,
                passed: assignment.passed,
                the_best: assignment.the_best,
                login: login.clone(),
                user_name: if user.name.is_empty() {
                    "Unknown".to_string()
                } else {
                    user.name.clone()
                },
                pull_url: assignment.url.clone(),
                key: AttemptKey {
                    passed: assignment.passed,
                    pull_id: id,
                    created_at: Some(assignment.created_at),
                },
            };

            let bucket = buckets.entry(repository).or_insert_with(|| Bucket {
                title: assignment.assignment_name.clone(),
                submissions: Vec::new(),
            });
            match bucket.submissions.iter_mut().find(|s| s.login == entry.login) {
                Some(existing) => {
                    if should_replace(existing.key, entry.key) {
                        *existing = entry;
                    }
                }
                None => bucket.submissions.push(entry),
            }
        }
    }

    let mut summaries: Vec<AssignmentSummary> = buckets
        .into_iter()
        .map(|(repository, bucket)| {
            let total = bucket.submissions.len();
            let passed = bucket.submissions.iter().filter(|s| s.passed).count();
            let best: Vec<SubmissionEntry> = bucket
                .submissions
                .into_iter()
                .filter(|s| s.the_best)
                .collect();
            let pass_rate = if total > 0 {
                passed as f64 / total as f64 * 100.0
            } else {
                0.0
            };

            AssignmentSummary {
                title: bucket.title,
                chapter: chapter_label(&repository),
                url: format!("https://github.com/{repository}"),
                repository,
                total_submissions: total,
                passed_count: passed,
                best_practice_count: best.len(),
                pass_rate: round_one(pass_rate),
                best_practice_users: best,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        chapter_order(&a.chapter)
            .cmp(&chapter_order(&b.chapter))
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.repository.cmp(&b.repository))
    });
    summaries
}

pub fn cohort_stats(summaries: &[AssignmentSummary]) -> CohortStats {
    let average = if summaries.is_empty() {
        0.0
    } else {
        summaries.iter().map(|s| s.pass_rate).sum::<f64>() / summaries.len() as f64
    };

    CohortStats {
        total_assignments: summaries.len(),
        total_submissions: summaries.iter().map(|s| s.total_submissions).sum(),
        total_best_practices: summaries.iter().map(|s| s.best_practice_count).sum(),
        average_pass_rate: round_one(average),
    }
}
