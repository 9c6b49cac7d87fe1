use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::matching::{PullIndex, Resolution};
use crate::models::{
    Assignment, AssignmentDetail, GithubIdentity, GithubProfile, PullRequest, Student,
    SubmissionRecord,
};

/// The fields the replacement policy compares between two attempts at the
/// same assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptKey {
    pub passed: bool,
    /// Zero marks an attempt that never resolved to a real pull request.
    pub pull_id: u64,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Assignment> for AttemptKey {
    fn from(assignment: &Assignment) -> Self {
        Self {
            passed: assignment.passed,
            pull_id: assignment.pull_id,
            created_at: Some(assignment.created_at),
        }
    }
}

/// Whether `incoming` should take the place of `existing`.
///
/// A pass beats a fail. With equal pass state a real pull beats the zero
/// placeholder, and between two different real pulls the more recently
/// created one wins. Everything else keeps `existing`.
pub fn should_replace(existing: AttemptKey, incoming: AttemptKey) -> bool {
    if existing.passed != incoming.passed {
        return incoming.passed;
    }
    match (existing.pull_id, incoming.pull_id) {
        (0, 0) => false,
        (0, _) => true,
        (_, 0) => false,
        (old, new) if old == new => false,
        _ => match (existing.created_at, incoming.created_at) {
            (Some(old), Some(new)) => new > old,
            _ => false,
        },
    }
}

/// Adds `incoming` to a student's assignments, deduplicated by URL.
pub fn merge_assignment(assignments: &mut Vec<Assignment>, incoming: Assignment) {
    match assignments.iter_mut().find(|existing| existing.url == incoming.url) {
        Some(existing) => {
            if should_replace(AttemptKey::from(&*existing), AttemptKey::from(&incoming)) {
                tracing::debug!(url = %incoming.url, "replacing earlier attempt");
                *existing = incoming;
            }
        }
        None => assignments.push(incoming),
    }
}

pub fn assignment_from(resolution: &Resolution<'_>) -> Assignment {
    let submission = resolution.submission;
    let pull = resolution.pull;
    Assignment {
        assignment_name: submission.label.clone(),
        url: resolution.url.clone(),
        week: submission.week.clone(),
        passed: submission.passed,
        the_best: resolution.the_best,
        perfect: submission.perfect,
        pass_multiple: submission.pass_multiple,
        pull_id: pull.id,
        title: pull.title.clone(),
        body: pull.body.clone(),
        created_at: pull.created_at,
        updated_at: pull.updated_at,
    }
}

/// Identity of a new student, preferring the fetched profile and falling
/// back to the pull request author.
pub fn identity_for(
    display_name: &str,
    pull: &PullRequest,
    profile: Option<&GithubProfile>,
) -> GithubIdentity {
    let text = |value: Option<&Option<String>>| {
        value
            .and_then(|v| v.as_deref())
            .unwrap_or_default()
            .to_string()
    };

    GithubIdentity {
        name: profile
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| display_name.to_string()),
        id: profile
            .and_then(|p| p.id)
            .unwrap_or(pull.user.id)
            .to_string(),
        login: profile
            .map(|p| p.login.clone())
            .unwrap_or_else(|| pull.user.login.clone()),
        avatar_url: profile
            .and_then(|p| p.avatar_url.clone())
            .unwrap_or_else(|| pull.user.avatar_url.clone()),
        html_url: profile
            .and_then(|p| p.html_url.clone())
            .unwrap_or_else(|| pull.user.html_url.clone()),
        url: text(profile.map(|p| &p.url)),
        company: text(profile.map(|p| &p.company)),
        blog: text(profile.map(|p| &p.blog)),
        location: text(profile.map(|p| &p.location)),
        email: text(profile.map(|p| &p.email)),
        bio: text(profile.map(|p| &p.bio)),
        followers: profile.map(|p| p.followers).unwrap_or(0),
        following: profile.map(|p| p.following).unwrap_or(0),
    }
}

/// Folds resolved submissions into students keyed by the matched pull's
/// author handle. Students are created on their first resolved submission.
pub fn fold_students(
    resolutions: &[Resolution<'_>],
    profiles: &[GithubProfile],
) -> BTreeMap<String, Student> {
    let by_login: HashMap<&str, &GithubProfile> = profiles
        .iter()
        .map(|profile| (profile.login.as_str(), profile))
        .collect();
    let mut students: BTreeMap<String, Student> = BTreeMap::new();

    for resolution in resolutions {
        let login = resolution.pull.user.login.clone();
        let student = students.entry(login).or_insert_with_key(|login| Student {
            name: resolution.submission.student.clone(),
            github: identity_for(
                &resolution.submission.student,
                resolution.pull,
                by_login.get(login.as_str()).copied(),
            ),
            assignments: Vec::new(),
        });
        merge_assignment(&mut student.assignments, assignment_from(resolution));
    }

    students
}

/// Feedback text keyed by the submission URL as written in the LMS export.
pub fn collect_feedbacks(records: &[SubmissionRecord]) -> BTreeMap<String, String> {
    records
        .iter()
        .filter_map(|record| {
            let url = record.assignment.url.as_deref().filter(|u| !u.is_empty())?;
            let feedback = record.feedback.as_deref().filter(|f| !f.is_empty())?;
            Some((url.to_string(), feedback.to_string()))
        })
        .collect()
}

/// Detail entry for every fetched pull, keyed by its URL.
pub fn collect_details(pulls: &PullIndex) -> BTreeMap<String, AssignmentDetail> {
    pulls
        .iter()
        .map(|pull| {
            (
                pull.html_url.clone(),
                AssignmentDetail {
                    id: pull.id,
                    user: pull.user.login.clone(),
                    title: pull.title.clone(),
                    body: pull.body.clone(),
                    created_at: pull.created_at,
                    updated_at: pull.updated_at,
                    url: pull.html_url.clone(),
                },
            )
        })
        .collect()
}
