use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullAuthor {
    pub login: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
}

/// A pull request as fetched from the hosting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(default)]
    pub id: u64,
    pub user: PullAuthor,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public profile of a platform user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubProfile {
    pub login: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentRef {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<serde_json::Value>,
}

/// One graded step from the LMS export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub name: String,
    pub assignment: AssignmentRef,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub the_best: bool,
    #[serde(default)]
    pub perfect: bool,
    #[serde(default)]
    pub pass_multiple: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// All steps of one student's submission folded into a single record.
#[derive(Debug, Clone)]
pub struct AggregatedSubmission {
    pub student: String,
    /// Normalized submission URL, never empty.
    pub url: String,
    /// URL as written in the first constituent record.
    pub original_url: String,
    /// Step labels joined with `" & "`.
    pub label: String,
    pub week: Option<serde_json::Value>,
    pub passed: bool,
    pub the_best: bool,
    pub perfect: bool,
    pub pass_multiple: bool,
}

/// A submission resolved against a fetched pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub assignment_name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<serde_json::Value>,
    pub passed: bool,
    pub the_best: bool,
    #[serde(default)]
    pub perfect: bool,
    #[serde(default)]
    pub pass_multiple: bool,
    #[serde(default)]
    pub pull_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GithubIdentity {
    pub name: String,
    pub id: String,
    pub login: String,
    pub avatar_url: String,
    pub html_url: String,
    pub url: String,
    pub company: String,
    pub blog: String,
    pub location: String,
    pub email: String,
    pub bio: String,
    pub followers: u64,
    pub following: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub github: GithubIdentity,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "화이트")]
    White,
    #[serde(rename = "블루")]
    Blue,
    #[serde(rename = "퍼플")]
    Purple,
    #[serde(rename = "브라운")]
    Brown,
    #[serde(rename = "레드")]
    Red,
    #[serde(rename = "블랙")]
    Black,
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Grade::White => "화이트",
            Grade::Blue => "블루",
            Grade::Purple => "퍼플",
            Grade::Brown => "브라운",
            Grade::Red => "레드",
            Grade::Black => "블랙",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let english = match self {
            Grade::White => "White",
            Grade::Blue => "Blue",
            Grade::Purple => "Purple",
            Grade::Brown => "Brown",
            Grade::Red => "Red",
            Grade::Black => "Black",
        };
        write!(f, "{} ({english})", self.label())
    }
}

/// A student with score and grade attached; the shape the site consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedStudent {
    pub name: String,
    pub github: GithubIdentity,
    pub assignments: Vec<Assignment>,
    pub score: u32,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDetail {
    pub id: u64,
    pub user: String,
    pub title: String,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

/// The output document written for the site generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub users: BTreeMap<String, RankedStudent>,
    pub feedbacks: BTreeMap<String, String>,
    pub assignment_details: BTreeMap<String, AssignmentDetail>,
}
