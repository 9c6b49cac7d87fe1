use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;

use crate::config::CohortConfig;
use crate::models::{AssignmentRef, GithubProfile, PullRequest, SubmissionRecord};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("input file not found: {0}")]
    Missing(PathBuf),
    #[error("unsupported LMS export format for {0} (expected .json or .csv)")]
    UnsupportedFormat(PathBuf),
    #[error("no repositories configured; nothing to reconcile")]
    NoRepositories,
}

/// Pull requests of one repository, in the order they were fetched.
#[derive(Debug, Clone)]
pub struct RepositoryPulls {
    pub repository: String,
    pub pulls: Vec<PullRequest>,
}

/// Fully buffered snapshot of every input the pipeline needs.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub repositories: Vec<RepositoryPulls>,
    pub profiles: Vec<GithubProfile>,
    pub submissions: Vec<SubmissionRecord>,
}

impl Inputs {
    pub fn all_pulls(&self) -> impl Iterator<Item = &PullRequest> {
        self.repositories.iter().flat_map(|repo| repo.pulls.iter())
    }
}

/// Reads all inputs concurrently. Any missing or malformed file aborts the run.
pub async fn load_inputs(config: &CohortConfig) -> anyhow::Result<Inputs> {
    if config.repositories.is_empty() {
        return Err(LoadError::NoRepositories.into());
    }

    let mut set = JoinSet::new();
    for (index, repository) in config.repositories.iter().enumerate() {
        let repository = repository.clone();
        let path = config.pulls_path(&repository);
        set.spawn(async move {
            let pulls: Vec<PullRequest> = read_json(&path).await?;
            anyhow::Ok((index, RepositoryPulls { repository, pulls }))
        });
    }

    let profiles_path = config.profiles_path();
    let lms_path = config.lms_export_path();
    let (profiles, submissions) = tokio::try_join!(
        read_json::<Vec<GithubProfile>>(&profiles_path),
        read_submissions(&lms_path),
    )?;

    let mut indexed = Vec::with_capacity(config.repositories.len());
    while let Some(joined) = set.join_next().await {
        let (index, repo) = joined.context("pull loader task panicked")??;
        tracing::info!(repository = %repo.repository, count = repo.pulls.len(), "loaded pulls");
        indexed.push((index, repo));
    }
    indexed.sort_by_key(|(index, _)| *index);

    tracing::info!(
        profiles = profiles.len(),
        submissions = submissions.len(),
        "loaded profiles and LMS export"
    );

    Ok(Inputs {
        repositories: indexed.into_iter().map(|(_, repo)| repo).collect(),
        profiles,
        submissions,
    })
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(LoadError::Missing(path.to_path_buf()).into());
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("malformed JSON in {}", path.display()))
}

/// LMS export as a JSON array or a CSV table, picked by file extension.
pub async fn read_submissions(path: &Path) -> anyhow::Result<Vec<SubmissionRecord>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => read_json(path).await,
        Some("csv") => {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(LoadError::Missing(path.to_path_buf()).into());
            }
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            parse_submissions_csv(&bytes)
                .with_context(|| format!("malformed CSV in {}", path.display()))
        }
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf()).into()),
    }
}

pub fn parse_submissions_csv(bytes: &[u8]) -> anyhow::Result<Vec<SubmissionRecord>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        assignment_name: String,
        assignment_url: Option<String>,
        week: Option<String>,
        passed: bool,
        the_best: Option<bool>,
        perfect: Option<bool>,
        pass_multiple: Option<bool>,
        feedback: Option<String>,
    }

    let mut reader = csv::Reader::from_reader(bytes);
    let mut records = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let week = row.week.filter(|w| !w.trim().is_empty()).map(|w| {
            match w.trim().parse::<u64>() {
                Ok(n) => serde_json::Value::from(n),
                Err(_) => serde_json::Value::from(w),
            }
        });

        records.push(SubmissionRecord {
            name: row.name,
            assignment: AssignmentRef {
                name: row.assignment_name,
                url: row.assignment_url.filter(|u| !u.trim().is_empty()),
                week,
            },
            passed: row.passed,
            the_best: row.the_best.unwrap_or(false),
            perfect: row.perfect.unwrap_or(false),
            pass_multiple: row.pass_multiple.unwrap_or(false),
            feedback: row.feedback.filter(|f| !f.is_empty()),
        });
    }

    Ok(records)
}
