use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::url::normalize_url;

/// A range of curriculum steps graded inside one repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChapterBucket {
    pub first_step: u32,
    pub last_step: u32,
    /// Substring expected in the lower-cased pull request URL.
    pub keyword: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CohortConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub total_assignments: Option<usize>,
    /// Display name to platform handle, consulted before profile search.
    #[serde(default)]
    pub identities: BTreeMap<String, String>,
    #[serde(default)]
    pub best_practice_urls: Vec<String>,
    #[serde(default = "default_chapters")]
    pub chapters: Vec<ChapterBucket>,
    #[serde(default)]
    pub lms_export: Option<PathBuf>,
    #[serde(default)]
    pub profiles: Option<PathBuf>,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            repositories: Vec::new(),
            total_assignments: None,
            identities: BTreeMap::new(),
            best_practice_urls: Vec::new(),
            chapters: default_chapters(),
            lms_export: None,
            profiles: None,
        }
    }
}

impl CohortConfig {
    /// Number of assignments a student can complete; the denominator of the
    /// completion rate.
    pub fn total_assignments(&self) -> usize {
        match self.total_assignments {
            Some(total) => total,
            None if !self.repositories.is_empty() => self.repositories.len(),
            None => self.chapters.len(),
        }
    }

    pub fn best_practice_set(&self) -> HashSet<String> {
        self.best_practice_urls
            .iter()
            .map(|url| normalize_url(Some(url)))
            .filter(|url| !url.is_empty())
            .collect()
    }

    pub fn lms_export_path(&self) -> PathBuf {
        self.lms_export
            .clone()
            .unwrap_or_else(|| self.data_dir.join("user-assignment-infos.json"))
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.profiles
            .clone()
            .unwrap_or_else(|| self.data_dir.join("github-profiles.json"))
    }

    pub fn pulls_path(&self, repository: &str) -> PathBuf {
        self.data_dir.join(repository).join("pulls.json")
    }

    pub fn app_data_path(&self) -> PathBuf {
        self.data_dir.join("app-data.json")
    }

    pub fn debug_report_path(&self) -> PathBuf {
        self.data_dir.join("matching-debug.md")
    }

    fn validate(&self) -> anyhow::Result<()> {
        for bucket in &self.chapters {
            if bucket.first_step > bucket.last_step {
                anyhow::bail!(
                    "chapter bucket {} has first_step {} after last_step {}",
                    bucket.keyword,
                    bucket.first_step,
                    bucket.last_step
                );
            }
            if bucket.keyword.trim().is_empty() {
                anyhow::bail!(
                    "chapter bucket for steps {}-{} has an empty keyword",
                    bucket.first_step,
                    bucket.last_step
                );
            }
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("docs/data")
}

fn default_chapters() -> Vec<ChapterBucket> {
    const CHAPTERS: [&str; 10] = [
        "1-1", "1-2", "1-3", "2-1", "2-2", "3-1", "3-2", "3-3", "4-1", "4-2",
    ];
    CHAPTERS
        .iter()
        .zip(0u32..)
        .map(|(chapter, index)| ChapterBucket {
            first_step: index * 2 + 1,
            last_step: index * 2 + 2,
            keyword: format!("chapter{chapter}"),
        })
        .collect()
}

/// Load config from a TOML file with env var overrides.
pub fn load(path: &Path) -> anyhow::Result<CohortConfig> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?
    } else {
        tracing::warn!("Config file not found at {}, using defaults", path.display());
        String::new()
    };

    let mut config: CohortConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;

    if let Ok(v) = std::env::var("COHORT_DATA_DIR") {
        config.data_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("COHORT_TOTAL_ASSIGNMENTS") {
        config.total_assignments = Some(
            v.parse()
                .context("COHORT_TOTAL_ASSIGNMENTS must be a non-negative integer")?,
        );
    }

    config.validate()?;
    Ok(config)
}
