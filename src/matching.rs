use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::ChapterBucket;
use crate::models::{AggregatedSubmission, GithubProfile, PullRequest};
use crate::url::{normalize_url, pull_number};

static STEP_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"step(\d+)").expect("valid step pattern"));

/// Fetched pull requests keyed by normalized URL.
///
/// Iteration follows fetch order; a later pull with the same normalized URL
/// replaces the earlier one in place.
#[derive(Debug, Default)]
pub struct PullIndex {
    pulls: Vec<PullRequest>,
    by_url: HashMap<String, usize>,
}

impl PullIndex {
    pub fn new<'a>(pulls: impl IntoIterator<Item = &'a PullRequest>) -> Self {
        let mut index = PullIndex::default();
        for pull in pulls {
            let key = normalize_url(Some(&pull.html_url));
            match index.by_url.get(&key) {
                Some(&slot) => index.pulls[slot] = pull.clone(),
                None => {
                    index.by_url.insert(key, index.pulls.len());
                    index.pulls.push(pull.clone());
                }
            }
        }
        index
    }

    pub fn get(&self, normalized_url: &str) -> Option<&PullRequest> {
        self.by_url.get(normalized_url).map(|&slot| &self.pulls[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PullRequest> {
        self.pulls.iter()
    }

    pub fn len(&self) -> usize {
        self.pulls.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchStatus {
    /// Submission URL found verbatim among fetched pulls.
    Direct,
    /// Recovered through handle and repository keyword.
    Recovered,
    /// Handle resolved but the label carries no usable step number.
    KeywordFail,
    /// Handle and keyword resolved but no pull of that handle carries the keyword.
    PartialFail,
    /// No handle could be resolved for the student.
    CompleteFail,
}

impl MatchStatus {
    pub fn is_success(self) -> bool {
        matches!(self, MatchStatus::Direct | MatchStatus::Recovered)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Direct => "direct",
            MatchStatus::Recovered => "recovered",
            MatchStatus::KeywordFail => "keyword_fail",
            MatchStatus::PartialFail => "partial_fail",
            MatchStatus::CompleteFail => "complete_fail",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarPull {
    pub url: String,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePull {
    pub url: String,
    pub has_keyword: bool,
}

/// Why a submission did or did not resolve.
#[derive(Debug, Clone)]
pub struct MatchDiagnostic {
    pub student: String,
    pub assignment: String,
    pub original_url: String,
    pub normalized_url: String,
    pub pull_number: Option<u64>,
    pub similar_pulls: Vec<SimilarPull>,
    pub handle: Option<String>,
    pub keyword: Option<String>,
    pub handle_pull_count: Option<usize>,
    pub keyword_pull_count: Option<usize>,
    pub handle_pulls: Vec<CandidatePull>,
    pub status: MatchStatus,
    pub matched_url: Option<String>,
}

impl MatchDiagnostic {
    fn new(submission: &AggregatedSubmission, status: MatchStatus) -> Self {
        Self {
            student: submission.student.clone(),
            assignment: submission.label.clone(),
            original_url: submission.original_url.clone(),
            normalized_url: submission.url.clone(),
            pull_number: None,
            similar_pulls: Vec::new(),
            handle: None,
            keyword: None,
            handle_pull_count: None,
            keyword_pull_count: None,
            handle_pulls: Vec::new(),
            status,
            matched_url: None,
        }
    }

    /// True when any URL or the derived keyword mentions `focus`.
    pub fn mentions(&self, focus: &str) -> bool {
        self.original_url.contains(focus)
            || self.normalized_url.contains(focus)
            || self.keyword.as_deref() == Some(focus)
    }
}

/// A submission bound to the pull request it was matched to.
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub submission: &'a AggregatedSubmission,
    pub pull: &'a PullRequest,
    /// Normalized URL of the matched pull, used as the assignment URL.
    pub url: String,
    pub the_best: bool,
}

pub struct MatchAttempt<'a> {
    pub resolution: Option<Resolution<'a>>,
    pub diagnostic: MatchDiagnostic,
}

/// Lookup tables the matcher consults besides the pull index.
pub struct MatchContext<'a> {
    pub identities: &'a BTreeMap<String, String>,
    pub profiles: &'a [GithubProfile],
    pub chapters: &'a [ChapterBucket],
    pub best_practices: &'a HashSet<String>,
}

pub struct Matcher<'a> {
    pulls: &'a PullIndex,
    context: MatchContext<'a>,
    fallback_searches: usize,
}

impl<'a> Matcher<'a> {
    pub fn new(pulls: &'a PullIndex, context: MatchContext<'a>) -> Self {
        Self {
            pulls,
            context,
            fallback_searches: 0,
        }
    }

    /// How many submissions needed the handle and keyword search.
    pub fn fallback_searches(&self) -> usize {
        self.fallback_searches
    }

    pub fn resolve(&mut self, submission: &'a AggregatedSubmission) -> MatchAttempt<'a> {
        if let Some(pull) = self.pulls.get(&submission.url) {
            let mut diagnostic = MatchDiagnostic::new(submission, MatchStatus::Direct);
            diagnostic.pull_number = pull_number(&submission.url);
            diagnostic.handle = Some(pull.user.login.clone());
            diagnostic.matched_url = Some(pull.html_url.clone());
            return MatchAttempt {
                resolution: Some(self.bind(submission, pull)),
                diagnostic,
            };
        }

        self.fallback_searches += 1;
        self.search_by_identity(submission)
    }

    fn search_by_identity(&self, submission: &'a AggregatedSubmission) -> MatchAttempt<'a> {
        let mut diagnostic = MatchDiagnostic::new(submission, MatchStatus::CompleteFail);
        diagnostic.pull_number = pull_number(&submission.url);
        diagnostic.similar_pulls = match diagnostic.pull_number {
            Some(number) => self
                .pulls
                .iter()
                .filter(|pull| pull_number(&normalize_url(Some(&pull.html_url))) == Some(number))
                .map(|pull| SimilarPull {
                    url: pull.html_url.clone(),
                    login: pull.user.login.clone(),
                })
                .collect(),
            None => Vec::new(),
        };

        let Some(handle) = resolve_handle(
            &submission.student,
            self.context.identities,
            self.context.profiles,
        ) else {
            return MatchAttempt {
                resolution: None,
                diagnostic,
            };
        };
        diagnostic.handle = Some(handle.clone());

        let Some(keyword) = derive_keyword(&submission.label, self.context.chapters) else {
            diagnostic.status = MatchStatus::KeywordFail;
            return MatchAttempt {
                resolution: None,
                diagnostic,
            };
        };
        let keyword = keyword.to_lowercase();
        diagnostic.keyword = Some(keyword.clone());

        let handle_pulls: Vec<&'a PullRequest> = self
            .pulls
            .iter()
            .filter(|pull| pull.user.login == handle)
            .collect();
        diagnostic.handle_pull_count = Some(handle_pulls.len());
        diagnostic.handle_pulls = handle_pulls
            .iter()
            .map(|pull| CandidatePull {
                url: pull.html_url.clone(),
                has_keyword: url_has_keyword(pull, &keyword),
            })
            .collect();
        let keyword_pull_count = diagnostic
            .handle_pulls
            .iter()
            .filter(|candidate| candidate.has_keyword)
            .count();
        diagnostic.keyword_pull_count = Some(keyword_pull_count);

        match handle_pulls
            .into_iter()
            .find(|pull| url_has_keyword(pull, &keyword))
        {
            Some(pull) => {
                diagnostic.status = MatchStatus::Recovered;
                diagnostic.matched_url = Some(pull.html_url.clone());
                MatchAttempt {
                    resolution: Some(self.bind(submission, pull)),
                    diagnostic,
                }
            }
            None => {
                diagnostic.status = MatchStatus::PartialFail;
                MatchAttempt {
                    resolution: None,
                    diagnostic,
                }
            }
        }
    }

    fn bind(&self, submission: &'a AggregatedSubmission, pull: &'a PullRequest) -> Resolution<'a> {
        let url = normalize_url(Some(&pull.html_url));
        let best = self.context.best_practices;
        let the_best = submission.the_best || best.contains(&url) || best.contains(&submission.url);
        Resolution {
            submission,
            pull,
            url,
            the_best,
        }
    }
}

fn url_has_keyword(pull: &PullRequest, keyword: &str) -> bool {
    pull.html_url.to_lowercase().contains(keyword)
}

/// Platform handle for a display name: manual table first, then an exact
/// profile name match.
pub fn resolve_handle(
    student: &str,
    identities: &BTreeMap<String, String>,
    profiles: &[GithubProfile],
) -> Option<String> {
    identities.get(student).cloned().or_else(|| {
        profiles
            .iter()
            .find(|profile| profile.name.as_deref() == Some(student))
            .map(|profile| profile.login.clone())
    })
}

/// First `STEP nn` ordinal in a label, ignoring case and whitespace.
pub fn step_number(label: &str) -> Option<u32> {
    let compact: String = label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    STEP_NUMBER
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Repository keyword of the chapter bucket holding the label's step.
pub fn derive_keyword<'c>(label: &str, chapters: &'c [ChapterBucket]) -> Option<&'c str> {
    let step = step_number(label)?;
    chapters
        .iter()
        .find(|bucket| (bucket.first_step..=bucket.last_step).contains(&step))
        .map(|bucket| bucket.keyword.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CohortConfig;
    use crate::models::PullAuthor;
    use chrono::{TimeZone, Utc};

    fn pull(id: u64, login: &str, url: &str) -> PullRequest {
        PullRequest {
            id,
            user: PullAuthor {
                login: login.to_string(),
                id: 100 + id,
                avatar_url: format!("https://avatars/{login}"),
                html_url: format!("https://github.com/{login}"),
            },
            title: format!("PR {id}"),
            body: Some("body".into()),
            html_url: url.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 7, 2, 0, 0, 0).unwrap(),
        }
    }

    fn submission(student: &str, label: &str, url: &str) -> AggregatedSubmission {
        AggregatedSubmission {
            student: student.to_string(),
            url: normalize_url(Some(url)),
            original_url: url.to_string(),
            label: label.to_string(),
            week: None,
            passed: true,
            the_best: false,
            perfect: false,
            pass_multiple: false,
        }
    }

    struct Fixture {
        index: PullIndex,
        identities: BTreeMap<String, String>,
        profiles: Vec<GithubProfile>,
        chapters: Vec<ChapterBucket>,
        best: HashSet<String>,
    }

    impl Fixture {
        fn new(pulls: Vec<PullRequest>) -> Self {
            Self {
                index: PullIndex::new(pulls.iter()),
                identities: BTreeMap::new(),
                profiles: Vec::new(),
                chapters: CohortConfig::default().chapters,
                best: HashSet::new(),
            }
        }

        fn matcher(&self) -> Matcher<'_> {
            Matcher::new(
                &self.index,
                MatchContext {
                    identities: &self.identities,
                    profiles: &self.profiles,
                    chapters: &self.chapters,
                    best_practices: &self.best,
                },
            )
        }
    }

    #[test]
    fn step_numbers_ignore_case_and_spacing() {
        assert_eq!(step_number("STEP 03"), Some(3));
        assert_eq!(step_number("Step 1 & STEP 02"), Some(1));
        assert_eq!(step_number("s t e p 17"), Some(17));
        assert_eq!(step_number("Chapter intro"), None);
    }

    #[test]
    fn keywords_follow_two_step_buckets() {
        let chapters = CohortConfig::default().chapters;
        assert_eq!(derive_keyword("STEP 01", &chapters), Some("chapter1-1"));
        assert_eq!(derive_keyword("STEP 04", &chapters), Some("chapter1-2"));
        assert_eq!(derive_keyword("STEP 11 & STEP 12", &chapters), Some("chapter3-1"));
        assert_eq!(derive_keyword("STEP 20", &chapters), Some("chapter4-2"));
        assert_eq!(derive_keyword("STEP 21", &chapters), None);
        assert_eq!(derive_keyword("STEP 00", &chapters), None);
        assert_eq!(derive_keyword("Bonus", &chapters), None);
    }

    #[test]
    fn handle_prefers_manual_table_over_profiles() {
        let mut identities = BTreeMap::new();
        identities.insert("Avery".to_string(), "avery-manual".to_string());
        let profiles = vec![
            GithubProfile {
                login: "avery-profile".into(),
                name: Some("Avery".into()),
                ..GithubProfile::default()
            },
            GithubProfile {
                login: "jules".into(),
                name: Some("Jules".into()),
                ..GithubProfile::default()
            },
        ];
        assert_eq!(
            resolve_handle("Avery", &identities, &profiles).as_deref(),
            Some("avery-manual")
        );
        assert_eq!(
            resolve_handle("Jules", &identities, &profiles).as_deref(),
            Some("jules")
        );
        assert_eq!(resolve_handle("Kiara", &identities, &profiles), None);
    }

    #[test]
    fn later_duplicate_url_replaces_earlier_pull_in_place() {
        let index = PullIndex::new(
            [
                pull(1, "a", "https://github.com/o/chapter1-1/pull/1"),
                pull(2, "b", "https://github.com/o/chapter1-1/pull/2"),
                pull(3, "a", "https://www.github.com/o/chapter1-1/pull/1/"),
            ]
            .iter(),
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("https://github.com/o/chapter1-1/pull/1").map(|p| p.id), Some(3));
        let order: Vec<u64> = index.iter().map(|p| p.id).collect();
        assert_eq!(order, [3, 2]);
    }

    #[test]
    fn direct_match_never_runs_fallback_search() {
        let mut fixture = Fixture::new(vec![pull(
            7,
            "avery",
            "https://github.com/o/front_chapter1-1/pull/7",
        )]);
        fixture
            .identities
            .insert("Avery".into(), "someone-else".into());
        let sub = submission("Avery", "STEP 01", "https://www.github.com/o/front_chapter1-1/pull/7/");

        let mut matcher = fixture.matcher();
        let attempt = matcher.resolve(&sub);
        assert_eq!(matcher.fallback_searches(), 0);
        assert_eq!(attempt.diagnostic.status, MatchStatus::Direct);
        let resolution = attempt.resolution.expect("direct match");
        assert_eq!(resolution.pull.id, 7);
        assert_eq!(resolution.url, "https://github.com/o/front_chapter1-1/pull/7");
        assert!(attempt.diagnostic.keyword.is_none());
    }

    #[test]
    fn fallback_recovers_by_handle_and_keyword() {
        let mut fixture = Fixture::new(vec![
            pull(1, "avery", "https://github.com/o/front_chapter1-1/pull/1"),
            pull(2, "avery", "https://github.com/o/front_chapter1-2/pull/9"),
            pull(3, "jules", "https://github.com/o/front_chapter1-2/pull/3"),
        ]);
        fixture.identities.insert("Avery".into(), "avery".into());
        let sub = submission("Avery", "STEP 03 & STEP 04", "https://github.com/o/wrong-repo/pull/9");

        let mut matcher = fixture.matcher();
        let attempt = matcher.resolve(&sub);
        assert_eq!(matcher.fallback_searches(), 1);
        let diagnostic = &attempt.diagnostic;
        assert_eq!(diagnostic.status, MatchStatus::Recovered);
        assert_eq!(diagnostic.keyword.as_deref(), Some("chapter1-2"));
        assert_eq!(diagnostic.handle_pull_count, Some(2));
        assert_eq!(diagnostic.keyword_pull_count, Some(1));
        assert_eq!(diagnostic.pull_number, Some(9));
        assert_eq!(diagnostic.similar_pulls.len(), 1);
        let resolution = attempt.resolution.expect("recovered");
        assert_eq!(resolution.pull.id, 2);
        assert_eq!(resolution.url, "https://github.com/o/front_chapter1-2/pull/9");
    }

    #[test]
    fn ambiguous_keyword_search_takes_first_pull() {
        let mut fixture = Fixture::new(vec![
            pull(4, "avery", "https://github.com/o/front_chapter2-1/pull/4"),
            pull(5, "avery", "https://github.com/o/front_chapter2-1/pull/5"),
        ]);
        fixture.identities.insert("Avery".into(), "avery".into());
        let sub = submission("Avery", "STEP 07", "https://github.com/o/elsewhere/pull/1");

        let mut matcher = fixture.matcher();
        let attempt = matcher.resolve(&sub);
        assert_eq!(attempt.diagnostic.keyword_pull_count, Some(2));
        assert_eq!(attempt.resolution.expect("recovered").pull.id, 4);
    }

    #[test]
    fn unresolved_handle_is_complete_failure() {
        let fixture = Fixture::new(vec![pull(1, "avery", "https://github.com/o/front_chapter1-1/pull/1")]);
        let sub = submission("Nobody", "STEP 01", "https://github.com/o/missing/pull/5");

        let attempt = fixture.matcher().resolve(&sub);
        assert!(attempt.resolution.is_none());
        assert_eq!(attempt.diagnostic.status, MatchStatus::CompleteFail);
        assert!(attempt.diagnostic.handle.is_none());
    }

    #[test]
    fn label_without_step_is_keyword_failure() {
        let mut fixture = Fixture::new(vec![pull(1, "avery", "https://github.com/o/front_chapter1-1/pull/1")]);
        fixture.identities.insert("Avery".into(), "avery".into());
        let sub = submission("Avery", "Orientation", "https://github.com/o/missing/pull/5");

        let attempt = fixture.matcher().resolve(&sub);
        assert!(attempt.resolution.is_none());
        assert_eq!(attempt.diagnostic.status, MatchStatus::KeywordFail);
        assert_eq!(attempt.diagnostic.handle.as_deref(), Some("avery"));
    }

    #[test]
    fn step_zero_is_not_filed_under_first_chapter() {
        let mut fixture = Fixture::new(vec![pull(1, "avery", "https://github.com/o/front_chapter1-1/pull/1")]);
        fixture.identities.insert("Avery".into(), "avery".into());
        let sub = submission("Avery", "STEP 00", "https://github.com/o/missing/pull/5");

        let attempt = fixture.matcher().resolve(&sub);
        assert!(attempt.resolution.is_none());
        assert_eq!(attempt.diagnostic.status, MatchStatus::KeywordFail);
        assert!(attempt.diagnostic.keyword.is_none());
    }

    #[test]
    fn handle_without_keyword_pull_is_partial_failure() {
        let mut fixture = Fixture::new(vec![pull(1, "avery", "https://github.com/o/front_chapter1-1/pull/1")]);
        fixture.identities.insert("Avery".into(), "avery".into());
        let sub = submission("Avery", "STEP 19", "https://github.com/o/missing/pull/5");

        let attempt = fixture.matcher().resolve(&sub);
        assert!(attempt.resolution.is_none());
        assert_eq!(attempt.diagnostic.status, MatchStatus::PartialFail);
        assert_eq!(attempt.diagnostic.handle_pull_count, Some(1));
        assert_eq!(attempt.diagnostic.keyword_pull_count, Some(0));
        assert!(!attempt.diagnostic.handle_pulls[0].has_keyword);
    }

    #[test]
    fn override_set_turns_best_practice_on() {
        let mut fixture = Fixture::new(vec![pull(
            3,
            "avery",
            "https://github.com/o/front_chapter1-1/pull/3",
        )]);
        fixture
            .best
            .insert("https://github.com/o/front_chapter1-1/pull/3".into());
        let sub = submission("Avery", "STEP 01", "https://github.com/o/front_chapter1-1/pull/3");
        assert!(!sub.the_best);

        let attempt = fixture.matcher().resolve(&sub);
        assert!(attempt.resolution.expect("matched").the_best);
    }

    #[test]
    fn override_set_matches_original_lms_url_after_recovery() {
        let mut fixture = Fixture::new(vec![pull(
            3,
            "avery",
            "https://github.com/o/front_chapter1-1/pull/3",
        )]);
        fixture.identities.insert("Avery".into(), "avery".into());
        fixture.best.insert("https://github.com/o/typo/pull/3".into());
        let sub = submission("Avery", "STEP 02", "https://github.com/o/typo/pull/3/");

        let attempt = fixture.matcher().resolve(&sub);
        assert!(attempt.resolution.expect("recovered").the_best);
    }
}
