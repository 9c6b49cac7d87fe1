use crate::aggregate::{collect_details, collect_feedbacks, fold_students};
use crate::config::CohortConfig;
use crate::grouping::group_submissions;
use crate::load::Inputs;
use crate::matching::{MatchContext, MatchDiagnostic, Matcher, PullIndex};
use crate::models::AppData;
use crate::ranking::rank_students;

#[derive(Debug)]
pub struct PipelineOutput {
    pub app_data: AppData,
    pub diagnostics: Vec<MatchDiagnostic>,
    pub fallback_searches: usize,
}

/// Group, match, fold and rank one snapshot of inputs.
pub fn run(inputs: &Inputs, config: &CohortConfig) -> PipelineOutput {
    let pulls = PullIndex::new(inputs.all_pulls());
    let submissions = group_submissions(&inputs.submissions);
    let best_practices = config.best_practice_set();
    tracing::info!(
        pulls = pulls.len(),
        records = inputs.submissions.len(),
        submissions = submissions.len(),
        "grouped LMS records"
    );

    let mut matcher = Matcher::new(
        &pulls,
        MatchContext {
            identities: &config.identities,
            profiles: &inputs.profiles,
            chapters: &config.chapters,
            best_practices: &best_practices,
        },
    );

    let mut resolutions = Vec::with_capacity(submissions.len());
    let mut diagnostics = Vec::with_capacity(submissions.len());
    for submission in &submissions {
        let attempt = matcher.resolve(submission);
        if !attempt.diagnostic.status.is_success() {
            tracing::debug!(
                student = %submission.student,
                url = %submission.url,
                status = %attempt.diagnostic.status,
                "submission left unmatched"
            );
        }
        resolutions.extend(attempt.resolution);
        diagnostics.push(attempt.diagnostic);
    }
    let fallback_searches = matcher.fallback_searches();

    let students = fold_students(&resolutions, &inputs.profiles);
    let total_assignments = config.total_assignments();
    let users = rank_students(students, total_assignments);
    tracing::info!(
        matched = resolutions.len(),
        unmatched = submissions.len() - resolutions.len(),
        fallback_searches,
        students = users.len(),
        total_assignments,
        "ranked students"
    );

    PipelineOutput {
        app_data: AppData {
            users,
            feedbacks: collect_feedbacks(&inputs.submissions),
            assignment_details: collect_details(&pulls),
        },
        diagnostics,
        fallback_searches,
    }
}
