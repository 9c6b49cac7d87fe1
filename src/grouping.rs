use std::collections::HashMap;

use crate::models::{AggregatedSubmission, SubmissionRecord};
use crate::url::normalize_url;

const LABEL_SEPARATOR: &str = " & ";

/// Folds per-step LMS rows into one submission per (student, normalized URL).
///
/// Rows without a usable URL are dropped. Groups keep the order in which
/// their first row appeared, and the first row supplies every field that is
/// not folded.
pub fn group_submissions(records: &[SubmissionRecord]) -> Vec<AggregatedSubmission> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<&SubmissionRecord>> = Vec::new();
    let mut urls: Vec<String> = Vec::new();
    let mut skipped = 0usize;

    for record in records {
        let url = normalize_url(record.assignment.url.as_deref());
        if url.is_empty() {
            skipped += 1;
            continue;
        }

        let key = format!("{}_{}", record.name, url);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            urls.push(url);
            groups.len() - 1
        });
        groups[slot].push(record);
    }

    if skipped > 0 {
        tracing::debug!(skipped, "dropped LMS rows without a submission URL");
    }

    groups
        .into_iter()
        .zip(urls)
        .filter_map(|(steps, url)| fold_group(&steps, url))
        .collect()
}

fn fold_group(steps: &[&SubmissionRecord], url: String) -> Option<AggregatedSubmission> {
    let first = steps.first()?;

    Some(AggregatedSubmission {
        student: first.name.clone(),
        url,
        original_url: first.assignment.url.clone().unwrap_or_default(),
        label: steps
            .iter()
            .map(|step| step.assignment.name.as_str())
            .collect::<Vec<_>>()
            .join(LABEL_SEPARATOR),
        week: first.assignment.week.clone(),
        passed: steps.iter().all(|step| step.passed),
        the_best: steps.iter().any(|step| step.the_best),
        perfect: steps.iter().any(|step| step.perfect),
        pass_multiple: steps.iter().any(|step| step.pass_multiple),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssignmentRef;

    fn record(name: &str, step: &str, url: Option<&str>, passed: bool) -> SubmissionRecord {
        SubmissionRecord {
            name: name.to_string(),
            assignment: AssignmentRef {
                name: step.to_string(),
                url: url.map(str::to_string),
                week: None,
            },
            passed,
            ..SubmissionRecord::default()
        }
    }

    #[test]
    fn steps_with_same_student_and_url_fold_into_one() {
        let records = vec![
            record("Avery", "STEP 01", Some("https://github.com/o/r/pull/1"), true),
            record("Avery", "STEP 02", Some("https://www.github.com/o/r/pull/1/"), false),
        ];

        let grouped = group_submissions(&records);
        assert_eq!(grouped.len(), 1);
        let group = &grouped[0];
        assert!(!group.passed);
        assert_eq!(group.label, "STEP 01 & STEP 02");
        assert_eq!(group.url, "https://github.com/o/r/pull/1");
    }

    #[test]
    fn all_passing_steps_keep_group_passed() {
        let records = vec![
            record("Avery", "STEP 01", Some("https://github.com/o/r/pull/1"), true),
            record("Avery", "STEP 02", Some("https://github.com/o/r/pull/1"), true),
        ];
        assert!(group_submissions(&records)[0].passed);
    }

    #[test]
    fn flags_are_or_folded_and_first_row_is_representative() {
        let first = record("Avery", "STEP 03", Some("https://github.com/o/r/pull/2"), true);
        let mut second = record("Avery", "STEP 04", Some("https://www.github.com/o/r/pull/2"), true);
        second.the_best = true;
        second.pass_multiple = true;

        let grouped = group_submissions(&[first, second]);
        let group = &grouped[0];
        assert!(group.the_best);
        assert!(group.pass_multiple);
        assert!(!group.perfect);
        assert_eq!(group.original_url, "https://github.com/o/r/pull/2");
    }

    #[test]
    fn different_students_or_urls_stay_separate() {
        let records = vec![
            record("Avery", "STEP 01", Some("https://github.com/o/r/pull/1"), true),
            record("Jules", "STEP 01", Some("https://github.com/o/r/pull/1"), true),
            record("Avery", "STEP 03", Some("https://github.com/o/s/pull/1"), true),
        ];
        let grouped = group_submissions(&records);
        let keys: Vec<_> = grouped
            .iter()
            .map(|g| (g.student.as_str(), g.url.as_str()))
            .collect();
        assert_eq!(
            keys,
            [
                ("Avery", "https://github.com/o/r/pull/1"),
                ("Jules", "https://github.com/o/r/pull/1"),
                ("Avery", "https://github.com/o/s/pull/1"),
            ]
        );
    }

    #[test]
    fn rows_without_url_are_discarded() {
        let records = vec![
            record("Avery", "STEP 01", None, true),
            record("Avery", "STEP 02", Some("   "), true),
        ];
        assert!(group_submissions(&records).is_empty());
    }
}
