use std::cmp::Ordering;
use std::collections::BTreeMap;

use clap::ValueEnum;

use crate::models::{Assignment, Grade, RankedStudent, Student};

const COMPLETION_SCORE: u32 = 30;
const BEST_PRACTICE_SCORE: u32 = 40;

const COMPLETION_100_BONUS: u32 = 100;
const COMPLETION_90_BONUS: u32 = 50;
const COMPLETION_80_BONUS: u32 = 25;

/// Score inputs and outputs for one student.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standing {
    pub completed: usize,
    pub best_practices: usize,
    pub completion_rate: f64,
    pub score: u32,
    pub grade: Grade,
}

/// Completed assignments as a percentage of `total_assignments`.
///
/// An empty curriculum yields 0 so no student is promoted by a zero
/// denominator.
pub fn completion_rate(completed: usize, total_assignments: usize) -> f64 {
    if total_assignments == 0 {
        return 0.0;
    }
    completed as f64 * 100.0 / total_assignments as f64
}

pub fn completion_bonus(completion_rate: f64) -> u32 {
    if completion_rate >= 100.0 {
        COMPLETION_100_BONUS
    } else if completion_rate >= 90.0 {
        COMPLETION_90_BONUS
    } else if completion_rate >= 80.0 {
        COMPLETION_80_BONUS
    } else {
        0
    }
}

pub fn score(completed: usize, best_practices: usize, completion_rate: f64) -> u32 {
    let base = completed as u32 * COMPLETION_SCORE + best_practices as u32 * BEST_PRACTICE_SCORE;
    base + completion_bonus(completion_rate)
}

/// First matching tier, checked from Black down to White.
pub fn grade(completion_rate: f64, best_practices: usize) -> Grade {
    if completion_rate >= 100.0 && best_practices >= 2 {
        Grade::Black
    } else if completion_rate >= 90.0 && best_practices >= 1 {
        Grade::Red
    } else if completion_rate >= 80.0 {
        Grade::Brown
    } else if completion_rate >= 55.0 {
        Grade::Purple
    } else if completion_rate >= 35.0 {
        Grade::Blue
    } else {
        Grade::White
    }
}

pub fn standing(assignments: &[Assignment], total_assignments: usize) -> Standing {
    let completed = assignments.iter().filter(|a| a.passed).count();
    let best_practices = assignments.iter().filter(|a| a.the_best).count();
    let rate = completion_rate(completed, total_assignments);

    Standing {
        completed,
        best_practices,
        completion_rate: rate,
        score: score(completed, best_practices, rate),
        grade: grade(rate, best_practices),
    }
}

/// Attaches score and grade to every student.
pub fn rank_students(
    students: BTreeMap<String, Student>,
    total_assignments: usize,
) -> BTreeMap<String, RankedStudent> {
    students
        .into_iter()
        .map(|(login, student)| {
            let standing = standing(&student.assignments, total_assignments);
            (
                login,
                RankedStudent {
                    name: student.name,
                    github: student.github,
                    assignments: student.assignments,
                    score: standing.score,
                    grade: standing.grade,
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    Name,
    Score,
    Bp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Students ordered for display; ties fall back to the handle.
pub fn leaderboard<'a>(
    users: &'a BTreeMap<String, RankedStudent>,
    key: SortKey,
    direction: SortDirection,
) -> Vec<(&'a str, &'a RankedStudent)> {
    let mut rows: Vec<(&str, &RankedStudent)> =
        users.iter().map(|(login, user)| (login.as_str(), user)).collect();

    rows.sort_by(|(a_login, a), (b_login, b)| {
        let primary = match key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Score => a.score.cmp(&b.score),
            SortKey::Bp => best_practice_count(a).cmp(&best_practice_count(b)),
        };
        let primary = match direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        match primary {
            Ordering::Equal => a_login.cmp(b_login),
            other => other,
        }
    });
    rows
}

pub fn best_practice_count(user: &RankedStudent) -> usize {
    user.assignments.iter().filter(|a| a.the_best).count()
}
