use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::AppData;
use crate::ranking;

#[derive(Debug, Clone)]
pub struct StandingRecord {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub login: String,
    pub display_name: String,
    pub completed: i32,
    pub best_practices: i32,
    pub score: i32,
    pub grade: String,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Stores one ranking run and a standing row per student.
pub async fn publish(
    pool: &PgPool,
    app: &AppData,
    total_assignments: usize,
) -> anyhow::Result<(Uuid, usize)> {
    let run_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO cohort_ranking.runs (id, generated_at, total_assignments)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(run_id)
    .bind(Utc::now())
    .bind(i32::try_from(total_assignments)?)
    .execute(&mut *tx)
    .await?;

    let mut inserted = 0usize;
    for (login, user) in &app.users {
        let standing = ranking::standing(&user.assignments, total_assignments);
        sqlx::query(
            r#"
            INSERT INTO cohort_ranking.standings
            (run_id, login, display_name, completed, best_practices, score, grade)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(run_id)
        .bind(login)
        .bind(&user.name)
        .bind(i32::try_from(standing.completed)?)
        .bind(i32::try_from(standing.best_practices)?)
        .bind(i32::try_from(user.score)?)
        .bind(user.grade.label())
        .execute(&mut *tx)
        .await?;
        inserted += 1;
    }

    tx.commit().await?;
    Ok((run_id, inserted))
}

pub async fn fetch_history(
    pool: &PgPool,
    login: &str,
    limit: i64,
) -> anyhow::Result<Vec<StandingRecord>> {
    let rows = sqlx::query(
        "SELECT r.id AS run_id, r.generated_at, s.login, s.display_name, \
         s.completed, s.best_practices, s.score, s.grade \
         FROM cohort_ranking.standings s \
         JOIN cohort_ranking.runs r ON r.id = s.run_id \
         WHERE s.login = $1 \
         ORDER BY r.generated_at DESC \
         LIMIT $2",
    )
    .bind(login)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut history = Vec::with_capacity(rows.len());
    for row in rows {
        history.push(StandingRecord {
            run_id: row.get("run_id"),
            generated_at: row.get("generated_at"),
            login: row.get("login"),
            display_name: row.get("display_name"),
            completed: row.get("completed"),
            best_practices: row.get("best_practices"),
            score: row.get("score"),
            grade: row.get("grade"),
        });
    }

    Ok(history)
}
