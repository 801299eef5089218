use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Serialize;

use crate::summary::ExerciseSummary;

use super::SummaryArchive;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedSummary {
    pub session_id: String,
    pub archived_at: DateTime<Utc>,
    pub summary: ExerciseSummary,
}

fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

fn row_to_archived(row: &Row) -> Result<ArchivedSummary> {
    let archived_at: String = row.get("archived_at")?;
    Ok(ArchivedSummary {
        session_id: row.get("session_id")?,
        archived_at: parse_datetime(&archived_at, "archived_at")?,
        summary: ExerciseSummary {
            date: row.get("completed_at")?,
            exercise_duration_minutes: row.get("duration_minutes")?,
            score_percentage: row.get("score_percentage")?,
            joint_scores: BTreeMap::new(),
        },
    })
}

impl SummaryArchive {
    pub async fn insert_summary(&self, session_id: &str, summary: &ExerciseSummary) -> Result<()> {
        let session_id = session_id.to_string();
        let record = summary.clone();
        let archived_at = Utc::now();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO summaries (session_id, completed_at, duration_minutes, score_percentage, archived_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session_id,
                    record.date,
                    record.exercise_duration_minutes,
                    record.score_percentage,
                    archived_at.to_rfc3339(),
                ],
            )
            .context("failed to insert summary")?;

            for (joint, score) in &record.joint_scores {
                tx.execute(
                    "INSERT INTO joint_scores (session_id, joint, score_percentage)
                     VALUES (?1, ?2, ?3)",
                    params![session_id, joint, score],
                )
                .context("failed to insert joint score")?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// All archived summaries, most recently archived first.
    pub async fn list_summaries(&self) -> Result<Vec<ArchivedSummary>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, completed_at, duration_minutes, score_percentage, archived_at
                 FROM summaries
                 ORDER BY archived_at DESC, rowid DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut archived = Vec::new();
            while let Some(row) = rows.next()? {
                archived.push(row_to_archived(row)?);
            }

            let mut joint_stmt = conn.prepare(
                "SELECT joint, score_percentage FROM joint_scores WHERE session_id = ?1",
            )?;
            for entry in &mut archived {
                let mut rows = joint_stmt.query(params![entry.session_id])?;
                while let Some(row) = rows.next()? {
                    entry
                        .summary
                        .joint_scores
                        .insert(row.get::<_, String>(0)?, row.get::<_, f64>(1)?);
                }
            }

            Ok(archived)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(score: f64, joints: &[(&str, f64)]) -> ExerciseSummary {
        ExerciseSummary {
            date: "2024-05-02T10:15:30+00:00".into(),
            exercise_duration_minutes: 1.5,
            score_percentage: score,
            joint_scores: joints.iter().map(|(j, s)| (j.to_string(), *s)).collect(),
        }
    }

    #[tokio::test]
    async fn stores_and_lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let archive = SummaryArchive::open(dir.path().join("archive.sqlite3")).unwrap();

        let first = summary(70.0, &[("ElbowRight", 70.0)]);
        let second = summary(100.0, &[]);
        archive.insert_summary("a", &first).await.unwrap();
        archive.insert_summary("b", &second).await.unwrap();

        let listed = archive.list_summaries().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, "b");
        assert_eq!(listed[0].summary, second);
        assert_eq!(listed[1].session_id, "a");
        assert_eq!(listed[1].summary, first);
    }

    #[tokio::test]
    async fn duplicate_session_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = SummaryArchive::open(dir.path().join("archive.sqlite3")).unwrap();
        archive.insert_summary("a", &summary(50.0, &[])).await.unwrap();
        assert!(archive.insert_summary("a", &summary(60.0, &[])).await.is_err());
    }

    #[tokio::test]
    async fn reopening_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.sqlite3");
        {
            let archive = SummaryArchive::open(path.clone()).unwrap();
            archive.insert_summary("a", &summary(90.0, &[("WristRight", 90.0)])).await.unwrap();
        }
        let archive = SummaryArchive::open(path).unwrap();
        let listed = archive.list_summaries().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].summary.joint_scores["WristRight"], 90.0);
    }
}
