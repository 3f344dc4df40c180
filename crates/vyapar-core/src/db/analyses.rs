//! Analysis history operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database, MAX_HISTORY_LIMIT};
use crate::error::{Error, Result};
use crate::models::{AnalysisResult, AnalysisSummary, Verdict};

impl Database {
    /// Store a result under a caller id and return its history id
    pub fn save_analysis(&self, user_id: &str, result: &AnalysisResult) -> Result<i64> {
        let conn = self.conn()?;
        let json = serde_json::to_string(result)?;

        conn.execute(
            r#"
            INSERT INTO analyses (user_id, business_idea, location, budget, verdict, score, result)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                result.input.business_idea,
                result.input.location,
                result.input.budget,
                result.verdict.as_str(),
                result.score,
                json
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Most recent analyses for a caller, newest first
    pub fn list_analyses(&self, user_id: &str, limit: u32) -> Result<Vec<AnalysisSummary>> {
        let conn = self.conn()?;
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);

        let mut stmt = conn.prepare(
            r#"
            SELECT id, created_at, business_idea, location, budget, verdict, score
            FROM analyses
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(params![user_id, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, u8>(6)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, created_at, business_idea, location, budget, verdict, score) = row?;
            summaries.push(AnalysisSummary {
                id,
                created_at: parse_datetime(&created_at),
                business_idea,
                location,
                budget,
                verdict: parse_verdict(&verdict)?,
                score,
            });
        }
        Ok(summaries)
    }

    /// One stored result, with its history id filled in
    pub fn get_analysis(&self, user_id: &str, id: i64) -> Result<Option<AnalysisResult>> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT result FROM analyses WHERE id = ? AND user_id = ?",
                params![id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|json| {
            let mut result: AnalysisResult = serde_json::from_str(&json)?;
            result.id = Some(id);
            Ok(result)
        })
        .transpose()
    }

    /// Delete one stored result; returns whether anything was removed
    pub fn delete_analysis(&self, user_id: &str, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM analyses WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        Ok(deleted > 0)
    }

    /// Number of stored analyses for a caller
    pub fn count_analyses(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM analyses WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?)
    }
}

fn parse_verdict(s: &str) -> Result<Verdict> {
    s.parse()
        .map_err(|e: String| Error::InvalidData(format!("stored verdict: {}", e)))
}
