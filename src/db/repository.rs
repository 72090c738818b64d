//! Append-only ledger of risk scores and analyst feedback.
//!
//! There are no update or delete paths; the schema triggers reject them.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::{ExplanationTree, FeedbackRecord, OutcomeLabel, RiskLevel, RiskScore, ScoreComponent};

fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw}: {e}")))
}

// ═══════════════════════════════════════════
// Risk Score Repository
// ═══════════════════════════════════════════

pub fn insert_risk_score(conn: &Connection, score: &RiskScore) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO risk_scores (id, document_id, version, score, risk_level, weight_breakdown,
         explanation_tree, industry, jurisdiction, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            score.score_id.to_string(),
            score.document_id.to_string(),
            score.version,
            score.score,
            score.risk_level.as_str(),
            serde_json::to_string(&score.weight_breakdown)?,
            serde_json::to_string(&score.explanation_tree)?,
            score.industry,
            score.jurisdiction,
            score.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Version the next stored score of `document_id` gets (1 for the first).
pub fn next_score_version(conn: &Connection, document_id: &Uuid) -> Result<u32, DatabaseError> {
    let current: Option<u32> = conn.query_row(
        "SELECT MAX(version) FROM risk_scores WHERE document_id = ?1",
        params![document_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(current.unwrap_or(0) + 1)
}

const RISK_SCORE_COLUMNS: &str = "id, document_id, version, score, risk_level, weight_breakdown,
    explanation_tree, industry, jurisdiction, created_at";

/// All retained versions, oldest first.
pub fn list_risk_scores(conn: &Connection, document_id: &Uuid) -> Result<Vec<RiskScore>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RISK_SCORE_COLUMNS} FROM risk_scores WHERE document_id = ?1 ORDER BY version ASC"
    ))?;
    let rows = stmt
        .query_map(params![document_id.to_string()], risk_score_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(risk_score_from_row).collect()
}

pub fn latest_risk_score(conn: &Connection, document_id: &Uuid) -> Result<Option<RiskScore>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {RISK_SCORE_COLUMNS} FROM risk_scores WHERE document_id = ?1
                 ORDER BY version DESC LIMIT 1"
            ),
            params![document_id.to_string()],
            risk_score_row,
        )
        .optional()?;
    row.map(risk_score_from_row).transpose()
}

// Internal row type for RiskScore mapping
struct RiskScoreRow {
    id: String,
    document_id: String,
    version: u32,
    score: f64,
    risk_level: String,
    weight_breakdown: String,
    explanation_tree: String,
    industry: Option<String>,
    jurisdiction: Option<String>,
    created_at: String,
}

fn risk_score_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RiskScoreRow> {
    Ok(RiskScoreRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        version: row.get(2)?,
        score: row.get(3)?,
        risk_level: row.get(4)?,
        weight_breakdown: row.get(5)?,
        explanation_tree: row.get(6)?,
        industry: row.get(7)?,
        jurisdiction: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn risk_score_from_row(row: RiskScoreRow) -> Result<RiskScore, DatabaseError> {
    let weight_breakdown: BTreeMap<ScoreComponent, f64> = serde_json::from_str(&row.weight_breakdown)?;
    let explanation_tree: ExplanationTree = serde_json::from_str(&row.explanation_tree)?;
    Ok(RiskScore {
        document_id: parse_uuid(&row.document_id)?,
        score_id: parse_uuid(&row.id)?,
        version: row.version,
        score: row.score,
        risk_level: RiskLevel::from_str(&row.risk_level)?,
        weight_breakdown,
        explanation_tree,
        industry: row.industry,
        jurisdiction: row.jurisdiction,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

// ═══════════════════════════════════════════
// Feedback Repository
// ═══════════════════════════════════════════

pub fn insert_feedback(conn: &Connection, record: &FeedbackRecord) -> Result<(), DatabaseError> {
    let suggestions = record
        .adjustment_suggestions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO feedback_records (id, document_id, score_id, original_score, corrected_score,
         outcome_label, user_notes, adjustment_suggestions, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.feedback_id.to_string(),
            record.document_id.to_string(),
            record.score_id.to_string(),
            record.original_score,
            record.corrected_score,
            record.outcome_label.map(|l| l.as_str()),
            record.user_notes,
            suggestions,
            record.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn list_feedback(conn: &Connection, document_id: &Uuid) -> Result<Vec<FeedbackRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, score_id, original_score, corrected_score, outcome_label,
         user_notes, adjustment_suggestions, created_at
         FROM feedback_records WHERE document_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![document_id.to_string()], |row| {
            Ok(FeedbackRow {
                id: row.get(0)?,
                document_id: row.get(1)?,
                score_id: row.get(2)?,
                original_score: row.get(3)?,
                corrected_score: row.get(4)?,
                outcome_label: row.get(5)?,
                user_notes: row.get(6)?,
                adjustment_suggestions: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(feedback_from_row).collect()
}

// Internal row type for FeedbackRecord mapping
struct FeedbackRow {
    id: String,
    document_id: String,
    score_id: String,
    original_score: f64,
    corrected_score: Option<f64>,
    outcome_label: Option<String>,
    user_notes: Option<String>,
    adjustment_suggestions: Option<String>,
    created_at: String,
}

fn feedback_from_row(row: FeedbackRow) -> Result<FeedbackRecord, DatabaseError> {
    Ok(FeedbackRecord {
        feedback_id: parse_uuid(&row.id)?,
        document_id: parse_uuid(&row.document_id)?,
        score_id: parse_uuid(&row.score_id)?,
        original_score: row.original_score,
        corrected_score: row.corrected_score,
        outcome_label: row.outcome_label.as_deref().map(OutcomeLabel::from_str).transpose()?,
        user_notes: row.user_notes,
        adjustment_suggestions: row
            .adjustment_suggestions
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
