//! Repository for the `audit_events` table.
//!
//! Rows are append-mostly: nothing here mutates a written event except
//! [`AuditRepo::set_flagged`], and nothing deletes except the retention
//! sweep, which refuses flagged rows by construction.

use medlock_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::audit::{AuditEvent, AuditQuery, CreateAuditEvent};

// ---------------------------------------------------------------------------
// Shared column lists
// ---------------------------------------------------------------------------

/// Column list for `audit_events` SELECT queries.
const COLUMNS: &str = "\
    id, actor_user_id, subject_type, subject_id, action, description, \
    details, source_ip, user_agent, flagged, occurred_at";

/// Column list for INSERT (excludes auto-generated `id`, `flagged`, `occurred_at`).
const INSERT_COLUMNS: &str = "\
    actor_user_id, subject_type, subject_id, action, description, \
    details, source_ip, user_agent";

// ---------------------------------------------------------------------------
// AuditRepo
// ---------------------------------------------------------------------------

/// Provides insert and query operations for audit events.
pub struct AuditRepo;

impl AuditRepo {
    /// Insert a single audit event, returning the written row.
    ///
    /// `occurred_at` is assigned by the database at insert time with
    /// sub-second precision.
    pub async fn insert(
        pool: &PgPool,
        entry: &CreateAuditEvent,
    ) -> Result<AuditEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_events ({INSERT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditEvent>(&query)
            .bind(entry.actor_user_id)
            .bind(&entry.subject_type)
            .bind(entry.subject_id)
            .bind(&entry.action)
            .bind(&entry.description)
            .bind(&entry.details)
            .bind(&entry.source_ip)
            .bind(&entry.user_agent)
            .fetch_one(pool)
            .await
    }

    /// Query audit events with filtering and pagination, newest first.
    pub async fn query(pool: &PgPool, params: &AuditQuery) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let limit = params.applied_limit();
        let offset = params.applied_offset();

        let (where_clause, bind_values, bind_idx) = build_filter(params);

        let query = format!(
            "SELECT {COLUMNS} FROM audit_events {where_clause} \
             ORDER BY occurred_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );

        let q = bind_values_as(sqlx::query_as::<_, AuditEvent>(&query), &bind_values);
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count audit events matching the given filter (for pagination metadata).
    pub async fn count(pool: &PgPool, params: &AuditQuery) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, _) = build_filter(params);

        let query = format!("SELECT COUNT(*)::BIGINT FROM audit_events {where_clause}");

        let q = bind_values_scalar(sqlx::query_scalar::<_, i64>(&query), &bind_values);
        q.fetch_one(pool).await
    }

    /// Full trail for one subject, newest first.
    pub async fn subject_trail(
        pool: &PgPool,
        subject_type: &str,
        subject_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let params = AuditQuery {
            subject_type: Some(subject_type.to_string()),
            subject_id: Some(subject_id),
            limit,
            offset,
            ..AuditQuery::default()
        };
        Self::query(pool, &params).await
    }

    /// Rolling view of internal security events, newest first.
    pub async fn security_events(
        pool: &PgPool,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let params = AuditQuery {
            subject_type: Some(medlock_core::audit::subjects::SECURITY.to_string()),
            limit,
            offset,
            ..AuditQuery::default()
        };
        Self::query(pool, &params).await
    }

    /// Accesses recorded against one patient since `cutoff`, newest first.
    pub async fn phi_access_for_patient(
        pool: &PgPool,
        patient_id: DbId,
        cutoff: Timestamp,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let params = AuditQuery {
            subject_type: Some(medlock_core::audit::subjects::PATIENT.to_string()),
            subject_id: Some(patient_id),
            from: Some(cutoff),
            limit,
            offset,
            ..AuditQuery::default()
        };
        Self::query(pool, &params).await
    }

    /// Set or clear the flagged bit. Returns `true` if the row was updated.
    pub async fn set_flagged(pool: &PgPool, id: DbId, flagged: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE audit_events SET flagged = $2 WHERE id = $1")
            .bind(id)
            .bind(flagged)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Retention sweep: delete unflagged events older than `cutoff`.
    ///
    /// Flagged rows are exempt unconditionally. Returns the deleted count.
    pub async fn delete_unflagged_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM audit_events WHERE flagged = false AND occurred_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Filter assembly
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically-built audit queries.
enum BindValue {
    BigInt(i64),
    Text(String),
    Bool(bool),
    Timestamp(Timestamp),
}

/// Assemble the WHERE clause for an [`AuditQuery`], one condition per
/// active filter.
///
/// Returns `(where_clause, bind_values, next_bind_index)`. With no active
/// filters the clause is empty; otherwise it begins with `WHERE `.
fn build_filter(params: &AuditQuery) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if let Some(actor_user_id) = params.actor_user_id {
        conditions.push(format!("actor_user_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::BigInt(actor_user_id));
    }

    if let Some(ref subject_type) = params.subject_type {
        conditions.push(format!("subject_type = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(subject_type.clone()));
    }

    if let Some(subject_id) = params.subject_id {
        conditions.push(format!("subject_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::BigInt(subject_id));
    }

    if let Some(ref action) = params.action {
        conditions.push(format!("action = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(action.clone()));
    }

    if let Some(flagged) = params.flagged {
        conditions.push(format!("flagged = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Bool(flagged));
    }

    if let Some(from) = params.from {
        conditions.push(format!("occurred_at >= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(from));
    }

    if let Some(to) = params.to {
        conditions.push(format!("occurred_at <= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(to));
    }

    if let Some(ref search) = params.search {
        conditions.push(format!(
            "(description ILIKE ${bind_idx} OR details::text ILIKE ${bind_idx})"
        ));
        bind_idx += 1;
        bind_values.push(BindValue::Text(format!("%{search}%")));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values, bind_idx)
}

/// Apply collected [`BindValue`]s to a row query, in filter order.
fn bind_values_as<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Bool(v) => q = q.bind(*v),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

/// Apply collected [`BindValue`]s to a scalar (COUNT) query.
fn bind_values_scalar<'q>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Bool(v) => q = q.bind(*v),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}
