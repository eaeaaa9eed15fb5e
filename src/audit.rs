//! Append-only audit trail of state-changing actions.

use diesel_async::RunQueryDsl;
use serde_json::Value;

use crate::{core::db::DbPool, models::CreateAuditLogEntity, schema::audit_log};

/// Appends one audit entry. Fire-and-forget: a failed append is logged and
/// swallowed so it can never fail the business operation that triggered it.
pub async fn record(
    pool: &DbPool,
    action: &str,
    entity_type: &str,
    entity_id: impl ToString,
    actor: &str,
    detail: Value,
) {
    let entry = CreateAuditLogEntity {
        action: action.to_string(),
        entity_type: entity_type.to_string(),
        entity_id: entity_id.to_string(),
        actor: actor.to_string(),
        detail,
    };

    let mut conn = match pool.get().await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::warn!("Audit append skipped, no DB connection: {err}");
            return;
        }
    };

    if let Err(err) = diesel::insert_into(audit_log::table)
        .values(&entry)
        .execute(&mut conn)
        .await
    {
        tracing::warn!(
            "Audit append failed for action '{}' on {} {}: {err}",
            entry.action,
            entry.entity_type,
            entry.entity_id
        );
    }
}
