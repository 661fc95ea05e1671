/*!
 * Audit Log HTTP Handlers
 *
 * ADMIN-only listing of the clinic's audit trail. Cross-clinic rows are
 * invisible by construction: the row-level policy scopes the query to the
 * bound clinic.
 */

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::bind_clinic,
    handlers::auth::AppState,
    handlers::patients::resolve_limit,
    models::{AuditLogFilter, AuthPrincipal, Role},
    services::AuditService,
    utils::{AppError, Result},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Paginated audit listing
///
/// GET /audit?page&limit&action&entityType&userId
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Query(query): Query<AuditListQuery>,
) -> Result<impl IntoResponse> {
    if principal.role != Role::Admin {
        return Err(AppError::Forbidden(
            "Only administrators can read the audit trail".to_string(),
        ));
    }

    let page = query.page.unwrap_or(1).max(1);
    let limit = resolve_limit(query.limit)?;

    let filter = AuditLogFilter {
        action: query.action,
        entity_type: query.entity_type,
        user_id: query.user_id,
    };

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let result = AuditService::list(&mut tx, principal.clinic_id, &filter, page, limit).await?;
    tx.commit().await?;

    Ok(Json(result))
}
