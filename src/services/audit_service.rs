/*!
 * Audit Service
 *
 * Appends scrubbed audit records and serves the ADMIN-only listing. The
 * append takes an executor so write paths can put the audit row in the same
 * transaction as the mutation it describes; identity flows pass their own
 * transaction the same way.
 */

use uuid::Uuid;

use crate::models::{AuditLog, AuditLogFilter, AuditLogPage, EntityType};
use crate::utils::{scrub_phi, Result};

pub struct AuditService;

impl AuditService {
    /// Append an audit record with PHI-scrubbed action text
    ///
    /// The entity reference is stored only in `entity_id`, as an opaque
    /// identifier; the action text is scrubbed of identifiers, emails, and
    /// phone numbers before persistence.
    pub async fn record(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        action: &str,
        entity_type: EntityType,
        entity_id: Option<Uuid>,
    ) -> Result<()> {
        let scrubbed = scrub_phi(action);
        let entity_ref = entity_id.map(|id| id.to_string());
        AuditLog::append(
            executor,
            user_id,
            &scrubbed,
            entity_type,
            entity_ref.as_deref(),
        )
        .await?;
        Ok(())
    }

    /// Paginated audit listing for clinic administrators
    ///
    /// Runs inside the caller's clinic-bound transaction; the queries also
    /// scope by clinic explicitly, mirroring the rest of the data layer.
    pub async fn list(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        clinic_id: Uuid,
        filter: &AuditLogFilter,
        page: i64,
        limit: i64,
    ) -> Result<AuditLogPage> {
        let data = AuditLog::list_page(&mut **tx, clinic_id, filter, page, limit).await?;
        let total = AuditLog::count(&mut **tx, clinic_id, filter).await?;

        Ok(AuditLogPage {
            data,
            total,
            page,
            limit,
        })
    }
}
