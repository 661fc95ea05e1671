/*!
 * Staff User HTTP Handlers
 */

use axum::{extract::State, response::IntoResponse, Extension, Json};

use crate::{
    db::bind_clinic,
    handlers::auth::AppState,
    models::{AuthPrincipal, User, UserDto},
    utils::{AppError, Result},
};

/// Current staff principal
///
/// GET /users/me
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let user = User::find_by_id(&mut *tx, principal.id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tx.commit().await?;

    Ok(Json(UserDto::from(user)))
}
