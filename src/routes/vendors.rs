//! Vendor onboarding and admin review

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthUser, Permission};
use crate::db;
use crate::error::{ApiResponse, AppError, Result};
use crate::models::{Partner, PartnerStatus};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VendorApplication {
    pub business_name: String,
    pub contact_email: String,
    pub phone: String,
    pub address: String,
}

impl VendorApplication {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("business_name", &self.business_name),
            ("contact_email", &self.contact_email),
            ("phone", &self.phone),
            ("address", &self.address),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} is required", name)));
            }
        }
        if !self.contact_email.contains('@') {
            return Err(AppError::Validation(
                "contact_email is not an email address".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/v1/vendors
pub async fn apply(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<VendorApplication>,
) -> Result<(StatusCode, Json<ApiResponse<Partner>>)> {
    req.validate()?;

    let partner = db::insert_partner(
        &state.db,
        user.user_id,
        req.business_name.trim(),
        req.contact_email.trim(),
        req.phone.trim(),
        req.address.trim(),
    )
    .await?;

    info!(partner_id = %partner.id, user_id = %user.user_id, "Vendor application received");
    Ok((StatusCode::CREATED, ApiResponse::ok(partner)))
}

/// GET /api/v1/admin/vendors/pending
pub async fn pending(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Partner>>>> {
    user.require(Permission::ReviewVendors)?;

    let partners = db::get_partners_by_status(&state.db, PartnerStatus::Pending).await?;
    Ok(ApiResponse::ok(partners))
}

/// POST /api/v1/admin/vendors/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    user: AuthUser,
    Path(partner_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Partner>>> {
    user.require(Permission::ReviewVendors)?;

    let partner = approve_partner(&state.db, partner_id).await?;
    state.cache.roles.invalidate(&partner.user_id).await;

    info!(partner_id = %partner.id, reviewer = %user.user_id, "Vendor approved");
    Ok(ApiResponse::ok(partner))
}

/// POST /api/v1/admin/vendors/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    user: AuthUser,
    Path(partner_id): Path<Uuid>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<ApiResponse<Partner>>> {
    user.require(Permission::ReviewVendors)?;

    let reason = body.and_then(|Json(req)| req.reason);
    let mut conn = state.db.acquire().await?;
    let partner = review(&mut conn, partner_id, PartnerStatus::Rejected, reason.as_deref()).await?;

    info!(partner_id = %partner.id, reviewer = %user.user_id, "Vendor rejected");
    Ok(ApiResponse::ok(partner))
}

/// Approve a partner and give its user the vendor role, both or neither
pub async fn approve_partner(pool: &PgPool, partner_id: Uuid) -> Result<Partner> {
    let mut tx = pool.begin().await?;
    let partner = review(&mut tx, partner_id, PartnerStatus::Approved, None).await?;
    db::grant_vendor_role(&mut *tx, partner.user_id).await?;
    tx.commit().await?;

    Ok(partner)
}

async fn review(
    conn: &mut PgConnection,
    partner_id: Uuid,
    to: PartnerStatus,
    reason: Option<&str>,
) -> Result<Partner> {
    let partner = db::get_partner(&mut *conn, partner_id).await?;
    let from: PartnerStatus = partner
        .status
        .parse()
        .map_err(AppError::Internal)?;

    if !from.can_transition_to(to) {
        return Err(AppError::Conflict(format!(
            "Partner is {} and cannot become {}",
            from.as_str(),
            to.as_str()
        )));
    }

    db::update_partner_status(&mut *conn, partner_id, from, to, reason)
        .await?
        .ok_or_else(|| AppError::Conflict("Partner was reviewed concurrently".to_string()))
}
