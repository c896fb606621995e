//! Coupon administration endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::domain::aggregates::coupon::{Coupon, CouponKind};
use crate::domain::value_objects::Money;
use crate::http::{non_negative, positive, ApiError, ApiResult, AppState, PaginatedResponse};
use crate::store::{CouponFilter, NewCoupon};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, max = 32))]
    pub code: String,
    pub kind: CouponKind,
    #[validate(custom = "positive")]
    pub value: Decimal,
    #[validate(custom = "non_negative")]
    #[serde(default)]
    pub min_purchase_value: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

pub async fn create_coupon(
    State(state): State<AppState>,
    Json(request): Json<CreateCouponRequest>,
) -> ApiResult<(StatusCode, Json<Coupon>)> {
    request.validate()?;
    if request.kind == CouponKind::Percentage && request.value > Decimal::ONE_HUNDRED {
        return Err(ApiError::bad_request("A percentage coupon cannot exceed 100"));
    }
    let coupon = state
        .coupons
        .create(NewCoupon {
            code: request.code,
            kind: request.kind,
            value: request.value,
            min_purchase_value: Money::new(request.min_purchase_value),
            description: request.description,
            is_active: request.is_active,
            expires_at: request.expires_at,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub is_active: Option<bool>,
}

pub async fn list_coupons(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<PaginatedResponse<Coupon>>> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).min(100);
    let filter = CouponFilter { is_active: params.is_active, page, per_page };
    let (data, total) = state.coupons.list(&filter).await?;
    Ok(Json(PaginatedResponse { data, total, page }))
}
