//! Catalog endpoints: public browsing plus admin CRUD.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::Money;
use crate::http::{non_negative, ApiError, ApiResult, AppState, PaginatedResponse};
use crate::store::{Catalog, NewProduct, ProductFilter, ProductUpdate};
use crate::Error;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub in_promotion: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<PaginatedResponse<Product>>> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).min(100);
    let filter = ProductFilter {
        search: params.search,
        in_promotion: params.in_promotion,
        min_price: params.min_price,
        max_price: params.max_price,
        page,
        per_page,
    };
    let (data, total) = state.catalog.list(&filter).await?;
    Ok(Json(PaginatedResponse { data, total, page }))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    let product = state.catalog.product(id).await?.ok_or(Error::ProductNotFound)?;
    Ok(Json(product))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub main_image_url: Option<String>,
    #[validate(custom = "non_negative")]
    pub list_price: Decimal,
    #[validate(custom = "non_negative")]
    pub promotional_price: Option<Decimal>,
    #[serde(default)]
    pub promotion_active: bool,
    #[serde(default)]
    pub stock_quantity: u32,
}

impl ProductRequest {
    fn check(&self) -> ApiResult<()> {
        self.validate()?;
        if self.promotion_active && self.promotional_price.is_none() {
            return Err(ApiError::bad_request("An active promotion requires a promotional price"));
        }
        Ok(())
    }
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<ProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    request.check()?;
    let sku = format!("SKU-{:08}", rand::random::<u32>());
    let product = state
        .catalog
        .create(NewProduct {
            sku,
            name: request.name,
            description: request.description,
            main_image_url: request.main_image_url,
            list_price: Money::new(request.list_price),
            promotional_price: request.promotional_price.map(Money::new),
            promotion_active: request.promotion_active,
            stock_quantity: request.stock_quantity,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ProductRequest>,
) -> ApiResult<Json<Product>> {
    request.check()?;
    let product = state
        .catalog
        .update(
            id,
            ProductUpdate {
                name: request.name,
                description: request.description,
                main_image_url: request.main_image_url,
                list_price: Money::new(request.list_price),
                promotional_price: request.promotional_price.map(Money::new),
                promotion_active: request.promotion_active,
                stock_quantity: request.stock_quantity,
            },
        )
        .await?
        .ok_or(Error::ProductNotFound)?;
    Ok(Json(product))
}

pub async fn archive_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.catalog.archive(id).await? {
        return Err(Error::ProductNotFound.into());
    }
    Ok(StatusCode::NO_CONTENT)
}
