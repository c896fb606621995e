//! Order endpoints, scoped to the calling customer.

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::domain::aggregates::order::Order;
use crate::http::{ApiResult, AppState, Identity};
use crate::Error;

pub async fn list_orders(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<Order>>> {
    let customer = identity.require_customer()?;
    let orders = state.orders.list(customer).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    let customer = identity.require_customer()?;
    let order = state.orders.find(customer, id).await?.ok_or(Error::OrderNotFound)?;
    Ok(Json(order))
}
