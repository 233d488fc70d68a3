//! API request handlers for the orders service

use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use brewclub_common::{Error, IngredientKind, NewIngredient, Supplier, SupplierOrderStatus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    aggregation, cart,
    checkout::{checkout, order_detail},
    config::Config,
    csv_export::export_supplier_order,
    csv_import::{import_csv, ImportRegistry, COLUMNS},
    models::{
        AddToCartRequest, CartDeleteRequest, CheckoutResponse, CreateIngredientRequest,
        CreateSupplierOrderRequest, CreateSupplierRequest, ImportFormatResponse,
        IngredientLine, IngredientResponse, OrderPageResponse, SessionResponse,
        SupplierOrderResponse, SupplierOrdersListResponse, SuppliersListResponse,
        UpdateStatusRequest,
    },
    notifier::{ConfirmationTemplate, Notifier},
    session::{Member, SessionId},
    storage::Storage,
};

/// Shared application state
pub struct AppState {
    pub storage: Mutex<Storage>,
    pub orders_enabled: bool,
    pub cart_ttl_secs: u64,
    pub notifier: Box<dyn Notifier>,
    pub confirmation: ConfirmationTemplate,
    pub import_registry: ImportRegistry,
}

impl AppState {
    pub fn new(storage: Storage, config: &Config, notifier: Box<dyn Notifier>) -> Self {
        Self {
            storage: Mutex::new(storage),
            orders_enabled: config.orders_enabled,
            cart_ttl_secs: config.cart_ttl_secs,
            notifier,
            confirmation: ConfirmationTemplate {
                subject: config.confirmation_subject.clone(),
                body: config.confirmation_template.clone(),
            },
            import_registry: ImportRegistry::standard(),
        }
    }

    fn ensure_orders_enabled(&self) -> Result<(), ApiError> {
        if self.orders_enabled {
            Ok(())
        } else {
            Err(Error::OrdersDisabled.into())
        }
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": self.message
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Internal error: {:#}", err);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
            details: None,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound(_) | Error::UnknownModel(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) | Error::DuplicateIngredient(_) => StatusCode::CONFLICT,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Internal error: {}", err);
        }

        let details = match &err {
            Error::InvalidOrder(lines) => serde_json::to_value(lines).ok(),
            _ => None,
        };

        ApiError {
            status,
            message: err.to_string(),
            details,
        }
    }
}

/// Rejects the request when ordering is switched off
pub struct OrdersOpen;

impl FromRequestParts<Arc<AppState>> for OrdersOpen {
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        state.ensure_orders_enabled().map(|_| OrdersOpen)
    }
}

fn ingredient_kind(slug: &str) -> Result<IngredientKind, ApiError> {
    IngredientKind::from_slug(slug).ok_or_else(|| ApiError {
        status: StatusCode::NOT_FOUND,
        message: format!("No ordering page for {}", slug),
        details: None,
    })
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "orders-service"
    }))
}

/// Issue a fresh session id for a cart
pub async fn create_session_handler() -> (StatusCode, Json<SessionResponse>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!("Issued session {}", session_id);
    (StatusCode::CREATED, Json(SessionResponse { session_id }))
}

// Catalog

pub async fn create_supplier_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<Supplier>), ApiError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Supplier name is required", None));
    }

    let supplier = Supplier::new(name);
    let mut storage = state.storage.lock().await;
    if storage.create_supplier(&supplier).await? {
        Ok((StatusCode::CREATED, Json(supplier)))
    } else {
        Err(ApiError {
            status: StatusCode::CONFLICT,
            message: format!("Supplier already exists: {}", supplier.name),
            details: None,
        })
    }
}

pub async fn list_suppliers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuppliersListResponse>, ApiError> {
    let mut storage = state.storage.lock().await;
    let suppliers = storage.list_suppliers().await?;
    let total = suppliers.len();

    Ok(Json(SuppliersListResponse { suppliers, total }))
}

pub async fn create_ingredient_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<IngredientResponse>), ApiError> {
    info!("Creating {} {}", payload.kind, payload.name);

    let new = NewIngredient {
        name: payload.name.trim().to_string(),
        kind: payload.kind,
        unit_cost: payload.unit_cost,
        unit_size: payload.unit_size,
        supplier: payload.supplier.trim().to_string(),
    };
    new.validate()?;

    let mut storage = state.storage.lock().await;
    if storage.get_supplier(&new.supplier).await?.is_none() {
        return Err(Error::NotFound(format!("Supplier {}", new.supplier)).into());
    }

    let name = new.name.clone();
    let ingredient = storage
        .create_ingredient(new)
        .await?
        .ok_or(Error::DuplicateIngredient(name))?;

    Ok((StatusCode::CREATED, Json(IngredientResponse { ingredient })))
}

pub async fn get_ingredient_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<IngredientResponse>, ApiError> {
    let mut storage = state.storage.lock().await;
    let ingredient = storage
        .get_ingredient(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Ingredient {}", id)))?;

    Ok(Json(IngredientResponse { ingredient }))
}

// Ordering

/// `GET /api/orders/{key}`: an ordering page for a kind slug, or the
/// member's own order for a numeric id
pub async fn order_page_handler(
    State(state): State<Arc<AppState>>,
    member: Member,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(kind) = IngredientKind::from_slug(&key) {
        state.ensure_orders_enabled()?;
        let session = SessionId::from_headers(&headers)?;
        return Ok(ordering_page(&state, kind, &session).await?.into_response());
    }

    let order_id = key.parse::<u64>().map_err(|_| Error::NotFound(format!("Order {}", key)))?;

    let mut storage = state.storage.lock().await;
    let detail = order_detail(&mut storage, order_id, &member).await?;
    Ok(Json(detail).into_response())
}

async fn ordering_page(
    state: &AppState,
    kind: IngredientKind,
    session: &SessionId,
) -> Result<Json<OrderPageResponse>, ApiError> {
    let mut storage = state.storage.lock().await;
    let lines = storage
        .list_ingredients(kind)
        .await?
        .into_iter()
        .map(IngredientLine::from)
        .collect();
    let current = storage.load_cart(&session.0).await?;
    let cart = cart::view(&mut storage, &current).await?;

    Ok(Json(OrderPageResponse {
        kind,
        title: kind.title(),
        lines,
        cart,
    }))
}

/// Validate an ordering page submission and add it to the cart
pub async fn add_to_cart_handler(
    _open: OrdersOpen,
    State(state): State<Arc<AppState>>,
    member: Member,
    session: SessionId,
    Path(slug): Path<String>,
    Json(payload): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<cart::CartView>), ApiError> {
    let kind = ingredient_kind(&slug)?;

    let mut storage = state.storage.lock().await;
    let catalog = storage.list_ingredients(kind).await?;

    let lines = cart::validate_submission(kind, &catalog, &payload.items).map_err(|errors| {
        warn!(
            "Rejected {} submission from {}: {} error(s)",
            kind,
            member.id,
            errors.len()
        );
        ApiError::bad_request(
            "Please correct the errors below",
            serde_json::to_value(&errors).ok(),
        )
    })?;

    let current = cart::add_items(&mut storage, &session.0, &lines, state.cart_ttl_secs).await?;
    let view = cart::view(&mut storage, &current).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn cart_handler(
    _open: OrdersOpen,
    State(state): State<Arc<AppState>>,
    _member: Member,
    session: SessionId,
) -> Result<Json<cart::CartView>, ApiError> {
    let mut storage = state.storage.lock().await;
    let current = storage.load_cart(&session.0).await?;
    Ok(Json(cart::view(&mut storage, &current).await?))
}

/// Remove a cart line. Bad requests are logged and treated as no-ops.
pub async fn cart_delete_handler(
    _open: OrdersOpen,
    State(state): State<Arc<AppState>>,
    _member: Member,
    session: SessionId,
    body: Bytes,
) -> Result<Json<cart::CartView>, ApiError> {
    let request = serde_json::from_slice::<CartDeleteRequest>(&body).unwrap_or_else(|e| {
        warn!("cart delete: unreadable request body: {}", e);
        CartDeleteRequest::default()
    });

    let mut storage = state.storage.lock().await;
    let current = cart::remove_item(
        &mut storage,
        &session.0,
        request.ingredient_id.as_ref(),
        state.cart_ttl_secs,
    )
    .await?;

    Ok(Json(cart::view(&mut storage, &current).await?))
}

pub async fn review_handler(
    _open: OrdersOpen,
    State(state): State<Arc<AppState>>,
    _member: Member,
    session: SessionId,
) -> Result<Json<cart::CartView>, ApiError> {
    let mut storage = state.storage.lock().await;
    let current = storage.load_cart(&session.0).await?;
    Ok(Json(cart::view(&mut storage, &current).await?))
}

pub async fn checkout_handler(
    _open: OrdersOpen,
    State(state): State<Arc<AppState>>,
    member: Member,
    session: SessionId,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    info!("Checkout for {} (session {})", member.id, session.0);

    let mut storage = state.storage.lock().await;
    let result = checkout(
        &mut storage,
        state.notifier.as_ref(),
        &state.confirmation,
        &session.0,
        &member,
    )
    .await;

    match result {
        Ok(order) => Ok((StatusCode::CREATED, Json(CheckoutResponse { order_id: order.id }))),
        Err(Error::InvalidOrder(lines)) => {
            warn!("Checkout for {} failed on {} line(s)", member.id, lines.len());
            Err(ApiError::bad_request(
                "Could not complete your order",
                serde_json::to_value(&lines).ok(),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

// Supplier orders

/// Aggregate outstanding items, then list pending supplier orders
pub async fn list_supplier_orders_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SupplierOrdersListResponse>, ApiError> {
    let mut storage = state.storage.lock().await;
    let report = aggregation::aggregate(&mut storage).await?;
    let orders = aggregation::pending_orders(&mut storage).await?;
    let total = orders.len();

    Ok(Json(SupplierOrdersListResponse {
        aggregation: report,
        orders,
        total,
    }))
}

pub async fn create_supplier_order_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSupplierOrderRequest>,
) -> Result<(StatusCode, Json<aggregation::SupplierOrderDetail>), ApiError> {
    info!(
        "Creating supplier order for {} from {} item(s)",
        payload.supplier,
        payload.order_item_ids.len()
    );

    let mut storage = state.storage.lock().await;
    let detail =
        aggregation::create_supplier_order(&mut storage, &payload.supplier, &payload.order_item_ids)
            .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_supplier_order_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<aggregation::SupplierOrderDetail>, ApiError> {
    let mut storage = state.storage.lock().await;
    Ok(Json(aggregation::supplier_order_detail(&mut storage, id).await?))
}

pub async fn update_supplier_order_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<SupplierOrderResponse>, ApiError> {
    let status = payload
        .status
        .parse::<SupplierOrderStatus>()
        .map_err(|_| ApiError::bad_request(format!("Unknown status: {}", payload.status), None))?;

    let mut storage = state.storage.lock().await;
    let order = aggregation::update_status(&mut storage, id, status).await?;

    Ok(Json(SupplierOrderResponse { order }))
}

pub async fn export_supplier_order_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError> {
    let mut storage = state.storage.lock().await;
    let body = export_supplier_order(&mut storage, id).await?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"supplier-order-{}.csv\"", id),
        ),
    ];
    Ok((headers, body).into_response())
}

// Import

pub async fn import_format_handler(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
) -> Result<Json<ImportFormatResponse>, ApiError> {
    state.import_registry.resolve(&model)?;

    Ok(Json(ImportFormatResponse {
        model,
        columns: COLUMNS.to_vec(),
        has_header: true,
    }))
}

pub async fn import_handler(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    body: String,
) -> Result<Json<crate::csv_import::ImportReport>, ApiError> {
    let kind = state.import_registry.resolve(&model)?;
    info!("Importing {} rows ({} bytes)", model, body.len());

    let mut storage = state.storage.lock().await;
    Ok(Json(import_csv(&mut storage, kind, &body).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewclub_common::InvalidLine;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (Error::NotFound("Order 1".to_string()), StatusCode::NOT_FOUND),
            (Error::UnknownModel("yeast".to_string()), StatusCode::NOT_FOUND),
            (Error::Conflict("claimed".to_string()), StatusCode::CONFLICT),
            (Error::DuplicateIngredient("Munich".to_string()), StatusCode::CONFLICT),
            (Error::InvalidQuantity("-1".to_string()), StatusCode::BAD_REQUEST),
            (Error::OrdersDisabled, StatusCode::BAD_REQUEST),
            (
                Error::Other(anyhow::anyhow!("connection refused")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_invalid_order_carries_lines() {
        let err = ApiError::from(Error::InvalidOrder(vec![InvalidLine {
            ingredient_name: "Gone Malt".to_string(),
            reason: "No such ingredient".to_string(),
        }]));

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let details = err.details.unwrap();
        assert_eq!(details[0]["ingredient_name"], "Gone Malt");
    }
}
