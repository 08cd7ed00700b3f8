use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::form::FormView;
use crate::models::transfer::TransferError;
use crate::services::transfer_service::DraftPatch;
use crate::services::TransferService;

/// Form view tagged with the session it belongs to
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub form: FormView,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub search_term: String,
}

/// Create transfer form routes
pub fn create_transfer_routes() -> Router<TransferService> {
    Router::new()
        .route("/sessions", post(open_session))
        .route("/sessions/{id}", get(get_session).delete(close_session))
        .route("/sessions/{id}/search", post(search_batch))
        .route("/sessions/{id}/draft", patch(update_draft))
        .route("/sessions/{id}/transfer", post(request_transfer))
        .route("/sessions/{id}/confirm", post(confirm_transfer))
        .route("/sessions/{id}/abort", post(abort_transfer))
        .route("/sessions/{id}/clear", post(clear_form))
}

type ErrorResponse = (StatusCode, Json<serde_json::Value>);

type HandlerResult<T> = Result<Json<T>, ErrorResponse>;

fn handle_transfer_error<T>(error: TransferError) -> HandlerResult<T> {
    Err(transfer_error_response(error))
}

fn transfer_error_response(error: TransferError) -> ErrorResponse {
    match error {
        TransferError::SessionNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Session not found",
                "message": format!("Transfer form session '{}' not found or expired", id)
            })),
        ),
        TransferError::NoPendingTransfer => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "No pending transfer",
                "message": "Request a transfer and review it before confirming"
            })),
        ),
        TransferError::InvalidInput(msg) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid input",
                "message": msg
            })),
        ),
        TransferError::ValidationFailed(messages) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "Validation error",
                "message": "One or more fields are invalid",
                "fields": messages
            })),
        ),
        TransferError::RequestFailed(msg) => {
            tracing::error!("ERP request error: {msg}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "ERP error",
                    "message": "The ERP service could not complete the request"
                })),
            )
        }
        e => {
            tracing::error!("Unexpected error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error",
                    "message": "An unexpected error occurred"
                })),
            )
        }
    }
}

fn session_view(id: Uuid, result: Result<FormView, TransferError>) -> HandlerResult<SessionView> {
    match result {
        Ok(form) => Ok(Json(SessionView {
            session_id: id,
            form,
        })),
        Err(e) => handle_transfer_error(e),
    }
}

fn rejected<T>(rejection: JsonRejection) -> HandlerResult<T> {
    handle_transfer_error(TransferError::InvalidInput(rejection.body_text()))
}

/// Open a new transfer form
/// POST /api/transfer/sessions
async fn open_session(State(service): State<TransferService>) -> (StatusCode, Json<SessionView>) {
    let (session_id, form) = service.open_session().await;
    (StatusCode::CREATED, Json(SessionView { session_id, form }))
}

/// Current form view
/// GET /api/transfer/sessions/{id}
async fn get_session(
    State(service): State<TransferService>,
    Path(id): Path<Uuid>,
) -> HandlerResult<SessionView> {
    session_view(id, service.view(id).await)
}

/// Discard a form
/// DELETE /api/transfer/sessions/{id}
async fn close_session(
    State(service): State<TransferService>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    match service.close_session(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(transfer_error_response(e)),
    }
}

/// Search stock by batch number
/// POST /api/transfer/sessions/{id}/search
async fn search_batch(
    State(service): State<TransferService>,
    Path(id): Path<Uuid>,
    request: Result<Json<SearchRequest>, JsonRejection>,
) -> HandlerResult<SessionView> {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return rejected(rejection),
    };
    session_view(id, service.search(id, &request.search_term).await)
}

/// Apply field edits
/// PATCH /api/transfer/sessions/{id}/draft
async fn update_draft(
    State(service): State<TransferService>,
    Path(id): Path<Uuid>,
    patch: Result<Json<DraftPatch>, JsonRejection>,
) -> HandlerResult<SessionView> {
    let Json(patch) = match patch {
        Ok(patch) => patch,
        Err(rejection) => return rejected(rejection),
    };
    session_view(id, service.update_draft(id, patch).await)
}

/// Validate and open the confirmation panel
/// POST /api/transfer/sessions/{id}/transfer
async fn request_transfer(
    State(service): State<TransferService>,
    Path(id): Path<Uuid>,
) -> HandlerResult<SessionView> {
    session_view(id, service.request_transfer(id).await)
}

/// Post the confirmed transfer to the ERP
/// POST /api/transfer/sessions/{id}/confirm
async fn confirm_transfer(
    State(service): State<TransferService>,
    Path(id): Path<Uuid>,
) -> HandlerResult<SessionView> {
    session_view(id, service.confirm_transfer(id).await)
}

/// Close the confirmation panel
/// POST /api/transfer/sessions/{id}/abort
async fn abort_transfer(
    State(service): State<TransferService>,
    Path(id): Path<Uuid>,
) -> HandlerResult<SessionView> {
    session_view(id, service.abort_transfer(id).await)
}

/// Clear all fields
/// POST /api/transfer/sessions/{id}/clear
async fn clear_form(
    State(service): State<TransferService>,
    Path(id): Path<Uuid>,
) -> HandlerResult<SessionView> {
    session_view(id, service.clear(id).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::FormSettings;
    use crate::test_support::MockErp;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;

    async fn app(mock: &MockErp) -> Router {
        let service = TransferService::new(mock.spawn().await, FormSettings::default());
        Router::new()
            .nest("/api/transfer", create_transfer_routes())
            .with_state(service)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_full_transfer_flow() {
        let mock = MockErp::with_sample_data();
        let app = app(&mock).await;

        let (status, body) = call(&app, Method::POST, "/api/transfer/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["session_id"].as_str().unwrap().to_string();
        assert_eq!(body["to_warehouse_options"], json!(["WH1", "WH2"]));

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/transfer/sessions/{id}/search"),
            Some(json!({ "search_term": "BATCH001" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available_quantity"], json!(8.0));
        assert_eq!(body["batch_number"], json!("BATCH001"));

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/api/transfer/sessions/{id}/draft"),
            Some(json!({
                "from_warehouse": "WH1",
                "from_bin": "WH1-A1",
                "to_warehouse": "WH2",
                "to_bin": "WH2-B2",
                "quantity": 5
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available_quantity"], json!(5.0));
        assert_eq!(body["to_bin_options"], json!(["WH2-B1", "WH2-B2"]));

        let (_, body) = call(
            &app,
            Method::POST,
            &format!("/api/transfer/sessions/{id}/transfer"),
            None,
        )
        .await;
        assert_eq!(body["validation_messages"], json!({}));
        assert_eq!(body["confirmation"]["to_bin"], json!("WH2-B2"));

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/transfer/sessions/{id}/confirm"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["confirmation"], serde_json::Value::Null);
        assert_eq!(body["draft"]["to_bin"], json!(""));
        assert_eq!(
            body["notice"],
            json!("Transfer Completed Successfully. Document Entry: 4701")
        );
        assert_eq!(mock.transfer_posts().len(), 1);

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/transfer/sessions/{id}/confirm"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(mock.transfer_posts().len(), 1);
    }

    #[tokio::test]
    async fn test_validation_messages_are_keyed_by_field() {
        let mock = MockErp::with_sample_data();
        let app = app(&mock).await;
        let (_, body) = call(&app, Method::POST, "/api/transfer/sessions", None).await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/transfer/sessions/{id}/transfer"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["validation_messages"]["from_warehouse"],
            json!("From Warehouse is required.")
        );
        assert_eq!(
            body["validation_messages"]["quantity"],
            json!("Quantity must be greater than zero.")
        );
        assert!(body["validation_messages"].get("posting_date").is_none());
    }

    #[tokio::test]
    async fn test_confirm_without_request_is_conflict() {
        let mock = MockErp::with_sample_data();
        let app = app(&mock).await;
        let (_, body) = call(&app, Method::POST, "/api/transfer/sessions", None).await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/transfer/sessions/{id}/confirm"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], json!("No pending transfer"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let mock = MockErp::with_sample_data();
        let app = app(&mock).await;
        let id = Uuid::new_v4();

        let (status, body) =
            call(&app, Method::GET, &format!("/api/transfer/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("Session not found"));

        let (status, _) =
            call(&app, Method::DELETE, &format!("/api/transfer/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let mock = MockErp::with_sample_data();
        let app = app(&mock).await;
        let (_, body) = call(&app, Method::POST, "/api/transfer/sessions", None).await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/api/transfer/sessions/{id}/draft"),
            Some(json!({ "quantity": "lots" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Invalid input"));

        let (status, _) =
            call(&app, Method::DELETE, &format!("/api/transfer/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
