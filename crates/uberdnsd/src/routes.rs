//! HTTP routes
//!
//! Thin axum adapters over `ManagementService`: extract headers and body,
//! call one service operation, render the result. No authorization or store
//! access happens here.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, error};

use uberdns_core::service::{FqdnRequest, LoginRequest, NameRequest, RecordRequest, RefreshRequest};
use uberdns_core::{Error, ManagementService};

type AppState = Arc<ManagementService>;

/// Build the router for every API route
pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/token/refresh", post(refresh))
        .route("/apikey", get(api_key))
        .route("/user/profile", get(profile))
        .route("/record/create", post(create_record))
        .route("/record/update", post(update_record))
        .route("/record/delete", post(delete_record))
        .route("/record/list", get(list_records))
        .route("/record/list/all", get(list_all_records))
        .route("/cache/purge", post(purge_all))
        .route("/cache/record/purge", post(purge_record))
        .route("/domain/create", post(create_domain))
        .route("/domain/delete", post(delete_domain))
        .route("/domain/list", get(list_domains))
        .with_state(service)
}

/// Core error rendered as `(status, public message)`
///
/// The detailed message only reaches the log.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::invalid_input(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }
        (self.0.status_code(), self.0.public_message()).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct Greeting {
    message: String,
}

#[derive(Serialize)]
struct PurgeSummary {
    purged: usize,
}

async fn index(State(svc): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Greeting>> {
    let user = svc.index(&headers).await?;
    Ok(Json(Greeting {
        message: format!("Hello, {}", user.name),
    }))
}

async fn login(
    State(svc): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body?;
    let outcome = svc.login(&request).await?;
    Ok(([(header::SET_COOKIE, outcome.set_cookie)], Json(outcome.tokens)).into_response())
}

async fn refresh(
    State(svc): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body?;
    let outcome = svc.refresh(&request).await?;
    Ok(([(header::SET_COOKIE, outcome.set_cookie)], Json(outcome.tokens)).into_response())
}

async fn logout(State(svc): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let cookie = svc.logout(&headers).await?;
    Ok(([(header::SET_COOKIE, cookie)], StatusCode::OK).into_response())
}

async fn api_key(State(svc): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    Ok(Json(svc.issue_api_key(&headers).await?))
}

async fn profile(State(svc): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    Ok(Json(svc.profile(&headers).await?))
}

async fn create_record(
    State(svc): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RecordRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    Ok((StatusCode::CREATED, Json(svc.create_record(&headers, &request).await?)))
}

async fn update_record(
    State(svc): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RecordRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    Ok(Json(svc.update_record(&headers, &request).await?))
}

async fn delete_record(
    State(svc): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NameRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    Ok(Json(svc.delete_record(&headers, &request).await?))
}

async fn list_records(State(svc): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    Ok(Json(svc.list_records(&headers).await?))
}

async fn list_all_records(
    State(svc): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(svc.list_all_records(&headers).await?))
}

async fn purge_all(State(svc): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    let purged = svc.purge_all(&headers).await?;
    Ok(Json(PurgeSummary { purged }))
}

async fn purge_record(
    State(svc): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<FqdnRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    Ok(Json(svc.purge_record(&headers, &request).await?))
}

async fn create_domain(
    State(svc): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NameRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    Ok((StatusCode::CREATED, Json(svc.create_domain(&headers, &request).await?)))
}

async fn delete_domain(
    State(svc): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NameRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    Ok(Json(svc.delete_domain(&headers, &request).await?))
}

async fn list_domains(State(svc): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    Ok(Json(svc.list_domains(&headers).await?))
}
