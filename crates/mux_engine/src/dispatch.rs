use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use mux_core::{
    BatchLimits, ErrorBody, FetchJob, FetchResult, JobError, RequestId, RequestIds, UrlBatch,
    UrlsRequest, ValidationError,
};
use mux_logging::{mux_info, mux_warn};
use thiserror::Error;

use crate::{CancelReason, FetchPipeline, PipelineError, PipelineSettings, ShutdownCoordinator};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Only POST method is supported")]
    MethodNotAllowed,
    #[error("Request body is empty")]
    EmptyBody,
    #[error("Incorrect JSON in request body")]
    MalformedJson,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Server is shutting down")]
    ShuttingDown,
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::EmptyBody
            | DispatchError::MalformedJson
            | DispatchError::Validation(_)
            | DispatchError::Job(_) => StatusCode::BAD_REQUEST,
            DispatchError::Pipeline(PipelineError::Fetch(_)) => StatusCode::BAD_GATEWAY,
            DispatchError::Pipeline(PipelineError::Canceled(CancelReason::BatchDeadline)) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            DispatchError::Pipeline(PipelineError::Canceled(CancelReason::Parent))
            | DispatchError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn into_response_for(self, rid: Option<RequestId>) -> Response {
        let message = match rid {
            Some(rid) => format!("{self} ({rid})"),
            None => self.to_string(),
        };
        (self.status(), Json(ErrorBody::new(message))).into_response()
    }
}

/// Everything a dispatch needs; shared by all connections of one server.
pub struct Dispatcher {
    pipeline: FetchPipeline,
    settings: PipelineSettings,
    limits: BatchLimits,
    ids: RequestIds,
    coordinator: ShutdownCoordinator,
}

impl Dispatcher {
    pub fn new(
        pipeline: FetchPipeline,
        settings: PipelineSettings,
        limits: BatchLimits,
        coordinator: ShutdownCoordinator,
    ) -> Self {
        Self {
            pipeline,
            settings,
            limits,
            ids: RequestIds::new(),
            coordinator,
        }
    }

    /// Decodes, validates and fetches one request body.
    pub async fn dispatch(
        &self,
        rid: RequestId,
        body: &[u8],
    ) -> Result<Vec<FetchResult>, DispatchError> {
        if !self.coordinator.is_running() {
            return Err(DispatchError::ShuttingDown);
        }
        if body.is_empty() {
            return Err(DispatchError::EmptyBody);
        }
        let request: UrlsRequest =
            serde_json::from_slice(body).map_err(|_| DispatchError::MalformedJson)?;
        let batch = UrlBatch::from(request);
        self.limits.validate(&batch)?;

        let job = FetchJob::new(
            rid,
            batch,
            self.settings.max_workers,
            self.settings.batch_timeout,
            self.settings.item_timeout,
        )?;
        let results = self
            .pipeline
            .run(job, &self.coordinator.force_signal())
            .await?;
        Ok(results)
    }
}

/// `POST /` dispatches a batch; any other method on `/` is refused.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", post(fetch_urls).fallback(method_not_allowed))
        .with_state(dispatcher)
}

async fn fetch_urls(State(dispatcher): State<Arc<Dispatcher>>, body: Bytes) -> Response {
    let rid = dispatcher.ids.next_id();
    mux_info!("[{}] Incoming request ({} bytes)", rid, body.len());

    match dispatcher.dispatch(rid, &body).await {
        Ok(results) => {
            mux_info!("[{}] Responding with {} results", rid, results.len());
            (StatusCode::OK, Json(results)).into_response()
        }
        Err(err) => {
            mux_warn!("[{}] {}", rid, err);
            err.into_response_for(Some(rid))
        }
    }
}

async fn method_not_allowed() -> Response {
    DispatchError::MethodNotAllowed.into_response_for(None)
}
