use axum::routing::{delete, get, post};
use axum::Router;

use backend_application::AppState;

use crate::handlers::{ingest_handlers, ops_handlers, query_handlers, stream_handlers};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v2/devices/:device_id/ingest",
            post(ingest_handlers::ingest_device),
        )
        .route("/v2/attendance", get(query_handlers::list_attendance))
        .route("/v2/attendance/stats", get(query_handlers::attendance_stats))
        .route(
            "/v2/attendance/stream",
            get(stream_handlers::attendance_stream),
        )
        .route(
            "/v2/attendance/students/:student_id",
            get(query_handlers::student_timeline),
        )
        .route("/v2/attendance/:id", delete(query_handlers::delete_record))
        .route("/v2/ops/health/live", get(ops_handlers::health_live))
        .route("/v2/ops/health/ready", get(ops_handlers::health_ready))
        .route(
            "/v2/ops/metrics/prometheus",
            get(ops_handlers::metrics_prometheus),
        )
        .with_state(state)
}
