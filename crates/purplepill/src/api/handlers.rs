use poem::handler;
use poem::web::Data;
use poem::Response;

use crate::collector::SnapshotStore;

const TEXT_PLAIN: &str = "text/plain";

/// Latest published snapshot, empty before the first successful cycle.
#[handler]
pub fn get_metrics(store: Data<&SnapshotStore>) -> Response {
    let snapshot = store.current();
    tracing::debug!(bytes = snapshot.len(), "Serving metrics snapshot");
    Response::builder()
        .content_type(TEXT_PLAIN)
        .header("Access-Control-Allow-Origin", "*")
        .body(snapshot.to_string())
}

#[handler]
pub fn get_health() -> Response {
    tracing::debug!("Serving health check");
    Response::builder().content_type(TEXT_PLAIN).body("OK")
}
