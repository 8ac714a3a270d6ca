use axum::Router;
use tower_http::trace::TraceLayer;

use crate::DeploymentImpl;

pub mod daily_report;
pub mod forms;
pub mod health;
pub mod tenant;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router())
        .merge(tenant::router(&deployment))
        .merge(daily_report::router(&deployment))
        .merge(forms::router(&deployment));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}
