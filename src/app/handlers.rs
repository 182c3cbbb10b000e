use axum::{extract::State, Json};
use serde::Serialize;

use crate::app::AppState;
use crate::db::PoolStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub db_connection: Option<PoolStats>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        db_connection: state.db.as_ref().map(|db| db.stats()),
    })
}
