pub mod certificates;
pub mod cli;
pub mod databases;
pub mod features;
pub mod hash;
pub mod keys;
pub mod list;
pub mod rdi;
pub mod server;
pub mod set;
pub mod settings;
pub mod stream;
pub mod string;
pub mod zset;

use axum::Router;

use crate::store::AppState;

/// The full REST surface, one sub-router per feature area.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(databases::router())
        .merge(certificates::router())
        .merge(keys::router())
        .merge(string::router())
        .merge(hash::router())
        .merge(set::router())
        .merge(zset::router())
        .merge(list::router())
        .merge(stream::router())
        .merge(cli::router())
        .merge(server::router())
        .merge(settings::router())
        .merge(features::router())
        .merge(rdi::router())
}
