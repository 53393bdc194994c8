//! Resource routes for users and articles.

use crate::handlers::{article, user};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(user::list).post(user::register))
        .route("/user/register", post(user::register))
        .route("/user/:id", get(user::read))
        .route("/article", get(article::list).post(article::create))
        .route(
            "/article/:id",
            get(article::read).patch(article::update).delete(article::delete),
        )
}
