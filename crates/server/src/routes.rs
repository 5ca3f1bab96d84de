use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
};
use tracing::Level;

use common::types::Health;

use crate::state::ServerState;

pub mod products;
pub mod users;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: health, product and user routes.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let product_routes = Router::new()
        .route("/products", get(products::list_products))
        .route("/product", post(products::create_product))
        .route(
            "/product/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        );

    let user_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/search", get(users::search_users))
        .route(
            "/user/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/register", post(users::register))
        .route("/login", post(users::login));

    Router::new()
        .route("/health", get(health))
        .merge(product_routes)
        .merge(user_routes)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径等
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::INFO),
                )
                // 响应返回时打点，包含状态码与耗时
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}
