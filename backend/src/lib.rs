//! Library Gateway - GraphQL federation over the book and user services
//!
//! One GraphQL request fans out to two backends. Relationship fields are
//! batched per request through [`services::LoaderRegistry`]; borrow and return
//! run through [`services::LendingService`].

pub mod api;
pub mod config;
pub mod error;
pub mod graphql;
pub mod services;

use std::sync::Arc;

use anyhow::Result;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::Router;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{BackendMode, Config};
use crate::graphql::GatewaySchema;
use crate::services::rpc::memory::{InMemoryBookService, InMemoryUserService, sample};
use crate::services::rpc::{HttpBookClient, HttpUserClient};
use crate::services::{BackendClients, LendingService, LoaderRegistry, LoaderSettings};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub schema: GatewaySchema,
    pub clients: BackendClients,
    pub loader_settings: LoaderSettings,
}

impl AppState {
    pub fn new(clients: BackendClients, loader_settings: LoaderSettings, loan_period_days: i64) -> Self {
        let lending = LendingService::new(clients.clone(), loan_period_days);
        let schema = graphql::build_schema(clients.clone(), lending);
        Self {
            schema,
            clients,
            loader_settings,
        }
    }

    /// Build the backends named by `config` and wire them into a state.
    pub fn from_config(config: &Config) -> Result<Self> {
        let clients = match config.backend_mode {
            BackendMode::Embedded => {
                let books = Arc::new(InMemoryBookService::new(config.fine_per_day));
                let users = Arc::new(InMemoryUserService::new());
                if config.seed_sample_data {
                    sample::seed(&books, &users);
                    tracing::info!("Embedded backends seeded with sample data");
                }
                BackendClients::new(books, users)
            }
            BackendMode::Remote => {
                let books = HttpBookClient::new(&config.book_service_url, config.rpc_timeout)?;
                let users = HttpUserClient::new(&config.user_service_url, config.rpc_timeout)?;
                tracing::info!(
                    book_service = %config.book_service_url,
                    user_service = %config.user_service_url,
                    "Using remote backends"
                );
                BackendClients::new(Arc::new(books), Arc::new(users))
            }
        };

        Ok(Self::new(
            clients,
            config.loader_settings(),
            config.loan_period_days,
        ))
    }

    /// Execute one GraphQL request with a fresh loader registry attached.
    pub async fn execute(&self, request: impl Into<async_graphql::Request>) -> async_graphql::Response {
        let loaders = LoaderRegistry::for_request(&self.clients, &self.loader_settings);
        let request = request.into().data(loaders);
        self.schema.execute(request).await
    }
}

/// Build the HTTP router - GraphQL is the primary API
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .merge(api::health::router())
        // GraphQL endpoint
        .route("/graphql", get(graphiql).post(graphql_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GraphQL query/mutation handler
async fn graphql_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    state.execute(req.into_inner()).await.into()
}

/// GraphiQL interactive playground (only for browsers)
async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        axum::response::Html(GraphiQLSource::build().endpoint("/graphql").finish()).into_response()
    } else {
        (
            axum::http::StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}
