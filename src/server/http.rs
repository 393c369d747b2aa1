//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routing is a plain
//! match on (method, path); each resource owns its sub-dispatch in
//! `crate::routes`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::MongoClient;
use crate::rating::RatingAggregator;
use crate::routes;
use crate::types::BookwormError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: MongoClient,
    /// Issues and validates access tokens
    pub jwt: JwtValidator,
    /// Per-book rating recompute, serialized per key
    pub ratings: RatingAggregator,
}

impl AppState {
    pub fn new(args: Args, mongo: MongoClient) -> Self {
        let jwt = JwtValidator::new(&args.jwt_secret(), args.jwt_expiry_seconds);
        Self {
            args,
            mongo,
            jwt,
            ratings: RatingAggregator::new(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), BookwormError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Bookworm listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure default JWT secret allowed");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (&method, path.as_str()) {
        // Liveness probe - returns 200 if the service is running
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Readiness probe - returns 200 only if MongoDB answers
        (&Method::GET, "/ready") | (&Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }

        // Version info for deployment verification
        (&Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (&Method::OPTIONS, _) => preflight_response(),

        // Authentication
        _ if path.starts_with("/auth") => {
            routes::handle_auth_request(req, Arc::clone(&state)).await
        }

        // Resource routes
        _ if path.starts_with("/api/books") => {
            routes::handle_books_request(req, Arc::clone(&state)).await
        }
        _ if path.starts_with("/api/genres") => {
            routes::handle_genres_request(req, Arc::clone(&state)).await
        }
        _ if path.starts_with("/api/library") => {
            routes::handle_library_request(req, Arc::clone(&state)).await
        }
        _ if path.starts_with("/api/stats") => {
            routes::handle_stats_request(req, Arc::clone(&state)).await
        }
        _ if path.starts_with("/api/recommendations") => {
            routes::handle_recommendations_request(req, Arc::clone(&state)).await
        }
        _ if path.starts_with("/api/reviews") => {
            routes::handle_reviews_request(req, Arc::clone(&state)).await
        }
        _ if path.starts_with("/api/goals") => {
            routes::handle_goals_request(req, Arc::clone(&state)).await
        }
        _ if path.starts_with("/api/social") => {
            routes::handle_social_request(req, Arc::clone(&state)).await
        }
        _ if path.starts_with("/api/tutorials") => {
            routes::handle_tutorials_request(req, Arc::clone(&state)).await
        }
        _ if path.starts_with("/api/users") => {
            routes::handle_users_request(req, Arc::clone(&state)).await
        }

        _ => routes::error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        )
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        )
        .body(Full::new(Bytes::new()))
        .unwrap()
}
