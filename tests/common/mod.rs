use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use supply_hub_api::{
    auth::{self, user, AuthConfig, AuthService, AuthUser, Role},
    config::AppConfig,
    db, events,
    handlers::AppServices,
    services::storage::InMemoryObjectStorage,
    services::users::CreateUserInput,
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

const TEST_JWT_SECRET: &str =
    "integration_test_secret_key_that_is_at_least_64_characters_long_0000";

/// Helper harness for spinning up an application state backed by an
/// in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub auth_service: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
}

#[allow(dead_code)]
impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let db_pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("test database should connect");
        db::run_migrations(&db_pool)
            .await
            .expect("migrations should apply");
        let db_arc = Arc::new(db_pool);

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_cfg = AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
            Duration::from_secs(cfg.refresh_token_expiration as u64),
        );
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let storage = Arc::new(InMemoryObjectStorage::new());
        let services = AppServices::new(db_arc.clone(), event_sender.clone(), storage);

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let auth_for_layer = auth_service.clone();
        let router = Router::new()
            .nest("/api/v1", supply_hub_api::api_v1_routes())
            .nest("/auth", auth::auth_routes().with_state(auth_service.clone()))
            .layer(axum::middleware::from_fn_with_state(
                auth_for_layer,
                |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
                 mut req: axum::http::Request<Body>,
                 next: axum::middleware::Next| async move {
                    req.extensions_mut().insert(auth);
                    next.run(req).await
                },
            ))
            .layer(axum::middleware::from_fn(
                supply_hub_api::tracing::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            auth_service,
            _event_task: event_task,
        }
    }

    /// Create a user account with the given role and return its model.
    pub async fn seed_user(&self, name: &str, email: &str, role: Role) -> user::Model {
        self.state
            .services
            .users
            .create_user(CreateUserInput {
                name: name.to_string(),
                email: email.to_string(),
                password: "a-sufficiently-long-password".to_string(),
                role,
            })
            .await
            .expect("seed user should insert")
    }

    /// Mint an access token for an account.
    pub async fn token_for(&self, account: &user::Model) -> String {
        self.auth_service
            .generate_token(account)
            .await
            .expect("token generation should succeed")
            .access_token
    }

    /// The acting identity a service-layer call sees for this account.
    pub fn auth_user_for(account: &user::Model) -> AuthUser {
        AuthUser {
            user_id: account.id.to_string(),
            name: Some(account.name.clone()),
            email: Some(account.email.clone()),
            roles: vec![account.role.as_claim().to_string()],
            permissions: account.role.permissions(),
            token_id: Uuid::new_v4().to_string(),
        }
    }

    /// Issue a request against the router and return (status, body bytes).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        (status, bytes.to_vec())
    }

    /// Issue a request and parse the response body as JSON.
    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = self.request(method, uri, token, body).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
