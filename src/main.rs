use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use authkit::{
    auth::TokenPayload,
    middleware::{cors_layer, request_id_layer, trace_layer},
    AppState, AuthService, Config, LookupContext, Strategy,
};
use axum::Router;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::signal;
use tower::ServiceBuilder;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authkit=debug,tower_http=debug".into()),
        )
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    info!("Starting authkit demo server with config: {:?}", config);

    let store = Arc::new(DemoStore::seeded()?);
    info!("Seeded {} demo users", store.users.len());

    let auth_service = Arc::new(AuthService::new());
    auth_service.initialize(auth_config(&config, store)?);

    let app = create_app(auth_service, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    // Run the server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn create_app(auth_service: Arc<AuthService<DemoUser>>, config: &Config) -> Router {
    let chain = authkit::build_chain_from_names(auth_service.clone(), &["user", "role", "org"]);
    let state = AppState::new(auth_service, chain);

    authkit::create_router(state).layer(
        ServiceBuilder::new()
            // Request tracing
            .layer(trace_layer())
            // Request ID
            .layer(request_id_layer())
            // CORS
            .layer(cors_layer(config)),
    )
}

#[derive(Debug, Clone)]
struct DemoUser {
    id: Uuid,
    email: String,
    phone: String,
    name: String,
    role: String,
    org: Value,
    password_hash: String,
}

/// In-memory user table and pending one-time codes.
struct DemoStore {
    users: Vec<DemoUser>,
    codes: Mutex<HashMap<String, String>>,
}

impl DemoStore {
    fn seeded() -> anyhow::Result<Self> {
        let users = vec![
            DemoUser {
                id: Uuid::new_v4(),
                email: "admin@example.com".to_string(),
                phone: "+15550100".to_string(),
                name: "Ada Admin".to_string(),
                role: "admin".to_string(),
                org: json!({ "id": "acme", "name": "Acme" }),
                password_hash: hash_password("admin-password")?,
            },
            DemoUser {
                id: Uuid::new_v4(),
                email: "viewer@example.com".to_string(),
                phone: "+15550101".to_string(),
                name: "Val Viewer".to_string(),
                role: "viewer".to_string(),
                org: Value::Null,
                password_hash: hash_password("viewer-password")?,
            },
        ];

        Ok(Self {
            users,
            codes: Mutex::new(HashMap::new()),
        })
    }

    fn find(&self, identifier: &str, strategy: Strategy) -> Option<DemoUser> {
        self.users
            .iter()
            .find(|user| match strategy {
                Strategy::EmailPassword | Strategy::OAuth => user.email == identifier,
                Strategy::PhoneOtp => user.phone == identifier,
                Strategy::Token => user.id.to_string() == identifier,
            })
            .cloned()
    }

    fn check_password(&self, email: &str, password: &str) -> bool {
        let Some(user) = self.users.iter().find(|user| user.email == email) else {
            return false;
        };
        match PasswordHash::new(&user.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn remember_code(&self, phone: String, otp: String) {
        self.codes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(phone, otp);
    }

    /// Codes are single use: a successful check consumes it.
    fn take_code(&self, phone: &str, otp: &str) -> bool {
        let mut codes = self
            .codes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if codes.get(phone).is_some_and(|stored| stored == otp) {
            codes.remove(phone);
            true
        } else {
            false
        }
    }
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

fn auth_config(
    config: &Config,
    store: Arc<DemoStore>,
) -> anyhow::Result<authkit::AuthConfig<DemoUser>> {
    let find_store = store.clone();
    let password_store = store.clone();
    let send_store = store.clone();
    let verify_store = store.clone();
    let oauth_store = store;

    config
        .auth_builder::<DemoUser>()
        .generate_token_payload(|user: &DemoUser| {
            let mut payload = TokenPayload::new();
            payload.insert("id".into(), json!(user.id));
            payload.insert("email".into(), json!(user.email));
            payload.insert("role".into(), json!(user.role));
            payload.insert("org".into(), user.org.clone());
            payload
        })
        .serialize_user(|user: &DemoUser| {
            json!({
                "id": user.id,
                "email": user.email,
                "phone": user.phone,
                "name": user.name,
                "role": user.role,
                "org": user.org,
            })
        })
        .find_user(move |identifier: String, context: LookupContext| {
            let store = find_store.clone();
            async move { Ok(store.find(&identifier, context.strategy)) }
        })
        .verify_password(move |email: String, password: String| {
            let store = password_store.clone();
            async move { Ok(store.check_password(&email, &password)) }
        })
        .on_otp_request(move |phone: String, otp: String| {
            let store = send_store.clone();
            async move {
                // No SMS provider in the demo; codes stay in memory.
                info!(phone = %phone, "Delivering one-time code");
                store.remember_code(phone, otp);
                Ok(())
            }
        })
        .verify_otp(move |phone: String, otp: String| {
            let store = verify_store.clone();
            async move { Ok(store.take_code(&phone, &otp)) }
        })
        .oauth_callback_handler(move |profile: Value, provider: String| {
            let store = oauth_store.clone();
            async move {
                info!(provider = %provider, "OAuth profile received");
                Ok(profile
                    .get("email")
                    .and_then(Value::as_str)
                    .and_then(|email| store.find(email, Strategy::OAuth)))
            }
        })
        .build()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
