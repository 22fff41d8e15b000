pub mod config;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use borkbook_core::{CoreError, DispatchReport, MealsSnapshot};
use borkbook_notify::{
    DeviceRegistry, Dispatcher, FcmConfig, FcmProvider, PushProvider, UnconfiguredProvider,
};
use borkbook_storage::{MealStore, PendingWrite, PersistOutcome, SnapshotFile, StorageError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use std::io;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{info, warn};

use config::Config;

pub struct AppState {
    meals: RwLock<MealStore>,
    // Serializes file writes so they land in mutation order.
    persist_lock: AsyncMutex<()>,
    dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(store: MealStore, dispatcher: Dispatcher) -> Self {
        Self {
            meals: RwLock::new(store),
            persist_lock: AsyncMutex::new(()),
            dispatcher,
        }
    }

    /// Loads (or synthesizes) the meal state and wires the push provider.
    pub fn initialize(config: &Config) -> Self {
        let store = MealStore::initialize(
            SnapshotFile::new(&config.meals_file),
            config.subjects.clone(),
        );
        let dispatcher = Dispatcher::new(Arc::new(DeviceRegistry::new()), build_provider(config));
        Self::new(store, dispatcher)
    }

    pub async fn snapshot(&self) -> MealsSnapshot {
        self.meals.read().await.snapshot().clone()
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.meals.read().await.last_updated()
    }

    /// The write lock covers only the in-memory change; the file write runs
    /// afterwards on a blocking thread so readers never wait on disk.
    pub async fn record_feeding(
        &self,
        subject: &str,
        day: &str,
        meal: &str,
        fed: bool,
    ) -> Result<PersistOutcome, CoreError> {
        let _persist = self.persist_lock.lock().await;
        let pending = self
            .meals
            .write()
            .await
            .record_feeding(subject, day, meal, fed)?;
        Ok(write_blocking(pending).await)
    }

    pub async fn reset(&self) -> PersistOutcome {
        let _persist = self.persist_lock.lock().await;
        let pending = self.meals.write().await.reset();
        write_blocking(pending).await
    }

    /// Final write at shutdown; `None` when nothing changed since startup.
    pub async fn flush(&self) -> Option<PersistOutcome> {
        let _persist = self.persist_lock.lock().await;
        let pending = self.meals.read().await.flush()?;
        Some(write_blocking(pending).await)
    }

    pub async fn register_handle(&self, raw: &str) -> Result<bool, CoreError> {
        self.dispatcher.registry().register(raw).await
    }

    pub async fn dispatch(&self, body: &str, sender: &str) -> Result<DispatchReport, CoreError> {
        self.dispatcher.dispatch(body, sender).await
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        self.dispatcher.registry()
    }
}

async fn write_blocking(pending: PendingWrite) -> PersistOutcome {
    let path = pending.path().to_path_buf();
    match tokio::task::spawn_blocking(move || pending.write()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(event = "meals_persist_failed", error = %err);
            PersistOutcome::Failed(StorageError::Io {
                path,
                source: io::Error::new(io::ErrorKind::Other, err.to_string()),
            })
        }
    }
}

pub fn build_provider(config: &Config) -> Arc<dyn PushProvider> {
    if !config.push_enabled() {
        warn!(event = "push_disabled", reason = "no fcm project configured");
        return Arc::new(UnconfiguredProvider);
    }
    let fcm = FcmConfig::new(config.fcm_project.clone(), config.fcm_token.clone())
        .with_endpoint(config.fcm_endpoint.clone())
        .with_timeout(config.push_timeout);
    match FcmProvider::new(fcm) {
        Ok(provider) => {
            info!(event = "push_enabled", provider = "fcm", project = %config.fcm_project);
            Arc::new(provider)
        }
        Err(err) => {
            warn!(event = "push_disabled", error = %err);
            Arc::new(UnconfiguredProvider)
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/meals", get(get_meals).post(post_meal))
        .route("/last-updated", get(get_last_updated))
        .route("/reset", post(post_reset))
        .route("/register-token", post(post_register_token))
        .route("/send-notification", post(post_send_notification))
        .route("/health", get(|| async { "ok" }))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct FeedingRequest {
    #[serde(alias = "subject")]
    dog: String,
    day: String,
    meal: String,
    fed: bool,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRequest {
    message: String,
    #[serde(default)]
    sender_token: String,
}

fn reply(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

fn invalid_data() -> Response {
    reply(
        StatusCode::BAD_REQUEST,
        json!({"message": "Invalid data provided!"}),
    )
}

async fn get_meals(State(app): State<Arc<AppState>>) -> Json<MealsSnapshot> {
    Json(app.snapshot().await)
}

async fn get_last_updated(State(app): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let last_updated = app
        .last_updated()
        .await
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Micros, true));
    Json(json!({ "lastUpdated": last_updated }))
}

async fn post_meal(
    State(app): State<Arc<AppState>>,
    payload: Result<Json<FeedingRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return invalid_data();
    };
    match app
        .record_feeding(&request.dog, &request.day, &request.meal, request.fed)
        .await
    {
        Ok(outcome) => reply(
            StatusCode::OK,
            json!({
                "message": "Meal updated successfully!",
                "persisted": outcome.is_persisted(),
            }),
        ),
        Err(err) => {
            warn!(event = "feeding_rejected", error = %err);
            invalid_data()
        }
    }
}

async fn post_reset(State(app): State<Arc<AppState>>) -> Response {
    let outcome = app.reset().await;
    reply(
        StatusCode::OK,
        json!({
            "message": "Meals reset successfully!",
            "persisted": outcome.is_persisted(),
        }),
    )
}

async fn post_register_token(
    State(app): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let token = match payload {
        Ok(Json(request)) => request.token,
        Err(_) => String::new(),
    };
    match app.register_handle(&token).await {
        Ok(_) => reply(
            StatusCode::OK,
            json!({"message": "Token registered successfully!"}),
        ),
        Err(_) => reply(
            StatusCode::BAD_REQUEST,
            json!({"message": "Token is required!"}),
        ),
    }
}

async fn post_send_notification(
    State(app): State<Arc<AppState>>,
    payload: Result<Json<NotificationRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return invalid_data();
    };
    let report = match app.dispatch(&request.message, &request.sender_token).await {
        Ok(report) => report,
        Err(CoreError::NoRecipients) => {
            return reply(
                StatusCode::NOT_FOUND,
                json!({"message": "No recipients to notify!"}),
            );
        }
        Err(err) => {
            warn!(event = "dispatch_rejected", error = %err);
            return invalid_data();
        }
    };

    let (status, message) = if report.all_succeeded() {
        (StatusCode::OK, "Notification sent successfully!")
    } else if report.all_failed() {
        (StatusCode::BAD_GATEWAY, "Failed to send notification.")
    } else {
        (StatusCode::MULTI_STATUS, "Notification partially sent.")
    };
    reply(
        status,
        json!({
            "message": message,
            "successCount": report.success_count,
            "failureCount": report.failure_count,
        }),
    )
}

async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
}
