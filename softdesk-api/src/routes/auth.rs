/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Create an account
/// - `POST /v1/auth/login` - Exchange username and password for tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for a new access token

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult, ValidationErrorDetail},
    extract::Json,
};
use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use softdesk_shared::{
    auth::{
        jwt::{self, Claims, TokenType},
        password,
    },
    models::account::{Account, CreateAccount, MIN_REGISTRATION_AGE},
};
use tracing::{debug, info};
use validator::Validate;

/// Register request
///
/// `password_confirmation` is only compared against `password`; it is never
/// stored and never echoed back.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters"))]
    pub username: String,

    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,

    pub password: String,

    pub password_confirmation: String,

    pub age: i32,

    #[serde(default)]
    pub can_be_contacted: bool,

    #[serde(default)]
    pub can_data_be_shared: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub account: Account,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    pub token_type: &'static str,

    /// Seconds until the access token expires
    pub expires_in: i64,

    pub account: Account,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

fn is_valid_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

/// Every registration rule that needs no database access
///
/// Returns all problems at once so the client can fix them in one round trip.
pub fn registration_errors(req: &RegisterRequest) -> Vec<ValidationErrorDetail> {
    let mut details = match req.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => validation_details(&errors),
    };

    if !req.username.is_empty() && !req.username.chars().all(is_valid_username_char) {
        details.push(ValidationErrorDetail::new(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }

    if req.age < MIN_REGISTRATION_AGE {
        details.push(ValidationErrorDetail::new(
            "age",
            format!(
                "You must be at least {} years old to register.",
                MIN_REGISTRATION_AGE
            ),
        ));
    }

    if req.password != req.password_confirmation {
        details.push(ValidationErrorDetail::new(
            "password_confirmation",
            "Password fields didn't match.",
        ));
    }

    if let Err(problems) = password::validate_password(&req.password, &req.username) {
        details.extend(
            problems
                .into_iter()
                .map(|message| ValidationErrorDetail::new("password", message)),
        );
    }

    details
}

async fn hash_off_thread(plaintext: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|e| ApiError::InternalError(format!("Hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

async fn verify_off_thread(plaintext: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &hash))
        .await
        .map_err(|e| ApiError::InternalError(format!("Verification task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Register a new account
///
/// ```text
/// POST /v1/auth/register
///
/// {
///   "username": "alice",
///   "email": "alice@example.com",
///   "password": "correct horse battery",
///   "password_confirmation": "correct horse battery",
///   "age": 30,
///   "can_be_contacted": true,
///   "can_data_be_shared": false
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: any rule failed, including a taken
///   username or email
/// - `409 Conflict`: lost a race for the same username or email
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let mut details = registration_errors(&req);
    if !details.is_empty() {
        debug!(username = %req.username, errors = details.len(), "Registration rejected");
        return Err(ApiError::ValidationError(details));
    }

    if Account::find_by_username(&state.db, &req.username).await?.is_some() {
        details.push(ValidationErrorDetail::new(
            "username",
            "A user with that username already exists.",
        ));
    }
    if Account::find_by_email(&state.db, &req.email).await?.is_some() {
        details.push(ValidationErrorDetail::new(
            "email",
            "A user with that email already exists.",
        ));
    }
    if !details.is_empty() {
        return Err(ApiError::ValidationError(details));
    }

    let password_hash = hash_off_thread(req.password).await?;

    let account = Account::create(
        &state.db,
        CreateAccount {
            username: req.username,
            email: req.email,
            password_hash,
            age: req.age,
            can_be_contacted: req.can_be_contacted,
            can_data_be_shared: req.can_data_be_shared,
        },
    )
    .await?;

    info!(account_id = %account.id, username = %account.username, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Account created successfully".to_string(),
            account,
        }),
    ))
}

/// Login with username and password
///
/// # Errors
///
/// - `401 Unauthorized`: unknown username or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid username or password".to_string());

    let account = Account::find_by_username(&state.db, &req.username)
        .await?
        .ok_or_else(invalid)?;

    if !verify_off_thread(req.password, account.password_hash.clone()).await? {
        debug!(account_id = %account.id, "Login failed: wrong password");
        return Err(invalid());
    }

    Account::update_last_login(&state.db, account.id).await?;

    let access_claims = Claims::new(account.id, TokenType::Access);
    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;
    let refresh_token = jwt::create_token(
        &Claims::new(account.id, TokenType::Refresh),
        state.jwt_secret(),
    )?;

    info!(account_id = %account.id, "Account logged in");

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: access_claims.expires_in_seconds(),
        account,
    }))
}

/// Exchange a refresh token for a new access token
///
/// The account must still exist.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let (access_token, claims) = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    if !Account::exists(&state.db, claims.sub).await? {
        return Err(ApiError::Unauthorized("Account no longer exists".to_string()));
    }

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: claims.expires_in_seconds(),
    }))
}
