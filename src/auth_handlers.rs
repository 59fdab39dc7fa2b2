// src/auth_handlers.rs - Login and account management

use actix_web::{web, HttpRequest, HttpResponse};
use validator::Validate;
use std::sync::Arc;
use chrono::{Duration, Utc};

use crate::handlers::ApiResponse;
use crate::auth::{
    AuthService, User, LoginRequest, CreateUserRequest, LoginResponse, UserInfo, UserRole,
    get_current_user, require_permission,
};
use crate::audit::audit;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const MAX_FAILED_ATTEMPTS: u32 = 5;

// ======== LOGIN ========

pub async fn login(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;

    let mut user = User::find_by_username(&app_state.db_pool, &request.username).await
        .map_err(|_| ApiError::BadRequest("Invalid username or password".to_string()))?;

    if !user.is_active {
        return Err(ApiError::AuthError("Account is disabled".to_string()));
    }

    if user.is_locked() {
        return Err(ApiError::AuthError("Account is temporarily locked. Try again later.".to_string()));
    }

    if !auth_service.verify_password(&request.password, &user.password_hash)
        .map_err(|_| ApiError::InternalServerError("Password verification failed".to_string()))? {

        user.increment_failed_attempts(&app_state.db_pool).await?;

        if user.failed_login_attempts >= MAX_FAILED_ATTEMPTS {
            user.lock_for_duration(&app_state.db_pool, Duration::minutes(15)).await?;
            log::warn!("User {} locked after {} failed logins", user.username, user.failed_login_attempts);
            return Err(ApiError::AuthError(
                "Account locked due to too many failed attempts. Try again in 15 minutes.".to_string()
            ));
        }

        return Err(ApiError::BadRequest("Invalid username or password".to_string()));
    }

    user.reset_failed_attempts(&app_state.db_pool).await?;
    user.update_last_login(&app_state.db_pool).await?;
    user.last_login = Some(Utc::now());

    let token = auth_service.generate_token(&user)?;

    let response = LoginResponse {
        token,
        expires_in: auth_service.token_lifetime_seconds(),
        user: user.clone().into(),
    };

    log::info!("User {} logged in successfully", user.username);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        response,
        "Login successful".to_string(),
    )))
}

// ======== PROFILE ========

pub async fn get_profile(
    app_state: web::Data<Arc<AppState>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = get_current_user(&http_request)?;
    let user = User::find_by_username(&app_state.db_pool, &claims.username).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(UserInfo::from(user))))
}

// ======== USER MANAGEMENT ========

pub async fn create_user(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<CreateUserRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_permission(&http_request, UserRole::can_manage_users)?;
    request.validate()?;

    let request = request.into_inner();
    if User::find_by_username(&app_state.db_pool, &request.username).await.is_ok() {
        return Err(ApiError::BadRequest(format!("User '{}' already exists", request.username)));
    }

    let user = User::create(&app_state.db_pool, request, &auth_service).await?;

    audit(
        &app_state.db_pool,
        &claims.sub,
        "create",
        "user",
        &user.id,
        &format!("Created {} account {}", user.role, user.username),
        None,
        &http_request,
    ).await;

    log::info!("User {} created by {}", user.username, claims.username);

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        UserInfo::from(user),
        "User created".to_string(),
    )))
}
