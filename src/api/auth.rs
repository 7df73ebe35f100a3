use super::*;
use actix_identity::Identity;
use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;

pub async fn status(id: Identity, db: Db) -> actix_web::Result<HttpResponse> {
    let mut status = AuthStatus::default();
    if let Some(username) = id.identity() {
        match db
            .get_user_by_username(&username)
            .map_err(|err| log_error(err, "Database error"))?
        {
            Some((_user_id, user)) => {
                status.is_authenticated = true;
                status.username = Some(user.username);
                status.display_name = Some(user.display_name);
            }
            None => {
                debug!("forgetting session of unknown user {}", username);
                id.forget();
            }
        }
    }
    Ok(HttpResponse::Ok().json(status))
}

pub async fn register(
    params: web::Json<Credentials>,
    db: Db,
    settings: web::Data<AuthSettings>,
) -> actix_web::Result<HttpResponse> {
    let params = params.into_inner();
    let username = params.username.trim();
    if username.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "Username is required"));
    }
    if params.password.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "Password is required"));
    }
    let display_name = params
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(username);
    let user = User {
        username: username.to_owned(),
        display_name: display_name.to_owned(),
        password_hash: bcrypt::hash(&params.password, settings.bcrypt_cost)
            .map_err(|err| log_error(err, "Hashing error"))?,
    };
    match db
        .add_user(&user)
        .map_err(|err| log_error(err, "Database error"))?
    {
        Some(user_id) => {
            log::info!("registered user {} ({})", user.username, user_id);
            Ok(HttpResponse::Created().json(Account {
                username: user.username,
                display_name: user.display_name,
            }))
        }
        None => Err(json_error(StatusCode::CONFLICT, "Username already exists!")),
    }
}

pub async fn login(
    params: web::Json<Credentials>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    if let Some((_user_id, user)) = db
        .get_user_by_username(params.username.trim())
        .map_err(|err| log_error(err, "Database error"))?
    {
        if bcrypt::verify(&params.password, &user.password_hash)
            .map_err(|err| log_error(err, "Verification error"))?
        {
            id.remember(user.username.clone());
            return Ok(HttpResponse::Ok().json(Account {
                username: user.username,
                display_name: user.display_name,
            }));
        }
    }
    Err(json_error(
        StatusCode::UNAUTHORIZED,
        "Invalid username or password",
    ))
}

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

pub async fn logout(id: Identity) -> actix_web::Result<HttpResponse> {
    id.forget();
    Ok(HttpResponse::Ok().json(Message {
        message: "Logged out successfully!",
    }))
}
