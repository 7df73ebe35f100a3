mod auth;
mod movies;
mod reviews;

use crate::database::*;
use crate::model::*;
use actix_identity::{CookieIdentityPolicy, Identity, IdentityService};
use actix_web::{error, http::StatusCode, web, HttpResponse};
use log::debug;
use std::collections::HashMap;

pub const COOKIE_NAME: &str = "auth-cookie";

type Db = web::Data<sled::Db>;

/// Per-app settings the handlers read.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> error::Error {
    debug!("{:?}", err);
    error::ErrorInternalServerError(message)
}

fn json_error(status: StatusCode, message: &str) -> error::Error {
    let response = HttpResponse::build(status).json(ErrorBody {
        error: message.to_owned(),
    });
    error::InternalError::from_response(message.to_owned(), response).into()
}

/// Resolves the logged in user or fails with 401.
fn current_user(id: &Identity, db: &sled::Db) -> actix_web::Result<(u64, User)> {
    let username = id
        .identity()
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "Not logged in"))?;
    db.get_user_by_username(&username)
        .map_err(|err| log_error(err, "Database error"))?
        .ok_or_else(|| {
            debug!("session for unknown user {}", username);
            json_error(StatusCode::UNAUTHORIZED, "Not logged in")
        })
}

fn movie_details(db: &sled::Db, movie: Movie) -> DbResult<MovieDetails> {
    let mut authors: HashMap<u64, Option<User>> = HashMap::new();
    let mut reviews = Vec::new();
    for (_review_id, review) in db.reviews_for_movie(movie.id)? {
        if !authors.contains_key(&review.user_id) {
            authors.insert(review.user_id, db.get_user(review.user_id)?);
        }
        let (username, display_name) = match authors.get(&review.user_id) {
            Some(Some(user)) => (user.username.clone(), user.display_name.clone()),
            _ => ("unknown".to_owned(), "unknown".to_owned()),
        };
        reviews.push(ReviewView {
            username,
            display_name,
            rating: review.rating,
            comment: review.comment,
        });
    }
    Ok(MovieDetails {
        wiki_link: crate::catalog::wiki_link(&movie.title),
        id: movie.id,
        title: movie.title,
        tagline: movie.tagline,
        poster_path: movie.poster_path,
        overview: movie.overview,
        genres: movie.genres,
        reviews,
    })
}

pub fn identity_service(key: &[u8], secure: bool) -> IdentityService<CookieIdentityPolicy> {
    IdentityService::new(
        CookieIdentityPolicy::new(key)
            .name(COOKIE_NAME)
            .path("/")
            .secure(secure),
    )
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/auth-status", web::get().to(auth::status))
            .route("/register", web::post().to(auth::register))
            .route("/login", web::post().to(auth::login))
            .route("/logout", web::post().to(auth::logout))
            .route("/movie", web::get().to(movies::random))
            .route("/explore", web::get().to(movies::random))
            .route("/movie/{id}", web::get().to(movies::details))
            .route("/search", web::get().to(movies::search))
            .route("/review", web::post().to(reviews::submit))
            .route("/my-reviews", web::get().to(reviews::mine))
            .route("/update-reviews", web::post().to(reviews::update))
            .route("/delete-review/{id}", web::delete().to(reviews::delete)),
    );
}
