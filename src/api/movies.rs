use super::*;
use crate::catalog;
use actix_identity::Identity;
use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Deserialize;

const SEARCH_LIMIT: usize = 20;

/// Random pick, served on both `/movie` and `/explore`.
pub async fn random(id: Identity, db: Db) -> actix_web::Result<HttpResponse> {
    current_user(&id, &db)?;
    let movie = catalog::random_movie(db.get_ref())
        .map_err(|err| log_error(err, "Database error"))?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Catalog is empty"))?;
    let details = movie_details(&db, movie).map_err(|err| log_error(err, "Database error"))?;
    Ok(HttpResponse::Ok().json(details))
}

pub async fn details(
    movie_id: web::Path<u64>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    current_user(&id, &db)?;
    let movie = db
        .get_movie(*movie_id)
        .map_err(|err| log_error(err, "Database error"))?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Movie not found"))?;
    let details = movie_details(&db, movie).map_err(|err| log_error(err, "Database error"))?;
    Ok(HttpResponse::Ok().json(details))
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    query: String,
}

pub async fn search(
    params: web::Query<SearchParams>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    current_user(&id, &db)?;
    let query = params.query.trim();
    if query.is_empty() {
        return Ok(HttpResponse::Ok().json(Vec::<MovieSummary>::new()));
    }
    let results = db
        .search_movies(query, SEARCH_LIMIT)
        .map_err(|err| log_error(err, "Database error"))?
        .iter()
        .map(MovieSummary::from)
        .collect::<Vec<_>>();
    debug!("search {:?}: {} results", query, results.len());
    Ok(HttpResponse::Ok().json(results))
}
