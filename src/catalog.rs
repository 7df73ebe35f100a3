use crate::database::{DbError, MovieDb};
use crate::model::Movie;
use rand::seq::SliceRandom;
use std::path::Path;
use thiserror::Error;

const BUNDLED_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] DbError),
}

pub fn parse_catalog(json: &str) -> Result<Vec<Movie>, CatalogError> {
    Ok(serde_json::from_str(json)?)
}

/// Loads movies from `path`, or the bundled catalog when no path is given,
/// into the database. Returns the number of movies stored.
pub fn seed<D>(db: &D, path: Option<&Path>) -> Result<usize, CatalogError>
where
    D: MovieDb<Error = DbError>,
{
    let movies = match path {
        Some(path) => parse_catalog(&std::fs::read_to_string(path)?)?,
        None => parse_catalog(BUNDLED_CATALOG)?,
    };
    for movie in &movies {
        db.put_movie(movie)?;
    }
    Ok(movies.len())
}

pub fn wiki_link(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        return "#".to_owned();
    }
    format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_"))
}

/// Picks a random catalog entry for the explore page.
pub fn random_movie<D>(db: &D) -> Result<Option<Movie>, DbError>
where
    D: MovieDb<Error = DbError>,
{
    let ids = db.movie_ids()?;
    match ids.choose(&mut rand::thread_rng()) {
        Some(id) => db.get_movie(*id),
        None => Ok(None),
    }
}
