use crate::fts_tree::FTSExt;
use crate::model::*;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use std::convert::TryInto;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("bad index entry in {0}")]
    BadIndex(&'static str),
}

pub type DbResult<T> = Result<T, DbError>;

// Big-endian so that tree order and prefix scans follow numeric id order.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V, tree: &'static str) -> DbResult<u64> {
    let bytes = id.as_ref().try_into().map_err(|_| DbError::BadIndex(tree))?;
    Ok(u64::from_be_bytes(bytes))
}

fn pair_key(prefix: u64, id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&serialize_id(prefix));
    key[8..].copy_from_slice(&serialize_id(id));
    key
}

fn storage_only(err: TransactionError<()>) -> Option<sled::Error> {
    match err {
        TransactionError::Storage(e) => Some(e),
        TransactionError::Abort(()) => None,
    }
}

const USERS: &[u8] = b"users";
const USERS_USERNAME: &[u8] = b"USERS_USERNAME";
const MOVIES: &[u8] = b"movies";
const MOVIES_FTS: &[u8] = b"movies_fts";
const REVIEWS: &[u8] = b"reviews";
const REVIEWS_MOVIE: &[u8] = b"REVIEWS_MOVIE";
const REVIEWS_USER: &[u8] = b"REVIEWS_USER";

pub trait UserDb {
    type Error;
    /// Returns `None` when the username is taken.
    fn add_user(&self, user: &User) -> Result<Option<u64>, Self::Error>;
    fn get_user(&self, id: u64) -> Result<Option<User>, Self::Error>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, Self::Error>;
}

pub trait MovieDb {
    type Error;
    /// Inserts or replaces a catalog entry and keeps the search index in step.
    fn put_movie(&self, movie: &Movie) -> Result<(), Self::Error>;
    fn get_movie(&self, id: u64) -> Result<Option<Movie>, Self::Error>;
    fn movie_ids(&self) -> Result<Vec<u64>, Self::Error>;
    /// Best matches first, at most `limit`.
    fn search_movies(&self, query: &str, limit: usize) -> Result<Vec<Movie>, Self::Error>;
}

pub trait ReviewDb {
    type Error;
    fn add_review(&self, review: &Review) -> Result<u64, Self::Error>;
    fn get_review(&self, id: u64) -> Result<Option<Review>, Self::Error>;
    /// Replaces `current` with `review` only if the stored record still equals
    /// `current`. Returns false when it was changed or removed meanwhile.
    fn update_review(&self, id: u64, current: &Review, review: &Review)
        -> Result<bool, Self::Error>;
    fn remove_review(&self, id: u64) -> Result<Option<Review>, Self::Error>;
    fn reviews_for_movie(&self, movie_id: u64) -> Result<Vec<(u64, Review)>, Self::Error>;
    fn reviews_by_user(&self, user_id: u64) -> Result<Vec<(u64, Review)>, Self::Error>;
}

impl UserDb for sled::Db {
    type Error = DbError;

    fn add_user(&self, user: &User) -> DbResult<Option<u64>> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let id = self.generate_id()?;
        let data = bincode::serialize(user)?;
        if let Err(err) = (&users, &users_username).transaction(|(users, users_username)| {
            if users_username
                .insert(user.username.as_bytes(), serialize_id(id).as_ref())?
                .is_some()
            {
                return Err(ConflictableTransactionError::Abort(()));
            }
            users.insert(serialize_id(id).as_ref(), data.as_slice())?;
            Ok(())
        }) {
            return match storage_only(err) {
                Some(e) => Err(e.into()),
                None => Ok(None),
            };
        }
        Ok(Some(id))
    }

    fn get_user(&self, id: u64) -> DbResult<Option<User>> {
        let users = self.open_tree(USERS)?;
        match users.get(serialize_id(id))? {
            Some(d) => Ok(Some(bincode::deserialize(&d)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_username(&self, username: &str) -> DbResult<Option<(u64, User)>> {
        let users_username = self.open_tree(USERS_USERNAME)?;
        if let Some(id) = users_username.get(username)? {
            let id = deserialize_id(id, "users_username")?;
            let user = self
                .get_user(id)?
                .ok_or(DbError::BadIndex("users_username"))?;
            Ok(Some((id, user)))
        } else {
            Ok(None)
        }
    }
}

impl MovieDb for sled::Db {
    type Error = DbError;

    fn put_movie(&self, movie: &Movie) -> DbResult<()> {
        let movies = self.open_tree(MOVIES)?;
        let fts = self.open_fts(MOVIES_FTS)?;
        let key = serialize_id(movie.id);
        let old = movies.insert(&key, bincode::serialize(movie)?)?;
        if let Some(old) = old {
            let old: Movie = bincode::deserialize(&old)?;
            fts.remove(&key, &old.search_text())?;
        }
        fts.insert(&key, &movie.search_text())?;
        Ok(())
    }

    fn get_movie(&self, id: u64) -> DbResult<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        match movies.get(serialize_id(id))? {
            Some(d) => Ok(Some(bincode::deserialize(&d)?)),
            None => Ok(None),
        }
    }

    fn movie_ids(&self) -> DbResult<Vec<u64>> {
        let movies = self.open_tree(MOVIES)?;
        movies
            .iter()
            .keys()
            .map(|key| deserialize_id(key?, "movies"))
            .collect()
    }

    fn search_movies(&self, query: &str, limit: usize) -> DbResult<Vec<Movie>> {
        let fts = self.open_fts(MOVIES_FTS)?;
        let mut scored = fts.query(query, true)?.into_iter().collect::<Vec<_>>();
        // Ties broken by key so results are stable.
        scored.sort_by(|(ka, a), (kb, b)| {
            b.partial_cmp(a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ka.cmp(kb))
        });
        let mut movies = Vec::new();
        for (key, _score) in scored.into_iter().take(limit) {
            let id = deserialize_id(&key, "movies_fts")?;
            movies.push(self.get_movie(id)?.ok_or(DbError::BadIndex("movies_fts"))?);
        }
        Ok(movies)
    }
}

impl ReviewDb for sled::Db {
    type Error = DbError;

    fn add_review(&self, review: &Review) -> DbResult<u64> {
        let reviews = self.open_tree(REVIEWS)?;
        let reviews_movie = self.open_tree(REVIEWS_MOVIE)?;
        let reviews_user = self.open_tree(REVIEWS_USER)?;
        let id = self.generate_id()?;
        let data = bincode::serialize(review)?;
        (&reviews, &reviews_movie, &reviews_user)
            .transaction(|(reviews, reviews_movie, reviews_user)| {
                reviews.insert(serialize_id(id).as_ref(), data.as_slice())?;
                reviews_movie.insert(pair_key(review.movie_id, id).as_ref(), sled::IVec::default())?;
                reviews_user.insert(pair_key(review.user_id, id).as_ref(), sled::IVec::default())?;
                Ok(())
            })
            .map_err(|err: TransactionError<()>| match storage_only(err) {
                Some(e) => DbError::Storage(e),
                None => DbError::BadIndex("reviews"),
            })?;
        Ok(id)
    }

    fn get_review(&self, id: u64) -> DbResult<Option<Review>> {
        let reviews = self.open_tree(REVIEWS)?;
        match reviews.get(serialize_id(id))? {
            Some(d) => Ok(Some(bincode::deserialize(&d)?)),
            None => Ok(None),
        }
    }

    fn update_review(&self, id: u64, current: &Review, review: &Review) -> DbResult<bool> {
        let reviews = self.open_tree(REVIEWS)?;
        let swapped = reviews.compare_and_swap(
            serialize_id(id),
            Some(bincode::serialize(current)?),
            Some(bincode::serialize(review)?),
        )?;
        Ok(swapped.is_ok())
    }

    fn remove_review(&self, id: u64) -> DbResult<Option<Review>> {
        let review = match self.get_review(id)? {
            Some(review) => review,
            None => return Ok(None),
        };
        let reviews = self.open_tree(REVIEWS)?;
        let reviews_movie = self.open_tree(REVIEWS_MOVIE)?;
        let reviews_user = self.open_tree(REVIEWS_USER)?;
        (&reviews, &reviews_movie, &reviews_user)
            .transaction(|(reviews, reviews_movie, reviews_user)| {
                reviews.remove(serialize_id(id).as_ref())?;
                reviews_movie.remove(pair_key(review.movie_id, id).as_ref())?;
                reviews_user.remove(pair_key(review.user_id, id).as_ref())?;
                Ok(())
            })
            .map_err(|err: TransactionError<()>| match storage_only(err) {
                Some(e) => DbError::Storage(e),
                None => DbError::BadIndex("reviews"),
            })?;
        Ok(Some(review))
    }

    fn reviews_for_movie(&self, movie_id: u64) -> DbResult<Vec<(u64, Review)>> {
        scan_reviews(self, REVIEWS_MOVIE, movie_id)
    }

    fn reviews_by_user(&self, user_id: u64) -> DbResult<Vec<(u64, Review)>> {
        scan_reviews(self, REVIEWS_USER, user_id)
    }
}

fn scan_reviews(db: &sled::Db, index: &'static [u8], owner: u64) -> DbResult<Vec<(u64, Review)>> {
    let index_tree = db.open_tree(index)?;
    let mut ret = Vec::new();
    for key in index_tree.scan_prefix(serialize_id(owner)).keys() {
        let key = key?;
        let id = deserialize_id(&key[8..], "reviews index")?;
        let review = db
            .get_review(id)?
            .ok_or(DbError::BadIndex("reviews index"))?;
        ret.push((id, review));
    }
    Ok(ret)
}
