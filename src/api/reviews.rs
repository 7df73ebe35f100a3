use super::*;
use actix_identity::Identity;
use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;

const RATING_ERROR: &str = "Rating must be between 1 and 10";

fn clean_comment(comment: Option<String>) -> Option<String> {
    comment.and_then(|c| {
        let trimmed = c.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

pub async fn submit(
    params: web::Json<NewReview>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let (user_id, user) = current_user(&id, &db)?;
    let params = params.into_inner();
    if !rating_in_range(params.rating) {
        return Err(json_error(StatusCode::BAD_REQUEST, RATING_ERROR));
    }
    let comment = clean_comment(params.comment);
    if params.rating.is_none() && comment.is_none() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "A rating or comment is required",
        ));
    }
    if db
        .get_movie(params.movie_id)
        .map_err(|err| log_error(err, "Database error"))?
        .is_none()
    {
        return Err(json_error(StatusCode::NOT_FOUND, "Movie not found"));
    }
    let review = Review {
        movie_id: params.movie_id,
        user_id,
        rating: params.rating,
        comment,
    };
    let review_id = db
        .add_review(&review)
        .map_err(|err| log_error(err, "Database error"))?;
    debug!("review {} on movie {} by {}", review_id, review.movie_id, user.username);
    Ok(HttpResponse::Ok().json(ReviewView {
        username: user.username,
        display_name: user.display_name,
        rating: review.rating,
        comment: review.comment,
    }))
}

pub async fn mine(id: Identity, db: Db) -> actix_web::Result<HttpResponse> {
    let (user_id, _user) = current_user(&id, &db)?;
    let reviews = db
        .reviews_by_user(user_id)
        .map_err(|err| log_error(err, "Database error"))?;
    let mut ret = Vec::with_capacity(reviews.len());
    for (review_id, review) in reviews {
        let movie_title = db
            .get_movie(review.movie_id)
            .map_err(|err| log_error(err, "Database error"))?
            .map(|movie| movie.title)
            .unwrap_or_default();
        ret.push(MyReview {
            id: review_id,
            movie_id: review.movie_id,
            movie_title,
            rating: review.rating,
            comment: review.comment,
        });
    }
    Ok(HttpResponse::Ok().json(ret))
}

#[derive(Serialize)]
struct Updated {
    updated: usize,
}

/// Applies a batch of edits. Entries naming reviews the user does not own
/// are skipped; an out of range rating rejects the whole batch.
pub async fn update(
    params: web::Json<ReviewUpdates>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let (user_id, _user) = current_user(&id, &db)?;
    let updates = params.into_inner().updates;
    if updates.iter().any(|u| !rating_in_range(u.rating)) {
        return Err(json_error(StatusCode::BAD_REQUEST, RATING_ERROR));
    }
    let mut updated = 0;
    for update in updates {
        let current = match db
            .get_review(update.id)
            .map_err(|err| log_error(err, "Database error"))?
        {
            Some(review) if review.user_id == user_id => review,
            _ => {
                debug!("skipping update of review {} for user {}", update.id, user_id);
                continue;
            }
        };
        let mut review = current.clone();
        if update.rating.is_some() {
            review.rating = update.rating;
        }
        if update.comment.is_some() {
            review.comment = clean_comment(update.comment);
        }
        if db
            .update_review(update.id, &current, &review)
            .map_err(|err| log_error(err, "Database error"))?
        {
            updated += 1;
        } else {
            debug!("review {} changed while updating, skipped", update.id);
        }
    }
    Ok(HttpResponse::Ok().json(Updated { updated }))
}

#[derive(Serialize)]
struct Deleted {
    deleted: u64,
}

pub async fn delete(
    review_id: web::Path<u64>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let (user_id, _user) = current_user(&id, &db)?;
    let review_id = review_id.into_inner();
    match db
        .get_review(review_id)
        .map_err(|err| log_error(err, "Database error"))?
    {
        Some(review) if review.user_id == user_id => {
            db.remove_review(review_id)
                .map_err(|err| log_error(err, "Database error"))?;
            Ok(HttpResponse::Ok().json(Deleted { deleted: review_id }))
        }
        _ => Err(json_error(StatusCode::NOT_FOUND, "Review not found")),
    }
}
