//! Typed client for the `/api` endpoints plus the view state that drives the
//! pages built on top of it.
//!
//! Every public call logs failures and hands back a fallback value (`None`,
//! an empty list, `false`, or [`AuthReply::Error`]) instead of an error.

pub mod review;
pub mod search;
pub mod session;

use crate::api::COOKIE_NAME;
use crate::model::*;
use actix_web::client::{Client, ClientRequest};
use actix_web::http::header::SET_COOKIE;
use log::error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP error! Status: {status}")]
    Status { status: u16, message: Option<String> },
    #[error("cannot decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Server supplied message, if the failure carried one.
    pub fn message(&self) -> Option<&str> {
        match self {
            ClientError::Status {
                message: Some(message),
                ..
            } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthReply {
    Account(Account),
    LoggedOut,
    Error(String),
}

#[derive(Serialize)]
struct SearchQuery<'a> {
    query: &'a str,
}

/// Extracts the session cookie pair from `Set-Cookie` values.
/// `Some(None)` means the server cleared the session.
fn session_cookie<'a, I>(set_cookies: I) -> Option<Option<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ret = None;
    for set_cookie in set_cookies {
        let pair = set_cookie.split(';').next().unwrap_or("").trim();
        let mut parts = pair.splitn(2, '=');
        if parts.next() != Some(COOKIE_NAME) {
            continue;
        }
        ret = match parts.next() {
            Some(value) if !value.is_empty() => Some(Some(pair.to_owned())),
            _ => Some(None),
        };
    }
    ret
}

/// Client for one user session. Not `Send`: it lives on the actix runtime
/// like the rest of the client side.
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: RefCell<Option<String>>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new<S: Into<String>>(base_url: S) -> ApiClient {
        ApiClient {
            client: Client::default(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            session: RefCell::new(None),
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.borrow().is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T, B>(&self, request: ClientRequest, body: Option<&B>) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let request = match self.session.borrow().as_ref() {
            Some(cookie) => request.header("Cookie", cookie.as_str()),
            None => request,
        };
        let sent = match body {
            Some(body) => request.send_json(body).await,
            None => request.send().await,
        };
        let mut response = sent.map_err(|e| ClientError::Request(e.to_string()))?;

        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .filter_map(|value| value.to_str().ok());
        if let Some(cookie) = session_cookie(set_cookies) {
            *self.session.borrow_mut() = cookie;
        }

        let status = response.status();
        if !status.is_success() {
            let message = response.json::<ErrorBody>().await.ok().map(|b| b.error);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<T, ()>(self.client.get(self.url(path)), None)
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(self.client.post(self.url(path)), Some(body)).await
    }

    /// `None` when the server cannot be asked.
    pub async fn auth_status(&self) -> Option<AuthStatus> {
        self.get("/auth-status")
            .await
            .map_err(|e| error!("Error checking authentication: {}", e))
            .ok()
    }

    /// True when the server reports a session or a username is remembered
    /// on this client.
    pub async fn check_auth(&self, remembered: Option<&str>) -> bool {
        let status = self.auth_status().await;
        session::Session::resolve(status.as_ref(), remembered).authenticated
    }

    pub async fn fetch_movie(&self) -> Option<MovieDetails> {
        self.get("/movie")
            .await
            .map_err(|e| error!("Error fetching movie: {}", e))
            .ok()
    }

    pub async fn fetch_explore(&self) -> Option<MovieDetails> {
        self.get("/explore")
            .await
            .map_err(|e| error!("Error fetching explore pick: {}", e))
            .ok()
    }

    pub async fn fetch_movie_details(&self, movie_id: u64) -> Option<MovieDetails> {
        self.get(&format!("/movie/{}", movie_id))
            .await
            .map_err(|e| error!("Error fetching movie details: {}", e))
            .ok()
    }

    pub async fn submit_review(&self, review: &NewReview) -> Option<ReviewView> {
        self.post("/review", review)
            .await
            .map_err(|e| error!("Error submitting review: {}", e))
            .ok()
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthReply {
        let credentials = Credentials {
            username: username.to_owned(),
            password: password.to_owned(),
            display_name: None,
        };
        match self.post::<Account, _>("/login", &credentials).await {
            Ok(account) => AuthReply::Account(account),
            Err(e) => {
                error!("Login error: {}", e);
                AuthReply::Error(
                    e.message()
                        .unwrap_or("Login failed. Please try again.")
                        .to_owned(),
                )
            }
        }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AuthReply {
        let credentials = Credentials {
            username: username.to_owned(),
            password: password.to_owned(),
            display_name: display_name.map(str::to_owned),
        };
        match self.post::<Account, _>("/register", &credentials).await {
            Ok(account) => AuthReply::Account(account),
            Err(e) => {
                error!("Registration error: {}", e);
                AuthReply::Error(
                    e.message()
                        .unwrap_or("Registration failed. Please try again.")
                        .to_owned(),
                )
            }
        }
    }

    pub async fn logout(&self) -> AuthReply {
        match self
            .send::<serde_json::Value, ()>(self.client.post(self.url("/logout")), None)
            .await
        {
            Ok(_) => {
                *self.session.borrow_mut() = None;
                AuthReply::LoggedOut
            }
            Err(e) => {
                error!("Logout error: {}", e);
                AuthReply::Error("Logout failed. Please try again.".to_owned())
            }
        }
    }

    pub async fn fetch_user_reviews(&self) -> Vec<MyReview> {
        self.get("/my-reviews").await.unwrap_or_else(|e| {
            error!("Error fetching user reviews: {}", e);
            Vec::new()
        })
    }

    pub async fn delete_review(&self, review_id: u64) -> bool {
        let request = self
            .client
            .delete(self.url(&format!("/delete-review/{}", review_id)));
        match self.send::<serde_json::Value, ()>(request, None).await {
            Ok(_) => true,
            Err(e) => {
                error!("Error deleting review: {}", e);
                false
            }
        }
    }

    pub async fn update_reviews(&self, updates: Vec<ReviewUpdate>) -> bool {
        let body = ReviewUpdates { updates };
        match self.post::<serde_json::Value, _>("/update-reviews", &body).await {
            Ok(_) => true,
            Err(e) => {
                error!("Error updating reviews: {}", e);
                false
            }
        }
    }

    pub async fn search_movies(&self, query: &str) -> Vec<MovieSummary> {
        let request = match self
            .client
            .get(self.url("/search"))
            .query(&SearchQuery { query })
        {
            Ok(request) => request,
            Err(e) => {
                error!("Error searching movies: {}", e);
                return Vec::new();
            }
        };
        self.send::<_, ()>(request, None).await.unwrap_or_else(|e| {
            error!("Error searching movies: {}", e);
            Vec::new()
        })
    }
}
