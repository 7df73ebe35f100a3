use serde::{Deserialize, Serialize};

/// Stored account. The identity cookie carries the username.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
}

/// Catalog entry, keyed by its external catalog id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl Movie {
    /// Text fed to the search index.
    pub fn search_text(&self) -> String {
        let mut text = self.title.clone();
        for part in [&self.tagline, &self.overview].iter() {
            if let Some(part) = part {
                text.push(' ');
                text.push_str(part);
            }
        }
        for genre in &self.genres {
            text.push(' ');
            text.push_str(genre);
        }
        text
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Review {
    pub movie_id: u64,
    pub user_id: u64,
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

pub fn rating_in_range(rating: Option<u8>) -> bool {
    rating.map_or(true, |r| r >= MIN_RATING && r <= MAX_RATING)
}

// Wire types shared by the server handlers and the client.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AuthStatus {
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub username: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReviewView {
    pub username: String,
    pub display_name: String,
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    pub tagline: Option<String>,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub wiki_link: String,
    pub reviews: Vec<ReviewView>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovieSummary {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
}

impl From<&Movie> for MovieSummary {
    fn from(movie: &Movie) -> Self {
        MovieSummary {
            id: movie.id,
            title: movie.title.clone(),
            poster_path: movie.poster_path.clone(),
            overview: movie.overview.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewReview {
    pub movie_id: u64,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MyReview {
    pub id: u64,
    pub movie_id: u64,
    pub movie_title: String,
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReviewUpdate {
    pub id: u64,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReviewUpdates {
    pub updates: Vec<ReviewUpdate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}
