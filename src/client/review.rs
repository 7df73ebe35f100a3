use super::session::Session;
use super::ApiClient;
use crate::model::*;
use log::warn;
use std::collections::BTreeMap;

/// A movie page: details, the visible review list and the review form.
#[derive(Debug, Default)]
pub struct MoviePage {
    pub movie: Option<MovieDetails>,
    pub reviews: Vec<ReviewView>,
    pub rating: Option<u8>,
    pub comment: String,
}

impl MoviePage {
    pub fn new() -> MoviePage {
        MoviePage::default()
    }

    pub fn loaded(&mut self, movie: Option<MovieDetails>) {
        if let Some(movie) = movie {
            self.reviews = movie.reviews.clone();
            self.movie = Some(movie);
        }
    }

    pub fn is_loading(&self) -> bool {
        self.movie.is_none()
    }

    pub fn set_rating(&mut self, rating: Option<u8>) {
        self.rating = rating;
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = comment.to_owned();
    }

    /// The request a submit would send; `None` while nothing is loaded.
    pub fn submission(&self) -> Option<NewReview> {
        let movie = self.movie.as_ref()?;
        Some(NewReview {
            movie_id: movie.id,
            rating: self.rating,
            comment: if self.comment.is_empty() {
                None
            } else {
                Some(self.comment.clone())
            },
        })
    }

    /// Applies the server's answer to a submit. A stored review is appended
    /// under the session's display name and the form cleared; a failed
    /// submit changes nothing.
    pub fn submitted(&mut self, reply: Option<ReviewView>, session: &Session) -> bool {
        match reply {
            Some(review) => {
                self.reviews.push(ReviewView {
                    display_name: session.reviewer_name().to_owned(),
                    ..review
                });
                self.rating = None;
                self.comment.clear();
                true
            }
            None => false,
        }
    }

    pub async fn load(&mut self, api: &ApiClient, movie_id: Option<u64>) {
        let movie = match movie_id {
            Some(movie_id) => api.fetch_movie_details(movie_id).await,
            None => api.fetch_explore().await,
        };
        self.loaded(movie);
    }

    pub async fn submit(&mut self, api: &ApiClient, session: &Session) -> bool {
        let review = match self.submission() {
            Some(review) => review,
            None => return false,
        };
        let reply = api.submit_review(&review).await;
        self.submitted(reply, session)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Edit {
    rating: Option<u8>,
    comment: Option<String>,
}

/// The user's own reviews with pending, unsaved edits.
#[derive(Debug)]
pub struct ReviewEditor {
    reviews: Vec<MyReview>,
    edits: BTreeMap<u64, Edit>,
    loading: bool,
}

impl Default for ReviewEditor {
    fn default() -> Self {
        ReviewEditor {
            reviews: Vec::new(),
            edits: BTreeMap::new(),
            loading: true,
        }
    }
}

impl ReviewEditor {
    pub fn new() -> ReviewEditor {
        ReviewEditor::default()
    }

    pub fn reviews(&self) -> &[MyReview] {
        &self.reviews
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_changes(&self) -> bool {
        !self.edits.is_empty()
    }

    pub fn loaded(&mut self, reviews: Vec<MyReview>) {
        self.reviews = reviews;
        self.loading = false;
    }

    pub fn edit_rating(&mut self, id: u64, rating: u8) {
        self.edits.entry(id).or_default().rating = Some(rating);
    }

    pub fn edit_comment(&mut self, id: u64, comment: &str) {
        self.edits.entry(id).or_default().comment = Some(comment.to_owned());
    }

    /// Rating as currently shown: the pending edit, else the saved value.
    pub fn rating(&self, id: u64) -> Option<u8> {
        self.edits
            .get(&id)
            .and_then(|edit| edit.rating)
            .or_else(|| self.find(id).and_then(|review| review.rating))
    }

    pub fn comment(&self, id: u64) -> Option<&str> {
        self.edits
            .get(&id)
            .and_then(|edit| edit.comment.as_deref())
            .or_else(|| self.find(id).and_then(|review| review.comment.as_deref()))
    }

    fn find(&self, id: u64) -> Option<&MyReview> {
        self.reviews.iter().find(|review| review.id == id)
    }

    pub fn removed(&mut self, id: u64) {
        self.reviews.retain(|review| review.id != id);
        self.edits.remove(&id);
    }

    /// Takes every pending edit as one batch. `None` when there is nothing
    /// to save.
    pub fn begin_save(&mut self) -> Option<Vec<ReviewUpdate>> {
        if self.edits.is_empty() {
            return None;
        }
        self.loading = true;
        let edits = std::mem::replace(&mut self.edits, BTreeMap::new());
        Some(
            edits
                .into_iter()
                .map(|(id, edit)| ReviewUpdate {
                    id,
                    rating: edit.rating,
                    comment: edit.comment,
                })
                .collect(),
        )
    }

    pub async fn load(&mut self, api: &ApiClient) {
        self.loading = true;
        let reviews = api.fetch_user_reviews().await;
        self.loaded(reviews);
    }

    pub async fn delete(&mut self, api: &ApiClient, id: u64) {
        if !api.delete_review(id).await {
            warn!("review {} may still exist on the server", id);
        }
        self.removed(id);
    }

    /// Sends pending edits and reloads the list. Returns whether anything
    /// was sent.
    pub async fn save(&mut self, api: &ApiClient) -> bool {
        let updates = match self.begin_save() {
            Some(updates) => updates,
            None => return false,
        };
        api.update_reviews(updates).await;
        self.load(api).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(reviews: Vec<ReviewView>) -> MovieDetails {
        MovieDetails {
            id: 680,
            title: "Pulp Fiction".to_owned(),
            tagline: None,
            poster_path: None,
            overview: None,
            genres: vec!["Crime".to_owned()],
            wiki_link: "#".to_owned(),
            reviews,
        }
    }

    fn view(name: &str, rating: Option<u8>) -> ReviewView {
        ReviewView {
            username: name.to_owned(),
            display_name: name.to_owned(),
            rating,
            comment: None,
        }
    }

    fn mine(id: u64, rating: u8, comment: &str) -> MyReview {
        MyReview {
            id,
            movie_id: 680,
            movie_title: "Pulp Fiction".to_owned(),
            rating: Some(rating),
            comment: Some(comment.to_owned()),
        }
    }

    #[test]
    fn submitting_appends_to_visible_list() {
        let mut page = MoviePage::new();
        assert!(page.submission().is_none());
        page.loaded(Some(details(vec![view("bob", Some(4))])));
        page.set_rating(Some(9));
        page.set_comment("great");
        assert_eq!(
            page.submission(),
            Some(NewReview {
                movie_id: 680,
                rating: Some(9),
                comment: Some("great".to_owned()),
            })
        );
        let session = Session {
            authenticated: true,
            username: Some("ann".to_owned()),
            display_name: "Ann Lee".to_owned(),
        };
        assert!(page.submitted(Some(view("ann", Some(9))), &session));
        assert_eq!(page.reviews.len(), 2);
        assert_eq!(page.reviews[1].username, "ann");
        assert_eq!(page.reviews[1].display_name, "Ann Lee");
        assert_eq!(page.reviews[1].rating, Some(9));
        assert_eq!(page.rating, None);
        assert!(page.comment.is_empty());
    }

    #[test]
    fn failed_submit_keeps_the_form() {
        let mut page = MoviePage::new();
        page.loaded(Some(details(vec![])));
        page.set_comment("draft");
        assert!(!page.submitted(None, &Session::default()));
        assert!(page.reviews.is_empty());
        assert_eq!(page.comment, "draft");
    }

    #[test]
    fn anonymous_reviewer_shows_as_you() {
        let mut page = MoviePage::new();
        page.loaded(Some(details(vec![])));
        page.set_rating(Some(3));
        assert!(page.submitted(Some(view("ann", Some(3))), &Session::default()));
        assert_eq!(page.reviews[0].display_name, "You");
    }

    #[test]
    fn edits_preserve_the_other_field() {
        let mut editor = ReviewEditor::new();
        assert!(editor.is_loading());
        editor.loaded(vec![mine(1, 5, "ok"), mine(2, 7, "good")]);
        editor.edit_rating(1, 8);
        assert_eq!(editor.rating(1), Some(8));
        assert_eq!(editor.comment(1), Some("ok"));
        editor.edit_comment(1, "better");
        assert_eq!(editor.rating(1), Some(8));
        assert_eq!(editor.comment(1), Some("better"));
        assert_eq!(editor.rating(2), Some(7));
    }

    #[test]
    fn save_batches_all_edits() {
        let mut editor = ReviewEditor::new();
        editor.loaded(vec![mine(1, 5, "ok"), mine(2, 7, "good")]);
        assert_eq!(editor.begin_save(), None);
        assert!(!editor.is_loading());

        editor.edit_comment(2, "meh");
        editor.edit_rating(1, 6);
        let updates = editor.begin_save().unwrap();
        assert_eq!(
            updates,
            vec![
                ReviewUpdate {
                    id: 1,
                    rating: Some(6),
                    comment: None,
                },
                ReviewUpdate {
                    id: 2,
                    rating: None,
                    comment: Some("meh".to_owned()),
                },
            ]
        );
        assert!(editor.is_loading());
        assert!(!editor.has_changes());
    }

    #[test]
    fn removing_drops_pending_edits() {
        let mut editor = ReviewEditor::new();
        editor.loaded(vec![mine(1, 5, "ok"), mine(2, 7, "good")]);
        editor.edit_rating(1, 9);
        editor.removed(1);
        assert_eq!(editor.reviews().len(), 1);
        assert!(!editor.has_changes());
    }

    #[actix_rt::test]
    async fn unreachable_server_leaves_pages_usable() {
        let api = ApiClient::new("http://127.0.0.1:1");

        let mut page = MoviePage::new();
        page.load(&api, Some(680)).await;
        assert!(page.is_loading());
        assert!(!page.submit(&api, &Session::default()).await);

        let mut editor = ReviewEditor::new();
        editor.load(&api).await;
        assert!(!editor.is_loading());
        assert!(editor.reviews().is_empty());
        assert!(!editor.save(&api).await);

        editor.loaded(vec![mine(1, 5, "ok")]);
        editor.edit_rating(1, 2);
        assert!(editor.save(&api).await);
        assert!(editor.reviews().is_empty());
        assert!(!editor.is_loading());
    }
}
