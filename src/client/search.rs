//! Debounced search box.
//!
//! The state machine is driven with explicit instants so the debounce and
//! stale-response rules are deterministic. A page that keeps taking input
//! while a search is out drives it as [`SearchBox::poll`], then [`fetch`],
//! then [`SearchBox::resolve`]; [`SearchBox::settle`] runs the same steps on
//! real timers for callers with nothing else to do meanwhile.

use super::ApiClient;
use crate::model::MovieSummary;
use log::debug;
use std::time::{Duration, Instant};

pub const DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub generation: u64,
    pub query: String,
}

#[derive(Debug, Default)]
pub struct SearchBox {
    query: String,
    deadline: Option<Instant>,
    generation: u64,
    in_flight: Option<u64>,
    results: Vec<MovieSummary>,
    loading: bool,
    open: bool,
}

impl SearchBox {
    pub fn new() -> SearchBox {
        SearchBox::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[MovieSummary] {
        &self.results
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// When the pending search fires, if one is scheduled.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A keystroke. Restarts the debounce window and supersedes any search
    /// still in flight.
    pub fn input(&mut self, query: &str, now: Instant) {
        self.query = query.to_owned();
        self.deadline = None;
        self.in_flight = None;
        self.loading = false;
        if query.trim().is_empty() {
            self.results.clear();
            self.open = false;
        } else {
            self.deadline = Some(now + DEBOUNCE);
        }
    }

    /// Fires the pending search once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<SearchRequest> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.generation += 1;
                self.in_flight = Some(self.generation);
                self.loading = true;
                Some(SearchRequest {
                    generation: self.generation,
                    query: self.query.trim().to_owned(),
                })
            }
            _ => None,
        }
    }

    /// Applies a response. Returns `false` and leaves the state untouched
    /// when the response belongs to a superseded or cancelled search.
    pub fn resolve(&mut self, generation: u64, results: Vec<MovieSummary>) -> bool {
        if self.in_flight != Some(generation) {
            debug!("dropping stale search response {}", generation);
            return false;
        }
        self.in_flight = None;
        self.loading = false;
        self.results = results;
        self.open = true;
        true
    }

    /// Unmount: forget the pending timer and any in-flight search.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.in_flight = None;
        self.loading = false;
    }

    pub fn outside_click(&mut self) {
        self.cancel();
        self.open = false;
    }

    /// Waits out the debounce window and runs the pending search, if any.
    /// Holds the box for the whole round trip, so one search at a time.
    /// Returns whether results were applied.
    pub async fn settle(&mut self, api: &ApiClient) -> bool {
        let deadline = match self.deadline {
            Some(deadline) => deadline,
            None => return false,
        };
        let now = Instant::now();
        if deadline > now {
            actix_rt::time::delay_for(deadline - now).await;
        }
        match self.poll(Instant::now()) {
            Some(request) => {
                let (generation, results) = fetch(api, request).await;
                self.resolve(generation, results)
            }
            None => false,
        }
    }
}

/// Runs a fired search without borrowing the box, tagging the results with
/// the request's generation for [`SearchBox::resolve`].
pub async fn fetch(api: &ApiClient, request: SearchRequest) -> (u64, Vec<MovieSummary>) {
    let results = api.search_movies(&request.query).await;
    (request.generation, results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: u64) -> MovieSummary {
        MovieSummary {
            id,
            title: format!("movie {}", id),
            poster_path: None,
            overview: None,
        }
    }

    #[test]
    fn only_the_last_keystroke_fires() {
        let t0 = Instant::now();
        let mut search = SearchBox::new();
        search.input("p", t0);
        search.input("pu", t0 + Duration::from_millis(200));
        search.input("pulp", t0 + Duration::from_millis(400));
        assert_eq!(search.poll(t0 + Duration::from_millis(600)), None);
        assert_eq!(
            search.deadline(),
            Some(t0 + Duration::from_millis(400) + DEBOUNCE)
        );
        let request = search.poll(t0 + Duration::from_millis(900)).unwrap();
        assert_eq!(request.query, "pulp");
        assert!(search.is_loading());
        assert_eq!(search.poll(t0 + Duration::from_millis(2000)), None);
    }

    #[test]
    fn stale_responses_are_dropped() {
        let t0 = Instant::now();
        let mut search = SearchBox::new();
        search.input("heat", t0);
        let first = search.poll(t0 + DEBOUNCE).unwrap();
        search.input("heathers", t0 + DEBOUNCE);
        let second = search.poll(t0 + DEBOUNCE * 2).unwrap();
        assert!(second.generation > first.generation);

        assert!(!search.resolve(first.generation, vec![movie(1)]));
        assert!(search.results().is_empty());
        assert!(search.resolve(second.generation, vec![movie(2)]));
        assert_eq!(search.results(), &[movie(2)][..]);
        assert!(search.is_open());
        assert!(!search.is_loading());
    }

    #[test]
    fn clearing_the_query_clears_results_without_fetching() {
        let t0 = Instant::now();
        let mut search = SearchBox::new();
        search.input("alien", t0);
        let request = search.poll(t0 + DEBOUNCE).unwrap();
        search.resolve(request.generation, vec![movie(3)]);
        search.input("   ", t0 + DEBOUNCE * 2);
        assert!(search.results().is_empty());
        assert!(!search.is_open());
        assert_eq!(search.deadline(), None);
        assert_eq!(search.poll(t0 + DEBOUNCE * 10), None);
    }

    #[test]
    fn cancel_and_outside_click() {
        let t0 = Instant::now();
        let mut search = SearchBox::new();
        search.input("alien", t0);
        search.cancel();
        assert_eq!(search.poll(t0 + DEBOUNCE), None);

        search.input("alien", t0);
        let request = search.poll(t0 + DEBOUNCE).unwrap();
        search.outside_click();
        assert!(!search.resolve(request.generation, vec![movie(4)]));
        assert!(!search.is_open());
        assert!(!search.is_loading());
    }

    #[actix_rt::test]
    async fn settle_against_unreachable_server() {
        let api = ApiClient::new("http://127.0.0.1:1");
        let mut search = SearchBox::new();
        assert!(!search.settle(&api).await);
        search.input("pulp", Instant::now());
        assert!(search.settle(&api).await);
        assert!(search.results().is_empty());
        assert!(search.is_open());
    }

    #[actix_rt::test]
    async fn typing_during_a_fetch_supersedes_it() {
        let api = ApiClient::new("http://127.0.0.1:1");
        let t0 = Instant::now();
        let mut search = SearchBox::new();
        search.input("pulp", t0);
        let request = search.poll(t0 + DEBOUNCE).unwrap();
        let pending = fetch(&api, request);
        search.input("pulp fiction", t0 + DEBOUNCE);
        let (generation, results) = pending.await;
        assert!(!search.resolve(generation, results));
        assert!(!search.is_open());

        let request = search.poll(t0 + DEBOUNCE * 2).unwrap();
        let (generation, results) = fetch(&api, request).await;
        assert!(search.resolve(generation, results));
        assert!(search.is_open());
    }
}
