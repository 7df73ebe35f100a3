use super::{ApiClient, AuthReply};
use crate::model::AuthStatus;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub authenticated: bool,
    pub username: Option<String>,
    pub display_name: String,
}

impl Session {
    pub fn from_status(status: &AuthStatus) -> Session {
        if !status.is_authenticated {
            return Session::default();
        }
        Session {
            authenticated: true,
            username: status.username.clone(),
            display_name: status
                .display_name
                .clone()
                .or_else(|| status.username.clone())
                .unwrap_or_default(),
        }
    }

    /// Combines the server's answer with a username remembered on the
    /// client, which older builds treated as proof of login on its own.
    pub fn resolve(status: Option<&AuthStatus>, remembered: Option<&str>) -> Session {
        match (status, remembered) {
            (Some(status), _) if status.is_authenticated => Session::from_status(status),
            (_, Some(username)) if !username.is_empty() => Session {
                authenticated: true,
                username: Some(username.to_owned()),
                display_name: username.to_owned(),
            },
            _ => Session::default(),
        }
    }

    pub fn greeting(&self) -> Option<String> {
        if self.display_name.is_empty() {
            None
        } else {
            Some(format!("Welcome, {}", self.display_name))
        }
    }

    /// Name shown on reviews this session writes.
    pub fn reviewer_name(&self) -> &str {
        if self.display_name.is_empty() {
            "You"
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Page {
    Landing,
    Explore,
    Search,
    Movie,
    MyReviews,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    Render,
    Redirect(&'static str),
}

/// Decides whether `page` renders. `session` is `None` when the auth check
/// itself failed, in which case the page renders.
pub fn gate(page: Page, session: Option<&Session>) -> Gate {
    let authenticated = match session {
        Some(session) => session.authenticated,
        None => return Gate::Render,
    };
    match page {
        Page::Landing if authenticated => Gate::Redirect("/explore"),
        Page::Landing => Gate::Render,
        _ if authenticated => Gate::Render,
        _ => Gate::Redirect("/"),
    }
}

/// Asks the server and gates `page`, returning the session alongside.
/// A `remembered` username stands in for a signed in session.
pub async fn guard(api: &ApiClient, page: Page, remembered: Option<&str>) -> (Gate, Session) {
    let status = api.auth_status().await;
    let session = Session::resolve(status.as_ref(), remembered);
    let checked = if status.is_none() && !session.authenticated {
        None
    } else {
        Some(&session)
    };
    (gate(page, checked), session)
}

/// Header bar state: brand links, search form and account controls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Navbar {
    pub session: Session,
}

impl Navbar {
    pub async fn load(api: &ApiClient, remembered: Option<&str>) -> Navbar {
        let status = api.auth_status().await;
        Navbar {
            session: Session::resolve(status.as_ref(), remembered),
        }
    }

    pub fn welcome(&self) -> Option<String> {
        if self.session.authenticated {
            self.session.greeting()
        } else {
            None
        }
    }

    /// Home, search and my-reviews only show for a signed in user.
    pub fn links(&self) -> &'static [(&'static str, &'static str)] {
        if self.session.authenticated {
            &[("Home", "/explore"), ("Search", "/search"), ("My Reviews", "/my-reviews")]
        } else {
            &[]
        }
    }

    /// Ends the session; the header falls back to the anonymous view even
    /// when the server call fails.
    pub async fn logout(&mut self, api: &ApiClient) -> AuthReply {
        let reply = api.logout().await;
        self.session = Session::default();
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(authenticated: bool) -> AuthStatus {
        AuthStatus {
            is_authenticated: authenticated,
            username: if authenticated { Some("ann".to_owned()) } else { None },
            display_name: if authenticated { Some("Ann".to_owned()) } else { None },
        }
    }

    #[test]
    fn landing_redirects_signed_in_users() {
        let ann = Session::from_status(&status(true));
        let anonymous = Session::from_status(&status(false));
        assert_eq!(gate(Page::Landing, Some(&ann)), Gate::Redirect("/explore"));
        assert_eq!(gate(Page::Landing, Some(&anonymous)), Gate::Render);
        assert_eq!(gate(Page::Landing, None), Gate::Render);
    }

    #[test]
    fn protected_pages_redirect_anonymous_users() {
        let ann = Session::from_status(&status(true));
        let anonymous = Session::from_status(&status(false));
        for page in &[Page::Explore, Page::Search, Page::Movie, Page::MyReviews] {
            assert_eq!(gate(*page, Some(&anonymous)), Gate::Redirect("/"));
            assert_eq!(gate(*page, Some(&ann)), Gate::Render);
            assert_eq!(gate(*page, None), Gate::Render);
        }
    }

    #[test]
    fn remembered_username_opens_protected_pages() {
        let session = Session::resolve(Some(&status(false)), Some("bob"));
        assert_eq!(gate(Page::MyReviews, Some(&session)), Gate::Render);
        assert_eq!(gate(Page::Landing, Some(&session)), Gate::Redirect("/explore"));
        let session = Session::resolve(Some(&status(false)), None);
        assert_eq!(gate(Page::MyReviews, Some(&session)), Gate::Redirect("/"));
    }

    #[test]
    fn session_names() {
        let session = Session::from_status(&status(true));
        assert_eq!(session.greeting().as_deref(), Some("Welcome, Ann"));
        assert_eq!(session.reviewer_name(), "Ann");
        let anonymous = Session::from_status(&status(false));
        assert_eq!(anonymous.greeting(), None);
        assert_eq!(anonymous.reviewer_name(), "You");
    }

    #[test]
    fn remembered_username_counts_as_signed_in() {
        let session = Session::resolve(Some(&status(false)), Some("bob"));
        assert!(session.authenticated);
        assert_eq!(session.display_name, "bob");
        assert!(Session::resolve(None, Some("bob")).authenticated);
        assert!(!Session::resolve(None, Some("")).authenticated);
        assert_eq!(
            Session::resolve(Some(&status(true)), Some("bob")).display_name,
            "Ann"
        );
    }

    #[test]
    fn navbar_for_signed_in_and_anonymous_users() {
        let navbar = Navbar {
            session: Session::from_status(&status(true)),
        };
        assert_eq!(navbar.welcome().as_deref(), Some("Welcome, Ann"));
        assert_eq!(navbar.links().len(), 3);
        assert_eq!(navbar.links()[0], ("Home", "/explore"));
        let navbar = Navbar::default();
        assert_eq!(navbar.welcome(), None);
        assert!(navbar.links().is_empty());
    }

    #[actix_rt::test]
    async fn guard_renders_when_the_server_is_down() {
        let api = ApiClient::new("http://127.0.0.1:1");
        let (gate, session) = guard(&api, Page::MyReviews, None).await;
        assert_eq!(gate, Gate::Render);
        assert!(!session.authenticated);

        let (gate, session) = guard(&api, Page::Landing, Some("bob")).await;
        assert_eq!(gate, Gate::Redirect("/explore"));
        assert_eq!(session.display_name, "bob");
    }

    #[actix_rt::test]
    async fn navbar_logout_clears_the_session() {
        let api = ApiClient::new("http://127.0.0.1:1");
        let mut navbar = Navbar::load(&api, Some("bob")).await;
        assert_eq!(navbar.welcome().as_deref(), Some("Welcome, bob"));
        assert!(matches!(navbar.logout(&api).await, AuthReply::Error(_)));
        assert!(!navbar.session.authenticated);
        assert_eq!(navbar.welcome(), None);
    }
}
