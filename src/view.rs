use ramhorns::Template;

use crate::error::{PublishError, Result};

const LOGIN_TPL: &str = include_str!("../templates/login.html");
const PANEL_TPL: &str = include_str!("../templates/index.html");
const NOT_FOUND_TPL: &str = include_str!("../templates/404.html");

#[derive(ramhorns::Content)]
struct LoginPage<'a> {
    has_error: bool,
    error: &'a str,
}

#[derive(ramhorns::Content)]
struct PanelPage {
    show_logout: bool,
}

#[derive(ramhorns::Content)]
struct NotFoundPage {}

/// The few HTML pages the server renders itself. Templates are compiled into
/// the binary and parsed once at startup.
pub struct Views {
    login: Template<'static>,
    panel: Template<'static>,
    not_found: Template<'static>,
}

fn parse_template(name: &str, src: &'static str) -> Result<Template<'static>> {
    Template::new(src)
        .map_err(|e| PublishError::Render(format!("Error parsing {} template: {}", name, e)))
}

impl Views {
    pub fn load() -> Result<Views> {
        Ok(Views {
            login: parse_template("login", LOGIN_TPL)?,
            panel: parse_template("panel", PANEL_TPL)?,
            not_found: parse_template("404", NOT_FOUND_TPL)?,
        })
    }

    pub fn login(&self, error: Option<&str>) -> String {
        self.login.render(&LoginPage {
            has_error: error.is_some(),
            error: error.unwrap_or_default(),
        })
    }

    /// The publishing panel. The logout link only shows when there is a
    /// session to end.
    pub fn panel(&self, auth_enabled: bool) -> String {
        self.panel.render(&PanelPage { show_logout: auth_enabled })
    }

    pub fn not_found(&self) -> String {
        self.not_found.render(&NotFoundPage {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_without_error() {
        let views = Views::load().unwrap();
        let html = views.login(None);
        assert!(html.contains(r#"<form method="post" action="/login">"#));
        assert!(!html.contains("class=\"error\""));
    }

    #[test]
    fn test_login_with_error_is_escaped() {
        let views = Views::load().unwrap();
        let html = views.login(Some("Invalid username or password <b>"));
        assert!(html.contains(r#"<p class="error">Invalid username or password &lt;b&gt;</p>"#), "{}", html);
    }

    #[test]
    fn test_panel_logout_link() {
        let views = Views::load().unwrap();
        assert!(views.panel(true).contains(r#"<a href="/logout">"#));
        assert!(!views.panel(false).contains(r#"<a href="/logout">"#));
    }

    #[test]
    fn test_not_found() {
        let views = Views::load().unwrap();
        assert!(views.not_found().contains("<h1>404</h1>"));
    }
}
