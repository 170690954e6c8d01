use crate::session::{SessionToken, SESSION_COOKIE};

/// Value of cookie `name` in a `Cookie` request header, if present.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

/// `Set-Cookie` value handing the session token to the browser. Not marked
/// `Secure`, so it also works behind plain HTTP.
pub fn session_cookie(token: &SessionToken) -> String {
    format!("{}={}; Path=/; Max-Age={}; HttpOnly", SESSION_COOKIE, token.value, token.max_age_secs)
}

/// `Set-Cookie` value telling the browser to drop the session token.
pub fn expired_session_cookie() -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly", SESSION_COOKIE)
}
