use lazy_static::lazy_static;
use regex::Regex;

/// A piece of plain text, split around bare urls.
#[derive(Debug, PartialEq)]
pub enum Segment<'a> {
    Text(&'a str),
    Link { href: String, text: &'a str },
}

/// Finds bare `http://`, `https://` and `www.` urls the way GitHub does:
/// the url must start the text or follow whitespace or one of `*_~(`, and
/// trailing punctuation is not part of it.
pub fn split_links(text: &str) -> Vec<Segment<'_>> {
    lazy_static! {
        static ref URL_REGEX: Regex = Regex::new(r"(?i)(?:https?://|www\.)[^\s<]+").unwrap();
    }

    let mut segments = vec![];
    let mut last = 0;

    for m in URL_REGEX.find_iter(text) {
        if !starts_at_boundary(text, m.start()) {
            continue;
        }

        let url = trim_trailing(m.as_str());
        if !has_domain(url) {
            continue;
        }

        if m.start() > last {
            segments.push(Segment::Text(&text[last..m.start()]));
        }
        let href = if url.len() >= 4 && url[..4].eq_ignore_ascii_case("www.") {
            format!("http://{}", url)
        } else {
            url.to_string()
        };
        segments.push(Segment::Link { href, text: url });
        last = m.start() + url.len();
    }

    if last < text.len() {
        segments.push(Segment::Text(&text[last..]));
    }
    segments
}

fn starts_at_boundary(text: &str, start: usize) -> bool {
    match text[..start].chars().next_back() {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '*' | '_' | '~' | '('),
    }
}

fn trim_trailing(mut url: &str) -> &str {
    loop {
        let Some(last) = url.chars().next_back() else {
            return url;
        };
        match last {
            '?' | '!' | '.' | ',' | ':' | '*' | '_' | '~' | '\'' | '"' => {
                url = &url[..url.len() - 1];
            }
            ')' if url.matches(')').count() > url.matches('(').count() => {
                url = &url[..url.len() - 1];
            }
            _ => return url,
        }
    }
}

// Something has to follow the scheme or `www.`, and it needs a dot.
fn has_domain(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let rest = lower.strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .or_else(|| lower.strip_prefix("www."));
    match rest {
        Some(rest) if lower.starts_with("www.") => !rest.is_empty(),
        Some(rest) => rest.contains('.') || rest.starts_with("localhost"),
        None => false,
    }
}
