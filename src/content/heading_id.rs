use std::collections::HashSet;

/// Hands out heading ids for one document.
///
/// The slug keeps ASCII letters (lowercased), digits, `-` and `_`, turns
/// whitespace into `-`, and drops everything else including non-ASCII text.
/// A slug already handed out in the same document gets `-1`, `-2`, ...
#[derive(Default)]
pub struct HeadingIds {
    seen: HashSet<String>,
}

impl HeadingIds {
    pub fn next_id(&mut self, heading_text: &str) -> String {
        let base = slugify(heading_text);
        if self.seen.insert(base.clone()) {
            return base;
        }

        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.seen.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

pub fn slugify(text: &str) -> String {
    let slug: String = text.trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
            '-' | '_' => Some(c),
            c if c.is_ascii_whitespace() => Some('-'),
            _ => None,
        })
        .collect();

    if slug.is_empty() {
        "heading".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hi"), "hi");
        assert_eq!(slugify("  Hello World  "), "hello-world");
        assert_eq!(slugify("What's new in 2.0?"), "whats-new-in-20");
        assert_eq!(slugify("snake_case and-dash"), "snake_case-and-dash");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
    }

    #[test]
    fn test_slugify_keeps_underscore() {
        assert_eq!(slugify("snake_case"), "snake_case");
        assert_eq!(slugify("__init__ Method"), "__init__-method");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "heading");
        assert_eq!(slugify("日本語"), "heading");
        assert_eq!(slugify("!!!"), "heading");
    }

    #[test]
    fn test_collisions() {
        let mut ids = HeadingIds::default();
        assert_eq!(ids.next_id("Intro"), "intro");
        assert_eq!(ids.next_id("Intro"), "intro-1");
        assert_eq!(ids.next_id("intro"), "intro-2");
        assert_eq!(ids.next_id("Intro 1"), "intro-1-1");
        assert_eq!(ids.next_id("Other"), "other");
    }
}
