use std::fmt::Write;

use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream};

use crate::content::autolink::{split_links, Segment};
use crate::content::content_renderer::ContentRenderer;
use crate::content::heading_id::HeadingIds;
use crate::content::RenderedPage;
use crate::error::{PublishError, Result};

/// Renders markdown into a standalone document.
///
/// GitHub flavoured: tables, strikethrough, task lists and bare url
/// autolinks. Headings get ids, every line break inside a paragraph is kept
/// as `<br />` and raw HTML is passed through untouched.
pub struct MarkdownRenderer {}

impl ContentRenderer for MarkdownRenderer {
    fn render(content: &str, theme_css: Option<&str>) -> Result<RenderedPage> {
        let fragment = Self::render_fragment(content);
        let html = Self::wrap_document(&fragment, theme_css.unwrap_or_default())?;

        Ok(RenderedPage {
            raw: content.to_string(),
            html,
        })
    }
}

struct PendingHeading<'a> {
    start: Tag<'a>,
    text: String,
    events: Vec<Event<'a>>,
}

impl MarkdownRenderer {
    fn parser_options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_GFM
    }

    pub fn render_fragment(md_text: &str) -> String {
        let parser = TextMergeStream::new(Parser::new_ext(md_text, Self::parser_options()));
        let events = Self::process_events(parser);

        let mut out = String::with_capacity(md_text.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn process_events<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
        let mut ids = HeadingIds::default();
        let mut out: Vec<Event<'a>> = vec![];
        let mut heading: Option<PendingHeading<'a>> = None;
        let mut link_depth = 0usize;
        let mut in_code_block = false;

        for event in events {
            match &event {
                Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => link_depth += 1,
                Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => link_depth = link_depth.saturating_sub(1),
                Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
                Event::End(TagEnd::CodeBlock) => in_code_block = false,
                _ => {}
            }

            let expanded = match event {
                Event::SoftBreak => vec![Event::HardBreak],
                Event::Text(text) if link_depth == 0 && !in_code_block => Self::autolink(text),
                other => vec![other],
            };

            for event in expanded {
                match event {
                    Event::Start(start @ Tag::Heading { .. }) => {
                        heading = Some(PendingHeading { start, text: String::new(), events: vec![] });
                    }
                    Event::End(end @ TagEnd::Heading(_)) => {
                        if let Some(pending) = heading.take() {
                            let id = ids.next_id(&pending.text);
                            out.push(Event::Start(Self::with_id(pending.start, id)));
                            out.extend(pending.events);
                        }
                        out.push(Event::End(end));
                    }
                    event => match heading.as_mut() {
                        Some(pending) => {
                            if let Event::Text(ref text) | Event::Code(ref text) = event {
                                pending.text.push_str(text);
                            }
                            pending.events.push(event);
                        }
                        None => out.push(event),
                    },
                }
            }
        }

        out
    }

    fn with_id(tag: Tag<'_>, id: String) -> Tag<'_> {
        match tag {
            Tag::Heading { level, classes, attrs, .. } => Tag::Heading {
                level,
                id: Some(CowStr::from(id)),
                classes,
                attrs,
            },
            other => other,
        }
    }

    fn autolink(text: CowStr<'_>) -> Vec<Event<'_>> {
        let segments = split_links(&text);
        if segments.iter().all(|s| matches!(s, Segment::Text(_))) {
            drop(segments);
            return vec![Event::Text(text)];
        }

        let mut events = vec![];
        for segment in segments {
            match segment {
                Segment::Text(s) => events.push(Event::Text(CowStr::from(s.to_string()))),
                Segment::Link { href, text } => {
                    events.push(Event::Start(Tag::Link {
                        link_type: LinkType::Autolink,
                        dest_url: CowStr::from(href),
                        title: CowStr::Borrowed(""),
                        id: CowStr::Borrowed(""),
                    }));
                    events.push(Event::Text(CowStr::from(text.to_string())));
                    events.push(Event::End(TagEnd::Link));
                }
            }
        }
        events
    }

    fn wrap_document(fragment: &str, theme_css: &str) -> Result<String> {
        let mut doc = String::with_capacity(fragment.len() + theme_css.len() + 320);
        write!(&mut doc, r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Published Content</title>
    <style>{}</style>
</head>
<body><article class="markdown-body">{}</article></body>
</html>"#, theme_css, fragment)
            .map_err(|e| PublishError::Render(e.to_string()))?;
        Ok(doc)
    }
}
