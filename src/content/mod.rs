use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::content::content_renderer::ContentRenderer;
use crate::content::html_renderer::HtmlRenderer;
use crate::content::markdown_renderer::MarkdownRenderer;
use crate::error::{PublishError, Result};

pub mod autolink;
pub mod content_renderer;
pub mod heading_id;
pub mod html_renderer;
pub mod markdown_renderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Html,
    Markdown,
}

impl FromStr for ContentFormat {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "html" => Ok(ContentFormat::Html),
            "markdown" => Ok(ContentFormat::Markdown),
            other => Err(PublishError::Validation(format!("Unsupported content type: {}", other))),
        }
    }
}

impl Display for ContentFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentFormat::Html => f.write_str("html"),
            ContentFormat::Markdown => f.write_str("markdown"),
        }
    }
}

/// What gets written to disk for one page: the submitted source and the
/// document served at the page url.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub raw: String,
    pub html: String,
}

pub fn render(content: &str, format: ContentFormat, theme_css: Option<&str>) -> Result<RenderedPage> {
    match format {
        ContentFormat::Html => HtmlRenderer::render(content, theme_css),
        ContentFormat::Markdown => MarkdownRenderer::render(content, theme_css),
    }
}
