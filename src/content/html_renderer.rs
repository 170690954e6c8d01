use crate::content::content_renderer::ContentRenderer;
use crate::content::RenderedPage;
use crate::error::Result;

/// Publishes HTML exactly as submitted. The operator is trusted, so there is
/// no sanitization and the theme is ignored.
pub struct HtmlRenderer {}

impl ContentRenderer for HtmlRenderer {
    fn render(content: &str, _theme_css: Option<&str>) -> Result<RenderedPage> {
        Ok(RenderedPage {
            raw: content.to_string(),
            html: content.to_string(),
        })
    }
}
