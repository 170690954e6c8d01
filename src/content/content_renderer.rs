use crate::content::RenderedPage;
use crate::error::Result;

pub trait ContentRenderer {
    fn render(content: &str, theme_css: Option<&str>) -> Result<RenderedPage>;
}
