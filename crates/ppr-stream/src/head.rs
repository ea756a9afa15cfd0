//! Document head and closing markup.

use ppr_core::{escape_attr, ShellAssets};

use crate::runtime::RUNTIME_SCRIPT;

/// Head content rendered before the shell.
#[derive(Debug, Clone, Default)]
pub struct HeadContent {
    /// Page title.
    pub title: Option<String>,
    /// Meta tags.
    pub meta: Vec<(String, String)>,
    /// Extra raw tags appended to the head.
    pub extra: Vec<String>,
}

impl HeadContent {
    /// Create new head content with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Add a meta tag.
    pub fn with_meta(mut self, name: &str, content: &str) -> Self {
        self.meta.push((name.to_string(), content.to_string()));
        self
    }

    /// Append a raw tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.extra.push(tag.into());
        self
    }

    /// Render the document opening: doctype, head with asset preloads and
    /// the client runtime, and the opening body tag.
    pub fn render_opening(&self, assets: &ShellAssets) -> String {
        let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");

        if let Some(title) = &self.title {
            html.push_str(&format!("<title>{}</title>\n", escape_attr(title)));
        }

        for (name, content) in &self.meta {
            html.push_str(&format!(
                r#"<meta name="{}" content="{}">"#,
                escape_attr(name),
                escape_attr(content)
            ));
            html.push('\n');
        }

        html.push_str(&preload_tags(assets));

        if let Some(css) = &assets.inline_css {
            html.push_str(&format!("<style>{}</style>\n", css));
        }

        for tag in &self.extra {
            html.push_str(tag);
            html.push('\n');
        }

        html.push_str(&format!("<script>{}</script>\n", RUNTIME_SCRIPT));
        html.push_str("</head>\n<body>\n");
        html
    }
}

/// `<link>`/`<script>` tags that start fetching shell assets immediately.
pub fn preload_tags(assets: &ShellAssets) -> String {
    let mut html = String::new();

    for href in &assets.fonts {
        html.push_str(&format!(
            r#"<link rel="preload" href="{}" as="font" crossorigin>"#,
            escape_attr(href)
        ));
        html.push('\n');
    }

    for href in &assets.css {
        html.push_str(&format!(
            r#"<link rel="stylesheet" href="{}">"#,
            escape_attr(href)
        ));
        html.push('\n');
    }

    for src in &assets.js {
        html.push_str(&format!(
            r#"<link rel="modulepreload" href="{}">"#,
            escape_attr(src)
        ));
        html.push('\n');
        html.push_str(&format!(
            r#"<script type="module" src="{}" async></script>"#,
            escape_attr(src)
        ));
        html.push('\n');
    }

    html
}

/// Markup closing the document.
pub fn closing_markup() -> &'static str {
    "\n</body>\n</html>"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_opening() {
        let assets = ShellAssets::default()
            .with_css("/app.css")
            .with_js("/app.js")
            .with_font("/inter.woff2")
            .with_inline_css("body{margin:0}");
        let head = HeadContent::new("Shop").with_meta("description", "A \"shop\"");

        let html = head.render_opening(&assets);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Shop</title>"));
        assert!(html.contains(r#"content="A &quot;shop&quot;""#));
        assert!(html.contains(r#"<link rel="stylesheet" href="/app.css">"#));
        assert!(html.contains(r#"as="font""#));
        assert!(html.contains(r#"<script type="module" src="/app.js" async></script>"#));
        assert!(html.contains("<style>body{margin:0}</style>"));
        assert!(html.contains("window.__PPR__"));
        assert!(html.ends_with("<body>\n"));
    }
}
