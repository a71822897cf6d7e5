//! Render glue shared by every host.
//!
//! Code blocks may start with a bare number on their first line to pin the
//! rendered width in pixels:
//!
//! ```text
//! 400
//! graph TD; A-->B
//! ```

use rand::Rng;

/// Fence tags the host glue registers, in registration order
pub const FENCE_TAGS: &[&str] = &["mer", "merlight", "merdark"];

/// Prefix shown for failures rendered inline
pub const RENDER_ERROR_PREFIX: &str = "Mermaid rendering error: ";

const RENDER_ID_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Result of splitting a leading width directive off a diagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidthDirective {
    pub width: Option<u32>,
    pub source: String,
}

/// Split a leading width line off `source`.
///
/// The first line, trimmed, must consist only of ASCII digits. The rest of
/// the text, with leading whitespace removed, becomes the diagram source.
/// Anything else leaves the input untouched.
pub fn parse_width(source: &str) -> WidthDirective {
    let (first_line, rest) = match source.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (source, ""),
    };
    let first_line = first_line.trim();

    if !first_line.is_empty() && first_line.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(width) = first_line.parse::<u32>() {
            return WidthDirective {
                width: Some(width),
                source: rest.trim_start().to_string(),
            };
        }
    }

    WidthDirective {
        width: None,
        source: source.to_string(),
    }
}

/// Visual theme selected by the fence tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagramTheme {
    #[default]
    Light,
    Dark,
}

impl DiagramTheme {
    /// Map a fence tag to a theme. `mer` is an alias for `merlight`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "mer" | "merlight" => Some(DiagramTheme::Light),
            "merdark" => Some(DiagramTheme::Dark),
            _ => None,
        }
    }

    /// Theme name understood by the library
    pub fn mermaid_theme(&self) -> &'static str {
        match self {
            DiagramTheme::Light => "default",
            DiagramTheme::Dark => "dark",
        }
    }

    /// Container background color
    pub fn background(&self) -> &'static str {
        match self {
            DiagramTheme::Light => "#ffffff",
            DiagramTheme::Dark => "#000000",
        }
    }
}

/// One diagram handed to a script host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub id: String,
    pub source: String,
    pub theme: DiagramTheme,
    pub width: Option<u32>,
}

impl RenderRequest {
    /// Build a request from a raw code block body, consuming any width line.
    pub fn from_block(raw: &str, theme: DiagramTheme) -> Self {
        let WidthDirective { width, source } = parse_width(raw);
        Self {
            id: generate_render_id(),
            source,
            theme,
            width,
        }
    }
}

/// What the host glue displays at the render site
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderArtifact {
    Diagram {
        id: String,
        markup: String,
        width: Option<u32>,
        background: &'static str,
    },
    /// Inline failure; the rest of the document keeps rendering
    Error { message: String },
}

impl RenderArtifact {
    pub fn error(reason: impl std::fmt::Display) -> Self {
        RenderArtifact::Error {
            message: format!("{}{}", RENDER_ERROR_PREFIX, reason),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RenderArtifact::Error { .. })
    }

    /// Displayable markup for either variant
    pub fn markup(&self) -> String {
        match self {
            RenderArtifact::Diagram { markup, .. } => markup.clone(),
            RenderArtifact::Error { message } => format!(
                "<div class=\"modern-mermaid-error\" style=\"color: red\">{}</div>",
                escape_html(message)
            ),
        }
    }
}

/// `mermaid-` followed by 9 random base-36 characters
pub fn generate_render_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..RENDER_ID_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("mermaid-{}", suffix)
}

/// Container style for a rendered diagram
pub fn container_style(theme: DiagramTheme, width: Option<u32>) -> String {
    let mut style = format!(
        "background-color: {}; padding: 20px; border-radius: 8px; display: flex; \
         justify-content: center; position: relative;",
        theme.background()
    );
    if let Some(width) = width.filter(|w| *w > 0) {
        style.push_str(&format!(" width: {}px; overflow-x: auto;", width));
    }
    style
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
