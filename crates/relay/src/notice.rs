//! Operator-facing header sent ahead of each relayed message.

use crate::{
    composer::{AnnotatedText, Composer, Part},
    types::Correspondent,
};

const DEFAULT_ICON: &str = "\u{1F4E9}";
const DEFAULT_TITLE: &str = "New message from a correspondent";

/// Header layout:
///
/// ```text
/// 📩 New message from a correspondent
///
/// 👤 User: @handle
/// 🆔 ID: 1387024303
/// ```
///
/// With a `glyph_id`, the leading icon is replaced by a custom glyph in the
/// annotated rendering. The user label is always emphasised.
#[derive(Debug, Clone)]
pub struct NoticeTemplate {
    pub title: String,
    pub glyph_id: Option<String>,
}

impl Default for NoticeTemplate {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            glyph_id: None,
        }
    }
}

impl NoticeTemplate {
    #[must_use]
    pub fn new(title: impl Into<String>, glyph_id: Option<String>) -> Self {
        Self {
            title: title.into(),
            glyph_id: glyph_id.filter(|g| !g.is_empty()),
        }
    }

    /// Build the annotated header and its plain fallback text.
    #[must_use]
    pub fn render(&self, composer: &Composer, correspondent: &Correspondent) -> (AnnotatedText, String) {
        let label = correspondent.handle_label();
        let body = format!(
            " {}\n\n\u{1F464} User: {label}\n\u{1F194} ID: {}",
            self.title, correspondent.id
        );

        let mut annotated = match self.glyph_id.as_deref() {
            Some(glyph_id) => composer.compose_from_parts([Part::Glyph(glyph_id), Part::Text(&body)]),
            None => composer.compose_from_parts([Part::Text(DEFAULT_ICON), Part::Text(&body)]),
        };
        annotated.emphasize(&label);

        (annotated, format!("{DEFAULT_ICON}{body}"))
    }
}
