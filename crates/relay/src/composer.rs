//! Annotated text with offsets in UTF-16 code units.
//!
//! Text is authored as UTF-8 but the wire protocol counts entity offsets and
//! lengths in UTF-16 code units, so every position handed to the transport is
//! converted here. Characters outside the Basic Multilingual Plane take two
//! units.

use std::{fmt, str::FromStr};

use {
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use postern_metrics::{counter, relay as relay_metrics};

use crate::{
    error::{Error, Result, TransportError},
    transport::RelayTransport,
    types::{ArtifactId, DeliveryTarget},
};

/// Default glyph placeholder: U+2B50 WHITE MEDIUM STAR, a single BMP unit.
pub const DEFAULT_PLACEHOLDER: char = '\u{2B50}';

const _: () = assert!(DEFAULT_PLACEHOLDER.len_utf16() == 1);

/// Length of `fragment` in UTF-16 code units.
#[must_use]
pub fn encoded_length(fragment: &str) -> usize {
    fragment.chars().map(char::len_utf16).sum()
}

/// What an annotation does to the span it covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Bold text.
    Emphasis,
    /// Inline custom glyph; `glyph_id` is the transport's reference id.
    GlyphRef { glyph_id: String },
}

/// A typed span over a text buffer, in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(flatten)]
    pub kind: AnnotationKind,
    pub offset: usize,
    pub length: usize,
}

impl Annotation {
    #[must_use]
    pub fn emphasis(offset: usize, length: usize) -> Self {
        Self {
            kind: AnnotationKind::Emphasis,
            offset,
            length,
        }
    }

    #[must_use]
    pub fn glyph(glyph_id: impl Into<String>, offset: usize) -> Self {
        Self {
            kind: AnnotationKind::GlyphRef {
                glyph_id: glyph_id.into(),
            },
            offset,
            length: 1,
        }
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }

    /// True when the spans share code units but neither contains the other.
    #[must_use]
    pub fn crosses(&self, other: &Self) -> bool {
        let overlaps = self.offset < other.end() && other.offset < self.end();
        let nested = (self.offset <= other.offset && other.end() <= self.end())
            || (other.offset <= self.offset && self.end() <= other.end());
        overlaps && !nested
    }
}

/// A character validated to occupy exactly one UTF-16 code unit.
///
/// Glyph annotations have length 1, so a wider placeholder would shift the
/// offset of every annotation after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder(char);

impl Placeholder {
    pub fn new(ch: char) -> Result<Self> {
        let units = ch.len_utf16();
        if units != 1 {
            return Err(Error::InvalidPlaceholder {
                placeholder: ch.to_string(),
                units,
            });
        }
        Ok(Self(ch))
    }

    #[must_use]
    pub fn as_char(self) -> char {
        self.0
    }
}

impl Default for Placeholder {
    fn default() -> Self {
        Self(DEFAULT_PLACEHOLDER)
    }
}

impl FromStr for Placeholder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Self::new(ch),
            _ => Err(Error::InvalidPlaceholder {
                placeholder: s.to_string(),
                units: encoded_length(s),
            }),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A text buffer plus the annotations placed over it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedText {
    text: String,
    annotations: Vec<Annotation>,
    encoded_len: usize,
}

impl AnnotatedText {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let encoded_len = encoded_length(&text);
        Self {
            text,
            annotations: Vec::new(),
            encoded_len,
        }
    }

    /// Build from parts, rejecting annotations that exceed the buffer or
    /// partially cross another annotation.
    pub fn with_annotations(text: impl Into<String>, annotations: Vec<Annotation>) -> Result<Self> {
        let mut out = Self::new(text);
        for annotation in annotations {
            out.push_annotation(annotation)?;
        }
        Ok(out)
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Buffer length in UTF-16 code units.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    pub fn push_text(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.encoded_len += encoded_length(fragment);
    }

    /// Append `placeholder` and a glyph annotation over it.
    pub fn push_glyph(&mut self, placeholder: Placeholder, glyph_id: &str) {
        let offset = self.encoded_len;
        self.text.push(placeholder.as_char());
        self.encoded_len += 1;
        self.annotations.push(Annotation::glyph(glyph_id, offset));
    }

    /// Validate and add an annotation. Exact duplicates are ignored.
    pub fn push_annotation(&mut self, annotation: Annotation) -> Result<()> {
        if annotation.end() > self.encoded_len {
            return Err(Error::invalid_annotation(format!(
                "span {}..{} exceeds text length {}",
                annotation.offset,
                annotation.end(),
                self.encoded_len
            )));
        }
        if let Some(other) = self.annotations.iter().find(|a| a.crosses(&annotation)) {
            return Err(Error::invalid_annotation(format!(
                "span {}..{} partially overlaps {}..{}",
                annotation.offset,
                annotation.end(),
                other.offset,
                other.end()
            )));
        }
        if !self.annotations.contains(&annotation) {
            self.annotations.push(annotation);
        }
        Ok(())
    }

    /// Emphasise the first occurrence of `substring`. Returns whether an
    /// annotation was added.
    pub fn emphasize(&mut self, substring: &str) -> bool {
        let before = self.annotations.len();
        let annotations = std::mem::take(&mut self.annotations);
        self.annotations = add_emphasis(&self.text, annotations, substring);
        self.annotations.len() > before
    }
}

/// One piece of a composed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part<'a> {
    Text(&'a str),
    /// A placeholder annotated with this glyph reference id.
    Glyph(&'a str),
}

/// Builds annotated text using a validated placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Composer {
    placeholder: Placeholder,
}

impl Composer {
    #[must_use]
    pub fn new(placeholder: Placeholder) -> Self {
        Self { placeholder }
    }

    #[must_use]
    pub fn placeholder(&self) -> Placeholder {
        self.placeholder
    }

    /// `prefix` + placeholder + `suffix`, with one glyph annotation at
    /// `encoded_length(prefix)`.
    #[must_use]
    pub fn compose_with_placeholder(
        &self,
        prefix: &str,
        glyph_ref: &str,
        suffix: &str,
    ) -> AnnotatedText {
        self.compose_from_parts([Part::Text(prefix), Part::Glyph(glyph_ref), Part::Text(suffix)])
    }

    #[must_use]
    pub fn compose_from_parts<'a>(
        &self,
        parts: impl IntoIterator<Item = Part<'a>>,
    ) -> AnnotatedText {
        let mut out = AnnotatedText::default();
        for part in parts {
            match part {
                Part::Text(fragment) => out.push_text(fragment),
                Part::Glyph(glyph_ref) => out.push_glyph(self.placeholder, glyph_ref),
            }
        }
        out
    }
}

/// Add an emphasis annotation over the first occurrence of `substring`.
///
/// Returns `annotations` unchanged when `substring` is empty or absent, when
/// the same span is already emphasised, or when the span would partially
/// cross an existing annotation.
#[must_use]
pub fn add_emphasis(
    text: &str,
    mut annotations: Vec<Annotation>,
    substring: &str,
) -> Vec<Annotation> {
    if substring.is_empty() {
        return annotations;
    }
    let Some(byte_idx) = text.find(substring) else {
        return annotations;
    };

    let emphasis = Annotation::emphasis(encoded_length(&text[..byte_idx]), encoded_length(substring));
    if annotations.contains(&emphasis) {
        return annotations;
    }
    if annotations.iter().any(|a| a.crosses(&emphasis)) {
        debug!(
            offset = emphasis.offset,
            length = emphasis.length,
            "skipping emphasis that would cross an existing annotation"
        );
        return annotations;
    }
    annotations.push(emphasis);
    annotations
}

/// Which payload reached the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPath {
    Annotated,
    Fallback,
}

/// Result of [`send_annotated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub artifact: ArtifactId,
    pub path: DeliveryPath,
}

/// Deliver `message`, degrading to `fallback_text` without annotations if the
/// transport rejects the annotated payload.
///
/// Only a [`TransportError::Rejected`] triggers the fallback: a failed
/// request may still have been delivered, and sending the fallback on top
/// would duplicate it.
pub async fn send_annotated<T>(
    transport: &T,
    target: DeliveryTarget,
    message: &AnnotatedText,
    fallback_text: &str,
) -> Result<SentMessage>
where
    T: RelayTransport + ?Sized,
{
    match transport
        .send(target, message.text(), message.annotations())
        .await
    {
        Ok(artifact) => Ok(SentMessage {
            artifact,
            path: DeliveryPath::Annotated,
        }),
        Err(TransportError::Rejected { reason }) if !message.annotations().is_empty() => {
            warn!(
                chat_id = %target,
                annotations = message.annotations().len(),
                reason = %reason,
                "annotated send rejected, delivering fallback text"
            );
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::ANNOTATION_FALLBACKS_TOTAL).increment(1);

            let artifact = transport.send(target, fallback_text, &[]).await?;
            Ok(SentMessage {
                artifact,
                path: DeliveryPath::Fallback,
            })
        },
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::test_support::MockTransport, rstest::rstest};

    #[rstest]
    #[case("", 0)]
    #[case("hello", 5)]
    #[case("Привет", 6)]
    #[case("\u{1F389}hello", 7)]
    #[case("a\u{1F600}\u{1F600}b", 6)]
    fn encoded_length_counts_utf16_units(#[case] input: &str, #[case] expected: usize) {
        assert_eq!(encoded_length(input), expected);
    }

    #[test]
    fn encoded_length_differs_from_bytes_and_chars() {
        let s = "\u{1F389}hello";
        assert_eq!(s.len(), 9);
        assert_eq!(s.chars().count(), 6);
        assert_eq!(encoded_length(s), 7);
    }

    #[test]
    fn placeholder_rejects_astral_characters() {
        let err = Placeholder::new('\u{1F44D}').unwrap_err();
        assert!(matches!(err, Error::InvalidPlaceholder { units: 2, .. }));
    }

    #[rstest]
    #[case("\u{2764}\u{FE0F}")]
    #[case("")]
    #[case("ab")]
    #[case("\u{1F600}")]
    fn placeholder_parse_rejects_non_single_unit(#[case] input: &str) {
        assert!(input.parse::<Placeholder>().is_err());
    }

    #[test]
    fn placeholder_parse_accepts_bmp_character() {
        let p: Placeholder = "\u{2B50}".parse().unwrap();
        assert_eq!(p, Placeholder::default());
        assert_eq!(encoded_length(&p.to_string()), 1);
    }

    #[test]
    fn compose_with_placeholder_places_glyph_after_prefix() {
        let composer = Composer::default();
        let out = composer.compose_with_placeholder("A: ", "glyph42", " done");

        assert_eq!(out.text(), "A: \u{2B50} done");
        assert_eq!(out.annotations(), &[Annotation::glyph("glyph42", 3)]);
        assert_eq!(out.encoded_len(), 9);
    }

    #[test]
    fn compose_with_placeholder_counts_astral_prefix() {
        let composer = Composer::default();
        let out = composer.compose_with_placeholder("\u{1F389} ", "g", "");
        assert_eq!(out.annotations()[0].offset, 3);
    }

    #[test]
    fn compose_from_parts_accumulates_offsets() {
        let composer = Composer::default();
        let out = composer.compose_from_parts([
            Part::Glyph("first"),
            Part::Text(" caf\u{E9} \u{1F600} "),
            Part::Glyph("second"),
            Part::Text("!"),
            Part::Glyph("third"),
        ]);

        let offsets: Vec<_> = out.annotations().iter().map(|a| a.offset).collect();
        // " café 😀 " is 9 units: space, 4 letters, space, surrogate pair, space.
        assert_eq!(offsets, vec![0, 10, 12]);
        assert_eq!(out.encoded_len(), 13);
        assert!(out.annotations().iter().all(|a| a.length == 1));
    }

    #[test]
    fn add_emphasis_spans_substring() {
        let text = "Welcome to ExampleCo today";
        let annotations = add_emphasis(text, Vec::new(), "ExampleCo");
        assert_eq!(annotations, vec![Annotation::emphasis(11, 9)]);
    }

    #[test]
    fn add_emphasis_absent_substring_is_noop() {
        let text = "Welcome to ExampleCo today";
        let annotations = add_emphasis(text, Vec::new(), "ExampleCo");
        let again = add_emphasis(text, annotations.clone(), "Globex");
        assert_eq!(again, annotations);
    }

    #[test]
    fn add_emphasis_empty_substring_is_noop() {
        assert!(add_emphasis("anything", Vec::new(), "").is_empty());
    }

    #[test]
    fn add_emphasis_is_idempotent() {
        let text = "Welcome to ExampleCo today";
        let once = add_emphasis(text, Vec::new(), "ExampleCo");
        let twice = add_emphasis(text, once.clone(), "ExampleCo");
        assert_eq!(once, twice);
    }

    #[test]
    fn add_emphasis_uses_first_occurrence_after_multibyte_text() {
        let text = "\u{1F389} \u{41F}\u{440}\u{438} ok ok";
        let annotations = add_emphasis(text, Vec::new(), "ok");
        // emoji (2) + space + 3 Cyrillic letters + space
        assert_eq!(annotations, vec![Annotation::emphasis(7, 2)]);
    }

    #[test]
    fn add_emphasis_skips_crossing_span() {
        let text = "abcdef";
        let existing = vec![Annotation::emphasis(0, 3)];
        let out = add_emphasis(text, existing.clone(), "cde");
        assert_eq!(out, existing);
    }

    #[test]
    fn add_emphasis_allows_nested_span() {
        let composer = Composer::default();
        let mut out = composer.compose_with_placeholder("Hi ", "g1", " there");
        assert!(out.emphasize(&format!("Hi {}", Placeholder::default())));
        assert_eq!(out.annotations().len(), 2);
        assert_eq!(out.annotations()[1], Annotation::emphasis(0, 4));
    }

    #[test]
    fn with_annotations_rejects_out_of_bounds() {
        let err = AnnotatedText::with_annotations("abc", vec![Annotation::emphasis(2, 2)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAnnotation { .. }));
    }

    #[test]
    fn with_annotations_rejects_crossing_spans() {
        let result = AnnotatedText::with_annotations("abcdef", vec![
            Annotation::emphasis(0, 3),
            Annotation::emphasis(2, 3),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn with_annotations_accepts_astral_bounds() {
        let text = AnnotatedText::with_annotations("\u{1F600}", vec![Annotation::emphasis(0, 2)])
            .unwrap();
        assert_eq!(text.encoded_len(), 2);
    }

    #[tokio::test]
    async fn send_annotated_uses_annotated_path_when_accepted() {
        let transport = MockTransport::default();
        let message = Composer::default().compose_with_placeholder("A: ", "glyph42", " done");

        let sent = send_annotated(&transport, DeliveryTarget(5), &message, "A: done")
            .await
            .unwrap();

        assert_eq!(sent.path, DeliveryPath::Annotated);
        let sends = transport.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].text, message.text());
        assert_eq!(sends[0].annotations, message.annotations());
    }

    #[tokio::test]
    async fn send_annotated_falls_back_exactly_once_on_rejection() {
        let transport = MockTransport::default();
        transport.reject_annotated();
        let message = Composer::default().compose_with_placeholder("A: ", "bogus", " done");

        let sent = send_annotated(&transport, DeliveryTarget(5), &message, "A: done")
            .await
            .unwrap();

        assert_eq!(sent.path, DeliveryPath::Fallback);
        let sends = transport.sends();
        assert_eq!(sends.len(), 1, "only the fallback may be delivered");
        assert_eq!(sends[0].text, "A: done");
        assert!(sends[0].annotations.is_empty());
        assert_eq!(sends[0].artifact, sent.artifact);
    }

    #[tokio::test]
    async fn send_annotated_surfaces_network_failure_without_fallback() {
        let transport = MockTransport::default();
        transport.fail_sends();
        let message = Composer::default().compose_with_placeholder("A: ", "g", " done");

        let err = send_annotated(&transport, DeliveryTarget(5), &message, "A: done")
            .await
            .unwrap_err();

        let (context, source) = match err {
            Error::Transport(TransportError::Failed { context, source }) => (context, source),
            other => panic!("expected transport failure, got {other:?}"),
        };
        assert_eq!(context, "send message");
        let io = source
            .downcast_ref::<std::io::Error>()
            .expect("io error source");
        assert_eq!(io.to_string(), "connection reset");
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn send_annotated_surfaces_fallback_failure() {
        let transport = MockTransport::default();
        transport.reject_all_sends();
        let message = Composer::default().compose_with_placeholder("A: ", "g", " done");

        let err = send_annotated(&transport, DeliveryTarget(5), &message, "A: done")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Transport(TransportError::Rejected { .. })
        ));
        assert_eq!(transport.attempts(), 2);
        assert!(transport.sends().is_empty());
    }
}
