//! Routing core for the postern relay.
//!
//! The [`SessionRouter`] owns a bounded [`RouteTable`] mapping every message
//! delivered into the operator's view back to the correspondent it came from,
//! so an operator reply can be relayed to the right chat. The [`composer`]
//! module builds annotated text whose offsets are counted in UTF-16 code
//! units, the convention the wire protocol uses for message entities.

pub mod composer;
pub mod error;
pub mod notice;
pub mod router;
pub mod table;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use {
    composer::{
        AnnotatedText, Annotation, AnnotationKind, Composer, DeliveryPath, Part, Placeholder,
        SentMessage, add_emphasis, encoded_length, send_annotated,
    },
    error::{Error, Result, TransportError},
    notice::NoticeTemplate,
    router::{InboundRelay, ReplyOutcome, SessionRouter},
    table::RouteTable,
    transport::RelayTransport,
    types::{ArtifactId, Correspondent, DeliveryTarget, InboundMessage, SourceRef},
};
