//! Capabilities the core asks the shell to perform.
//!
//! Render is Crux's built-in capability and is used directly; it is the
//! "data changed" signal for the city list.

mod documents;

pub use self::documents::{
    BatchWrite, Document, DocumentError, DocumentOperation, DocumentOutput, DocumentResult,
    Documents, DocumentsCapability,
};
pub use crux_core::render::Render;

// The Effect derive names the app type in its generated impls.
#[allow(unused_imports)]
use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub documents: Documents<Event>,
}
