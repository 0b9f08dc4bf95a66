//! Textual rendering of a compiled grammar (§4.7).
//!
//! [`crate::options::Output::Parser`] bypasses this module entirely and
//! returns a [`crate::runtime::LoadedParser`] directly — these two
//! renderers only cover the `types` and `source` text artifacts.

mod source;
mod types;

pub use source::render as render_source;
pub use types::render as render_types;
