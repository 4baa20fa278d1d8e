//! Media validation and upload pipeline
//!
//! Turns a user's file selection into at most three uploaded media
//! references for a post.

pub mod composer;
pub mod file;
pub mod preview;
pub mod probe;
pub mod slots;

pub use composer::{MediaComposer, PendingMedia, Selection};
pub use file::{MediaFile, MediaKind};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use probe::{
    container_duration, mp4_duration, webm_duration, ContainerProbe, MediaProbe, ProbeError,
};
pub use slots::{MediaSlots, SLOT_COUNT};
