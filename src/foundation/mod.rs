pub(crate) mod abort;
#[doc(hidden)]
pub mod alloc_track;
pub(crate) mod core;
pub(crate) mod error;
