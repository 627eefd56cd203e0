//! Direct mount and unmount primitives plus overlay option construction.

pub mod mount;
pub mod overlayfs;
