//! Output plumbing: compression codecs, object-store access and the durable
//! streams writers append to.

pub mod cloud;
pub mod compression;
pub mod storage;
