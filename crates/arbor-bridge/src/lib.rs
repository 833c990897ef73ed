#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Depth plane unpacking.
pub mod depth;

/// Bridge error types.
pub mod error;

/// Image and plane descriptors crossing the managed boundary.
pub mod image;

/// Processing of a marshaled camera/depth image pair.
pub mod process;

/// Exported JNI entry points.
pub mod jni_bindings;
