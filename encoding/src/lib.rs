#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]
//! DICOM encoding and decoding primitives.
//!
//! This crate provides the byte-level building blocks
//! for reading and writing DICOM Part-10 content:
//!
//! - [`source`] wraps a seekable reader into a [`ByteSource`]
//!   with bounds checking and a switchable byte order;
//! - [`decode`] and [`encode`] hold the data element header
//!   decoders and encoders for the uncompressed transfer syntaxes;
//! - [`text`] decodes text according to the specific character set;
//! - [`transfer_syntax`] describes the known transfer syntaxes
//!   and builds decoders and encoders for them at run-time.
//!
//! All APIs are based on synchronous I/O.

pub mod decode;
pub mod encode;
pub mod source;
pub mod text;
pub mod transfer_syntax;

pub use byteordered::Endianness;
pub use decode::Decode;
pub use encode::Encode;
pub use source::ByteSource;
pub use transfer_syntax::{Codec, TransferSyntax};
