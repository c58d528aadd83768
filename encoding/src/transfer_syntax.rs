//! The DICOM transfer syntax data structure and the built-in registry.
//!
//! A transfer syntax tells how the main data set of a file is encoded:
//! byte order, whether the VR is explicit,
//! and whether the pixel data is encapsulated.
//! The registry is a static table,
//! looked up by UID with [`get`].

use crate::decode::basic::BasicDecoder;
use crate::decode::explicit_be::ExplicitVRBigEndianDecoder;
use crate::decode::explicit_le::ExplicitVRLittleEndianDecoder;
use crate::decode::implicit_le::ImplicitVRLittleEndianDecoder;
use crate::decode::DecodeFrom;
use crate::encode::explicit::ExplicitVREncoder;
use crate::encode::implicit_le::ImplicitVRLittleEndianEncoder;
use crate::encode::EncodeTo;
use byteordered::Endianness;
use minidcm_core::dictionary::DataDictionary;
use std::io::{Read, Write};

/// A decoder with its type erased.
pub type DynDecoder<S> = Box<dyn DecodeFrom<S>>;

/// An encoder with its type erased.
pub type DynEncoder<'w, W> = Box<dyn EncodeTo<W> + 'w>;

/// The requirements of a transfer syntax beyond element encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Native pixel data, nothing else to do.
    None,
    /// Pixel data is encapsulated in fragments
    /// and may need a pixel codec to be decoded.
    /// The data set itself is readable.
    EncapsulatedPixelData,
    /// The data set itself is encoded in a way not supported here
    /// (such as deflate compression).
    Unsupported,
}

/// A DICOM transfer syntax specifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferSyntax {
    /// The unique identifier of the transfer syntax.
    uid: &'static str,
    /// The name of the transfer syntax.
    name: &'static str,
    /// The byte order of data.
    byte_order: Endianness,
    /// Whether the transfer syntax mandates an explicit value representation,
    /// or the VR is implicit.
    explicit_vr: bool,
    codec: Codec,
}

impl TransferSyntax {
    /// Create a new transfer syntax descriptor.
    pub const fn new(
        uid: &'static str,
        name: &'static str,
        byte_order: Endianness,
        explicit_vr: bool,
        codec: Codec,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            byte_order,
            explicit_vr,
            codec,
        }
    }

    /// Create a new descriptor for an explicit VR little endian
    /// transfer syntax with the given codec.
    pub const fn new_ele(uid: &'static str, name: &'static str, codec: Codec) -> Self {
        TransferSyntax::new(uid, name, Endianness::Little, true, codec)
    }

    /// Obtain this transfer syntax' unique identifier.
    pub const fn uid(&self) -> &'static str {
        self.uid
    }

    /// Obtain the name of this transfer syntax.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Obtain this transfer syntax' expected endianness.
    pub const fn endianness(&self) -> Endianness {
        self.byte_order
    }

    /// Whether the value representation is written with every element.
    pub const fn explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// Obtain this transfer syntax' codec specification.
    pub const fn codec(&self) -> Codec {
        self.codec
    }

    /// Check whether the data set of this transfer syntax cannot be read.
    pub fn unsupported(&self) -> bool {
        self.codec == Codec::Unsupported
    }

    /// Retrieve the appropriate data element decoder for this transfer syntax
    /// and given reader type, using the standard data dictionary.
    /// Yields `None` if the data set cannot be decoded.
    pub fn decoder_for<S>(&self) -> Option<DynDecoder<S>>
    where
        S: ?Sized + Read,
    {
        self.decoder_with_dict(minidcm_core::StandardDataDictionary)
    }

    /// Retrieve the appropriate data element decoder for this transfer syntax,
    /// resolving implicit value representations with the given dictionary.
    /// Yields `None` if the data set cannot be decoded.
    pub fn decoder_with_dict<S, D>(&self, dict: D) -> Option<DynDecoder<S>>
    where
        S: ?Sized + Read,
        D: DataDictionary + 'static,
    {
        if self.unsupported() {
            return None;
        }
        match (self.byte_order, self.explicit_vr) {
            (Endianness::Little, false) => {
                Some(Box::new(ImplicitVRLittleEndianDecoder::with_dict(dict)))
            }
            (Endianness::Little, true) => Some(Box::new(ExplicitVRLittleEndianDecoder::default())),
            (Endianness::Big, true) => Some(Box::new(ExplicitVRBigEndianDecoder::default())),
            _ => None,
        }
    }

    /// Retrieve the appropriate data element encoder for this transfer syntax
    /// and the given writer type.
    /// Yields `None` if the data set cannot be encoded.
    pub fn encoder_for<'w, W>(&self) -> Option<DynEncoder<'w, W>>
    where
        W: 'w + ?Sized + Write,
    {
        if self.unsupported() {
            return None;
        }
        match (self.byte_order, self.explicit_vr) {
            (Endianness::Little, false) => Some(Box::new(ImplicitVRLittleEndianEncoder::default())),
            (byte_order, true) => Some(Box::new(ExplicitVREncoder::new(byte_order))),
            _ => None,
        }
    }

    /// Obtain a dynamic basic decoder, based on this transfer syntax' expected endianness.
    pub fn basic_decoder(&self) -> BasicDecoder {
        BasicDecoder::from(self.endianness())
    }
}

/// Implicit VR Little Endian: Default Transfer Syntax for DICOM
pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    Endianness::Little,
    false,
    Codec::None,
);

/// Explicit VR Little Endian
pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    Codec::None,
);

/// Explicit VR Big Endian
pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    Endianness::Big,
    true,
    Codec::None,
);

/// Deflated Explicit VR Little Endian
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.1.99",
    "Deflated Explicit VR Little Endian",
    Codec::Unsupported,
);

/// Encapsulated Uncompressed Explicit VR Little Endian
pub const ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax =
    TransferSyntax::new_ele(
        "1.2.840.10008.1.2.1.98",
        "Encapsulated Uncompressed Explicit VR Little Endian",
        Codec::EncapsulatedPixelData,
    );

/// RLE Lossless
pub const RLE_LOSSLESS: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.5",
    "RLE Lossless",
    Codec::EncapsulatedPixelData,
);

/// JPEG Baseline (Process 1)
pub const JPEG_BASELINE: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.50",
    "JPEG Baseline (Process 1)",
    Codec::EncapsulatedPixelData,
);

/// JPEG Extended (Process 2 & 4)
pub const JPEG_EXTENDED: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.51",
    "JPEG Extended (Process 2 & 4)",
    Codec::EncapsulatedPixelData,
);

/// JPEG Lossless, Non-Hierarchical (Process 14)
pub const JPEG_LOSSLESS_NON_HIERARCHICAL: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.57",
    "JPEG Lossless, Non-Hierarchical (Process 14)",
    Codec::EncapsulatedPixelData,
);

/// JPEG Lossless, Non-Hierarchical, First-Order Prediction
pub const JPEG_LOSSLESS_NON_HIERARCHICAL_FIRST_ORDER_PREDICTION: TransferSyntax =
    TransferSyntax::new_ele(
        "1.2.840.10008.1.2.4.70",
        "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
        Codec::EncapsulatedPixelData,
    );

/// JPEG-LS Lossless Image Compression
pub const JPEG_LS_LOSSLESS: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.80",
    "JPEG-LS Lossless Image Compression",
    Codec::EncapsulatedPixelData,
);

/// JPEG-LS Lossy (Near-Lossless) Image Compression
pub const JPEG_LS_LOSSY: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.81",
    "JPEG-LS Lossy (Near-Lossless) Image Compression",
    Codec::EncapsulatedPixelData,
);

/// JPEG 2000 Image Compression (Lossless Only)
pub const JPEG_2000_LOSSLESS: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.90",
    "JPEG 2000 Image Compression (Lossless Only)",
    Codec::EncapsulatedPixelData,
);

/// JPEG 2000 Image Compression
pub const JPEG_2000: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.91",
    "JPEG 2000 Image Compression",
    Codec::EncapsulatedPixelData,
);

static ENTRIES: &[TransferSyntax] = &[
    IMPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_BIG_ENDIAN,
    DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
    ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN,
    RLE_LOSSLESS,
    JPEG_BASELINE,
    JPEG_EXTENDED,
    JPEG_LOSSLESS_NON_HIERARCHICAL,
    JPEG_LOSSLESS_NON_HIERARCHICAL_FIRST_ORDER_PREDICTION,
    JPEG_LS_LOSSLESS,
    JPEG_LS_LOSSY,
    JPEG_2000_LOSSLESS,
    JPEG_2000,
];

/// Look up a transfer syntax by UID.
///
/// Trailing padding (space or NUL) in the UID is ignored.
pub fn get(uid: &str) -> Option<&'static TransferSyntax> {
    let uid = uid.trim_end_matches(|c: char| c == ' ' || c == '\0');
    ENTRIES.iter().find(|ts| ts.uid == uid)
}

/// Iterate over all known transfer syntaxes.
pub fn entries() -> impl Iterator<Item = &'static TransferSyntax> {
    ENTRIES.iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::BasicDecode;
    use minidcm_core::header::{Header, Length};
    use minidcm_core::{DataElementHeader, Tag, VR};
    use rstest::rstest;

    #[rstest]
    #[case("1.2.840.10008.1.2", false, Endianness::Little, Codec::None)]
    #[case("1.2.840.10008.1.2.1\0", true, Endianness::Little, Codec::None)]
    #[case("1.2.840.10008.1.2.2 ", true, Endianness::Big, Codec::None)]
    #[case("1.2.840.10008.1.2.5", true, Endianness::Little, Codec::EncapsulatedPixelData)]
    #[case("1.2.840.10008.1.2.1.99", true, Endianness::Little, Codec::Unsupported)]
    fn lookup_by_uid(
        #[case] uid: &str,
        #[case] explicit_vr: bool,
        #[case] endianness: Endianness,
        #[case] codec: Codec,
    ) {
        let ts = get(uid).expect("should be registered");
        assert_eq!(ts.explicit_vr(), explicit_vr);
        assert_eq!(ts.endianness(), endianness);
        assert_eq!(ts.codec(), codec);
    }

    #[test]
    fn unknown_uid() {
        assert!(get("1.2.3.4").is_none());
    }

    #[test]
    fn deflated_has_no_decoder() {
        assert!(DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN
            .decoder_for::<&[u8]>()
            .is_none());
        assert!(DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN
            .encoder_for::<Vec<u8>>()
            .is_none());
    }

    #[test]
    fn decoder_and_encoder_agree() {
        for ts in [
            &IMPLICIT_VR_LITTLE_ENDIAN,
            &EXPLICIT_VR_LITTLE_ENDIAN,
            &EXPLICIT_VR_BIG_ENDIAN,
        ] {
            let header = DataElementHeader::new(Tag(0x0028, 0x0010), VR::US, Length(2));
            let encoder = ts.encoder_for::<Vec<u8>>().unwrap();
            let mut out = Vec::new();
            encoder.encode_element_header(&mut out, header).unwrap();

            let decoder = ts.decoder_for::<&[u8]>().unwrap();
            let mut source = &out[..];
            let (decoded, _) = decoder.decode_header(&mut source).unwrap();
            assert_eq!(decoded.tag(), header.tag);
            assert_eq!(decoded.vr(), VR::US, "in {}", ts.name());
            assert_eq!(decoded.len, Length(2));
            assert!(source.is_empty());

            assert_eq!(ts.basic_decoder().endianness(), ts.endianness());
        }
    }
}
