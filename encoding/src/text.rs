//! Text encoding and decoding for textual data element values.
//!
//! The character repertoire of a data set is declared by its
//! Specific Character Set (0008,0005) element.
//! Only single-byte repertoires, UTF-8 and GB18030 are recognized;
//! see [`SpecificCharacterSet`] for the complete list.
//! Data sets declaring anything else fall back to the default repertoire.

use encoding::all::{GB18030, ISO_8859_1, ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5, UTF_8};
use encoding::{DecoderTrap, EncoderTrap, Encoding, RawDecoder, StringWriter};
use snafu::{Backtrace, Snafu};
use std::borrow::Cow;

/// An error type for text encoding issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum EncodeTextError {
    /// The text contains characters outside of the character repertoire.
    #[snafu(display("{}", message))]
    EncodeCustom {
        /// The error message in plain text.
        message: Cow<'static, str>,
        backtrace: Backtrace,
    },
}

/// An error type for text decoding issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DecodeTextError {
    /// The byte sequence could not be decoded.
    #[snafu(display("{}", message))]
    DecodeCustom {
        /// The error message in plain text.
        message: Cow<'static, str>,
        backtrace: Backtrace,
    },
}

type EncodeResult<T> = Result<T, EncodeTextError>;
type DecodeResult<T> = Result<T, DecodeTextError>;

/// A holder of encoding and decoding mechanisms for text in DICOM content,
/// which according to the standard, depends on the specific character set.
pub trait TextCodec {
    /// Obtain the defined term of the text encoding,
    /// as it would appear in the Specific Character Set element.
    fn name(&self) -> &'static str;

    /// Decode the given byte buffer as a single string. The resulting string
    /// _may_ contain backslash characters ('\') to delimit individual values,
    /// and should be split later on if required.
    fn decode(&self, text: &[u8]) -> DecodeResult<String>;

    /// Encode a text value into a byte vector. The input string can
    /// feature multiple text values by using the backslash character ('\')
    /// as the value delimiter.
    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>>;
}

impl<'a, T: ?Sized> TextCodec for &'a T
where
    T: TextCodec,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        (**self).decode(text)
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        (**self).encode(text)
    }
}

/// An enum type for all currently supported character sets.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum SpecificCharacterSet {
    /// **ISO-IR 6**: the default character set.
    #[default]
    Default,
    /// **ISO-IR 100** (ISO-8859-1): the Western Europe character set.
    IsoIr100,
    /// **ISO-IR 101** (ISO-8859-2): the Central/Eastern Europe character set.
    IsoIr101,
    /// **ISO-IR 109** (ISO-8859-3): the South Europe character set.
    IsoIr109,
    /// **ISO-IR 110** (ISO-8859-4): the North Europe character set.
    IsoIr110,
    /// **ISO-IR 144** (ISO-8859-5): The Latin/Cyrillic character set.
    IsoIr144,
    /// **ISO-IR 192**: The Unicode character set based on the UTF-8 encoding.
    IsoIr192,
    /// **GB18030**: The Simplified Chinese character set.
    Gb18030,
}

impl SpecificCharacterSet {
    /// Obtain the specific character set identified by the given code string.
    ///
    /// Only the first value of a multi-valued code string is considered.
    ///
    /// # Example
    ///
    /// ```
    /// # use minidcm_encoding::text::SpecificCharacterSet;
    /// let character_set = SpecificCharacterSet::from_code("ISO_IR 100");
    /// assert_eq!(character_set, Some(SpecificCharacterSet::IsoIr100));
    /// ```
    pub fn from_code(code: &str) -> Option<Self> {
        use self::SpecificCharacterSet::*;
        let code = code.split('\\').next().unwrap_or_default();
        match code.trim_matches(|c: char| c == ' ' || c == '\0') {
            "" | "ISO_IR_6" | "ISO_IR 6" | "ISO 2022 IR 6" => Some(Default),
            "ISO_IR_100" | "ISO_IR 100" | "ISO 2022 IR 100" => Some(IsoIr100),
            "ISO_IR_101" | "ISO_IR 101" | "ISO 2022 IR 101" => Some(IsoIr101),
            "ISO_IR_109" | "ISO_IR 109" | "ISO 2022 IR 109" => Some(IsoIr109),
            "ISO_IR_110" | "ISO_IR 110" | "ISO 2022 IR 110" => Some(IsoIr110),
            "ISO_IR_144" | "ISO_IR 144" | "ISO 2022 IR 144" => Some(IsoIr144),
            "ISO_IR_192" | "ISO_IR 192" => Some(IsoIr192),
            "GB18030" => Some(Gb18030),
            _ => None,
        }
    }
}

impl TextCodec for SpecificCharacterSet {
    fn name(&self) -> &'static str {
        match self {
            SpecificCharacterSet::Default => "ISO_IR 6",
            SpecificCharacterSet::IsoIr100 => "ISO_IR 100",
            SpecificCharacterSet::IsoIr101 => "ISO_IR 101",
            SpecificCharacterSet::IsoIr109 => "ISO_IR 109",
            SpecificCharacterSet::IsoIr110 => "ISO_IR 110",
            SpecificCharacterSet::IsoIr144 => "ISO_IR 144",
            SpecificCharacterSet::IsoIr192 => "ISO_IR 192",
            SpecificCharacterSet::Gb18030 => "GB18030",
        }
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        match self {
            SpecificCharacterSet::Default => DefaultCharacterSetCodec.decode(text),
            SpecificCharacterSet::IsoIr100 => IsoIr100CharacterSetCodec.decode(text),
            SpecificCharacterSet::IsoIr101 => IsoIr101CharacterSetCodec.decode(text),
            SpecificCharacterSet::IsoIr109 => IsoIr109CharacterSetCodec.decode(text),
            SpecificCharacterSet::IsoIr110 => IsoIr110CharacterSetCodec.decode(text),
            SpecificCharacterSet::IsoIr144 => IsoIr144CharacterSetCodec.decode(text),
            SpecificCharacterSet::IsoIr192 => Utf8CharacterSetCodec.decode(text),
            SpecificCharacterSet::Gb18030 => Gb18030CharacterSetCodec.decode(text),
        }
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        match self {
            SpecificCharacterSet::Default => DefaultCharacterSetCodec.encode(text),
            SpecificCharacterSet::IsoIr100 => IsoIr100CharacterSetCodec.encode(text),
            SpecificCharacterSet::IsoIr101 => IsoIr101CharacterSetCodec.encode(text),
            SpecificCharacterSet::IsoIr109 => IsoIr109CharacterSetCodec.encode(text),
            SpecificCharacterSet::IsoIr110 => IsoIr110CharacterSetCodec.encode(text),
            SpecificCharacterSet::IsoIr144 => IsoIr144CharacterSetCodec.encode(text),
            SpecificCharacterSet::IsoIr192 => Utf8CharacterSetCodec.encode(text),
            SpecificCharacterSet::Gb18030 => Gb18030CharacterSetCodec.encode(text),
        }
    }
}

/// Replace undecodable bytes with an octal escape (`\ooo`).
fn decode_text_trap(
    _decoder: &mut dyn RawDecoder,
    input: &[u8],
    output: &mut dyn StringWriter,
) -> bool {
    for &c in input {
        output.write_char('\\');
        output.write_char((((c & 0o300) >> 6) + b'0') as char);
        output.write_char((((c & 0o070) >> 3) + b'0') as char);
        output.write_char(((c & 0o007) + b'0') as char);
    }
    true
}

/// Create and implement a character set type using the `encoding` crate.
macro_rules! decl_character_set {
    ($typ: ident, $term: literal, $val: expr) => {
        #[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
        #[doc = "Data type for the "]
        #[doc = $term]
        #[doc = "character set encoding."]
        pub struct $typ;

        impl TextCodec for $typ {
            fn name(&self) -> &'static str {
                $term
            }

            fn decode(&self, text: &[u8]) -> DecodeResult<String> {
                $val.decode(text, DecoderTrap::Call(decode_text_trap))
                    .map_err(|message| DecodeCustomSnafu { message }.build())
            }

            fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
                $val.encode(text, EncoderTrap::Strict)
                    .map_err(|message| EncodeCustomSnafu { message }.build())
            }
        }
    };
}

// ISO 8859-1 is a superset of the default repertoire
decl_character_set!(DefaultCharacterSetCodec, "ISO_IR 6", ISO_8859_1);
decl_character_set!(IsoIr100CharacterSetCodec, "ISO_IR 100", ISO_8859_1);
decl_character_set!(IsoIr101CharacterSetCodec, "ISO_IR 101", ISO_8859_2);
decl_character_set!(IsoIr109CharacterSetCodec, "ISO_IR 109", ISO_8859_3);
decl_character_set!(IsoIr110CharacterSetCodec, "ISO_IR 110", ISO_8859_4);
decl_character_set!(IsoIr144CharacterSetCodec, "ISO_IR 144", ISO_8859_5);
decl_character_set!(Utf8CharacterSetCodec, "ISO_IR 192", UTF_8);
decl_character_set!(Gb18030CharacterSetCodec, "GB18030", GB18030);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn test_codec<T>(codec: T, string: &str, bytes: &[u8])
    where
        T: TextCodec,
    {
        assert_eq!(codec.encode(string).expect("encoding"), bytes);
        assert_eq!(codec.decode(bytes).expect("decoding"), string);
    }

    #[test]
    fn iso_ir_6_baseline() {
        test_codec(SpecificCharacterSet::Default, "Smith^John", b"Smith^John");
        test_codec(DefaultCharacterSetCodec, "CT", b"CT");
    }

    #[test]
    fn iso_ir_100_baseline() {
        test_codec(
            SpecificCharacterSet::IsoIr100,
            "Simões^João",
            b"Sim\xF5es^Jo\xE3o",
        );
    }

    #[test]
    fn iso_ir_192_baseline() {
        test_codec(
            SpecificCharacterSet::IsoIr192,
            "Simões^João",
            "Simões^João".as_bytes(),
        );
        test_codec(Utf8CharacterSetCodec, "Иванков^Андрей", "Иванков^Андрей".as_bytes());
    }

    #[test]
    fn iso_ir_144_baseline() {
        test_codec(
            IsoIr144CharacterSetCodec,
            "Иванков^Андрей",
            b"\xB8\xD2\xD0\xDD\xDA\xDE\xD2^\xB0\xDD\xD4\xE0\xD5\xD9",
        );
    }

    #[test]
    fn invalid_utf8_is_escaped() {
        let text = Utf8CharacterSetCodec.decode(b"A\xFFB").unwrap();
        assert_eq!(text, "A\\377B");
    }

    #[test]
    fn unencodable_text_fails() {
        assert!(DefaultCharacterSetCodec.encode("Иванков").is_err());
    }

    #[rstest]
    #[case("ISO_IR 100", Some(SpecificCharacterSet::IsoIr100))]
    #[case("ISO_IR 192 ", Some(SpecificCharacterSet::IsoIr192))]
    #[case("", Some(SpecificCharacterSet::Default))]
    #[case("\\ISO 2022 IR 100", Some(SpecificCharacterSet::Default))]
    #[case("ISO 2022 IR 87", None)]
    fn character_set_from_code(#[case] code: &str, #[case] expected: Option<SpecificCharacterSet>) {
        assert_eq!(SpecificCharacterSet::from_code(code), expected);
    }
}
