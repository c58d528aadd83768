//! Lenient reading of DICOM Part-10 files into in-memory objects.
//!
//! Decoding never gives up on the whole file because of one bad element.
//! Problems are collected as [`DecodeIssue`]s, in the order found:
//!
//! - a bad value of known length is skipped,
//!   and decoding continues with the next element;
//! - a bad header, a length running past the end of its container,
//!   or an unexpected tag where an item was expected
//!   stops decoding at that point.
//!
//! Either way, the caller gets whatever was decoded before the problem.
//! Only problems with the file as a whole
//! (not DICOM, unreadable meta group, unsupported transfer syntax)
//! are returned as a [`ReadError`].

use crate::mem::{InMemDicomObject, InMemElement};
use crate::meta::{self, FileMetaTable};
use crate::FileDicomObject;
use minidcm_core::dictionary::{tags, DataDictionary};
use minidcm_core::header::{DataElementHeader, SequenceItemHeader};
use minidcm_core::value::{ByteRange, DataSetSequence, PixelFragmentSequence, PrimitiveValue, C};
use minidcm_core::{DataElement, StandardDataDictionary, Tag, VR};
use minidcm_encoding::decode::basic::BasicDecoder;
use minidcm_encoding::decode::implicit_le::ImplicitVRLittleEndianDecoder;
use minidcm_encoding::decode::{self, BasicDecode, DecodeFrom};
use minidcm_encoding::source::{self, ByteSource};
use minidcm_encoding::text::{DecodeTextError, SpecificCharacterSet, TextCodec};
use minidcm_encoding::transfer_syntax::{self, DynDecoder};
use minidcm_encoding::{Endianness, TransferSyntax};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The default maximum depth of nested sequences.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

const PREAMBLE_LEN: usize = 128;
const DICM_MAGIC_CODE: &[u8; 4] = b"DICM";

/// An error which may occur when loading a DICOM file.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("Could not open file '{}'", filename.display()))]
    OpenFile {
        filename: PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not prepare the byte source"))]
    CreateSource {
        #[snafu(backtrace)]
        source: source::Error,
    },
    #[snafu(display("Could not read the file preamble"))]
    ReadPreamble {
        #[snafu(backtrace)]
        source: source::Error,
    },
    /// No `DICM` code at offset 128.
    #[snafu(display("Not a DICOM file: missing `DICM` code after the preamble"))]
    NotDicom { backtrace: Backtrace },
    #[snafu(display("Could not parse meta group data set"))]
    ParseMetaDataSet {
        #[snafu(backtrace)]
        source: meta::Error,
    },
    /// The data set is encoded in a way which cannot be decoded,
    /// either because the transfer syntax is unknown
    /// or because the whole data set is compressed.
    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },
}

/// What went wrong while decoding part of a data set.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[non_exhaustive]
pub enum IssueKind {
    #[snafu(display(
        "stream truncated: {} bytes requested, {} available",
        requested,
        available
    ))]
    TruncatedStream { requested: u64, available: u64 },
    #[snafu(display("invalid value representation {:02X?}", code))]
    InvalidVr { code: [u8; 2] },
    #[snafu(display("declared length {} exceeds the {} bytes available", len, available))]
    LengthOverflow { len: u32, available: u64 },
    #[snafu(display("undefined length is not allowed for {}", vr))]
    UndefinedLength { vr: VR },
    #[snafu(display("invalid {} value: {}", vr, reason))]
    InvalidValue { vr: VR, reason: String },
    #[snafu(display("expected a sequence item, found {}", found))]
    BadItem { found: Tag },
    #[snafu(display("no {} before the end of the enclosing value", delimiter))]
    MissingDelimiter { delimiter: Tag },
    #[snafu(display("sequences nested deeper than {} levels", max_depth))]
    NestingTooDeep { max_depth: u32 },
    #[snafu(display("duplicate data element, the last one was kept"))]
    DuplicateTag {},
    #[snafu(display("unknown specific character set `{}`", code))]
    UnknownCharacterSet { code: String },
    #[snafu(display("unreadable data: {}", message))]
    Unreadable { message: String },
}

impl IssueKind {
    /// Whether decoding stopped because of this issue.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            IssueKind::InvalidValue { .. }
                | IssueKind::DuplicateTag { .. }
                | IssueKind::UnknownCharacterSet { .. }
        )
    }

    /// Whether the element this issue was recorded against
    /// should be considered malformed.
    pub fn marks_malformed(&self) -> bool {
        !matches!(
            self,
            IssueKind::DuplicateTag { .. } | IssueKind::UnknownCharacterSet { .. }
        )
    }
}

/// A problem found while decoding a data set.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeIssue {
    /// The data element concerned, if its tag could be read.
    pub tag: Option<Tag>,
    /// Absolute byte offset of the element (or item) header.
    pub offset: u64,
    /// Sequence nesting depth, 0 for the root data set.
    pub depth: u32,
    /// What went wrong.
    pub kind: IssueKind,
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.tag {
            Some(tag) => write!(f, "{} at offset {}: {}", tag, self.offset, self.kind),
            None => write!(f, "offset {}: {}", self.offset, self.kind),
        }
    }
}

/// Options for reading a DICOM file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    defer_pixel_data: bool,
    max_depth: u32,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            defer_pixel_data: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave native pixel data in the source,
    /// recording only its byte range.
    pub fn defer_pixel_data(mut self, defer: bool) -> Self {
        self.defer_pixel_data = defer;
        self
    }

    /// Set the maximum depth of nested sequences.
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// A decoded DICOM file, along with the problems found while decoding it.
#[derive(Debug, Clone)]
pub struct ReadOutcome<D = StandardDataDictionary> {
    pub object: FileDicomObject<InMemDicomObject<D>>,
    pub issues: Vec<DecodeIssue>,
}

impl<D> ReadOutcome<D> {
    /// Whether the whole data set was decoded.
    pub fn is_complete(&self) -> bool {
        !self.issues.iter().any(|issue| issue.kind.is_fatal())
    }
}

/// Open and decode a DICOM file with the standard data dictionary.
pub fn open_file<P>(path: P, options: &ReadOptions) -> Result<ReadOutcome, ReadError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).context(OpenFileSnafu { filename: path })?;
    from_reader(BufReader::new(file), options)
}

/// Decode a DICOM file from a seekable reader,
/// starting with its 128-byte preamble.
pub fn from_reader<R>(src: R, options: &ReadOptions) -> Result<ReadOutcome, ReadError>
where
    R: Read + Seek,
{
    read_with_dict(src, StandardDataDictionary, options)
}

/// Decode a DICOM file from a seekable reader,
/// resolving implicit value representations with the given dictionary.
pub fn read_with_dict<R, D>(
    src: R,
    dict: D,
    options: &ReadOptions,
) -> Result<ReadOutcome<D>, ReadError>
where
    R: Read + Seek,
    D: DataDictionary + Clone + 'static,
{
    let mut source = ByteSource::new(src).context(CreateSourceSnafu)?;
    ensure!(
        source.remaining() >= (PREAMBLE_LEN + DICM_MAGIC_CODE.len()) as u64,
        NotDicomSnafu
    );
    let preamble = source
        .read_bytes(PREAMBLE_LEN + DICM_MAGIC_CODE.len())
        .context(ReadPreambleSnafu)?;
    ensure!(preamble[PREAMBLE_LEN..] == DICM_MAGIC_CODE[..], NotDicomSnafu);

    let meta = FileMetaTable::read_from(&mut source).context(ParseMetaDataSetSnafu)?;
    let uid = meta.transfer_syntax();
    let ts = transfer_syntax::get(uid).context(UnsupportedTransferSyntaxSnafu { uid })?;
    let (obj, issues) = read_dataset_with_ts(&mut source, ts, dict, options)?;

    Ok(ReadOutcome {
        object: FileDicomObject::new(meta, obj),
        issues,
    })
}

/// Decode a data set from the current position of the source until its end,
/// in the given transfer syntax.
pub fn read_dataset_with_ts<R, D>(
    source: &mut ByteSource<R>,
    ts: &TransferSyntax,
    dict: D,
    options: &ReadOptions,
) -> Result<(InMemDicomObject<D>, Vec<DecodeIssue>), ReadError>
where
    R: Read + Seek,
    D: DataDictionary + Clone + 'static,
{
    let decoder = ts
        .decoder_with_dict(dict.clone())
        .context(UnsupportedTransferSyntaxSnafu { uid: ts.uid() })?;
    source.set_endianness(ts.endianness());
    debug!(transfer_syntax = ts.name(), offset = source.position(), "Reading data set");

    let mut obj = InMemDicomObject::new_empty_with_dict(dict.clone());
    let mut reader = DataSetReader {
        source,
        decoder,
        dict,
        options: *options,
        charset: SpecificCharacterSet::Default,
        issues: Vec::new(),
    };
    if reader.read_body(&mut obj, Bound::End, 0).is_err() {
        debug!(elements = obj.len(), "Decoding stopped early");
    }
    Ok((obj, reader.issues))
}

/// Decoding stopped; the reason was recorded as an issue.
#[derive(Debug)]
struct Stop;

type Step<T = ()> = std::result::Result<T, Stop>;

/// Where a data set body ends.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Bound {
    /// at the end of the source
    End,
    /// at this absolute offset
    Until(u64),
    /// at the next item delimiter,
    /// which must come before the given offset if there is one
    ItemDelimiter(Option<u64>),
}

impl Bound {
    /// The offset that no content may run past.
    fn limit(self) -> Option<u64> {
        match self {
            Bound::End => None,
            Bound::Until(end) => Some(end),
            Bound::ItemDelimiter(limit) => limit,
        }
    }
}

struct DataSetReader<'s, R, D> {
    source: &'s mut ByteSource<R>,
    decoder: DynDecoder<ByteSource<R>>,
    dict: D,
    options: ReadOptions,
    charset: SpecificCharacterSet,
    issues: Vec<DecodeIssue>,
}

impl<'s, R, D> DataSetReader<'s, R, D>
where
    R: Read + Seek,
    D: DataDictionary + Clone + 'static,
{
    fn read_body(&mut self, obj: &mut InMemDicomObject<D>, bound: Bound, depth: u32) -> Step {
        loop {
            let offset = self.source.position();
            match bound {
                Bound::End if self.source.remaining() == 0 => return Ok(()),
                Bound::Until(end) if offset >= end => return Ok(()),
                Bound::ItemDelimiter(Some(end)) if offset >= end => {
                    return self.stop(
                        None,
                        offset,
                        depth,
                        MissingDelimiterSnafu {
                            delimiter: Tag::ITEM_DELIMITER,
                        }
                        .build(),
                    );
                }
                _ => {}
            }

            let header = self.read_header(depth)?;
            let tag = header.tag;
            match tag {
                Tag::ITEM_DELIMITER if matches!(bound, Bound::ItemDelimiter(_)) => return Ok(()),
                tag if tag.group() == 0xFFFE => {
                    return self.stop(Some(tag), offset, depth, BadItemSnafu { found: tag }.build());
                }
                _ => {}
            }
            self.read_element(obj, header, offset, bound, depth)?;

            if let Some(limit) = bound.limit() {
                let position = self.source.position();
                if position > limit {
                    let len = u32::try_from(position - offset).unwrap_or(u32::MAX);
                    let available = limit.saturating_sub(offset);
                    return self.stop(
                        Some(tag),
                        offset,
                        depth,
                        LengthOverflowSnafu { len, available }.build(),
                    );
                }
            }
        }
    }

    fn read_header(&mut self, depth: u32) -> Step<DataElementHeader> {
        let offset = self.source.position();
        let available = self.source.remaining();
        match self.decoder.decode_header(&mut *self.source) {
            Ok((header, _)) => Ok(header),
            Err(e) => {
                let (tag, kind) = header_issue(&e, available);
                self.stop(tag, offset, depth, kind)
            }
        }
    }

    /// The number of bytes left for a value starting at the current position.
    fn available(&self, bound: Bound) -> u64 {
        let remaining = self.source.remaining();
        match bound.limit() {
            Some(end) => end.saturating_sub(self.source.position()).min(remaining),
            None => remaining,
        }
    }

    fn read_element(
        &mut self,
        obj: &mut InMemDicomObject<D>,
        header: DataElementHeader,
        offset: u64,
        bound: Bound,
        depth: u32,
    ) -> Step {
        let tag = header.tag;
        let vr = header.vr;
        if let Some(len) = header.len.get() {
            let available = self.available(bound);
            if u64::from(len) > available {
                return self.stop(
                    Some(tag),
                    offset,
                    depth,
                    LengthOverflowSnafu { len, available }.build(),
                );
            }
        }

        let elem = match (vr, header.len.get()) {
            (VR::SQ, _) => {
                return self.read_sequence(obj, header, offset, bound.limit(), depth, false)
            }
            (VR::UN, None) => {
                return self.read_sequence(obj, header, offset, bound.limit(), depth, true)
            }
            (_, None) if tag == Tag::PIXEL_DATA => self.read_pixel_sequence(header, depth)?,
            (_, None) => {
                // header decoders reject any other undefined length
                return self.stop(Some(tag), offset, depth, UndefinedLengthSnafu { vr }.build());
            }
            (_, Some(len)) if tag == Tag::PIXEL_DATA && self.options.defer_pixel_data => {
                let range = ByteRange {
                    offset: self.source.position(),
                    len,
                };
                if let Err(e) = self.source.skip(u64::from(len)) {
                    return self.stop(Some(tag), offset, depth, source_issue(&e));
                }
                DataElement::new_with_len(tag, vr, header.len, range)
            }
            (_, Some(len)) => {
                let bytes = match self.source.read_bytes(len as usize) {
                    Ok(bytes) => bytes,
                    Err(e) => return self.stop(Some(tag), offset, depth, source_issue(&e)),
                };
                let endianness = self.source.endianness();
                match parse_value(vr, &bytes, endianness, self.charset) {
                    Ok(value) => DataElement::new_with_len(tag, vr, header.len, value),
                    Err(e) => {
                        let reason = e.to_string();
                        self.record(Some(tag), offset, depth, InvalidValueSnafu { vr, reason }.build());
                        return Ok(());
                    }
                }
            }
        };

        if tag == tags::SPECIFIC_CHARACTER_SET {
            self.update_charset(obj, &elem, offset, depth);
        }
        self.insert(obj, elem, offset, depth);
        Ok(())
    }

    fn read_sequence(
        &mut self,
        obj: &mut InMemDicomObject<D>,
        header: DataElementHeader,
        offset: u64,
        limit: Option<u64>,
        depth: u32,
        implicit: bool,
    ) -> Step {
        let max_depth = self.options.max_depth;
        if depth + 1 > max_depth {
            return self.stop(
                Some(header.tag),
                offset,
                depth,
                NestingTooDeepSnafu { max_depth }.build(),
            );
        }

        // the content of an undefined length UN element
        // is always in implicit VR little endian
        let saved = if implicit {
            let decoder: DynDecoder<ByteSource<R>> =
                Box::new(ImplicitVRLittleEndianDecoder::with_dict(self.dict.clone()));
            let endianness = self.source.endianness();
            self.source.set_endianness(Endianness::Little);
            Some((std::mem::replace(&mut self.decoder, decoder), endianness))
        } else {
            None
        };

        let mut items = Vec::new();
        let outcome = self.read_items(header, limit, depth, &mut items);

        if let Some((decoder, endianness)) = saved {
            self.decoder = decoder;
            self.source.set_endianness(endianness);
        }

        let elem = DataElement::new_with_len(
            header.tag,
            VR::SQ,
            header.len,
            DataSetSequence::new(items, header.len),
        );
        self.insert(obj, elem, offset, depth);
        outcome
    }

    fn read_items(
        &mut self,
        header: DataElementHeader,
        limit: Option<u64>,
        depth: u32,
        items: &mut Vec<InMemDicomObject<D>>,
    ) -> Step {
        let end = header.len.get().map(|len| self.source.position() + u64::from(len));
        // undefined length sequences still end with their enclosing value
        let limit = end.or(limit);
        let bound = limit.map_or(Bound::End, Bound::Until);
        loop {
            let offset = self.source.position();
            match (end, limit) {
                (Some(end), _) if offset >= end => return Ok(()),
                (None, Some(limit)) if offset >= limit => {
                    return self.stop(
                        Some(header.tag),
                        offset,
                        depth,
                        MissingDelimiterSnafu {
                            delimiter: Tag::SEQUENCE_DELIMITER,
                        }
                        .build(),
                    );
                }
                _ => {}
            }

            match self.read_item_header(header.tag, depth)? {
                SequenceItemHeader::Item { len } => {
                    let item_bound = match len.get() {
                        Some(len) => {
                            let available = self.available(bound);
                            if u64::from(len) > available {
                                return self.stop(
                                    Some(header.tag),
                                    offset,
                                    depth,
                                    LengthOverflowSnafu { len, available }.build(),
                                );
                            }
                            Bound::Until(self.source.position() + u64::from(len))
                        }
                        None => Bound::ItemDelimiter(limit),
                    };

                    let charset = self.charset;
                    let mut item = InMemDicomObject::new_empty_with_dict(self.dict.clone());
                    item.set_charset(charset);
                    let outcome = self.read_body(&mut item, item_bound, depth + 1);
                    self.charset = charset;
                    items.push(item);
                    outcome?;
                }
                SequenceItemHeader::SequenceDelimiter if end.is_none() => return Ok(()),
                _ => {
                    return self.stop(
                        Some(header.tag),
                        offset,
                        depth,
                        BadItemSnafu {
                            found: Tag::SEQUENCE_DELIMITER,
                        }
                        .build(),
                    )
                }
            }
        }
    }

    /// Read the next item or delimiter header of the sequence `parent`.
    fn read_item_header(&mut self, parent: Tag, depth: u32) -> Step<SequenceItemHeader> {
        let offset = self.source.position();
        let available = self.source.remaining();
        let found = match self.source.peek_tag() {
            Ok(tag) => tag,
            Err(e) => return self.stop(Some(parent), offset, depth, source_issue(&e)),
        };
        if found.group() != 0xFFFE {
            return self.stop(Some(parent), offset, depth, BadItemSnafu { found }.build());
        }
        match self.decoder.decode_item_header(&mut *self.source) {
            Ok(item) => Ok(item),
            Err(e) if e.is_truncation() => self.stop(
                Some(parent),
                offset,
                depth,
                TruncatedStreamSnafu {
                    requested: 8_u64,
                    available,
                }
                .build(),
            ),
            Err(_) => self.stop(Some(parent), offset, depth, BadItemSnafu { found }.build()),
        }
    }

    fn read_pixel_sequence(
        &mut self,
        header: DataElementHeader,
        depth: u32,
    ) -> Step<InMemElement<D>> {
        let tag = header.tag;
        let mut offset_table: Option<C<u32>> = None;
        let mut fragments: C<Vec<u8>> = C::new();
        loop {
            let offset = self.source.position();
            let len = match self.read_item_header(tag, depth)? {
                SequenceItemHeader::SequenceDelimiter => break,
                SequenceItemHeader::Item { len } => len,
                SequenceItemHeader::ItemDelimiter => {
                    return self.stop(
                        Some(tag),
                        offset,
                        depth,
                        BadItemSnafu {
                            found: Tag::ITEM_DELIMITER,
                        }
                        .build(),
                    )
                }
            };
            let Some(len) = len.get() else {
                return self.stop(Some(tag), offset, depth, UndefinedLengthSnafu { vr: header.vr }.build());
            };
            let available = self.source.remaining();
            if u64::from(len) > available {
                return self.stop(
                    Some(tag),
                    offset,
                    depth,
                    LengthOverflowSnafu { len, available }.build(),
                );
            }
            let bytes = match self.source.read_bytes(len as usize) {
                Ok(bytes) => bytes,
                Err(e) => return self.stop(Some(tag), offset, depth, source_issue(&e)),
            };

            if offset_table.is_none() {
                // the first item is the basic offset table
                let table = match parse_value(VR::UL, &bytes, self.source.endianness(), self.charset)
                {
                    Ok(PrimitiveValue::U32(table)) => table,
                    Ok(_) => C::new(),
                    Err(e) => {
                        let reason = e.to_string();
                        self.record(Some(tag), offset, depth, InvalidValueSnafu { vr: header.vr, reason }.build());
                        C::new()
                    }
                };
                offset_table = Some(table);
            } else {
                fragments.push(bytes);
            }
        }

        Ok(DataElement::new_with_len(
            tag,
            header.vr,
            header.len,
            PixelFragmentSequence::new(offset_table.unwrap_or_default(), fragments),
        ))
    }

    fn update_charset(
        &mut self,
        obj: &mut InMemDicomObject<D>,
        elem: &InMemElement<D>,
        offset: u64,
        depth: u32,
    ) {
        let code = elem
            .to_str()
            .map(|code| code.into_owned())
            .unwrap_or_default();
        match SpecificCharacterSet::from_code(&code) {
            Some(charset) => {
                self.charset = charset;
                obj.set_charset(charset);
            }
            None => self.record(
                Some(elem.header().tag),
                offset,
                depth,
                UnknownCharacterSetSnafu { code }.build(),
            ),
        }
    }

    fn insert(&mut self, obj: &mut InMemDicomObject<D>, elem: InMemElement<D>, offset: u64, depth: u32) {
        let tag = elem.header().tag;
        if obj.put(elem).is_some() {
            self.record(Some(tag), offset, depth, DuplicateTagSnafu.build());
        }
    }

    fn record(&mut self, tag: Option<Tag>, offset: u64, depth: u32, kind: IssueKind) {
        let severity = if kind.is_fatal() { "fatal" } else { "recoverable" };
        warn!(
            tag = %tag.map(|t| t.to_string()).unwrap_or_default(),
            offset,
            depth,
            condition = %kind,
            severity,
            "Data set decoding issue"
        );
        self.issues.push(DecodeIssue {
            tag,
            offset,
            depth,
            kind,
        });
    }

    fn stop<T>(&mut self, tag: Option<Tag>, offset: u64, depth: u32, kind: IssueKind) -> Step<T> {
        self.record(tag, offset, depth, kind);
        Err(Stop)
    }
}

fn header_issue(e: &decode::Error, available: u64) -> (Option<Tag>, IssueKind) {
    match e {
        decode::Error::InvalidVr { tag, code, .. } => {
            (Some(*tag), InvalidVrSnafu { code: *code }.build())
        }
        decode::Error::UndefinedLength { tag, vr, .. } => {
            (Some(*tag), UndefinedLengthSnafu { vr: *vr }.build())
        }
        e if e.is_truncation() => {
            // only long explicit VR headers take more than 8 bytes
            let requested: u64 = if available < 8 { 8 } else { 12 };
            (None, TruncatedStreamSnafu { requested, available }.build())
        }
        e => (
            None,
            UnreadableSnafu {
                message: e.to_string(),
            }
            .build(),
        ),
    }
}

fn source_issue(e: &source::Error) -> IssueKind {
    match e {
        source::Error::TruncatedStream {
            requested,
            available,
            ..
        } => TruncatedStreamSnafu {
            requested: *requested,
            available: *available,
        }
        .build(),
        e => UnreadableSnafu {
            message: e.to_string(),
        }
        .build(),
    }
}

#[derive(Debug, Snafu)]
enum ValueError {
    #[snafu(display("{}", source))]
    DecodeValueText { source: DecodeTextError },
    #[snafu(display("`{}` is not a valid number", text))]
    ParseNumber { text: String },
    #[snafu(display("length {} is not a multiple of {}", len, size))]
    UnalignedLength { len: usize, size: usize },
    #[snafu(display("{}", source))]
    ReadBinary { source: std::io::Error },
}

fn trim_padding(text: &str) -> &str {
    text.trim_end_matches(|c: char| c == ' ' || c == '\0')
}

/// Decode the bytes of a primitive value according to its VR.
fn parse_value(
    vr: VR,
    bytes: &[u8],
    endianness: Endianness,
    charset: SpecificCharacterSet,
) -> Result<PrimitiveValue, ValueError> {
    if bytes.is_empty() {
        return Ok(PrimitiveValue::Empty);
    }

    if vr.is_textual() {
        let codec = if vr == VR::UI {
            SpecificCharacterSet::Default
        } else {
            charset
        };
        let text = codec.decode(bytes).context(DecodeValueTextSnafu)?;
        let text = trim_padding(&text);
        if text.is_empty() {
            return Ok(PrimitiveValue::Empty);
        }
        return Ok(match vr {
            VR::IS => PrimitiveValue::I32(parse_numbers(text, |s| s.parse::<i32>().ok())?),
            VR::DS => PrimitiveValue::F64(parse_numbers(text, |s| {
                s.parse::<f64>().ok().filter(|v| v.is_finite())
            })?),
            vr if vr.is_single_text() => PrimitiveValue::Str(text.to_string()),
            _ => PrimitiveValue::Strs(text.split('\\').map(|s| trim_padding(s).to_string()).collect()),
        });
    }

    let basic = BasicDecoder::new(endianness);

    macro_rules! read_numbers {
        ($variant: ident, $typ: ty, $method: ident) => {{
            let size = std::mem::size_of::<$typ>();
            ensure!(
                bytes.len() % size == 0,
                UnalignedLengthSnafu {
                    len: bytes.len(),
                    size
                }
            );
            let mut values: C<$typ> = C::from_elem(<$typ>::default(), bytes.len() / size);
            basic
                .$method(bytes, &mut values[..])
                .context(ReadBinarySnafu)?;
            PrimitiveValue::$variant(values)
        }};
    }

    Ok(match vr {
        VR::AT => {
            ensure!(
                bytes.len() % 4 == 0,
                UnalignedLengthSnafu {
                    len: bytes.len(),
                    size: 4_usize
                }
            );
            let mut parts: C<u16> = C::from_elem(0, bytes.len() / 2);
            basic
                .decode_us_into(bytes, &mut parts[..])
                .context(ReadBinarySnafu)?;
            PrimitiveValue::Tags(parts.chunks(2).map(|p| Tag(p[0], p[1])).collect())
        }
        VR::US | VR::OW => read_numbers!(U16, u16, decode_us_into),
        VR::SS => read_numbers!(I16, i16, decode_ss_into),
        VR::UL | VR::OL => read_numbers!(U32, u32, decode_ul_into),
        VR::SL => read_numbers!(I32, i32, decode_sl_into),
        VR::UV | VR::OV => read_numbers!(U64, u64, decode_uv_into),
        VR::SV => read_numbers!(I64, i64, decode_sv_into),
        VR::FL | VR::OF => read_numbers!(F32, f32, decode_fl_into),
        VR::FD | VR::OD => read_numbers!(F64, f64, decode_fd_into),
        _ => PrimitiveValue::U8(C::from_slice(bytes)),
    })
}

fn parse_numbers<T, F>(text: &str, parse: F) -> Result<C<T>, ValueError>
where
    F: Fn(&str) -> Option<T>,
{
    text.split('\\')
        .map(|s| {
            let s = s.trim();
            parse(s).context(ParseNumberSnafu { text: s })
        })
        .collect()
}
