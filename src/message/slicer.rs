// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Reconstruction of [`TraceMessage`]s from slices

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::config::{MAX_SRC_BITS, Settings, SliceFormat};

use super::error::{Error, Malformed};
use super::{Payload, TCode, TraceMessage};

/// Parser for slice streams
///
/// The slicer reads slices, either as raw bytes or as one hexadecimal number
/// per line, and reassembles them into [`TraceMessage`]s. Slices encountered
/// outside a message which do not start one are skipped, which resynchronizes
/// the slicer at the next message boundary when starting in the middle of a
/// trace.
///
/// # Example
///
/// ```
/// use riscv_nexus_trace::config::SliceFormat;
/// use riscv_nexus_trace::message::slicer::MessageSlicer;
/// use riscv_nexus_trace::message::{Payload, TCode};
///
/// let data: &[u8] = b"\x0c\x1b";
/// let mut slicer = MessageSlicer::new(data, SliceFormat::Binary, 0);
/// let message = slicer.read_next_message().unwrap().unwrap();
/// assert_eq!(message.payload, Payload::DirectBranch { i_cnt: 6 });
/// assert!(slicer.read_next_message().unwrap().is_none());
/// ```
pub struct MessageSlicer<R> {
    reader: R,
    format: SliceFormat,
    src_bits: u8,
    offset: u64,
    size: Option<u64>,
    line: u64,
    text: String,
    state: State,
    number: u64,
}

/// Message currently being assembled
#[derive(Default)]
struct State {
    tcode: Option<u8>,
    offset: u64,
    segments: Vec<Segment>,
    current: Segment,
}

impl MessageSlicer<BufReader<File>> {
    /// Open a slice file
    ///
    /// The file's format is determined by the [`Settings`]' slice format.
    pub fn open(path: impl AsRef<Path>, settings: &Settings) -> Result<Self, Error> {
        if settings.src_bits > MAX_SRC_BITS {
            return Err(Error::SrcBits(settings.src_bits));
        }
        let path = path.as_ref();
        let format = settings.slice_format_for(path);
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        tracing::debug!(?path, ?format, size, "Opened slice file");
        let mut slicer = Self::new(BufReader::new(file), format, settings.src_bits);
        slicer.size = Some(size);
        Ok(slicer)
    }
}

impl<R: BufRead> MessageSlicer<R> {
    /// Create a new slicer reading from the given reader
    ///
    /// A [`SliceFormat::Auto`] is treated as [`SliceFormat::Binary`]. A
    /// `src_bits` wider than [`MAX_SRC_BITS`] makes every read fail with
    /// [`Error::SrcBits`].
    pub fn new(reader: R, format: SliceFormat, src_bits: u8) -> Self {
        Self {
            reader,
            format,
            src_bits,
            offset: 0,
            size: None,
            line: 0,
            text: String::new(),
            state: Default::default(),
            number: 0,
        }
    }

    /// Retrieve the number of bytes consumed from the underlying reader
    pub fn file_offset(&self) -> u64 {
        self.offset
    }

    /// Retrieve the size of the underlying file, if known
    pub fn file_size(&self) -> Option<u64> {
        self.size
    }

    /// Read the next message
    ///
    /// Returns `None` at the end of the trace. A trace ending in the middle of
    /// a message results in an [`Error::Truncated`], after which `None` is
    /// returned. After an [`Error::Malformed`], parsing continues with the
    /// next message.
    pub fn read_next_message(&mut self) -> Result<Option<TraceMessage>, Error> {
        if self.src_bits > MAX_SRC_BITS {
            return Err(Error::SrcBits(self.src_bits));
        }
        loop {
            let offset = self.offset;
            let Some(slice) = self.next_slice()? else {
                return if self.state.tcode.take().is_some() {
                    tracing::warn!(offset = self.state.offset, "Trace ends mid-message");
                    Err(Error::Truncated)
                } else {
                    Ok(None)
                };
            };
            let (mdo, mseo) = (slice >> 2, slice & 0x3);

            let Some(tcode) = self.state.tcode else {
                if mseo == 0 {
                    self.state = State {
                        tcode: Some(mdo),
                        offset,
                        ..Default::default()
                    };
                } else {
                    tracing::trace!(offset, slice, "Skipping slice outside message");
                }
                continue;
            };

            self.state.current.push(mdo);
            if mseo != 0 {
                let segment = core::mem::take(&mut self.state.current);
                self.state.segments.push(segment);
            }
            if mseo & 0x2 != 0 {
                self.state.tcode = None;
                let number = self.number;
                self.number += 1;
                let offset = self.state.offset;
                let mut fields = Fields::new(core::mem::take(&mut self.state.segments));
                return self
                    .assemble(tcode, &mut fields)
                    .map(|(core, timestamp, payload)| {
                        Some(TraceMessage {
                            core,
                            number,
                            offset,
                            timestamp,
                            payload,
                        })
                    })
                    .inspect_err(|e| {
                        tracing::warn!(number, offset, tcode, error = %e, "Discarding malformed message")
                    })
                    .map_err(Error::Malformed);
            }
        }
    }

    /// Assemble core id, timestamp and payload from a message's fields
    fn assemble(
        &self,
        tcode: u8,
        fields: &mut Fields,
    ) -> Result<(u8, Option<u64>, Payload), Malformed> {
        let tcode = TCode::try_from(tcode)?;
        let core = fields.fixed(self.src_bits.into())?;
        let payload = Payload::parse(tcode, fields)?;
        let timestamp = fields.optional_var()?;
        fields.finish()?;
        Ok((core, timestamp, payload))
    }

    /// Read the next slice
    fn next_slice(&mut self) -> Result<Option<u8>, Error> {
        match self.format {
            SliceFormat::Text => self.next_text_slice(),
            SliceFormat::Auto | SliceFormat::Binary => {
                let buf = self.reader.fill_buf()?;
                let Some(slice) = buf.first().copied() else {
                    return Ok(None);
                };
                self.reader.consume(1);
                self.offset += 1;
                Ok(Some(slice))
            }
        }
    }

    /// Read the next slice from a textual trace
    fn next_text_slice(&mut self) -> Result<Option<u8>, Error> {
        loop {
            self.text.clear();
            let len = self.reader.read_line(&mut self.text)?;
            if len == 0 {
                return Ok(None);
            }
            self.offset += len as u64;
            self.line += 1;

            let text = self.text.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .unwrap_or(text);
            return u8::from_str_radix(digits, 16)
                .map(Some)
                .map_err(|_| Error::InvalidText {
                    line: self.line,
                    text: text.into(),
                });
        }
    }
}

impl<R: BufRead> Iterator for MessageSlicer<R> {
    type Item = Result<TraceMessage, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next_message().transpose()
    }
}

/// Data bits of slices up to and including an end-of-field slice
#[derive(Copy, Clone, Default, Debug)]
pub(crate) struct Segment {
    value: u128,
    bits: u32,
    overflow: bool,
}

impl Segment {
    /// Append the data bits of a slice
    fn push(&mut self, mdo: u8) {
        if self.bits + 6 <= u128::BITS {
            self.value |= u128::from(mdo & 0x3f) << self.bits;
            self.bits += 6;
        } else {
            self.overflow = true;
        }
    }
}

/// Reader for the fields of a single message
pub(crate) struct Fields {
    segments: std::vec::IntoIter<Segment>,
    current: Option<Segment>,
}

impl Fields {
    fn new(segments: Vec<Segment>) -> Self {
        let mut segments = segments.into_iter();
        let current = segments.next();
        Self { segments, current }
    }

    /// Read a fixed-width field of at most 8 bits
    pub fn fixed(&mut self, width: u32) -> Result<u8, Malformed> {
        if width == 0 {
            return Ok(0);
        }
        if width > u8::BITS {
            return Err(Malformed::FieldOverflow);
        }
        let segment = self.current.as_mut().ok_or(Malformed::MissingField)?;
        if segment.bits < width {
            return Err(Malformed::MissingField);
        }
        let value = (segment.value & ((1 << width) - 1)) as u8;
        segment.value >>= width;
        segment.bits -= width;
        Ok(value)
    }

    /// Read a variable-width field occupying the rest of the current segment
    pub fn var(&mut self) -> Result<u64, Malformed> {
        self.optional_var()?.ok_or(Malformed::MissingField)
    }

    /// Read a variable-width field, if another one is present
    pub fn optional_var(&mut self) -> Result<Option<u64>, Malformed> {
        let Some(segment) = self.current.take() else {
            return Ok(None);
        };
        self.current = self.segments.next();
        if segment.overflow {
            return Err(Malformed::FieldOverflow);
        }
        u64::try_from(segment.value)
            .map(Some)
            .map_err(|_| Malformed::FieldOverflow)
    }

    /// Ensure all fields were consumed
    pub fn finish(&mut self) -> Result<(), Malformed> {
        match self.current {
            Some(_) => Err(Malformed::ExtraField),
            None => Ok(()),
        }
    }
}
