//! Sequential reads through a bounded, re-mappable view
//!
//! A single memory mapping is capped at [`MAP_WINDOW`](crate::config::MAP_WINDOW)
//! bytes, but model files can be far larger. [`MappedCursor`] keeps one view
//! open at a time. Once the read position inside it passes the remap
//! threshold, the cursor maps a fresh view that starts one threshold further
//! into the source, and moves its position back by the same distance.
//!
//! Remapping only happens when the caller asks for it via
//! [`MappedCursor::maybe_remap`]. The binary decoder calls it between
//! records, so a record is never split across views. Any single record must
//! therefore fit in `window - threshold` bytes.

use std::io;
use std::ops::Deref;

use byteorder::{ByteOrder, ReadBytesExt};

/// Something that can hand out read-only views of a byte range
pub trait MapSource {
    type View: Deref<Target = [u8]>;

    /// Total length of the source in bytes
    fn source_len(&self) -> io::Result<u64>;

    /// View of `len` bytes starting at `offset`. The range lies within
    /// the source and `len` is never zero.
    fn map(&self, offset: u64, len: usize) -> io::Result<Self::View>;
}

#[cfg(feature = "native")]
impl MapSource for std::fs::File {
    type View = memmap2::Mmap;

    fn source_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn map(&self, offset: u64, len: usize) -> io::Result<memmap2::Mmap> {
        // SAFETY: the map is read-only and the file is not expected to be
        // truncated while a model is loading.
        unsafe {
            memmap2::MmapOptions::new()
                .offset(offset)
                .len(len)
                .map(self)
        }
    }
}

impl<'a> MapSource for &'a [u8] {
    type View = &'a [u8];

    fn source_len(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn map(&self, offset: u64, len: usize) -> io::Result<&'a [u8]> {
        let start = offset as usize;
        let bytes: &'a [u8] = *self;
        bytes.get(start..start + len).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Range {}..{} exceeds source size {}",
                    start,
                    start + len,
                    bytes.len()
                ),
            )
        })
    }
}

/// Where a remap placed the new view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remap {
    /// Remaps performed so far, including this one
    pub count: u64,
    /// Absolute offset of the new view
    pub start: u64,
    /// Length of the new view
    pub len: u64,
}

/// Read cursor over a [`MapSource`] with explicit remap state
pub struct MappedCursor<'s, S: MapSource> {
    source: &'s S,
    source_len: u64,
    view: S::View,
    /// Position within `view`
    pos: usize,
    remaps: u64,
    threshold: u64,
    window: u64,
}

impl<'s, S: MapSource> MappedCursor<'s, S> {
    /// Map the first window of `source`. Returns `None` for an empty source,
    /// which cannot be mapped.
    pub fn open(source: &'s S, threshold: u64, window: u64) -> io::Result<Option<Self>> {
        debug_assert!(window > threshold);
        let source_len = source.source_len()?;
        if source_len == 0 {
            return Ok(None);
        }
        let len = source_len.min(window);
        let view = source.map(0, len as usize)?;
        Ok(Some(Self {
            source,
            source_len,
            view,
            pos: 0,
            remaps: 0,
            threshold,
            window,
        }))
    }

    /// Absolute offset of the current view
    pub fn view_start(&self) -> u64 {
        self.remaps * self.threshold
    }

    pub fn view_len(&self) -> usize {
        self.view.len()
    }

    /// Absolute read position within the source
    pub fn position(&self) -> u64 {
        self.view_start() + self.pos as u64
    }

    pub fn remaps(&self) -> u64 {
        self.remaps
    }

    /// Bytes between the read position and the end of the source
    pub fn remaining(&self) -> u64 {
        self.source_len.saturating_sub(self.position())
    }

    pub fn is_at_end(&self) -> bool {
        self.position() >= self.source_len
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        match self.view.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(self.eof()),
        }
    }

    /// Fill `dst` with `f32`s in byte order `B`
    pub fn read_f32_into<B: ByteOrder>(&mut self, dst: &mut [f32]) -> io::Result<()> {
        let mut rest = self.view.get(self.pos..).unwrap_or(&[]);
        if rest.len() < dst.len() * 4 {
            return Err(self.eof());
        }
        rest.read_f32_into::<B>(dst)?;
        self.pos += dst.len() * 4;
        Ok(())
    }

    /// Slide the view forward by one threshold if the cursor has passed it
    pub fn maybe_remap(&mut self) -> io::Result<Option<Remap>> {
        if (self.pos as u64) <= self.threshold {
            return Ok(None);
        }
        let start = (self.remaps + 1) * self.threshold;
        let len = (self.source_len - start).min(self.window);
        let view = self.source.map(start, len as usize)?;

        // Swap only after the new view is in place
        self.view = view;
        self.pos -= self.threshold as usize;
        self.remaps += 1;
        Ok(Some(Remap {
            count: self.remaps,
            start,
            len,
        }))
    }

    fn eof(&self) -> io::Error {
        let at = self.position();
        let view_end = self.view_start() + self.view.len() as u64;
        if view_end >= self.source_len {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("unexpected end of input at byte {}", at),
            )
        } else {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "record at byte {} extends past the mapped window [{}, {})",
                    at,
                    self.view_start(),
                    view_end
                ),
            )
        }
    }
}
