//! The portable Roaring serialization format.
//!
//! Layout (all integers little-endian):
//! - Cookie. Without run containers: `u32 12346` then `u32 container_count`.
//!   With run containers: `u32 12347 | (container_count - 1) << 16` then a
//!   bitset of `(container_count + 7) / 8` bytes flagging the run containers.
//! - Per container, interleaved `u16 key` and `u16 cardinality - 1`.
//! - `u32` payload offsets, one per container, unless the bitmap has run
//!   containers and fewer than [`NO_OFFSET_THRESHOLD`] containers.
//! - Payloads in key order: array values as `u16`, bitmap words as 1024 `u64`,
//!   runs as `u16 run_count` followed by `(start, length - 1)` pairs.
//!
//! Deserialization does not check container invariants unless asked to
//! ([`ReadConfig::validate`] or [`BitmapBase::validate`]); input from an
//! untrusted source must be validated before use.

use std::io::{self, Read, Write};

use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use roar_common::{Error, Result, verify_data};

use crate::{
    bitmap::{Bitmap, BitmapBase, FrozenBitmap},
    config::ReadConfig,
    container::{
        ARRAY_MAX_LEN, BITMAP_WORDS, Container, array::ArrayContainer, bitmap::BitmapContainer,
        run::{Run, RunContainer},
    },
    directory::ContainerDirectory,
    storage::{self, Storage},
    util,
};

/// Cookie of a bitmap without run containers; followed by the container count.
pub const SERIAL_COOKIE_NO_RUNCONTAINER: u32 = 12346;

/// Low 16 bits of the cookie of a bitmap with run containers.
pub const SERIAL_COOKIE: u16 = 12347;

/// Bitmaps with run containers omit the offset table below this many
/// containers.
pub const NO_OFFSET_THRESHOLD: usize = 4;

impl<S: Storage> BitmapBase<S> {
    /// Exact number of bytes written by [`serialize_into`](Self::serialize_into).
    pub fn serialized_size_in_bytes(&self) -> usize {
        header_size(self.directory.len(), self.has_run_containers())
            + self
                .directory
                .containers()
                .iter()
                .map(Container::serialized_size_in_bytes)
                .sum::<usize>()
    }

    /// Writes the portable format into `writer`; returns the number of bytes
    /// written.
    pub fn serialize_into<W: Write>(&self, mut writer: W) -> Result<usize> {
        self.write_portable(&mut writer)
            .map_err(|e| Error::io("serialize bitmap", e))
    }

    /// The portable format as a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size_in_bytes());
        // Writing into a Vec cannot fail.
        let _ = self.write_portable(&mut out);
        out
    }

    /// Checks the structural invariants: keys strictly ascending and every
    /// container non-empty and well-formed for its encoding.
    pub fn validate(&self) -> Result<()> {
        let result = self.check_structure();
        if let Err(e) = &result {
            log::warn!("bitmap rejected by validation: {e}");
        }
        result
    }

    fn check_structure(&self) -> Result<()> {
        verify_data!(keys, util::is_strictly_increasing(self.directory.keys()));
        self.directory
            .containers()
            .iter()
            .try_for_each(Container::validate)
    }

    fn has_run_containers(&self) -> bool {
        self.directory
            .containers()
            .iter()
            .any(|c| matches!(c, Container::Run(_)))
    }

    fn write_portable<W: Write>(&self, writer: &mut W) -> io::Result<usize> {
        let count = self.directory.len();
        let has_runs = self.has_run_containers();
        let header_size = header_size(count, has_runs);

        if has_runs {
            writer.write_u32::<LE>(SERIAL_COOKIE as u32 | (((count - 1) as u32) << 16))?;
            let mut run_flags = vec![0u8; count.div_ceil(8)];
            for (i, container) in self.directory.containers().iter().enumerate() {
                if matches!(container, Container::Run(_)) {
                    run_flags[i / 8] |= 1 << (i % 8);
                }
            }
            writer.write_all(&run_flags)?;
        } else {
            writer.write_u32::<LE>(SERIAL_COOKIE_NO_RUNCONTAINER)?;
            writer.write_u32::<LE>(count as u32)?;
        }

        for (key, container) in self.directory.iter() {
            writer.write_u16::<LE>(key)?;
            writer.write_u16::<LE>((container.len() - 1) as u16)?;
        }

        if !has_runs || count >= NO_OFFSET_THRESHOLD {
            let mut offset = header_size;
            for container in self.directory.containers() {
                writer.write_u32::<LE>(offset as u32)?;
                offset += container.serialized_size_in_bytes();
            }
        }

        let mut written = header_size;
        for container in self.directory.containers() {
            match container {
                Container::Array(a) => write_u16s(writer, a.values())?,
                Container::Bitmap(b) => write_u64s(writer, b.words())?,
                Container::Run(r) => {
                    writer.write_u16::<LE>(r.run_count() as u16)?;
                    write_runs(writer, r.runs())?;
                }
            }
            written += container.serialized_size_in_bytes();
        }
        Ok(written)
    }
}

impl Bitmap {
    /// Reads the portable format without validating container invariants.
    pub fn deserialize_from<R: Read>(reader: R) -> Result<Bitmap> {
        Self::deserialize_with(reader, &ReadConfig::default())
    }

    pub fn deserialize_with<R: Read>(mut reader: R, config: &ReadConfig) -> Result<Bitmap> {
        config.validate()?;
        let header = read_header(&mut reader, config)?;

        let mut directory = ContainerDirectory::with_capacity(header.keys.len());
        for (i, (&key, &cardinality)) in header.keys.iter().zip(&header.cardinalities).enumerate() {
            let container = if header.is_run(i) {
                let run_count = reader.read_u16::<LE>().map_err(read_error)? as usize;
                let mut runs = vec![Run::default(); run_count];
                for run in runs.iter_mut() {
                    run.start = reader.read_u16::<LE>().map_err(read_error)?;
                    run.length = reader.read_u16::<LE>().map_err(read_error)?;
                }
                Container::Run(RunContainer::wrap_unchecked(runs))
            } else if cardinality > ARRAY_MAX_LEN {
                let mut words = vec![0u64; BITMAP_WORDS];
                reader
                    .read_u64_into::<LE>(&mut words)
                    .map_err(read_error)?;
                Container::Bitmap(BitmapContainer::wrap(words.into_boxed_slice(), cardinality))
            } else {
                let mut values = vec![0u16; cardinality];
                reader
                    .read_u16_into::<LE>(&mut values)
                    .map_err(read_error)?;
                Container::Array(ArrayContainer::wrap_unchecked(values))
            };
            directory.append(key, container);
        }

        let bitmap = Bitmap::from_directory(directory);
        log::debug!(
            "deserialized {} containers (run containers: {}), {} bytes",
            bitmap.container_count(),
            header.run_flags.is_some(),
            bitmap.serialized_size_in_bytes()
        );
        if config.validate {
            bitmap.validate()?;
        }
        Ok(bitmap)
    }

    /// Reads the portable format from a byte slice into an owned bitmap.
    pub fn from_bytes(bytes: &[u8]) -> Result<Bitmap> {
        Self::deserialize_from(bytes)
    }
}

impl<'a> FrozenBitmap<'a> {
    /// Read-only view over serialized `bytes`.
    ///
    /// Payloads are borrowed in place when the host is little-endian and the
    /// payload is suitably aligned, and decoded into a private copy otherwise.
    pub fn view(bytes: &'a [u8]) -> Result<FrozenBitmap<'a>> {
        Self::view_with(bytes, &ReadConfig::default())
    }

    pub fn view_with(bytes: &'a [u8], config: &ReadConfig) -> Result<FrozenBitmap<'a>> {
        config.validate()?;
        let mut cursor = SliceCursor { bytes, position: 0 };
        let header = read_header(&mut cursor, config)?;

        let mut directory = ContainerDirectory::with_capacity(header.keys.len());
        for (i, (&key, &cardinality)) in header.keys.iter().zip(&header.cardinalities).enumerate() {
            let container = if header.is_run(i) {
                let run_count = cursor.read_u16::<LE>().map_err(read_error)? as usize;
                let runs = storage::borrow_runs(cursor.take_slice(4 * run_count)?);
                Container::Run(RunContainer::wrap_unchecked(runs))
            } else if cardinality > ARRAY_MAX_LEN {
                let words = storage::borrow_u64s(cursor.take_slice(8 * BITMAP_WORDS)?);
                Container::Bitmap(BitmapContainer::wrap(words, cardinality))
            } else {
                let values = storage::borrow_u16s(cursor.take_slice(2 * cardinality)?);
                Container::Array(ArrayContainer::wrap_unchecked(values))
            };
            directory.append(key, container);
        }

        log::debug!(
            "viewing {} containers (run containers: {}), {} of {} bytes",
            directory.len(),
            header.run_flags.is_some(),
            cursor.position,
            bytes.len()
        );
        let bitmap = FrozenBitmap::from_directory(directory);
        if config.validate {
            bitmap.validate()?;
        }
        Ok(bitmap)
    }
}

/// Cookie and descriptive header.
struct Header {
    keys: Vec<u16>,
    cardinalities: Vec<usize>,
    run_flags: Option<Vec<u8>>,
}

impl Header {
    fn is_run(&self, index: usize) -> bool {
        self.run_flags
            .as_ref()
            .is_some_and(|flags| flags[index / 8] & (1 << (index % 8)) != 0)
    }
}

fn read_header<R: Read>(reader: &mut R, config: &ReadConfig) -> Result<Header> {
    let cookie = reader.read_u32::<LE>().map_err(read_error)?;
    let (count, run_flags) = if cookie & 0xFFFF == SERIAL_COOKIE as u32 {
        let count = (cookie >> 16) as usize + 1;
        let mut flags = vec![0u8; count.div_ceil(8)];
        reader.read_exact(&mut flags).map_err(read_error)?;
        (count, Some(flags))
    } else if cookie == SERIAL_COOKIE_NO_RUNCONTAINER {
        let count = reader.read_u32::<LE>().map_err(read_error)? as usize;
        (count, None)
    } else {
        return Err(Error::invalid_format(
            "cookie",
            format!("unrecognized cookie {cookie:#010x}"),
        ));
    };
    verify_data!(container_count, count <= config.max_containers);

    let mut keys = Vec::with_capacity(count);
    let mut cardinalities = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(reader.read_u16::<LE>().map_err(read_error)?);
        cardinalities.push(reader.read_u16::<LE>().map_err(read_error)? as usize + 1);
    }
    verify_data!(keys, util::is_strictly_increasing(&keys));

    if run_flags.is_none() || count >= NO_OFFSET_THRESHOLD {
        // Payloads are read sequentially; the offsets are only skipped.
        for _ in 0..count {
            reader.read_u32::<LE>().map_err(read_error)?;
        }
    }
    Ok(Header {
        keys,
        cardinalities,
        run_flags,
    })
}

fn header_size(count: usize, has_runs: bool) -> usize {
    if has_runs {
        let offsets = if count >= NO_OFFSET_THRESHOLD { 4 * count } else { 0 };
        4 + count.div_ceil(8) + 4 * count + offsets
    } else {
        8 + 8 * count
    }
}

/// Truncated input is a format error; anything else is a reader failure.
fn read_error(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::invalid_format("bitmap", "input ends before the serialized bitmap")
    } else {
        Error::io("deserialize bitmap", e)
    }
}

fn write_u16s<W: Write>(writer: &mut W, values: &[u16]) -> io::Result<()> {
    if cfg!(target_endian = "little") {
        writer.write_all(bytemuck::cast_slice(values))
    } else {
        values.iter().try_for_each(|&v| writer.write_u16::<LE>(v))
    }
}

fn write_u64s<W: Write>(writer: &mut W, words: &[u64]) -> io::Result<()> {
    if cfg!(target_endian = "little") {
        writer.write_all(bytemuck::cast_slice(words))
    } else {
        words.iter().try_for_each(|&w| writer.write_u64::<LE>(w))
    }
}

fn write_runs<W: Write>(writer: &mut W, runs: &[Run]) -> io::Result<()> {
    if cfg!(target_endian = "little") {
        writer.write_all(bytemuck::cast_slice(runs))
    } else {
        runs.iter().try_for_each(|run| {
            writer.write_u16::<LE>(run.start)?;
            writer.write_u16::<LE>(run.length)
        })
    }
}

/// Reader over a byte slice that can also hand out borrowed sub-slices.
struct SliceCursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> SliceCursor<'a> {
    fn take_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.position.checked_add(len).filter(|&end| end <= self.bytes.len());
        let end = end.ok_or_else(|| {
            Error::invalid_format("bitmap", "input ends before the serialized bitmap")
        })?;
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }
}

impl Read for SliceCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.bytes[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}
