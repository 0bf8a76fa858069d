//! Streaming codec between bit-text and packed bytes
//!
//! Bit-text is a flat stream of `'0'`/`'1'` characters with no header. Packed
//! bytes hold 8 bits each, most significant bit first; a short final group is
//! padded with zero low-order bits.
//!
//! Every transform here works on bounded chunks (`chunk_bits` bits or
//! `chunk_bytes` bytes at a time), so memory use does not grow with the input.
//! File outputs go through [`write_atomically`]: the data lands in a temporary
//! sibling file which replaces the destination only once fully written.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::constants::DEFAULT_CHUNK_BITS;
use crate::{BitSequence, Error, Result};

#[inline]
fn bit_of(c: &u8) -> Option<bool> {
    match c {
        b'0' => Some(false),
        b'1' => Some(true),
        _ => None,
    }
}

#[inline]
fn bit_char(bit: bool) -> u8 {
    if bit {
        b'1'
    } else {
        b'0'
    }
}

/// Pack up to 8 bits MSB-first; missing low-order bits are 0
#[inline]
fn pack_byte(group: &[bool]) -> u8 {
    group
        .iter()
        .enumerate()
        .fold(0u8, |acc, (k, &bit)| acc | ((bit as u8) << (7 - k)))
}

/// Pack bits into bytes, MSB first, zero-padding the final group
pub fn encode_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8).map(pack_byte).collect()
}

/// Unpack bytes into bits, MSB first
pub fn unpack_bits(bytes: &[u8]) -> BitSequence {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |k| (byte >> k) & 1 == 1))
        .collect()
}

/// Incremental bit packer
///
/// Bits are pushed in any grouping; a partial byte carries over between
/// pushes. Packed bytes are buffered up to `chunk_bits / 8` and then written.
pub struct BitPacker<W: Write> {
    writer: W,
    current: u8,
    filled: u8,
    buffer: Vec<u8>,
    buffer_limit: usize,
    bits_pushed: u64,
    bytes_written: u64,
}

impl<W: Write> BitPacker<W> {
    pub fn new(writer: W) -> Self {
        Self::with_chunk_bits(writer, DEFAULT_CHUNK_BITS)
    }

    pub fn with_chunk_bits(writer: W, chunk_bits: usize) -> Self {
        let buffer_limit = (chunk_bits / 8).max(1);
        Self {
            writer,
            current: 0,
            filled: 0,
            buffer: Vec::with_capacity(buffer_limit),
            buffer_limit,
            bits_pushed: 0,
            bytes_written: 0,
        }
    }

    pub fn push(&mut self, bit: bool) -> io::Result<()> {
        self.current = (self.current << 1) | bit as u8;
        self.filled += 1;
        self.bits_pushed += 1;
        if self.filled == 8 {
            self.buffer.push(self.current);
            self.current = 0;
            self.filled = 0;
            if self.buffer.len() >= self.buffer_limit {
                self.flush_buffer()?;
            }
        }
        Ok(())
    }

    pub fn push_bits(&mut self, bits: &[bool]) -> io::Result<()> {
        for &bit in bits {
            self.push(bit)?;
        }
        Ok(())
    }

    /// Number of bits pushed so far
    pub fn bits_pushed(&self) -> u64 {
        self.bits_pushed
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.bytes_written += self.buffer.len() as u64;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Pad the final partial byte, flush, and return the writer with the
    /// total number of bytes written
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        if self.filled > 0 {
            self.buffer.push(self.current << (8 - self.filled));
            self.current = 0;
            self.filled = 0;
        }
        self.flush_buffer()?;
        self.writer.flush()?;
        Ok((self.writer, self.bytes_written))
    }
}

/// Chunked bit-text reader
///
/// Yields `Vec<bool>` chunks of at most `chunk_bits` bits. Characters other
/// than `'0'`/`'1'` are skipped, so a chunk may hold fewer bits than the
/// number of characters consumed.
pub struct BitTextDecoder<R: Read> {
    reader: R,
    chunk_bits: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: Read> BitTextDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_bits(reader, DEFAULT_CHUNK_BITS)
    }

    pub fn with_chunk_bits(reader: R, chunk_bits: usize) -> Self {
        let chunk_bits = chunk_bits.max(1);
        Self {
            reader,
            chunk_bits,
            buf: vec![0u8; chunk_bits],
            done: false,
        }
    }

    /// Read the next chunk, `None` at end of input
    pub fn next_chunk(&mut self) -> io::Result<Option<Vec<bool>>> {
        if self.done {
            return Ok(None);
        }

        let mut bits = Vec::with_capacity(self.chunk_bits);
        while bits.len() < self.chunk_bits {
            // One character yields at most one bit, so never overshoot
            let want = self.chunk_bits - bits.len();
            let n = match self.reader.read(&mut self.buf[..want]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            bits.extend(self.buf[..n].iter().filter_map(bit_of));
        }

        if bits.is_empty() && self.done {
            Ok(None)
        } else {
            Ok(Some(bits))
        }
    }
}

impl<R: Read> Iterator for BitTextDecoder<R> {
    type Item = io::Result<Vec<bool>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

/// Fixed-size blocks over a bit-text source
///
/// Every block except the last holds exactly `block_bits` bits, whatever
/// noise the text carries, so several equally long sources can be read in
/// step and their blocks combined position by position.
pub struct BitBlocks<R: Read> {
    decoder: BitTextDecoder<R>,
    block_bits: usize,
    pending: Vec<bool>,
    exhausted: bool,
}

impl<R: Read> BitBlocks<R> {
    pub fn new(reader: R, block_bits: usize) -> Self {
        let block_bits = block_bits.max(1);
        Self {
            decoder: BitTextDecoder::with_chunk_bits(reader, block_bits),
            block_bits,
            pending: Vec::with_capacity(block_bits),
            exhausted: false,
        }
    }

    /// Read the next block, `None` at end of input
    pub fn next_block(&mut self) -> io::Result<Option<Vec<bool>>> {
        while !self.exhausted && self.pending.len() < self.block_bits {
            match self.decoder.next_chunk()? {
                Some(chunk) => self.pending.extend_from_slice(&chunk),
                None => self.exhausted = true,
            }
        }
        if self.pending.is_empty() {
            return Ok(None);
        }

        let take = self.pending.len().min(self.block_bits);
        let rest = self.pending.split_off(take);
        Ok(Some(std::mem::replace(&mut self.pending, rest)))
    }
}

impl<R: Read> Iterator for BitBlocks<R> {
    type Item = io::Result<Vec<bool>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}

/// Decode a whole bit-text source
pub fn decode_bits_from_text<R: Read>(reader: R) -> io::Result<BitSequence> {
    let mut bits = BitSequence::new();
    for chunk in BitTextDecoder::new(reader) {
        bits.extend_from_slice(&chunk?);
    }
    Ok(bits)
}

/// Count the bits in a bit-text source without keeping them
pub fn count_bits<R: Read>(reader: R, chunk_bits: usize) -> io::Result<u64> {
    let mut total = 0u64;
    for chunk in BitTextDecoder::with_chunk_bits(reader, chunk_bits) {
        total += chunk?.len() as u64;
    }
    Ok(total)
}

/// Decode bit-text and pack it into bytes in a single pass
///
/// Returns the number of bytes written. Identical to decoding into bits and
/// calling [`encode_bits`].
pub fn bit_text_to_bytes<R: Read, W: Write>(
    reader: R,
    writer: W,
    chunk_bits: usize,
) -> io::Result<u64> {
    let mut packer = BitPacker::with_chunk_bits(writer, chunk_bits);
    for chunk in BitTextDecoder::with_chunk_bits(reader, chunk_bits) {
        packer.push_bits(&chunk?)?;
    }
    let (_, written) = packer.finish()?;
    Ok(written)
}

/// Write bits as bit-text, `chunk_bits` characters at a time
pub fn write_bit_text<W: Write>(bits: &[bool], mut writer: W, chunk_bits: usize) -> io::Result<()> {
    let mut text = Vec::with_capacity(chunk_bits.max(1).min(bits.len()));
    for chunk in bits.chunks(chunk_bits.max(1)) {
        text.clear();
        text.extend(chunk.iter().map(|&b| bit_char(b)));
        writer.write_all(&text)?;
    }
    writer.flush()
}

/// Lookup table from byte value to its 8 bit characters
fn byte_text_table() -> [[u8; 8]; 256] {
    let mut table = [[0u8; 8]; 256];
    for (value, row) in table.iter_mut().enumerate() {
        for (k, c) in row.iter_mut().enumerate() {
            *c = bit_char((value >> (7 - k)) & 1 == 1);
        }
    }
    table
}

/// Expand raw bytes into bit-text, `chunk_bytes` input bytes at a time
///
/// Returns the number of bits written.
pub fn bytes_to_bit_text<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    chunk_bytes: usize,
) -> io::Result<u64> {
    let table = byte_text_table();
    let mut input = vec![0u8; chunk_bytes.max(1)];
    let mut text = Vec::with_capacity(input.len() * 8);
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut input) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        text.clear();
        for &byte in &input[..n] {
            text.extend_from_slice(&table[byte as usize]);
        }
        writer.write_all(&text)?;
        total += n as u64 * 8;
    }

    writer.flush()?;
    Ok(total)
}

/// Write a file through a temporary sibling, replacing `dest` only on success
///
/// A failure at any point leaves an existing `dest` untouched and removes the
/// temporary file.
pub fn write_atomically<T, F>(dest: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut dyn Write) -> io::Result<T>,
{
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::codec(dest, e))?;
    let value = {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let value = write(&mut writer).map_err(|e| Error::codec(dest, e))?;
        writer.flush().map_err(|e| Error::codec(dest, e))?;
        value
    };
    tmp.persist(dest).map_err(|e| Error::codec(dest, e.error))?;
    Ok(value)
}

fn open_reader(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| Error::codec(path, e))?;
    Ok(BufReader::new(file))
}

/// Read a bit-text file into memory
pub fn read_bit_text_file(path: &Path, chunk_bits: usize) -> Result<BitSequence> {
    let mut bits = BitSequence::new();
    for chunk in BitTextDecoder::with_chunk_bits(open_reader(path)?, chunk_bits) {
        bits.extend_from_slice(&chunk.map_err(|e| Error::codec(path, e))?);
    }
    Ok(bits)
}

/// Write bits to `dest` as bit-text, replacing any previous content
pub fn write_bit_text_file(bits: &[bool], dest: &Path, chunk_bits: usize) -> Result<()> {
    write_atomically(dest, |w| write_bit_text(bits, w, chunk_bits))
}

/// Pack bits into a binary file, returning the number of bytes written
pub fn write_packed_file(bits: &[bool], dest: &Path, chunk_bits: usize) -> Result<u64> {
    write_atomically(dest, |w| {
        let mut packer = BitPacker::with_chunk_bits(w, chunk_bits);
        for chunk in bits.chunks(chunk_bits.max(1)) {
            packer.push_bits(chunk)?;
        }
        let (_, written) = packer.finish()?;
        Ok(written)
    })
}

/// Write a stream of bit chunks to `dest` as bit-text
///
/// Returns the number of bits written. A failing chunk aborts the write and
/// leaves `dest` untouched.
pub fn write_bit_text_chunks<I>(chunks: I, dest: &Path, chunk_bits: usize) -> Result<u64>
where
    I: IntoIterator<Item = io::Result<Vec<bool>>>,
{
    write_atomically(dest, |w| {
        let mut total = 0u64;
        for chunk in chunks {
            let chunk = chunk?;
            write_bit_text(&chunk, &mut *w, chunk_bits)?;
            total += chunk.len() as u64;
        }
        Ok(total)
    })
}

/// Pack a stream of bit chunks into a binary file
///
/// Returns the number of bytes written.
pub fn write_packed_chunks<I>(chunks: I, dest: &Path, chunk_bits: usize) -> Result<u64>
where
    I: IntoIterator<Item = io::Result<Vec<bool>>>,
{
    write_atomically(dest, |w| {
        let mut packer = BitPacker::with_chunk_bits(w, chunk_bits);
        for chunk in chunks {
            packer.push_bits(&chunk?)?;
        }
        let (_, written) = packer.finish()?;
        Ok(written)
    })
}

/// Convert a bit-text file into a binary file
pub fn bit_text_file_to_bytes(src: &Path, dest: &Path, chunk_bits: usize) -> Result<u64> {
    let reader = open_reader(src)?;
    let written = write_atomically(dest, |w| bit_text_to_bytes(reader, w, chunk_bits))?;
    tracing::debug!(
        src = %src.display(),
        dest = %dest.display(),
        bytes = written,
        "Packed bit-text file"
    );
    Ok(written)
}

/// Convert a binary file into a bit-text file
pub fn bytes_file_to_bit_text(src: &Path, dest: &Path, chunk_bytes: usize) -> Result<u64> {
    let reader = open_reader(src)?;
    let bits = write_atomically(dest, |w| bytes_to_bit_text(reader, w, chunk_bytes))?;
    tracing::debug!(
        src = %src.display(),
        dest = %dest.display(),
        bits,
        "Expanded binary file to bit-text"
    );
    Ok(bits)
}
