//! BGZF block compression: independent gzip members carrying a `BC` extra
//! subfield with the member's total size, addressable by virtual offset.
use crate::gilib::{GenoError, Result};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression, Crc};
use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::Path,
};

/// Largest uncompressed payload per block, as htslib writes them
pub const MAX_BLOCK_DATA: usize = 0xff00;
const MAX_BLOCK_SIZE: usize = 0x10000;
const HEADER_LEN: usize = 12;
const FOOTER_LEN: usize = 8;

/// Empty block marking end of file
pub const EOF_MARKER: [u8; 28] = [
    31, 139, 8, 4, 0, 0, 0, 0, 0, 255, 6, 0, 66, 67, 2, 0, 27, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// High 48 bits: compressed block address. Low 16 bits: offset in the
/// block's decompressed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    pub fn new(block_address: u64, within_block: u16) -> Self {
        Self((block_address << 16) | within_block as u64)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }

    pub fn block_address(&self) -> u64 {
        self.0 >> 16
    }

    pub fn within_block(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_address(), self.within_block())
    }
}

/// Sequential and random-access reader over BGZF blocks.
/// Holds one decompressed block at a time.
pub struct BgzfReader<R> {
    inner: R,
    block_address: u64,
    next_block_address: u64,
    data: Vec<u8>,
    pos: usize,
    line_buf: Vec<u8>,
}

impl BgzfReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> BgzfReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            block_address: 0,
            next_block_address: 0,
            data: Vec::new(),
            pos: 0,
            line_buf: Vec::new(),
        }
    }

    /// Offset of the next unread byte. At the end of a non-empty block this
    /// is the start of the following block.
    pub fn virtual_offset(&self) -> VirtualOffset {
        if self.pos >= self.data.len() && !self.data.is_empty() {
            VirtualOffset::new(self.next_block_address, 0)
        } else {
            VirtualOffset::new(self.block_address, self.pos as u16)
        }
    }

    /// Read one line into `line` without its terminator.
    /// Returns bytes consumed including the terminator; 0 at end of file.
    pub fn read_line(&mut self, line: &mut String) -> Result<usize> {
        line.clear();
        self.line_buf.clear();
        let mut consumed = 0;
        loop {
            if self.pos >= self.data.len() {
                if !self.read_block()? {
                    break;
                }
                continue;
            }
            let rest = &self.data[self.pos..];
            match rest.iter().position(|b| *b == b'\n') {
                Some(idx) => {
                    self.line_buf.extend_from_slice(&rest[..idx]);
                    self.pos += idx + 1;
                    consumed += idx + 1;
                    break;
                }
                None => {
                    self.line_buf.extend_from_slice(rest);
                    consumed += rest.len();
                    self.pos = self.data.len();
                }
            }
        }
        if self.line_buf.last() == Some(&b'\r') {
            self.line_buf.pop();
        }
        let text = std::str::from_utf8(&self.line_buf).map_err(|e| {
            GenoError::format(format!("line is not UTF-8: {}", e)).at(format!("block {}", self.block_address))
        })?;
        line.push_str(text);
        Ok(consumed)
    }

    /// Load the block at `next_block_address`. False at clean end of file.
    fn read_block(&mut self) -> Result<bool> {
        let address = self.next_block_address;
        let at = || format!("block {}", address);

        let mut header = [0u8; HEADER_LEN];
        let got = read_fully(&mut self.inner, &mut header)?;
        if got == 0 {
            self.data.clear();
            self.pos = 0;
            return Ok(false);
        }
        if got < HEADER_LEN {
            return Err(GenoError::format("truncated block header").at(at()));
        }
        if header[0] != 31 || header[1] != 139 || header[2] != 8 || header[3] & 0x04 == 0 {
            return Err(GenoError::format("not a BGZF block").at(at()));
        }

        let xlen = u16::from_le_bytes([header[10], header[11]]) as usize;
        let mut extra = vec![0u8; xlen];
        self.inner.read_exact(&mut extra)?;
        let block_size = bsize(&extra).ok_or_else(|| GenoError::format("missing BC subfield").at(at()))?;
        if block_size < HEADER_LEN + xlen + FOOTER_LEN {
            return Err(GenoError::format(format!("block size {} too small", block_size)).at(at()));
        }

        let mut payload = vec![0u8; block_size - HEADER_LEN - xlen];
        self.inner.read_exact(&mut payload)?;
        let (cdata, footer) = payload.split_at(payload.len() - FOOTER_LEN);
        let expected_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        let isize = u32::from_le_bytes([footer[4], footer[5], footer[6], footer[7]]) as usize;

        if isize > MAX_BLOCK_SIZE {
            return Err(GenoError::format(format!("inflated size {} exceeds {}", isize, MAX_BLOCK_SIZE)).at(at()));
        }

        self.data.clear();
        self.data.reserve(isize);
        DeflateDecoder::new(cdata)
            .take(MAX_BLOCK_SIZE as u64 + 1)
            .read_to_end(&mut self.data)
            .map_err(|e| GenoError::format(format!("inflate failed: {}", e)).at(at()))?;
        if self.data.len() != isize {
            return Err(GenoError::format(format!(
                "inflated {} bytes, expected {}",
                self.data.len(),
                isize
            ))
            .at(at()));
        }
        let mut crc = Crc::new();
        crc.update(&self.data);
        if crc.sum() != expected_crc {
            return Err(GenoError::format("CRC mismatch").at(at()));
        }

        self.block_address = address;
        self.next_block_address = address + block_size as u64;
        self.pos = 0;
        Ok(true)
    }
}

impl<R: Read + Seek> BgzfReader<R> {
    /// Position the reader at `offset`
    pub fn seek(&mut self, offset: VirtualOffset) -> Result<()> {
        let within = offset.within_block() as usize;
        if offset.block_address() != self.block_address || self.data.is_empty() {
            self.inner.seek(SeekFrom::Start(offset.block_address()))?;
            self.next_block_address = offset.block_address();
            self.block_address = offset.block_address();
            self.data.clear();
            self.pos = 0;
            if !self.read_block()? && within > 0 {
                return Err(GenoError::format("seek past end of file").at(offset.to_string()));
            }
        }
        if within > self.data.len() {
            return Err(GenoError::format(format!(
                "offset {} beyond block of {} bytes",
                within,
                self.data.len()
            ))
            .at(offset.to_string()));
        }
        self.pos = within;
        Ok(())
    }
}

/// Bytes read before end of input, short only at EOF
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Total block size from the `BC` extra subfield
fn bsize(extra: &[u8]) -> Option<usize> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        if extra[pos] == 66 && extra[pos + 1] == 67 && slen == 2 && pos + 6 <= extra.len() {
            return Some(u16::from_le_bytes([extra[pos + 4], extra[pos + 5]]) as usize + 1);
        }
        pos += 4 + slen;
    }
    None
}

/// Writes BGZF blocks of at most `block_size` uncompressed bytes
pub struct BgzfWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
    block_size: usize,
    compressed_address: u64,
}

impl<W: Write> BgzfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_block_size(inner, MAX_BLOCK_DATA)
    }

    /// Small blocks are useful to exercise multi-block files
    pub fn with_block_size(inner: W, block_size: usize) -> Self {
        let block_size = block_size.clamp(1, MAX_BLOCK_DATA);
        Self {
            inner,
            buf: Vec::with_capacity(block_size),
            block_size,
            compressed_address: 0,
        }
    }

    /// Offset the next written byte will have once read back
    pub fn virtual_offset(&self) -> VirtualOffset {
        VirtualOffset::new(self.compressed_address, self.buf.len() as u16)
    }

    /// Flush the pending block, append the EOF marker and hand back the sink
    pub fn finish(mut self) -> io::Result<W> {
        self.flush_block()?;
        self.inner.write_all(&EOF_MARKER)?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let block = compress_block(&self.buf)?;
        self.inner.write_all(&block)?;
        self.compressed_address += block.len() as u64;
        self.buf.clear();
        Ok(())
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut remaining = data;
        while !remaining.is_empty() {
            let take = remaining.len().min(self.block_size - self.buf.len());
            self.buf.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            if self.buf.len() >= self.block_size {
                self.flush_block()?;
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_block()?;
        self.inner.flush()
    }
}

fn compress_block(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut deflate = DeflateEncoder::new(Vec::new(), Compression::default());
    deflate.write_all(data)?;
    let deflated = deflate.finish()?;
    let mut crc = Crc::new();
    crc.update(data);

    let total = HEADER_LEN + 6 + deflated.len() + FOOTER_LEN;
    if total > MAX_BLOCK_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("compressed block of {} bytes exceeds BGZF limit", total),
        ));
    }

    let mut block = Vec::with_capacity(total);
    block.extend_from_slice(&[31, 139, 8, 4, 0, 0, 0, 0, 0, 255]);
    block.extend_from_slice(&6u16.to_le_bytes());
    block.extend_from_slice(&[66, 67]);
    block.extend_from_slice(&2u16.to_le_bytes());
    block.extend_from_slice(&((total - 1) as u16).to_le_bytes());
    block.extend_from_slice(&deflated);
    block.extend_from_slice(&crc.sum().to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());
    Ok(block)
}

/// Compress a plain text file into BGZF, keeping line boundaries intact
pub fn compress_file(input: &Path, output: &Path) -> Result<()> {
    let reader = BufReader::new(File::open(input)?);
    let mut writer = BgzfWriter::new(BufWriter::new(File::create(output)?));
    for line in reader.split(b'\n') {
        let line = line?;
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
    }
    writer.finish()?;
    info!("compressed {} to {}", input.display(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn write_lines(lines: &[&str], block_size: usize) -> (Vec<u8>, Vec<VirtualOffset>) {
        let mut writer = BgzfWriter::with_block_size(Vec::new(), block_size);
        let mut offsets = vec![];
        for line in lines {
            offsets.push(writer.virtual_offset());
            writer.write_all(line.as_bytes()).unwrap();
            writer.write_all(b"\n").unwrap();
        }
        (writer.finish().unwrap(), offsets)
    }

    #[test]
    fn test_virtual_offset_parts() {
        let v = VirtualOffset::new(1234, 56);
        assert_eq!(v.block_address(), 1234);
        assert_eq!(v.within_block(), 56);
        assert_eq!(VirtualOffset::from_raw(v.as_raw()), v);
        assert!(VirtualOffset::new(1, 0) > VirtualOffset::new(0, 65535));
    }

    #[test]
    fn test_lines_span_blocks() {
        let lines = ["first line", "second", "a somewhat longer third line", "", "last"];
        let (bytes, _) = write_lines(&lines, 7);
        assert!(bytes.ends_with(&EOF_MARKER));

        let mut reader = BgzfReader::new(Cursor::new(bytes));
        let mut line = String::new();
        let mut seen = vec![];
        while reader.read_line(&mut line).unwrap() > 0 {
            seen.push(line.clone());
        }
        assert_eq!(seen, lines.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_reader_offsets_match_writer() {
        let lines = ["alpha", "beta", "gamma", "delta", "epsilon"];
        let (bytes, written) = write_lines(&lines, 12);

        let mut reader = BgzfReader::new(Cursor::new(bytes.clone()));
        let mut line = String::new();
        for expected in &written {
            assert_eq!(reader.virtual_offset(), *expected);
            reader.read_line(&mut line).unwrap();
        }

        let mut reader = BgzfReader::new(Cursor::new(bytes));
        for (idx, offset) in written.iter().enumerate().rev() {
            reader.seek(*offset).unwrap();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, lines[idx]);
        }
    }

    #[test]
    fn test_corrupt_crc() {
        let (mut bytes, _) = write_lines(&["some data"], 100);
        // CRC sits 8 bytes before the end of the first block
        let first_block_end = bytes.len() - EOF_MARKER.len();
        bytes[first_block_end - 8] ^= 0xff;
        let mut reader = BgzfReader::new(Cursor::new(bytes));
        let mut line = String::new();
        assert!(matches!(reader.read_line(&mut line), Err(GenoError::Format { .. })));
    }

    #[test]
    fn test_oversized_isize() {
        let (mut bytes, _) = write_lines(&["some data"], 100);
        // ISIZE is the last footer word of the first block
        let first_block_end = bytes.len() - EOF_MARKER.len();
        bytes[first_block_end - 4..first_block_end].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut reader = BgzfReader::new(Cursor::new(bytes));
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Err(e @ GenoError::Format { .. }) => assert!(e.to_string().contains("exceeds")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_bgzf() {
        let mut reader = BgzfReader::new(Cursor::new(b"plain text that is long enough\n".to_vec()));
        let mut line = String::new();
        assert!(reader.read_line(&mut line).is_err());
    }

    #[test]
    fn test_compress_file() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("in.txt");
        let packed = dir.path().join("in.txt.gz");
        std::fs::write(&plain, "x\ty\nz\n").unwrap();
        compress_file(&plain, &packed).unwrap();

        let mut reader = BgzfReader::open(&packed).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "x\ty");
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "z");
        assert_eq!(reader.read_line(&mut line).unwrap(), 0);
    }
}
