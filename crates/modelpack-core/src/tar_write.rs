//! Deterministic tar / tar.gz write path and the streaming readers it uses.

use crate::config::ArchiveFormat;
use crate::manifest::FileMeta;
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use std::io::{self, Read, Write};
use tar::{Builder, Header};

/// Owner recorded on every entry.
const ENTRY_OWNER: &str = "modelpack";

/// Tar builder over either a gzip encoder or the raw writer.
pub(crate) enum TarSink<W: Write> {
    Gzip(Builder<GzEncoder<W>>),
    Plain(Builder<W>),
}

impl<W: Write> TarSink<W> {
    pub(crate) fn new(writer: W, format: ArchiveFormat) -> Self {
        match format {
            ArchiveFormat::TarGz => {
                let encoder = GzBuilder::new()
                    .mtime(0)
                    .operating_system(255)
                    .write(writer, Compression::best());
                Self::Gzip(deterministic(Builder::new(encoder)))
            }
            ArchiveFormat::Tar => Self::Plain(deterministic(Builder::new(writer))),
        }
    }

    pub(crate) fn append_bytes(&mut self, path: &str, data: &[u8]) -> io::Result<()> {
        self.append_reader(path, data.len() as u64, data)
    }

    /// Append `size` bytes read from `data`. The reader must yield exactly
    /// that many bytes.
    pub(crate) fn append_reader<R: Read>(
        &mut self,
        path: &str,
        size: u64,
        data: R,
    ) -> io::Result<()> {
        let mut header = entry_header(size)?;
        // append_data emits a GNU long-name entry for paths over 100 bytes.
        match self {
            Self::Gzip(tar) => tar.append_data(&mut header, path, data),
            Self::Plain(tar) => tar.append_data(&mut header, path, data),
        }
    }

    /// Write the tar trailer, finish compression and hand back the writer.
    pub(crate) fn finish(self) -> io::Result<W> {
        match self {
            Self::Gzip(tar) => tar.into_inner()?.finish(),
            Self::Plain(tar) => tar.into_inner(),
        }
    }
}

fn deterministic<T: Write>(mut tar: Builder<T>) -> Builder<T> {
    tar.mode(tar::HeaderMode::Deterministic);
    tar
}

fn entry_header(size: u64) -> io::Result<Header> {
    let mut header = Header::new_gnu();
    header.set_size(size);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_username(ENTRY_OWNER)?;
    header.set_groupname(ENTRY_OWNER)?;
    Ok(header)
}

/// Reader that hashes and counts everything passing through it.
pub(crate) struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes: u64,
}

impl<R: Read> HashingReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    pub(crate) fn into_parts(self) -> (R, FileMeta) {
        let meta = FileMeta::from_digest(self.hasher.finalize(), self.bytes);
        (self.inner, meta)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}

/// Reader that yields exactly `expected` bytes and fails if the source ends
/// early. The header size is written before the content, so a shrinking
/// source must abort the entry instead of producing a short member.
pub(crate) struct SizedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> SizedReader<R> {
    pub(crate) fn new(inner: R, expected: u64) -> Self {
        Self {
            inner,
            remaining: expected,
        }
    }

    /// Fails if the source still has data after the expected length.
    pub(crate) fn ensure_exhausted(mut self) -> io::Result<()> {
        let mut probe = [0u8; 1];
        match self.inner.read(&mut probe)? {
            0 => Ok(()),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "source grew while it was being archived",
            )),
        }
    }
}

impl<R: Read> Read for SizedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let cap = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..cap])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source ended {} bytes early", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
