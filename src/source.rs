//! Byte sources the chunk writer can slice

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// A byte-addressable blob of known size.
///
/// `read_window` is called with windows inside `[0, size())`, in ascending
/// offset order.
#[async_trait]
pub trait ByteSource: Send {
    /// Total size in bytes
    fn size(&self) -> u64;

    /// Read exactly `len` bytes starting at `offset`
    async fn read_window(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>>;
}

fn window<'a>(bytes: &'a [u8], offset: u64, len: usize) -> std::io::Result<&'a [u8]> {
    let start = usize::try_from(offset).map_err(std::io::Error::other)?;
    bytes
        .get(start..start.saturating_add(len))
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("window {}+{} outside {} bytes", offset, len, bytes.len()),
            )
        })
}

#[async_trait]
impl ByteSource for Vec<u8> {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    async fn read_window(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        window(self, offset, len).map(<[u8]>::to_vec)
    }
}

#[async_trait]
impl<'a> ByteSource for &'a [u8] {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    async fn read_window(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        window(self, offset, len).map(<[u8]>::to_vec)
    }
}

/// A file on disk, read one window at a time
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    /// Open `path` and record its current length
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self { file, size })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_window(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}
