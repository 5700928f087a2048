use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use crate::error::DbResult;

/// Values that know their own on-disk image. Pages and tuples encode
/// through their schema instead; this trait covers the fixed-width
/// primitives the log records are assembled from.
pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub fn read_exact<R: Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .unwrap_or_else(|_| panic!("io error, expect {} bytes", bytes_count));
    buffer
}

/// An append buffer for assembling on-disk page images.
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn to_padded_bytes(&self, size: usize) -> Vec<u8> {
        let mut buf = self.buf.clone();

        if buf.len() > size {
            panic!(
                "buffer size is larger than the given size: {} > {}",
                buf.len(),
                size
            );
        }

        buf.resize(size, 0);
        buf
    }
}

/// The file behind the write-ahead log. Appends encoded values and
/// remembers nothing; positioning is the log manager's business.
pub struct LogFile {
    file: File,
}

impl LogFile {
    pub fn new<P: AsRef<Path>>(file_path: P) -> DbResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(file_path)?;

        Ok(Self { file })
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) -> DbResult<()> {
        self.file.write_all(&obj.encode())?;
        Ok(())
    }

    pub fn get_current_position(&mut self) -> DbResult<u64> {
        Ok(self.file.seek(SeekFrom::Current(0))?)
    }

    /// Durably persist everything appended so far.
    pub fn force(&mut self) -> DbResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// # Format
///
/// - 4 bytes: payload size
/// - n bytes: payload
impl Encodeable for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();

        let len = self.len() as u32;
        buffer.extend_from_slice(&len.to_be_bytes());
        buffer.extend_from_slice(&self);

        buffer
    }
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_be_bytes().to_vec()
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, i8, i16, i32, i64, usize);
