//! Region file access: sector and timestamp tables plus chunk extraction.

use std::convert::TryFrom;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::{GzDecoder, ZlibDecoder};
use num_enum::TryFromPrimitive;

use crate::{Error, Result};

/// The size in bytes of a 'sector' in a region file. Sectors are the
/// file's allocation unit; a chunk occupies one or more whole sectors.
pub const SECTOR_SIZE: usize = 4096;

/// The region file header: the sector-pointer table and the timestamp table.
pub const HEADER_SIZE: usize = 2 * SECTOR_SIZE;

/// Compression schemes chunk data is stored with.
#[derive(Debug, TryFromPrimitive)]
#[repr(u8)]
pub enum CompressionScheme {
    Gzip = 1,
    Zlib = 2,
    Uncompressed = 3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SectorPointer {
    begin_sector: usize,
    sector_count: usize,
}

/// A Minecraft region: a 32x32 grid of chunk slots backed by one file.
///
/// The header is read eagerly so timestamp scans never touch the stream;
/// chunk reads seek under a mutex.
#[derive(Debug)]
pub struct Region<S> {
    stream: Mutex<S>,
    pointers: Vec<SectorPointer>,
    timestamps: Vec<i32>,
}

impl<S: Read + Seek> Region<S> {
    /// Parse the region header from a stream. An `Error::IO` with kind
    /// `UnexpectedEof` means the file is empty or truncated; callers
    /// typically skip such regions.
    pub fn from_stream(mut stream: S) -> Result<Self> {
        stream.seek(SeekFrom::Start(0))?;

        let mut header = [0u8; HEADER_SIZE];
        stream.read_exact(&mut header)?;

        let mut pointers = Vec::with_capacity(1024);
        for i in 0..1024 {
            let entry = &header[i * 4..i * 4 + 4];
            let mut begin = 0usize;
            begin |= (entry[0] as usize) << 16;
            begin |= (entry[1] as usize) << 8;
            begin |= entry[2] as usize;
            pointers.push(SectorPointer {
                begin_sector: begin,
                sector_count: entry[3] as usize,
            });
        }

        let mut timestamps = Vec::with_capacity(1024);
        let mut table = &header[SECTOR_SIZE..];
        for _ in 0..1024 {
            timestamps.push(table.read_i32::<BigEndian>()?);
        }

        Ok(Self {
            stream: Mutex::new(stream),
            pointers,
            timestamps,
        })
    }

    /// Modification timestamp of the chunk slot at region-relative (x, z).
    pub fn timestamp(&self, x: usize, z: usize) -> i32 {
        debug_assert!(x < 32 && z < 32);
        self.timestamps[z * 32 + x]
    }

    /// Uncompressed NBT for the chunk at region-relative (x, z), or `None`
    /// when the slot is unoccupied.
    pub fn read_chunk(&self, x: usize, z: usize) -> Result<Option<Vec<u8>>> {
        debug_assert!(x < 32 && z < 32);

        let pointer = self.pointers[z * 32 + x];
        if pointer.begin_sector == 0 && pointer.sector_count == 0 {
            return Ok(None);
        }

        let mut lock = self.stream.lock().unwrap();
        lock.seek(SeekFrom::Start((pointer.begin_sector * SECTOR_SIZE) as u64))?;

        let len = lock.read_u32::<BigEndian>()? as usize;
        let scheme = lock.read_u8()?;

        // the length field counts the scheme byte and must fit the
        // allocated sectors.
        if len == 0 || len - 1 > pointer.sector_count * SECTOR_SIZE {
            return Err(Error::InvalidChunkMeta);
        }

        let mut compressed = vec![0u8; len - 1];
        lock.read_exact(&mut compressed)?;
        drop(lock);

        let scheme =
            CompressionScheme::try_from(scheme).map_err(|_| Error::UnknownCompression(scheme))?;

        let mut data = Vec::new();
        match scheme {
            CompressionScheme::Gzip => {
                GzDecoder::new(compressed.as_slice()).read_to_end(&mut data)?;
            }
            CompressionScheme::Zlib => {
                ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut data)?;
            }
            CompressionScheme::Uncompressed => data = compressed,
        }

        Ok(Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::fixture::region_file;
    use std::io::Cursor;

    #[test]
    fn empty_file_is_unexpected_eof() {
        let err = Region::from_stream(Cursor::new(Vec::new())).unwrap_err();
        match err {
            Error::IO(e) => assert_eq!(std::io::ErrorKind::UnexpectedEof, e.kind()),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn header_only_region_has_no_chunks() {
        let region = Region::from_stream(Cursor::new(vec![0u8; HEADER_SIZE])).unwrap();

        for x in 0..32 {
            for z in 0..32 {
                assert_eq!(0, region.timestamp(x, z));
                assert!(region.read_chunk(x, z).unwrap().is_none());
            }
        }
    }

    #[test]
    fn chunk_round_trips_through_sectors() {
        let payload = b"not actually nbt, but plumbing does not care".to_vec();
        let bytes = region_file(&[(3, 7, 1234, payload.clone())]);
        let region = Region::from_stream(Cursor::new(bytes)).unwrap();

        assert_eq!(1234, region.timestamp(3, 7));
        assert_eq!(0, region.timestamp(7, 3));
        assert_eq!(payload, region.read_chunk(3, 7).unwrap().unwrap());
        assert!(region.read_chunk(0, 0).unwrap().is_none());
    }

    #[test]
    fn unknown_compression_scheme_is_rejected() {
        let mut bytes = vec![0u8; HEADER_SIZE + SECTOR_SIZE];
        // slot (0,0): sector 2, one sector long.
        bytes[0..4].copy_from_slice(&[0, 0, 2, 1]);
        // chunk header: length 2 (scheme byte + 1), scheme 9.
        bytes[HEADER_SIZE..HEADER_SIZE + 6].copy_from_slice(&[0, 0, 0, 2, 9, 0]);

        let region = Region::from_stream(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            region.read_chunk(0, 0),
            Err(Error::UnknownCompression(9))
        ));
    }
}
