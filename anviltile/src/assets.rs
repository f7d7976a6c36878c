//! Lookup-by-name access to the files inside a game client archive.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::Mutex;

use zip::ZipArchive;

/// Errors from the archive layer.
#[derive(Debug)]
pub enum AssetError {
    NotFound(String),
    Zip(zip::result::ZipError),
    Image(image::ImageError),
    IO(std::io::Error),
}

impl From<zip::result::ZipError> for AssetError {
    fn from(err: zip::result::ZipError) -> Self {
        AssetError::Zip(err)
    }
}

impl From<image::ImageError> for AssetError {
    fn from(err: image::ImageError) -> Self {
        AssetError::Image(err)
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::IO(err)
    }
}

impl std::fmt::Display for AssetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetError::NotFound(name) => f.write_fmt(format_args!("asset {name} does not exist")),
            AssetError::Zip(e) => f.write_fmt(format_args!("archive error: {e}")),
            AssetError::Image(e) => f.write_fmt(format_args!("image error: {e}")),
            AssetError::IO(e) => f.write_fmt(format_args!("io error: {e}")),
        }
    }
}

impl std::error::Error for AssetError {}

pub type AssetResult<T> = std::result::Result<T, AssetError>;

/// Access to the files of a client JAR (a ZIP archive). Only entries under
/// `assets/` and `data/` are retained; everything else in the archive
/// (class files and the like) is invisible.
///
/// The underlying archive is behind a mutex so loads can be issued from
/// any thread; decoding happens outside the lock.
pub struct AssetLoader<S: Read + Seek = File> {
    names: HashSet<String>,
    archive: Mutex<ZipArchive<S>>,
}

impl AssetLoader<File> {
    pub fn from_path(path: &Path) -> AssetResult<Self> {
        Self::from_reader(File::open(path)?)
    }
}

impl<S: Read + Seek> AssetLoader<S> {
    pub fn from_reader(reader: S) -> AssetResult<Self> {
        let archive = ZipArchive::new(reader)?;

        let names = archive
            .file_names()
            .filter(|name| name.starts_with("assets/") || name.starts_with("data/"))
            .map(|name| name.to_owned())
            .collect();

        Ok(Self {
            names,
            archive: Mutex::new(archive),
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// The retained entry names, in archive order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// A reader over an entry's contents.
    pub fn open(&self, name: &str) -> AssetResult<Cursor<Vec<u8>>> {
        Ok(Cursor::new(self.load_raw(name)?))
    }

    pub fn load_raw(&self, name: &str) -> AssetResult<Vec<u8>> {
        if !self.names.contains(name) {
            return Err(AssetError::NotFound(name.to_owned()));
        }

        let mut archive = self.archive.lock().unwrap();
        let mut file = archive.by_name(name)?;

        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn load_png(&self, name: &str) -> AssetResult<image::RgbaImage> {
        let raw = self.load_raw(name)?;
        let img = image::load(Cursor::new(raw), image::ImageFormat::Png)?;
        Ok(img.into_rgba8())
    }
}
