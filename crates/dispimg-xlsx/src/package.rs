//! In-memory OPC package

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use zip::CompressionMethod;

use crate::content_types::CONTENT_TYPES_PART;
use crate::error::{XlsxError, XlsxResult};

/// Upper bound on the buffer reserved from an entry's declared size
const MAX_PREALLOCATION: u64 = 1 << 20;

#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
    compression: CompressionMethod,
}

/// A zip container loaded into memory.
///
/// Entries keep their archive order. Replacing a part keeps its position,
/// new parts are appended after the existing ones.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<PackageEntry>,
    index: HashMap<String, usize>,
}

impl Package {
    /// Open a package from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Read a package from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut package = Package::default();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            let is_dir = file.is_dir();
            let compression = match file.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };

            let mut data = Vec::with_capacity(initial_capacity(file.size()));
            if !is_dir {
                file.read_to_end(&mut data)?;
            }

            if package.index.contains_key(&name) {
                log::warn!("Duplicate zip entry '{}' ignored", name);
                continue;
            }
            package.index.insert(name.clone(), package.entries.len());
            package.entries.push(PackageEntry {
                name,
                data,
                is_dir,
                compression,
            });
        }

        // Verify this is an OOXML package
        if !package.contains(CONTENT_TYPES_PART) {
            return Err(XlsxError::InvalidFormat(format!(
                "Missing {}",
                CONTENT_TYPES_PART
            )));
        }

        Ok(package)
    }

    /// Number of entries in the package
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the package has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in archive order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Whether a part exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Raw bytes of a part
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.index
            .get(name)
            .map(|&idx| self.entries[idx].data.as_slice())
    }

    /// Raw bytes of a part that must exist
    pub fn required_part(&self, name: &str) -> XlsxResult<&[u8]> {
        self.part(name)
            .ok_or_else(|| XlsxError::MissingPart(name.to_string()))
    }

    /// Insert or replace a part
    pub fn set_part(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&idx) => self.entries[idx].data = data,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push(PackageEntry {
                    name,
                    data,
                    is_dir: false,
                    compression: CompressionMethod::Deflated,
                });
            }
        }
    }

    /// Write the package as a zip archive
    pub fn write<W: Write + Seek>(&self, writer: W) -> XlsxResult<()> {
        let mut zip = zip::ZipWriter::new(writer);

        for entry in &self.entries {
            let options =
                zip::write::SimpleFileOptions::default().compression_method(entry.compression);
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
            } else {
                zip.start_file(entry.name.as_str(), options)?;
                zip.write_all(&entry.data)?;
            }
        }

        zip.finish()?;
        Ok(())
    }

    /// Write the package to `path`.
    ///
    /// The archive is written to a temporary file next to `path` and only
    /// moved into place once it is complete, so a failed save never leaves a
    /// truncated file at `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> XlsxResult<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.write(tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| XlsxError::Io(e.error))?;
        Ok(())
    }
}

/// The declared size is untrusted; large entries grow while reading
fn initial_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOCATION) as usize
}
