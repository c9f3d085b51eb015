use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use zip::{ZipArchive, ZipWriter};
use zip::result::ZipError;

use super::decode_text;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("could not open {}: {err}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("not a valid mission archive: {0}")]
    Zip(#[from] ZipError),
    #[error("failed to read entry {name}: {err}")]
    Read {
        name: String,
        #[source]
        err: std::io::Error,
    },
}

/// A `.miz` archive open for reading.
///
/// Entries are read on demand. The underlying reader is released when the
/// archive is dropped.
pub struct MizArchive<R> {
    zip: ZipArchive<R>,
}

impl MizArchive<BufReader<File>> {
    /// Opens the archive at `path` read-only. The file may be held open by
    /// another process at the same time.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| ArchiveError::Open {
            path: path.to_path_buf(),
            err,
        })?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> MizArchive<R> {
    pub fn from_reader(reader: R) -> Result<Self, ArchiveError> {
        Ok(Self {
            zip: ZipArchive::new(reader)?,
        })
    }

    /// Entry names in central-directory order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        (0..self.zip.len()).filter_map(move |i| self.zip.name_for_index(i))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.zip.index_for_name(name).is_some()
    }

    /// A streaming reader over one entry, or `None` when it does not exist.
    pub fn entry_reader(&mut self, name: &str) -> Result<Option<impl Read + '_>, ArchiveError> {
        match self.zip.by_name(name) {
            Ok(file) => Ok(Some(file)),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn read_entry_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        let Some(mut reader) = self.entry_reader(name)? else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|err| ArchiveError::Read {
                name: name.to_string(),
                err,
            })?;
        Ok(Some(bytes))
    }

    pub fn entry_text(&mut self, name: &str) -> Result<Option<String>, ArchiveError> {
        Ok(self.read_entry_bytes(name)?.map(decode_text))
    }

    /// The decoded text of an entry. Missing and unreadable entries both
    /// read as an empty string.
    pub fn read_entry_text(&mut self, name: &str) -> String {
        match self.entry_text(name) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("archive has no {name} entry");
                String::new()
            }
            Err(err) => {
                warn!("{err}");
                String::new()
            }
        }
    }

    /// Names of the entries under `prefix` whose extension is one of
    /// `extensions`. Both comparisons ignore case.
    pub fn list_entries_with_prefix_and_extension(
        &self,
        prefix: &str,
        extensions: &[&str],
    ) -> Vec<String> {
        let prefix = prefix.to_ascii_lowercase();
        self.entry_names()
            .filter(|name| {
                let lower = name.to_ascii_lowercase();
                lower.starts_with(&prefix)
                    && Path::new(&lower)
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            })
            .map(str::to_string)
            .collect()
    }

    /// Copies every entry except `skip` into `writer` without recompressing.
    pub fn copy_entries_except<W: Write + Seek>(
        &mut self,
        writer: &mut ZipWriter<W>,
        skip: &str,
    ) -> Result<(), ArchiveError> {
        for i in 0..self.zip.len() {
            let entry = self.zip.by_index_raw(i)?;
            if entry.name() == skip {
                continue;
            }
            writer.raw_copy_file(entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::io::{Cursor, Write};

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    /// Builds an in-memory archive with the given entries.
    pub(crate) fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn archive(entries: &[(&str, &[u8])]) -> MizArchive<Cursor<Vec<u8>>> {
        MizArchive::from_reader(Cursor::new(build_archive(entries))).unwrap()
    }

    #[test]
    fn reads_text_and_bytes() {
        let mut archive = archive(&[("mission", b"mission = {}"), ("blob", &[0, 1, 2])]);
        assert_eq!(archive.read_entry_text("mission"), "mission = {}");
        assert_eq!(archive.read_entry_bytes("blob").unwrap(), Some(vec![0, 1, 2]));
        assert_eq!(archive.read_entry_text("missing"), "");
        assert_eq!(archive.entry_text("missing").unwrap(), None);
        assert!(archive.contains("blob"));
    }

    #[test]
    fn lists_images_case_insensitively_in_order() {
        let archive = archive(&[
            ("l10n/DEFAULT/dictionary", b""),
            ("l10n/DEFAULT/b.PNG", b""),
            ("L10N/default/a.jpeg", b""),
            ("l10n/DEFAULT/notes.txt", b""),
            ("KNEEBOARD/page1.bmp", b""),
            ("l10n/DEFAULT/c.jpg", b""),
        ]);
        assert_eq!(
            archive.list_entries_with_prefix_and_extension("l10n/DEFAULT/", &["png", "jpg", "jpeg", "bmp"]),
            vec!["l10n/DEFAULT/b.PNG", "L10N/default/a.jpeg", "l10n/DEFAULT/c.jpg"]
        );
        assert_eq!(
            archive.list_entries_with_prefix_and_extension("kneeboard/", &["bmp"]),
            vec!["KNEEBOARD/page1.bmp"]
        );
    }

    #[test]
    fn rejects_non_archives() {
        assert!(matches!(
            MizArchive::from_reader(Cursor::new(b"not a zip".to_vec())),
            Err(ArchiveError::Zip(_))
        ));
        assert!(matches!(
            MizArchive::open("/definitely/not/here.miz"),
            Err(ArchiveError::Open { .. })
        ));
    }
}
