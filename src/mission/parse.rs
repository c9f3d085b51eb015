use std::io::{Cursor, Read, Seek};
use std::path::Path;

use bon::Builder;
use image::ImageReader;
use tracing::{debug, warn};

use super::builder::MissionBuilder;
use super::scope::{BlockScope, TableScope};
use super::{Backend, EmbeddedImage, MissionDetails, ParseStatus};
use crate::data::{
    BRIEFING_IMAGE_PREFIX, CancelFlag, DICTIONARY_ENTRY, IMAGE_EXTENSIONS, KNEEBOARD_IMAGE_PREFIX,
    MISSION_ENTRY, MizArchive,
};
use crate::dictionary::Dictionary;
use crate::error::{ErrorKind, IResult};
use crate::lua::{self, Document};

/// What to read from an archive besides the mission itself.
#[derive(Builder, Debug, Clone)]
pub struct ParseOptions {
    /// Load briefing images from `l10n/DEFAULT/`.
    #[builder(default = true)]
    pub images: bool,
    /// Load kneeboard pages from `KNEEBOARD/`.
    #[builder(default = true)]
    pub kneeboard: bool,
    #[builder(default)]
    pub cancel: CancelFlag,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builds the mission model from mission text.
///
/// The text is read as a table document first. When that fails the same
/// model is assembled by scanning the raw text, and the result reports
/// [`Backend::TextScan`].
pub fn mission_from_text(
    mission: &str,
    dictionary: &Dictionary,
    cancel: &CancelFlag,
) -> MissionDetails {
    match lua::parse_document(mission) {
        Ok(document) => {
            if document.truncated {
                warn!("mission text ends early; reading the part that is present");
            }
            let mut details = MissionBuilder::new(dictionary, cancel)
                .build(&TableScope::new(document.root()));
            details.backend = Backend::Tree;
            details
        }
        Err(err) => {
            warn!("mission text could not be tokenized ({err}); falling back to text scanning");
            let mut details =
                MissionBuilder::new(dictionary, cancel).build(&BlockScope::mission_root(mission));
            details.backend = Backend::TextScan;
            details
        }
    }
}

fn sniff_image(name: &str, bytes: Vec<u8>) -> image::ImageResult<EmbeddedImage> {
    let reader = ImageReader::new(Cursor::new(bytes.as_slice())).with_guessed_format()?;
    let format = reader
        .format()
        .and_then(|format| format.extensions_str().first())
        .map(|ext| ext.to_string())
        .unwrap_or_default();
    let (width, height) = reader.into_dimensions()?;
    Ok(EmbeddedImage {
        name: name.to_string(),
        bytes,
        format,
        width,
        height,
    })
}

impl<R: Read + Seek> MizArchive<R> {
    /// Images under `prefix`, in archive order. Entries that cannot be read or
    /// do not decode as an image are skipped. Returns `None` if cancelled.
    pub fn embedded_images(&mut self, prefix: &str, cancel: &CancelFlag) -> Option<Vec<EmbeddedImage>> {
        let mut images = Vec::new();
        for name in self.list_entries_with_prefix_and_extension(prefix, &IMAGE_EXTENSIONS) {
            if cancel.is_cancelled() {
                return None;
            }
            let bytes = match self.read_entry_bytes(&name) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(err) => {
                    warn!("skipping image {name}: {err}");
                    continue;
                }
            };
            match sniff_image(&name, bytes) {
                Ok(image) => images.push(image),
                Err(err) => warn!("skipping image {name}: {err}"),
            }
        }
        Some(images)
    }

    /// The mission entry read as a table document.
    pub fn mission_document(&mut self) -> IResult<Document> {
        let text = self
            .entry_text(MISSION_ENTRY)?
            .ok_or_else(|| ErrorKind::MissingEntry(MISSION_ENTRY.to_string()))?;
        Ok(lua::parse_document(&text)?)
    }

    /// Reads everything [`MissionDetails`] describes from this archive.
    pub fn mission_details(&mut self, options: &ParseOptions) -> IResult<MissionDetails> {
        let cancel = &options.cancel;
        if cancel.is_cancelled() {
            return Ok(MissionDetails::cancelled());
        }

        let mission = match self.entry_text(MISSION_ENTRY)? {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                warn!("archive has no mission entry");
                return Ok(MissionDetails::missing_mission());
            }
        };
        if cancel.is_cancelled() {
            return Ok(MissionDetails::cancelled());
        }

        let dictionary = Dictionary::new(&self.read_entry_text(DICTIONARY_ENTRY));
        if cancel.is_cancelled() {
            return Ok(MissionDetails::cancelled());
        }
        debug!("dictionary holds {} entries", dictionary.len());

        let mut details = mission_from_text(&mission, &dictionary, cancel);
        if details.status == ParseStatus::Cancelled {
            return Ok(details);
        }

        let sources = [
            (options.images, BRIEFING_IMAGE_PREFIX),
            (options.kneeboard, KNEEBOARD_IMAGE_PREFIX),
        ];
        for (enabled, prefix) in sources {
            if !enabled {
                continue;
            }
            let Some(images) = self.embedded_images(prefix, cancel) else {
                details.status = ParseStatus::Cancelled;
                return Ok(details);
            };
            if prefix == KNEEBOARD_IMAGE_PREFIX {
                details.kneeboard_images = images;
            } else {
                details.images = images;
            }
        }

        debug!("{}", details.debug_info());
        Ok(details)
    }
}

/// Like [`parse_mission_with`], but archive failures are returned as errors.
pub fn try_parse_mission(path: impl AsRef<Path>, options: &ParseOptions) -> IResult<MissionDetails> {
    MizArchive::open(path)?.mission_details(options)
}

/// Parses the archive at `path` with default options.
pub fn parse_mission(path: impl AsRef<Path>) -> MissionDetails {
    parse_mission_with(path, &ParseOptions::default())
}

/// Parses the archive at `path`. This never fails: an unreadable archive
/// produces a result with [`ParseStatus::Failed`].
pub fn parse_mission_with(path: impl AsRef<Path>, options: &ParseOptions) -> MissionDetails {
    let path = path.as_ref();
    try_parse_mission(path, options).unwrap_or_else(|err| {
        warn!("failed to parse {}: {err}", path.display());
        MissionDetails::failed(err.to_string())
    })
}

#[cfg(feature = "async")]
pub async fn parse_mission_async(path: std::path::PathBuf, options: ParseOptions) -> MissionDetails {
    async_std::task::spawn_blocking(move || parse_mission_with(&path, &options)).await
}
