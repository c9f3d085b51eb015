use std::fmt;
use std::io::Write;
use std::path::Path;

use bon::Builder;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::scope::{BlockScope, Scope, TableScope};
use crate::data::{ArchiveError, DICTIONARY_ENTRY, MISSION_ENTRY, MizArchive};
use crate::dictionary::{self, is_dict_key};
use crate::lua::parse_document;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("archive has no mission entry")]
    MissingMission,
    #[error("archive has no dictionary entry")]
    MissingDictionary,
    #[error("failed to write archive: {0}")]
    Zip(#[from] ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A briefing text backed by a dictionary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BriefingField {
    Sortie,
    Situation,
    BlueTask,
    RedTask,
    NeutralsTask,
}

impl BriefingField {
    pub const ALL: [BriefingField; 5] = [
        BriefingField::Sortie,
        BriefingField::Situation,
        BriefingField::BlueTask,
        BriefingField::RedTask,
        BriefingField::NeutralsTask,
    ];

    /// The mission root key holding this field's dictionary reference.
    pub fn mission_key(&self) -> &'static str {
        match self {
            BriefingField::Sortie => "sortie",
            BriefingField::Situation => "descriptionText",
            BriefingField::BlueTask => "descriptionBlueTask",
            BriefingField::RedTask => "descriptionRedTask",
            BriefingField::NeutralsTask => "descriptionNeutralsTask",
        }
    }
}

impl fmt::Display for BriefingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mission_key())
    }
}

/// New briefing texts. Fields left unset are not touched.
#[derive(Debug, Clone, Default, Builder)]
pub struct BriefingUpdate {
    #[builder(into)]
    sortie: Option<String>,
    #[builder(into)]
    situation: Option<String>,
    #[builder(into)]
    blue_task: Option<String>,
    #[builder(into)]
    red_task: Option<String>,
    #[builder(into)]
    neutrals_task: Option<String>,
}

impl BriefingUpdate {
    pub fn text(&self, field: BriefingField) -> Option<&str> {
        match field {
            BriefingField::Sortie => self.sortie.as_deref(),
            BriefingField::Situation => self.situation.as_deref(),
            BriefingField::BlueTask => self.blue_task.as_deref(),
            BriefingField::RedTask => self.red_task.as_deref(),
            BriefingField::NeutralsTask => self.neutrals_task.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        BriefingField::ALL.iter().all(|field| self.text(*field).is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SkipReason {
    /// The mission stores the text inline instead of as a `DictKey_` reference.
    NotDictKey(String),
    /// The reference does not exist in the dictionary.
    NotInDictionary(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotDictKey(value) => write!(f, "mission value {value:?} is not a dictionary reference"),
            SkipReason::NotInDictionary(key) => write!(f, "{key} is not in the dictionary"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdateReport {
    pub updated: Vec<BriefingField>,
    pub skipped: Vec<(BriefingField, SkipReason)>,
}

impl UpdateReport {
    pub fn changed(&self) -> bool {
        !self.updated.is_empty()
    }
}

fn mission_references<S: Scope>(root: &S, update: &BriefingUpdate) -> Vec<(BriefingField, String)> {
    BriefingField::ALL
        .into_iter()
        .filter(|field| update.text(*field).is_some())
        .map(|field| {
            let value = root.str_field(field.mission_key()).unwrap_or_default();
            (field, value)
        })
        .collect()
}

/// Applies `update` to a dictionary text. Returns the new text and what was
/// changed.
pub fn apply_update(
    mission: &str,
    dictionary_text: &str,
    update: &BriefingUpdate,
) -> (String, UpdateReport) {
    let references = match parse_document(mission) {
        Ok(document) => mission_references(&TableScope::new(document.root()), update),
        Err(err) => {
            warn!("mission does not tokenize ({err}), scanning text instead");
            mission_references(&BlockScope::mission_root(mission), update)
        }
    };

    let mut report = UpdateReport::default();
    let mut text = dictionary_text.to_string();
    for (field, reference) in references {
        let Some(new_text) = update.text(field) else {
            continue;
        };
        if !is_dict_key(&reference) {
            report.skipped.push((field, SkipReason::NotDictKey(reference)));
            continue;
        }
        match dictionary::replace_value(&text, &reference, new_text) {
            Some(replaced) => {
                debug!("replaced {reference} for {field}");
                text = replaced;
                report.updated.push(field);
            }
            None => report.skipped.push((field, SkipReason::NotInDictionary(reference))),
        }
    }
    (text, report)
}

/// Rewrites the briefing texts of the archive at `path`.
///
/// The new archive is written next to the original and then moved over it,
/// so a failure part way through leaves the original intact. Nothing is
/// written when no field could be updated.
pub fn update_briefings(path: impl AsRef<Path>, update: &BriefingUpdate) -> Result<UpdateReport, UpdateError> {
    let path = path.as_ref();
    let mut source = MizArchive::open(path)?;

    let mission = source
        .entry_text(MISSION_ENTRY)?
        .filter(|text| !text.trim().is_empty())
        .ok_or(UpdateError::MissingMission)?;
    let dictionary_text = source
        .entry_text(DICTIONARY_ENTRY)?
        .ok_or(UpdateError::MissingDictionary)?;

    let (new_dictionary, report) = apply_update(&mission, &dictionary_text, update);
    if !report.changed() {
        debug!("no briefing text changed in {}", path.display());
        return Ok(report);
    }

    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = ZipWriter::new(temp.as_file_mut());
        source.copy_entries_except(&mut writer, DICTIONARY_ENTRY)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(DICTIONARY_ENTRY, options)?;
        writer.write_all(new_dictionary.as_bytes())?;
        writer.finish()?;
    }
    drop(source);

    temp.persist(path).map_err(|err| UpdateError::Io(err.error))?;
    Ok(report)
}

/// Reads back the current briefing texts of the archive at `path`, keyed by
/// field. Inline texts are returned as written.
pub fn read_briefings(path: impl AsRef<Path>) -> Result<Vec<(BriefingField, String)>, UpdateError> {
    let mut source = MizArchive::open(path)?;
    let mission = source.entry_text(MISSION_ENTRY)?.ok_or(UpdateError::MissingMission)?;
    let dictionary_text = source.read_entry_text(DICTIONARY_ENTRY);

    let everything = BriefingUpdate {
        sortie: Some(String::new()),
        situation: Some(String::new()),
        blue_task: Some(String::new()),
        red_task: Some(String::new()),
        neutrals_task: Some(String::new()),
    };
    let references = match parse_document(&mission) {
        Ok(document) => mission_references(&TableScope::new(document.root()), &everything),
        Err(_) => mission_references(&BlockScope::mission_root(&mission), &everything),
    };
    Ok(references
        .into_iter()
        .map(|(field, reference)| {
            let text = if is_dict_key(&reference) {
                dictionary::resolve(&dictionary_text, &reference).unwrap_or(reference)
            } else {
                reference
            };
            (field, text)
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::archive::test::build_archive;

    const MISSION: &str = "mission = \n{\n    [\"sortie\"] = \"DictKey_sortie_5\",\n    [\"descriptionText\"] = \"DictKey_descriptionText_1\",\n    [\"descriptionBlueTask\"] = \"Inline blue task\",\n    [\"descriptionRedTask\"] = \"DictKey_descriptionRedTask_3\",\n} -- end of mission\n";
    const DICTIONARY: &str = "dictionary = \n{\n    [\"DictKey_descriptionText_1\"] = \"Old situation\",\n    [\"DictKey_sortie_5\"] = \"Old sortie\",\n} -- end of dictionary\n";

    fn write_miz(dir: &Path, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.join("test.miz");
        std::fs::write(&path, build_archive(entries)).unwrap();
        path
    }

    #[test]
    fn rewrites_dictionary_backed_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_miz(
            dir.path(),
            &[
                ("mission", MISSION.as_bytes()),
                ("l10n/DEFAULT/dictionary", DICTIONARY.as_bytes()),
                ("l10n/DEFAULT/brief.png", &[1, 2, 3]),
            ],
        );

        let update = BriefingUpdate::builder()
            .situation("Line one \"quoted\"\nLine two \\ done")
            .sortie("New sortie")
            .build();
        let report = update_briefings(&path, &update).unwrap();
        assert_eq!(report.updated, [BriefingField::Sortie, BriefingField::Situation]);
        assert!(report.skipped.is_empty());

        let mut archive = MizArchive::open(&path).unwrap();
        let dictionary_text = archive.read_entry_text("l10n/DEFAULT/dictionary");
        assert_eq!(
            dictionary::resolve(&dictionary_text, "DictKey_descriptionText_1").as_deref(),
            Some("Line one \"quoted\"\nLine two \\ done")
        );
        assert_eq!(
            dictionary::resolve(&dictionary_text, "DictKey_sortie_5").as_deref(),
            Some("New sortie")
        );
        assert_eq!(archive.read_entry_text("mission"), MISSION);
        assert_eq!(archive.read_entry_bytes("l10n/DEFAULT/brief.png").unwrap(), Some(vec![1, 2, 3]));

        let briefings = read_briefings(&path).unwrap();
        assert!(briefings.contains(&(BriefingField::Sortie, "New sortie".to_string())));
        assert!(briefings.contains(&(BriefingField::BlueTask, "Inline blue task".to_string())));
    }

    #[test]
    fn skips_inline_and_unknown_references() {
        let update = BriefingUpdate::builder()
            .blue_task("x")
            .red_task("y")
            .build();
        let (text, report) = apply_update(MISSION, DICTIONARY, &update);
        assert_eq!(text, DICTIONARY);
        assert!(report.updated.is_empty());
        assert_eq!(
            report.skipped,
            [
                (BriefingField::BlueTask, SkipReason::NotDictKey("Inline blue task".to_string())),
                (
                    BriefingField::RedTask,
                    SkipReason::NotInDictionary("DictKey_descriptionRedTask_3".to_string())
                ),
            ]
        );
    }

    #[test]
    fn unchanged_archive_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_miz(
            dir.path(),
            &[("mission", MISSION.as_bytes()), ("l10n/DEFAULT/dictionary", DICTIONARY.as_bytes())],
        );
        let before = std::fs::read(&path).unwrap();
        let report = update_briefings(&path, &BriefingUpdate::builder().blue_task("x").build()).unwrap();
        assert!(!report.changed());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn missing_entries_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_miz(dir.path(), &[("mission", MISSION.as_bytes())]);
        let update = BriefingUpdate::builder().sortie("x").build();
        assert!(matches!(update_briefings(&path, &update), Err(UpdateError::MissingDictionary)));

        let path = write_miz(dir.path(), &[("l10n/DEFAULT/dictionary", DICTIONARY.as_bytes())]);
        assert!(matches!(update_briefings(&path, &update), Err(UpdateError::MissingMission)));
    }

    #[test]
    fn falls_back_to_text_scan_for_references() {
        let mission = "mission = { [\"sortie\"] = \"DictKey_sortie_5\", [\"weird\"] = @, }";
        let update = BriefingUpdate::builder().sortie("Scanned").build();
        let (text, report) = apply_update(mission, DICTIONARY, &update);
        assert_eq!(report.updated, [BriefingField::Sortie]);
        assert_eq!(dictionary::resolve(&text, "DictKey_sortie_5").as_deref(), Some("Scanned"));
        assert!(BriefingUpdate::default().is_empty());
    }
}
