use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use tracing::debug;

use super::{CancelFlag, MISSION_ENTRY, MizArchive, UNKNOWN_THEATER};
use crate::scan::{FieldPattern, RawValue};

/// Theater keys in the order they are tried on each line.
static THEATER_PATTERNS: LazyLock<[FieldPattern; 3]> = LazyLock::new(|| {
    [
        FieldPattern::case_insensitive("theatre"),
        FieldPattern::case_insensitive("theater"),
        FieldPattern::case_insensitive("map"),
    ]
});

/// Matches a theater assignment on a single line of mission text.
pub fn theater_in_line(line: &str) -> Option<String> {
    THEATER_PATTERNS.iter().find_map(|pattern| match pattern.find(line) {
        Some(RawValue::Quoted(value)) if !value.is_empty() => Some(value.to_string()),
        _ => None,
    })
}

fn probe(path: &Path, cancel: &CancelFlag) -> Option<String> {
    if cancel.is_cancelled() {
        return None;
    }

    let mut archive = match MizArchive::open(path) {
        Ok(archive) => archive,
        Err(err) => {
            debug!("probe of {} failed: {err}", path.display());
            return None;
        }
    };
    let entry = match archive.entry_reader(MISSION_ENTRY) {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            debug!("{} has no mission entry", path.display());
            return None;
        }
        Err(err) => {
            debug!("probe of {} failed: {err}", path.display());
            return None;
        }
    };

    let mut reader = BufReader::new(entry);
    let mut line = Vec::new();
    loop {
        if cancel.is_cancelled() {
            return None;
        }
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return None,
            Ok(_) => {
                if let Some(theater) = theater_in_line(&String::from_utf8_lossy(&line)) {
                    return Some(theater);
                }
            }
            Err(err) => {
                debug!("probe of {} failed: {err}", path.display());
                return None;
            }
        }
    }
}

/// Reads the theater of a mission without parsing the rest of it.
///
/// Only the leading lines of the mission entry are read, up to the first one
/// naming a theater. Every failure reads as `"Unknown"`.
pub fn probe_theater(path: impl AsRef<Path>) -> String {
    probe_theater_with(path, &CancelFlag::default())
}

pub fn probe_theater_with(path: impl AsRef<Path>, cancel: &CancelFlag) -> String {
    probe(path.as_ref(), cancel).unwrap_or_else(|| UNKNOWN_THEATER.to_string())
}

/// Probes many archives, keeping the input order.
#[cfg(feature = "rayon")]
pub fn probe_theaters<P>(paths: &[P]) -> Vec<(PathBuf, String)>
where
    P: AsRef<Path> + Sync,
{
    use rayon::prelude::*;

    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            (path.to_path_buf(), probe_theater(path))
        })
        .collect()
}

/// Probes many archives, keeping the input order.
#[cfg(not(feature = "rayon"))]
pub fn probe_theaters<P>(paths: &[P]) -> Vec<(PathBuf, String)>
where
    P: AsRef<Path> + Sync,
{
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            (path.to_path_buf(), probe_theater(path))
        })
        .collect()
}

#[cfg(feature = "async")]
pub async fn probe_theater_async(path: PathBuf, cancel: CancelFlag) -> String {
    async_std::task::spawn_blocking(move || probe_theater_with(&path, &cancel)).await
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;
    use crate::data::archive::test::build_archive;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn line_variants() {
        assert_eq!(theater_in_line(r#"    ["theatre"] = "Caucasus","#).as_deref(), Some("Caucasus"));
        assert_eq!(theater_in_line("Theater = 'Syria'").as_deref(), Some("Syria"));
        assert_eq!(theater_in_line(r#"["map"] = "Nevada""#).as_deref(), Some("Nevada"));
        assert_eq!(theater_in_line(r#"["map"] = {"#), None);
        assert_eq!(theater_in_line(r#"["sortie"] = "theatre""#), None);
    }

    #[test]
    fn probes_first_match() {
        let mission = "mission = \n{\n    [\"date\"] = {},\n    [\"theatre\"] = \"PersianGulf\",\n    [\"map\"] = \"ignored\",\n}\n";
        let file = write_temp(&build_archive(&[("mission", mission.as_bytes())]));
        assert_eq!(probe_theater(file.path()), "PersianGulf");
    }

    #[test]
    fn failures_read_as_unknown() {
        let not_zip = write_temp(b"plain text, not an archive");
        assert_eq!(probe_theater(not_zip.path()), "Unknown");

        let no_mission = write_temp(&build_archive(&[("other", b"theatre = 'Syria'")]));
        assert_eq!(probe_theater(no_mission.path()), "Unknown");

        let no_match = write_temp(&build_archive(&[("mission", b"mission = { }")]));
        assert_eq!(probe_theater(no_match.path()), "Unknown");

        assert_eq!(probe_theater("/no/such/file.miz"), "Unknown");
    }

    #[test]
    fn cancelled_probe_is_unknown() {
        let file = write_temp(&build_archive(&[("mission", b"theatre = 'Syria'")]));
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert_eq!(probe_theater_with(file.path(), &cancel), "Unknown");
    }

    #[test]
    fn bulk_probe_keeps_order() {
        let a = write_temp(&build_archive(&[("mission", b"theatre = 'Syria'")]));
        let b = write_temp(b"junk");
        let c = write_temp(&build_archive(&[("mission", b"theatre = 'Kola'")]));
        let results = probe_theaters(&[a.path(), b.path(), c.path()]);
        let theaters: Vec<_> = results.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(theaters, ["Syria", "Unknown", "Kola"]);
        assert_eq!(results[1].0, b.path());
    }
}
