use std::fmt;

use thiserror::Error;

use crate::data::ArchiveError;
use crate::lua::ParseError;
use crate::mission::UpdateError;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("{err}")]
    Archive {
        #[from]
        err: ArchiveError,
    },
    #[error("Parse error: {err}")]
    Parse {
        #[from]
        err: ParseError,
    },
    #[error("Briefing update failed: {err}")]
    Update {
        #[from]
        err: UpdateError,
    },
    #[error("Archive has no {0} entry")]
    MissingEntry(String),
    #[cfg(feature = "json")]
    #[error("Error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error { kind }
    }
}

impl std::convert::From<ArchiveError> for Error {
    fn from(x: ArchiveError) -> Error {
        Error { kind: x.into() }
    }
}

impl std::convert::From<ParseError> for Error {
    fn from(x: ParseError) -> Error {
        Error { kind: x.into() }
    }
}

impl std::convert::From<UpdateError> for Error {
    fn from(x: UpdateError) -> Error {
        Error { kind: x.into() }
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(x: std::io::Error) -> Error {
        Error { kind: x.into() }
    }
}

#[cfg(feature = "json")]
impl std::convert::From<serde_json::Error> for Error {
    fn from(x: serde_json::Error) -> Error {
        Error { kind: x.into() }
    }
}

pub type IResult<T> = Result<T, Error>;

pub fn failure_from_kind(kind: ErrorKind) -> Error {
    Error { kind }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn archive_errors_display_their_cause() {
        let err: Error = ArchiveError::Zip(zip::result::ZipError::FileNotFound).into();
        assert!(err.to_string().starts_with("not a valid mission archive"));
        assert!(matches!(
            failure_from_kind(ErrorKind::MissingEntry("mission".into())).kind,
            ErrorKind::MissingEntry(_)
        ));
    }
}
