use std::{io, num::{ParseFloatError, ParseIntError}, str::Utf8Error};
use quick_xml::events::attributes::AttrError;

/// What went wrong, at the granularity the parse driver cares about.
/// `MalformedInput` and `StructuralInvariant` abort a parse with no
/// recovery; the remaining kinds come from collaborators (filesystem,
/// XML reader) and abort it too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    StructuralInvariant,
    Io,
    Xml,
    Other,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn malformed_input(message: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::MalformedInput,
            message: message.into(),
        }
    }

    pub fn structural_invariant(message: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::StructuralInvariant,
            message: message.into(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            message: value.to_string(),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error {
            kind: ErrorKind::Xml,
            message: value.to_string(),
        }
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error {
            kind: ErrorKind::Xml,
            message: value.to_string(),
        }
    }
}

impl From<ParseFloatError> for Error {
    fn from(value: ParseFloatError) -> Self {
        Error {
            kind: ErrorKind::MalformedInput,
            message: value.to_string(),
        }
    }
}

impl From<ParseIntError> for Error {
    fn from(value: ParseIntError) -> Self {
        Error {
            kind: ErrorKind::MalformedInput,
            message: value.to_string(),
        }
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Error {
            kind: ErrorKind::MalformedInput,
            message: value.to_string(),
        }
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error {
            kind: ErrorKind::Other,
            message: value.to_string(),
        }
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error {
            kind: ErrorKind::Other,
            message: value,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
