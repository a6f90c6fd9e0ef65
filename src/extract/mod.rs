//! Pull-based atom streams and their composition.
//!
//! An [`Extractor`] produces one [`AtomKind`] at a time. Structural atoms bracket groups
//! (`StartGroup`/`EndGroup`) and records (`StartRecord`/`EndRecord`); scalar atoms carry one
//! cell each. Consumers advance a stream by calling [`Extractor::next_atom`] and read the atom
//! just produced through [`Extractor::current_kind`] and [`Extractor::current_payload`].
//!
//! Building blocks:
//!
//! - [`chain`]: presents several extractors as one stream
//! - [`group`]: single-shot `StartGroup`/`EndGroup` markers with deferred payloads
//! - [`csv`]: delimited-text tokenizer with scalar type inference
//! - `excel`: workbook tokenizer (feature `excel`)
//! - [`registry`]: format key to tokenizer factory mapping
//! - [`file`]: assembles a tokenizer for one file into a complete group
//!
//! Extractors are stateful, single-pass and not meant to be shared between threads.

pub mod chain;
pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod file;
pub mod group;
pub mod registry;

pub use chain::Chain;
pub use csv::{DelimitedOptions, DelimitedTokenizer};
pub use file::FileSource;
pub use group::GroupMarker;
pub use registry::{FormatRegistry, TokenizerFactory};

use crate::error::ImportResult;
use crate::types::Scalar;

/// Kind of a single atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomKind {
    StartRecord,
    EndRecord,
    StartGroup,
    EndGroup,
    Integer,
    Float,
    String,
    Null,
}

impl AtomKind {
    /// `true` for group and record brackets.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Self::StartRecord | Self::EndRecord | Self::StartGroup | Self::EndGroup
        )
    }
}

/// Data attached to the atom last produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// No data (e.g. a bare `StartRecord`, or no current atom).
    #[default]
    None,
    /// Cell value of a scalar atom.
    Scalar(Scalar),
    /// Field count (`EndRecord`), record count (`EndGroup`) or record ordinal (`StartRecord`).
    Count(usize),
    /// Group label (`StartGroup`).
    Label(String),
}

pub(crate) static NO_PAYLOAD: Payload = Payload::None;

impl Payload {
    pub fn as_count(&self) -> Option<usize> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Label(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

/// A pull-based producer of atoms.
///
/// Implementations must keep groups and records balanced over a finite stream; the protocol
/// does not re-validate nesting.
pub trait Extractor {
    /// Advance to the next atom and return its kind, or `None` once the stream is exhausted.
    fn next_atom(&mut self) -> ImportResult<Option<AtomKind>>;

    /// Kind of the atom last returned by [`Self::next_atom`].
    fn current_kind(&self) -> Option<AtomKind>;

    /// Payload of the atom last returned by [`Self::next_atom`].
    fn current_payload(&self) -> &Payload;
}

impl<E: Extractor + ?Sized> Extractor for Box<E> {
    fn next_atom(&mut self) -> ImportResult<Option<AtomKind>> {
        (**self).next_atom()
    }

    fn current_kind(&self) -> Option<AtomKind> {
        (**self).current_kind()
    }

    fn current_payload(&self) -> &Payload {
        (**self).current_payload()
    }
}

/// Replays a recorded sequence of atoms.
///
/// The counterpart of [`collect_atoms`]; useful for feeding synthetic streams to consumers.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    atoms: std::vec::IntoIter<(AtomKind, Payload)>,
    current: Option<(AtomKind, Payload)>,
}

impl Replay {
    pub fn new(atoms: Vec<(AtomKind, Payload)>) -> Self {
        Self {
            atoms: atoms.into_iter(),
            current: None,
        }
    }
}

impl Extractor for Replay {
    fn next_atom(&mut self) -> ImportResult<Option<AtomKind>> {
        self.current = self.atoms.next();
        Ok(self.current_kind())
    }

    fn current_kind(&self) -> Option<AtomKind> {
        self.current.as_ref().map(|(kind, _)| *kind)
    }

    fn current_payload(&self) -> &Payload {
        self.current.as_ref().map_or(&NO_PAYLOAD, |(_, payload)| payload)
    }
}

/// Drain an extractor into `(kind, payload)` pairs.
///
/// Handy for inspecting short streams; conversions should stream instead.
pub fn collect_atoms<E: Extractor + ?Sized>(
    extractor: &mut E,
) -> ImportResult<Vec<(AtomKind, Payload)>> {
    let mut out = Vec::new();
    while let Some(kind) = extractor.next_atom()? {
        out.push((kind, extractor.current_payload().clone()));
    }
    Ok(out)
}
