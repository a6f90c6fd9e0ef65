//! Single-shot group markers.
//!
//! A [`GroupMarker`] yields exactly one `StartGroup` or `EndGroup` atom. Wrapping any
//! extractor as `Chain[start, inner, end]` gives it group semantics without the inner
//! extractor knowing about groups.

use crate::error::ImportResult;

use super::{AtomKind, Extractor, NO_PAYLOAD, Payload};

enum MarkerState {
    Pending,
    Emitted(Payload),
    Exhausted,
}

/// Yields one group bracket atom whose payload is computed when the atom is pulled.
///
/// The payload accessor runs at emission time, so an end marker placed behind a tokenizer
/// sees a record count that is complete by the time it is pulled.
pub struct GroupMarker {
    kind: AtomKind,
    payload: Box<dyn Fn() -> Payload>,
    state: MarkerState,
}

impl GroupMarker {
    /// A `StartGroup` marker labelled by `label`.
    pub fn start(label: impl Fn() -> String + 'static) -> Self {
        Self {
            kind: AtomKind::StartGroup,
            payload: Box::new(move || Payload::Label(label())),
            state: MarkerState::Pending,
        }
    }

    /// An `EndGroup` marker carrying the record count returned by `count`.
    pub fn end(count: impl Fn() -> usize + 'static) -> Self {
        Self {
            kind: AtomKind::EndGroup,
            payload: Box::new(move || Payload::Count(count())),
            state: MarkerState::Pending,
        }
    }
}

impl Extractor for GroupMarker {
    fn next_atom(&mut self) -> ImportResult<Option<AtomKind>> {
        match self.state {
            MarkerState::Pending => {
                self.state = MarkerState::Emitted((self.payload)());
                Ok(Some(self.kind))
            }
            MarkerState::Emitted(_) | MarkerState::Exhausted => {
                self.state = MarkerState::Exhausted;
                Ok(None)
            }
        }
    }

    fn current_kind(&self) -> Option<AtomKind> {
        match self.state {
            MarkerState::Emitted(_) => Some(self.kind),
            _ => None,
        }
    }

    fn current_payload(&self) -> &Payload {
        match &self.state {
            MarkerState::Emitted(payload) => payload,
            _ => &NO_PAYLOAD,
        }
    }
}
