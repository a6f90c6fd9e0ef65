//! Sequencing combinator.

use crate::error::ImportResult;

use super::{AtomKind, Extractor, NO_PAYLOAD, Payload};

/// Presents an ordered list of extractors as one stream.
///
/// Pulls from the current source until it is exhausted, then moves on to the next one.
/// Sources that produce no atoms are skipped without leaving a gap.
pub struct Chain {
    sources: Vec<Box<dyn Extractor>>,
    cursor: usize,
}

impl Chain {
    pub fn new(sources: Vec<Box<dyn Extractor>>) -> Self {
        Self { sources, cursor: 0 }
    }

    /// Append another source behind the existing ones.
    pub fn push(&mut self, source: Box<dyn Extractor>) {
        self.sources.push(source);
    }

    /// `true` once every source has been exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.sources.len()
    }
}

impl Extractor for Chain {
    fn next_atom(&mut self) -> ImportResult<Option<AtomKind>> {
        while let Some(source) = self.sources.get_mut(self.cursor) {
            if let Some(kind) = source.next_atom()? {
                return Ok(Some(kind));
            }
            self.cursor += 1;
        }
        Ok(None)
    }

    fn current_kind(&self) -> Option<AtomKind> {
        self.sources.get(self.cursor).and_then(|s| s.current_kind())
    }

    fn current_payload(&self) -> &Payload {
        self.sources
            .get(self.cursor)
            .map_or(&NO_PAYLOAD, |s| s.current_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::Chain;
    use crate::extract::{AtomKind, Extractor, Payload, Replay, collect_atoms};
    use crate::types::Scalar;

    fn ints(values: &[i64]) -> Box<dyn Extractor> {
        Box::new(Replay::new(
            values
                .iter()
                .map(|v| (AtomKind::Integer, Payload::Scalar(Scalar::Integer(*v))))
                .collect(),
        ))
    }

    #[test]
    fn skips_empty_sources_without_gaps() {
        let mut chain = Chain::new(vec![ints(&[1, 2]), ints(&[]), ints(&[3, 4, 5])]);
        let atoms = collect_atoms(&mut chain).unwrap();

        let values: Vec<Scalar> = atoms
            .into_iter()
            .map(|(_, p)| p.as_scalar().cloned().unwrap())
            .collect();
        assert_eq!(values, (1..=5).map(Scalar::Integer).collect::<Vec<_>>());
        assert!(chain.is_exhausted());
    }

    #[test]
    fn accessors_follow_the_active_source() {
        let mut chain = Chain::new(vec![ints(&[]), ints(&[7])]);
        assert_eq!(chain.current_kind(), None);

        assert_eq!(chain.next_atom().unwrap(), Some(AtomKind::Integer));
        assert_eq!(chain.current_kind(), Some(AtomKind::Integer));
        assert_eq!(chain.current_payload(), &Payload::Scalar(Scalar::Integer(7)));
        // Stable until the next pull.
        assert_eq!(chain.current_payload(), &Payload::Scalar(Scalar::Integer(7)));

        assert_eq!(chain.next_atom().unwrap(), None);
        assert_eq!(chain.current_kind(), None);
        assert_eq!(chain.current_payload(), &Payload::None);
        assert_eq!(chain.next_atom().unwrap(), None);
    }

    #[test]
    fn empty_chain_is_exhausted() {
        let mut chain = Chain::new(Vec::new());
        assert_eq!(chain.next_atom().unwrap(), None);
        assert!(chain.is_exhausted());
    }
}
