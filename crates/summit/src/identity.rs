use fnv::FnvHashMap;

use crate::peptide::{Modification, NormalizedPeptide, SequenceId};

/// One previously registered form of a clean sequence. The clean sequence
/// itself is the map key, so a variant only stores its modification list and
/// assigned id.
#[derive(Clone, Debug)]
struct Variant {
    modifications: Vec<Modification>,
    id: SequenceId,
}

/// Matches normalized peptides against previously seen ones, treating
/// modifications whose positions differ by at most one residue as the same
/// identity.
///
/// # Important invariant
/// * an id is assigned to at most one variant per run: [`Self::register`] is
///   only called after [`Self::resolve`] returned `None`.
#[derive(Default)]
pub struct IdentityResolver {
    variants: FnvHashMap<String, Vec<Variant>>,
}

impl IdentityResolver {
    /// Find the id of a previously registered peptide matching `peptide`
    /// under the positional tolerance. The first matching variant in
    /// insertion order wins; there is no best-match search.
    pub fn resolve(&self, peptide: &NormalizedPeptide) -> Option<SequenceId> {
        let variants = self.variants.get(&peptide.clean_sequence)?;
        variants
            .iter()
            .find(|v| Self::matches(&v.modifications, &peptide.modifications))
            .map(|v| v.id)
    }

    fn matches(candidate: &[Modification], new: &[Modification]) -> bool {
        if candidate.is_empty() && new.is_empty() {
            return true;
        }
        if candidate.len() != new.len() {
            return false;
        }
        candidate.iter().zip(new).all(|(c, n)| {
            c.name == n.name && (n.position - c.position).abs() <= 1
        })
    }

    /// Register a new variant under `id`. Call only when [`Self::resolve`]
    /// found no match.
    pub fn register(&mut self, peptide: &NormalizedPeptide, id: SequenceId) {
        self.variants
            .entry(peptide.clean_sequence.clone())
            .or_default()
            .push(Variant {
                modifications: peptide.modifications.clone(),
                id,
            });
    }
}
