//! Reduce one filtered view into an immutable statistics record.

use fnv::FnvHashMap;
use serde::Serialize;

use crate::aggregate::{modification_flags, SequenceMaps, UniqueSeqSnapshot};
use crate::filter::FilteredView;
use crate::peptide::{parse_descriptor, SequenceId};
use crate::Error;

/// Dataset-level tally over the passing observations of one filtered view.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatsRecord {
    pub total_psms: usize,
    pub unique_peptide_count: usize,
    pub unique_protein_count: usize,
    pub phosphopeptide_count: usize,
    pub phosphopeptide_c_term_k: usize,
    pub phosphopeptide_c_term_r: usize,
    pub keratin_count: usize,
    pub trypsin_count: usize,
    pub tryptic_count: usize,
    pub acetylated_count: usize,
    pub missed_cleavage_ratio: f64,
    pub phospho_missed_cleavage_ratio: f64,
    /// Only reported for the FDR pass, and only when a dynamic reporter-ion
    /// modification was configured.
    pub percent_missing_n_term_reporter: Option<f64>,
    pub percent_missing_reporter: Option<f64>,
}

fn merge_into(
    map: &mut FnvHashMap<SequenceId, UniqueSeqSnapshot>,
    id: SequenceId,
    snapshot: UniqueSeqSnapshot,
) {
    map.entry(id)
        .and_modify(|existing| *existing = existing.merge(snapshot))
        .or_insert(snapshot);
}

fn ratio(flagged: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        flagged as f64 / total as f64
    }
}

fn percent(flagged: usize, total: usize) -> f64 {
    ratio(flagged, total) * 100.0
}

/// Tabulate one filtered view. `reporter_ion_active` is only set for the
/// FDR pass, when a dynamic reporter-ion modification was detected upstream.
pub fn tabulate(
    view: &FilteredView,
    maps: &SequenceMaps,
    reporter_ion_active: bool,
) -> Result<StatsRecord, Error> {
    let mut unique: FnvHashMap<SequenceId, UniqueSeqSnapshot> = FnvHashMap::default();
    let mut phospho: FnvHashMap<SequenceId, UniqueSeqSnapshot> = FnvHashMap::default();
    let mut acetyl: FnvHashMap<SequenceId, UniqueSeqSnapshot> = FnvHashMap::default();
    let mut protein_counts: FnvHashMap<&str, usize> = FnvHashMap::default();

    let mut total_psms = 0;
    let mut missing_n_term = 0;
    let mut missing_any = 0;

    for identity in view.identities.values() {
        let count = identity.passing_count();
        if count == 0 {
            continue;
        }
        total_psms += count;

        let mut snapshot = identity.snapshot(count);
        // Authoritative modification metadata overrides the flags frozen
        // from the symbol form.
        if let Some(descriptor) = maps.seq_to_mod_descriptor.get(&identity.seq_id_first) {
            let modifications = parse_descriptor(identity.seq_id_first, descriptor)?;
            let (phosphopeptide, acetylated) = modification_flags(&modifications);
            snapshot.attributes.phosphopeptide = phosphopeptide;
            snapshot.attributes.acetylated = acetylated;
        }

        merge_into(&mut unique, identity.seq_id_first, snapshot);
        if snapshot.attributes.phosphopeptide {
            merge_into(&mut phospho, identity.seq_id_first, snapshot);
        }
        if snapshot.attributes.acetylated {
            merge_into(&mut acetyl, identity.seq_id_first, snapshot);
        }

        match maps.seq_to_proteins.get(&identity.seq_id_first) {
            Some(proteins) if !proteins.is_empty() => {
                for protein in proteins {
                    *protein_counts.entry(protein.as_str()).or_default() += count;
                }
            }
            _ => *protein_counts.entry(identity.protein.as_str()).or_default() += count,
        }

        if reporter_ion_active {
            for observation in identity.observations.iter().filter(|o| o.passes_filter) {
                if observation.missing_n_term_reporter_ion {
                    missing_n_term += 1;
                }
                if observation.missing_reporter_ion {
                    missing_any += 1;
                }
            }
        }
    }

    let flagged = |map: &FnvHashMap<SequenceId, UniqueSeqSnapshot>,
                   f: fn(&UniqueSeqSnapshot) -> bool| {
        map.values().filter(|s| f(s)).count()
    };

    Ok(StatsRecord {
        total_psms,
        unique_peptide_count: unique.len(),
        unique_protein_count: protein_counts.len(),
        phosphopeptide_count: phospho.len(),
        phosphopeptide_c_term_k: flagged(&phospho, |s| s.attributes.c_term_k),
        phosphopeptide_c_term_r: flagged(&phospho, |s| s.attributes.c_term_r),
        keratin_count: flagged(&unique, |s| s.attributes.keratin),
        trypsin_count: flagged(&unique, |s| s.attributes.trypsin),
        tryptic_count: flagged(&unique, |s| s.attributes.tryptic),
        acetylated_count: acetyl.len(),
        missed_cleavage_ratio: ratio(
            flagged(&unique, |s| s.attributes.missed_cleavage),
            unique.len(),
        ),
        phospho_missed_cleavage_ratio: ratio(
            flagged(&phospho, |s| s.attributes.missed_cleavage),
            phospho.len(),
        ),
        percent_missing_n_term_reporter: reporter_ion_active
            .then(|| percent(missing_n_term, total_psms)),
        percent_missing_reporter: reporter_ion_active.then(|| percent(missing_any, total_psms)),
    })
}
