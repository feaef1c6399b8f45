//! Per-identity false discovery rates, adopted from search-engine output
//! when every identity carries one, otherwise estimated from the running
//! decoy/forward protein ratio over the score-sorted identity list.

use fnv::FnvHashMap;

use crate::aggregate::{AggregatedIdentity, UNKNOWN_EVALUE, UNKNOWN_PRIMARY_SCORE};
use crate::peptide::SequenceId;
use crate::Error;

const DECOY_PREFIXES: [&str; 5] = ["reversed_", "scrambled_", "xxx_", "xxx.", "rev_"];
const DECOY_SUFFIX: &str = ":reversed";

/// Decoy proteins are identified by naming convention.
pub fn is_decoy_protein(protein: &str) -> bool {
    let name = protein.to_ascii_lowercase();
    DECOY_PREFIXES.iter().any(|p| name.starts_with(p)) || name.ends_with(DECOY_SUFFIX)
}

/// Minimum fraction of identities that must carry an authoritative FDR for
/// thresholding to proceed when decoy estimation is impossible.
const KNOWN_FDR_FALLBACK_FRACTION: f64 = 0.2;

/// Assign a final FDR to every identity, either by adopting the best known
/// observation FDR or by decoy-ratio estimation.
///
/// On failure the working set is cleared; the caller's other threshold pass
/// is unaffected.
pub fn estimate(identities: &mut FnvHashMap<SequenceId, AggregatedIdentity>) -> Result<(), Error> {
    let known = identities
        .values()
        .filter(|i| i.best_fdr().is_some())
        .count();

    // Every identity already has an authoritative FDR: nothing to estimate.
    if known == identities.len() {
        for identity in identities.values_mut() {
            identity.fdr = identity.best_fdr();
        }
        return Ok(());
    }

    struct Entry {
        id: SequenceId,
        score: f64,
        decoy: bool,
    }

    let mut entries = Vec::with_capacity(identities.len());
    let mut plausible = false;
    for (&id, identity) in identities.iter() {
        let primary = identity.best_primary_score();
        let e_value = identity.best_e_value();
        let score = if primary < UNKNOWN_PRIMARY_SCORE {
            primary
        } else {
            e_value
        };
        plausible |= primary < 1.0 || e_value < UNKNOWN_EVALUE;
        entries.push(Entry {
            id,
            score,
            decoy: is_decoy_protein(&identity.protein),
        });
    }

    if !plausible {
        return known_fdr_fallback(identities, known, Error::MissingScoreData);
    }

    entries.sort_by(|a, b| a.score.total_cmp(&b.score));

    let mut assigned: Vec<Option<f64>> = vec![None; entries.len()];
    let mut forward = 0u64;
    let mut decoy = 0u64;
    for (i, entry) in entries.iter().enumerate() {
        match entry.decoy {
            true => decoy += 1,
            false => forward += 1,
        }
        if forward > 0 {
            let fdr = decoy as f64 / forward as f64;
            // Entries walked while forward was still 0 inherit the first
            // computed ratio.
            for slot in assigned[..=i].iter_mut().rev() {
                if slot.is_some() {
                    break;
                }
                *slot = Some(fdr);
            }
        }
    }

    if decoy == 0 {
        return known_fdr_fallback(identities, known, Error::NoDecoyProteins);
    }

    for (entry, fdr) in entries.iter().zip(assigned) {
        identities
            .get_mut(&entry.id)
            .expect("entry ids come from this map")
            .fdr = fdr;
    }
    Ok(())
}

fn known_fdr_fallback(
    identities: &mut FnvHashMap<SequenceId, AggregatedIdentity>,
    known: usize,
    error: Error,
) -> Result<(), Error> {
    if (known as f64) < identities.len() as f64 * KNOWN_FDR_FALLBACK_FRACTION {
        log::error!(
            "{} ({} of {} identities have an authoritative FDR)",
            error,
            known,
            identities.len()
        );
        identities.clear();
        return Err(error);
    }
    log::warn!(
        "{}; thresholding on the {} identities with an authoritative FDR",
        error,
        known
    );
    // Identities without a known FDR keep `None` and are untouched.
    for identity in identities.values_mut() {
        identity.fdr = identity.best_fdr();
    }
    Ok(())
}

/// Remove every identity whose final FDR exceeds the threshold. An identity
/// without a final FDR is kept.
pub fn prune(identities: &mut FnvHashMap<SequenceId, AggregatedIdentity>, fdr_threshold: f64) {
    let before = identities.len();
    identities.retain(|_, identity| identity.fdr.map_or(true, |f| f <= fdr_threshold));
    log::info!(
        "{} of {} identities at FDR <= {}",
        identities.len(),
        before,
        fdr_threshold
    );
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::aggregate::{PsmObservation, UNKNOWN_EVALUE, UNKNOWN_PRIMARY_SCORE};

    fn observation(score: f64, fdr: Option<f64>) -> PsmObservation {
        PsmObservation {
            dataset: "ds".into(),
            scan_number: 1,
            fdr,
            primary_score: score,
            e_value: UNKNOWN_EVALUE,
            missing_n_term_reporter_ion: false,
            missing_reporter_ion: false,
            passes_filter: false,
        }
    }

    fn identity(protein: &str, score: f64, fdr: Option<f64>) -> AggregatedIdentity {
        AggregatedIdentity {
            protein: protein.into(),
            seq_id_first: 0,
            attributes: Default::default(),
            fdr: None,
            observations: vec![observation(score, fdr)],
        }
    }

    fn set(identities: Vec<AggregatedIdentity>) -> FnvHashMap<SequenceId, AggregatedIdentity> {
        identities
            .into_iter()
            .enumerate()
            .map(|(i, mut identity)| {
                identity.seq_id_first = i as SequenceId;
                (i as SequenceId, identity)
            })
            .collect()
    }

    #[test]
    fn decoy_naming_conventions() {
        assert!(is_decoy_protein("Reversed_P12345"));
        assert!(is_decoy_protein("scrambled_ALBU_HUMAN"));
        assert!(is_decoy_protein("XXX_P12345"));
        assert!(is_decoy_protein("xxx.P12345"));
        assert!(is_decoy_protein("REV_sp|P12345|"));
        assert!(is_decoy_protein("sp|P12345:reversed"));
        assert!(!is_decoy_protein("sp|P12345|ALBU_HUMAN"));
        assert!(!is_decoy_protein("BREV_1"));
    }

    #[test]
    fn decoys_before_first_forward_are_backfilled() {
        // Best (lowest) scores are all decoys; the first forward hit at
        // index 3 computes 3/1 and the three earlier entries inherit it.
        let mut identities = set(vec![
            identity("XXX_A", 1e-12, None),
            identity("XXX_B", 1e-11, None),
            identity("XXX_C", 1e-10, None),
            identity("FWD_A", 1e-9, None),
            identity("FWD_B", 1e-8, None),
        ]);
        estimate(&mut identities).unwrap();

        assert_eq!(identities.get(&0).unwrap().fdr, Some(3.0));
        assert_eq!(identities.get(&1).unwrap().fdr, Some(3.0));
        assert_eq!(identities.get(&2).unwrap().fdr, Some(3.0));
        assert_eq!(identities.get(&3).unwrap().fdr, Some(3.0));
        assert_eq!(identities.get(&4).unwrap().fdr, Some(1.5));
    }

    #[test]
    fn ratio_walks_with_running_counts() {
        let mut identities = set(vec![
            identity("FWD_A", 1e-12, None),
            identity("FWD_B", 1e-11, None),
            identity("XXX_A", 1e-10, None),
            identity("FWD_C", 1e-9, None),
        ]);
        estimate(&mut identities).unwrap();

        assert_eq!(identities.get(&0).unwrap().fdr, Some(0.0));
        assert_eq!(identities.get(&1).unwrap().fdr, Some(0.0));
        assert_eq!(identities.get(&2).unwrap().fdr, Some(0.5));
        assert_eq!(identities.get(&3).unwrap().fdr, Some(1.0 / 3.0));
    }

    #[test]
    fn prune_is_strictly_greater_than() {
        let mut identities = set(vec![
            identity("FWD_A", 1e-12, None),
            identity("FWD_B", 1e-11, None),
            identity("XXX_A", 1e-10, None),
        ]);
        estimate(&mut identities).unwrap();
        prune(&mut identities, 0.5);

        // 0.0, 0.0, and exactly 0.5 all survive a 0.5 threshold.
        assert_eq!(identities.len(), 3);
        prune(&mut identities, 0.01);
        assert_eq!(identities.len(), 2);
        assert!(identities
            .values()
            .all(|i| i.fdr.map_or(true, |f| f <= 0.01)));
    }

    #[test]
    fn all_known_fdrs_skip_estimation() {
        // No decoys anywhere, but every identity has an authoritative FDR.
        let mut identities = set(vec![
            identity("FWD_A", UNKNOWN_PRIMARY_SCORE, Some(0.001)),
            identity("FWD_B", UNKNOWN_PRIMARY_SCORE, Some(0.05)),
        ]);
        estimate(&mut identities).unwrap();
        prune(&mut identities, 0.01);

        assert_eq!(identities.len(), 1);
        assert_eq!(identities.get(&0).unwrap().fdr, Some(0.001));
    }

    #[test]
    fn no_scores_and_no_fallback_fails() {
        let mut identities = set(vec![
            identity("FWD_A", UNKNOWN_PRIMARY_SCORE, None),
            identity("FWD_B", UNKNOWN_PRIMARY_SCORE, None),
            identity("FWD_C", UNKNOWN_PRIMARY_SCORE, None),
            identity("FWD_D", UNKNOWN_PRIMARY_SCORE, None),
            identity("FWD_E", UNKNOWN_PRIMARY_SCORE, Some(0.01)),
        ]);
        // Only 1 of 5 identities has a known FDR: below the 20% fallback.
        assert_eq!(estimate(&mut identities), Err(Error::MissingScoreData));
        assert!(identities.is_empty());
    }

    #[test]
    fn no_scores_with_sufficient_known_fdrs_falls_back() {
        let mut identities = set(vec![
            identity("FWD_A", UNKNOWN_PRIMARY_SCORE, None),
            identity("FWD_B", UNKNOWN_PRIMARY_SCORE, Some(0.001)),
            identity("FWD_C", UNKNOWN_PRIMARY_SCORE, Some(0.5)),
        ]);
        estimate(&mut identities).unwrap();
        prune(&mut identities, 0.01);

        // The unknown identity is untouched; the known ones are thresholded.
        assert_eq!(identities.len(), 2);
        assert!(identities.get(&0).unwrap().fdr.is_none());
        assert_eq!(identities.get(&1).unwrap().fdr, Some(0.001));
    }

    #[test]
    fn no_decoys_and_no_fallback_fails() {
        let mut identities = set(vec![
            identity("FWD_A", 1e-12, None),
            identity("FWD_B", 1e-11, None),
        ]);
        assert_eq!(estimate(&mut identities), Err(Error::NoDecoyProteins));
        assert!(identities.is_empty());
    }
}
