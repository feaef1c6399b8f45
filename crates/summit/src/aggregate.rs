use std::sync::LazyLock;

use fnv::FnvHashMap;
use regex::Regex;

use crate::identity::IdentityResolver;
use crate::peptide::{Modification, NormalizedPeptide, SequenceId};
use crate::Error;

/// Primary score value meaning "no score reported".
pub const UNKNOWN_PRIMARY_SCORE: f64 = 10.0;
/// E-value meaning "no e-value reported".
pub const UNKNOWN_EVALUE: f64 = f64::MAX;

/// An internal K or R not followed by P. A C-terminal K/R has no following
/// residue and never matches.
static MISSED_CLEAVAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new("[KR][^P]").unwrap());

static KERATIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(keratin|KRT[0-9]+|K[12]C[0-9]+)").unwrap());

static TRYPSIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(trypsin|TRYP_PIG|TRY[1-9])").unwrap());

const PHOSPHO_MOD: &str = "phosph";
const ACETYL_MODS: [&str; 2] = ["acetyl", "acnotmt"];

/// How the peptide's termini relate to the enzyme's cleavage specificity.
#[derive(Copy, Clone, PartialEq, Eq, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CleavageState {
    Full,
    Partial,
    NonSpecific,
    Unknown,
}

impl Default for CleavageState {
    fn default() -> Self {
        Self::Unknown
    }
}

/// One row of search-engine output, after the caller has dropped rank > 1
/// hits and stripped flanking residues from the peptide.
#[derive(Clone, Debug, Default)]
pub struct PsmRow {
    /// Raw result row identifier; the fallback sequence id when no external
    /// result-to-sequence map entry exists.
    pub result_id: i64,
    pub dataset: String,
    pub scan_number: i64,
    /// Symbol-annotated peptide sequence.
    pub peptide: String,
    /// Every protein this row was matched to.
    pub proteins: Vec<String>,
    pub cleavage_state: CleavageState,
    pub missed_cleavage_count: u32,
    pub fdr: Option<f64>,
    pub primary_score: f64,
    pub e_value: f64,
    pub missing_n_term_reporter_ion: bool,
    pub missing_reporter_ion: bool,
}

/// One observation of an identity in a particular scan.
#[derive(Clone, Debug, PartialEq)]
pub struct PsmObservation {
    pub dataset: String,
    pub scan_number: i64,
    pub fdr: Option<f64>,
    pub primary_score: f64,
    pub e_value: f64,
    pub missing_n_term_reporter_ion: bool,
    pub missing_reporter_ion: bool,
    pub passes_filter: bool,
}

impl PsmObservation {
    fn from_row(row: &PsmRow) -> PsmObservation {
        PsmObservation {
            dataset: row.dataset.clone(),
            scan_number: row.scan_number,
            fdr: row.fdr,
            primary_score: row.primary_score,
            e_value: row.e_value,
            missing_n_term_reporter_ion: row.missing_n_term_reporter_ion,
            missing_reporter_ion: row.missing_reporter_ion,
            passes_filter: false,
        }
    }

    /// Merge a repeated observation of the same (dataset, scan) in place:
    /// keep the minimum known FDR and the minimum score/e-value.
    fn merge(&mut self, row: &PsmRow) {
        if let Some(new) = row.fdr {
            match self.fdr {
                Some(old) if old <= new => {}
                _ => self.fdr = Some(new),
            }
        }
        self.primary_score = self.primary_score.min(row.primary_score);
        self.e_value = self.e_value.min(row.e_value);
    }
}

/// Boolean attributes of an identity, frozen at its first occurrence.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentityAttributes {
    pub c_term_k: bool,
    pub c_term_r: bool,
    pub missed_cleavage: bool,
    pub keratin: bool,
    pub trypsin: bool,
    pub tryptic: bool,
    pub phosphopeptide: bool,
    pub acetylated: bool,
}

impl IdentityAttributes {
    fn freeze(row: &PsmRow, normalized: &NormalizedPeptide) -> IdentityAttributes {
        let clean = &normalized.clean_sequence;
        let last = clean.chars().last();

        let regex_hit = MISSED_CLEAVAGE.is_match(clean);
        let caller_hit = row.missed_cleavage_count > 0;
        if regex_hit != caller_hit {
            log::debug!(
                "missed cleavage disagreement for {}: counted {}, sequence says {}",
                clean,
                row.missed_cleavage_count,
                regex_hit
            );
        }

        let (phosphopeptide, acetylated) = modification_flags(&normalized.modifications);

        IdentityAttributes {
            c_term_k: last == Some('K'),
            c_term_r: last == Some('R'),
            missed_cleavage: regex_hit,
            keratin: row.proteins.iter().any(|p| KERATIN.is_match(p)),
            trypsin: row.proteins.iter().any(|p| TRYPSIN.is_match(p)),
            tryptic: matches!(row.cleavage_state, CleavageState::Full | CleavageState::Partial),
            phosphopeptide,
            acetylated,
        }
    }
}

/// Scan the modification list in order; the first modification matching
/// either category decides which single flag is set. A peptide carrying both
/// phospho and acetyl marks only whichever appears first in its list.
pub fn modification_flags(modifications: &[Modification]) -> (bool, bool) {
    for m in modifications {
        let name = m.name.to_ascii_lowercase();
        if name == PHOSPHO_MOD {
            return (true, false);
        }
        if ACETYL_MODS.contains(&name.as_str()) {
            return (false, true);
        }
    }
    (false, false)
}

/// Accumulated state for one canonical peptide. The observation count is
/// derived from the observation list and is not directly settable.
#[derive(Clone, Debug)]
pub struct AggregatedIdentity {
    /// First-seen protein, the fallback when no external protein map entry
    /// exists.
    pub protein: String,
    pub seq_id_first: SequenceId,
    pub attributes: IdentityAttributes,
    /// Per-identity FDR: adopted from observations, or estimated from the
    /// decoy ratio. `None` until the estimator runs.
    pub fdr: Option<f64>,
    pub observations: Vec<PsmObservation>,
}

impl AggregatedIdentity {
    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    pub fn passing_count(&self) -> usize {
        self.observations.iter().filter(|o| o.passes_filter).count()
    }

    /// Minimum known FDR across observations.
    pub fn best_fdr(&self) -> Option<f64> {
        self.observations
            .iter()
            .filter_map(|o| o.fdr)
            .fold(None, |best, f| match best {
                Some(b) if b <= f => Some(b),
                _ => Some(f),
            })
    }

    pub fn best_primary_score(&self) -> f64 {
        self.observations
            .iter()
            .map(|o| o.primary_score)
            .fold(UNKNOWN_PRIMARY_SCORE, f64::min)
    }

    pub fn best_e_value(&self) -> f64 {
        self.observations
            .iter()
            .map(|o| o.e_value)
            .fold(UNKNOWN_EVALUE, f64::min)
    }

    pub fn snapshot(&self, observation_count: usize) -> UniqueSeqSnapshot {
        UniqueSeqSnapshot {
            attributes: self.attributes,
            observation_count,
        }
    }
}

/// Detached copy of an identity's attributes plus an observation count, used
/// for group-by aggregation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct UniqueSeqSnapshot {
    pub attributes: IdentityAttributes,
    pub observation_count: usize,
}

impl UniqueSeqSnapshot {
    /// Merging two snapshots under the same identity sums their counts.
    pub fn merge(mut self, other: UniqueSeqSnapshot) -> UniqueSeqSnapshot {
        self.observation_count += other.observation_count;
        self
    }
}

/// Optional side tables from the search result reader. All may be empty.
#[derive(Clone, Debug, Default)]
pub struct SequenceMaps {
    pub result_to_seq: FnvHashMap<i64, SequenceId>,
    pub seq_to_proteins: FnvHashMap<SequenceId, Vec<String>>,
    pub seq_to_mod_descriptor: FnvHashMap<SequenceId, String>,
}

/// The full aggregated result set for one run.
#[derive(Clone, Debug, Default)]
pub struct AggregatedSet {
    pub identities: FnvHashMap<SequenceId, AggregatedIdentity>,
}

/// Collapses a PSM stream into aggregated identities.
#[derive(Default)]
pub struct PsmAggregator {
    resolver: IdentityResolver,
    identities: FnvHashMap<SequenceId, AggregatedIdentity>,
}

impl PsmAggregator {
    pub fn new() -> PsmAggregator {
        PsmAggregator::default()
    }

    /// Normalize and resolve one row, then either merge it into an existing
    /// identity or freeze a new one.
    pub fn ingest(&mut self, row: &PsmRow, maps: &SequenceMaps) -> Result<(), Error> {
        let symbol = NormalizedPeptide::from_symbol_form(&row.peptide);
        let mapped = maps.result_to_seq.get(&row.result_id).copied();

        // Authoritative sequence metadata, when available, replaces the
        // symbol-derived modification list.
        let normalized = match mapped.and_then(|id| {
            maps.seq_to_mod_descriptor
                .get(&id)
                .map(|descriptor| (id, descriptor))
        }) {
            Some((id, descriptor)) => {
                NormalizedPeptide::from_descriptor(&symbol.clean_sequence, id, descriptor)?
            }
            None => symbol,
        };

        match self.resolver.resolve(&normalized) {
            Some(id) => {
                let identity = self
                    .identities
                    .get_mut(&id)
                    .expect("resolved ids are always registered");
                match identity
                    .observations
                    .iter_mut()
                    .find(|o| o.dataset == row.dataset && o.scan_number == row.scan_number)
                {
                    Some(observation) => observation.merge(row),
                    None => identity.observations.push(PsmObservation::from_row(row)),
                }
            }
            None => {
                let id = mapped.unwrap_or(row.result_id);
                if self.identities.contains_key(&id) {
                    log::warn!(
                        "sequence id {} already assigned; skipping row for {} scan {}",
                        id,
                        normalized.clean_sequence,
                        row.scan_number
                    );
                    return Ok(());
                }
                let attributes = IdentityAttributes::freeze(row, &normalized);
                self.resolver.register(&normalized, id);
                self.identities.insert(
                    id,
                    AggregatedIdentity {
                        protein: row.proteins.first().cloned().unwrap_or_default(),
                        seq_id_first: id,
                        attributes,
                        fdr: None,
                        observations: vec![PsmObservation::from_row(row)],
                    },
                );
            }
        }
        Ok(())
    }

    pub fn finish(self) -> AggregatedSet {
        AggregatedSet {
            identities: self.identities,
        }
    }
}
