//! Two independent threshold passes over the same aggregated set. Each pass
//! takes the immutable source and returns its own filtered copy; pass B is
//! never applied to pass A's output.

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregatedIdentity, AggregatedSet};
use crate::fdr;
use crate::peptide::SequenceId;
use crate::Error;

/// Which search engine family produced the result set. X!Tandem reports an
/// expectation value where the others report a spectral probability, so the
/// primary-score pass compares a different field for it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    MsgfPlus,
    MsPathfinder,
    XTandem,
}

impl ResultKind {
    pub fn uses_e_value(self) -> bool {
        matches!(self, ResultKind::XTandem)
    }
}

impl Default for ResultKind {
    fn default() -> Self {
        Self::MsgfPlus
    }
}

/// A threshold of 1 or more disables the corresponding pass.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct FilterSettings {
    pub primary_threshold: f64,
    pub fdr_threshold: f64,
    pub result_kind: ResultKind,
}

impl Default for FilterSettings {
    fn default() -> Self {
        FilterSettings {
            primary_threshold: 1.0,
            fdr_threshold: 1.0,
            result_kind: ResultKind::default(),
        }
    }
}

/// One pass's private copy of the aggregated set, with `passes_filter` set
/// on every observation.
#[derive(Clone, Debug, Default)]
pub struct FilteredView {
    pub identities: FnvHashMap<SequenceId, AggregatedIdentity>,
}

impl FilteredView {
    pub fn total_passing(&self) -> usize {
        self.identities.values().map(|i| i.passing_count()).sum()
    }
}

/// Primary-score pass. Disabled (everything passes) when the threshold
/// is >= 1.
pub fn filter_by_score(source: &AggregatedSet, settings: &FilterSettings) -> FilteredView {
    let mut identities = source.identities.clone();
    let enabled = settings.primary_threshold < 1.0;
    for identity in identities.values_mut() {
        for observation in identity.observations.iter_mut() {
            observation.passes_filter = if !enabled {
                true
            } else if settings.result_kind.uses_e_value() {
                observation.e_value <= settings.primary_threshold
            } else {
                observation.primary_score <= settings.primary_threshold
            };
        }
    }
    let view = FilteredView { identities };
    log::info!(
        "score pass: {} observations at threshold {}",
        view.total_passing(),
        settings.primary_threshold
    );
    view
}

/// FDR pass. Runs the estimator over a private copy, removes identities
/// above the threshold, then marks any remaining observation whose own FDR
/// exceeds it. Disabled (everything passes) when the threshold is >= 1.
pub fn filter_by_fdr(
    source: &AggregatedSet,
    settings: &FilterSettings,
) -> Result<FilteredView, Error> {
    let mut identities = source.identities.clone();
    if settings.fdr_threshold < 1.0 {
        fdr::estimate(&mut identities)?;
        fdr::prune(&mut identities, settings.fdr_threshold);
        for identity in identities.values_mut() {
            for observation in identity.observations.iter_mut() {
                observation.passes_filter =
                    !observation.fdr.map_or(false, |f| f > settings.fdr_threshold);
            }
        }
    } else {
        for identity in identities.values_mut() {
            for observation in identity.observations.iter_mut() {
                observation.passes_filter = true;
            }
        }
    }
    Ok(FilteredView { identities })
}
