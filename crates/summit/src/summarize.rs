//! One summarization run: aggregate the PSM stream, run both threshold
//! passes, tabulate each, and compute scan coverage off the raw scan list.

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use crate::aggregate::{PsmAggregator, PsmRow, SequenceMaps};
use crate::filter::{filter_by_fdr, filter_by_score, FilterSettings};
use crate::scans::{self, ScanCoverage, ScanTotalsSource};
use crate::stats::{tabulate, StatsRecord};
use crate::Error;

/// A dynamic reporter-ion modification detected upstream, e.g. a TMT or
/// iTRAQ label. Its presence enables the reporter-ion completeness
/// percentages on the FDR pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReporterIon {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SummarySettings {
    pub filter: FilterSettings,
    pub reporter_ion: Option<ReporterIon>,
}

/// Output of one run. The two passes fail independently: a failed FDR pass
/// leaves the score pass intact, and vice versa.
#[derive(Debug)]
pub struct SummaryReport {
    pub score_pass: Result<StatsRecord, Error>,
    pub fdr_pass: Result<StatsRecord, Error>,
    pub scan_coverage: ScanCoverage,
}

/// Run the whole pipeline over one dataset's result rows.
///
/// Returns `Err` only for run-fatal conditions (corrupt sequence metadata);
/// per-pass failures are carried inside the report.
pub fn summarize(
    rows: &[PsmRow],
    maps: &SequenceMaps,
    scan_totals: &dyn ScanTotalsSource,
    settings: &SummarySettings,
) -> Result<SummaryReport, Error> {
    let mut aggregator = PsmAggregator::new();
    for row in rows {
        aggregator.ingest(row, maps)?;
    }
    let set = aggregator.finish();
    log::info!(
        "aggregated {} rows into {} identities",
        rows.len(),
        set.identities.len()
    );

    let score_pass = {
        let view = filter_by_score(&set, &settings.filter);
        tabulate(&view, maps, false)
    };

    let reporter_active = settings.reporter_ion.is_some();
    let fdr_pass = filter_by_fdr(&set, &settings.filter)
        .and_then(|view| tabulate(&view, maps, reporter_active));

    match (&score_pass, &fdr_pass) {
        (Ok(score), Ok(fdr)) => log::info!(
            "unique peptides: {} (score pass), {} (FDR pass)",
            score.unique_peptide_count,
            fdr.unique_peptide_count
        ),
        (_, Err(e)) => log::warn!("FDR pass failed: {}", e),
        (Err(e), _) => log::warn!("score pass failed: {}", e),
    }

    // Coverage runs off the raw scan list, before any filtering.
    let mut scans_by_dataset: FnvHashMap<String, Vec<i64>> = FnvHashMap::default();
    for row in rows {
        scans_by_dataset
            .entry(row.dataset.clone())
            .or_default()
            .push(row.scan_number);
    }
    let scan_coverage = scans::analyze(&scans_by_dataset, scan_totals);

    Ok(SummaryReport {
        score_pass,
        fdr_pass,
        scan_coverage,
    })
}
