//! Scan-gap and PSM-coverage quality metrics, computed from the observed
//! scan numbers independently of any threshold pass.

use fnv::FnvHashMap;
use serde::Serialize;

use crate::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanTotals {
    pub total_scans: i64,
    pub total_msn_scans: i64,
}

/// External per-dataset scan-count lookup. Out of core scope; callers supply
/// an implementation with its own retry policy.
pub trait ScanTotalsSource {
    fn totals(&self, dataset: &str) -> Result<ScanTotals, Error>;
}

impl ScanTotalsSource for FnvHashMap<String, ScanTotals> {
    fn totals(&self, dataset: &str) -> Result<ScanTotals, Error> {
        self.get(dataset)
            .copied()
            .ok_or_else(|| Error::ScanLookupFailure {
                dataset: dataset.to_string(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScanCoverage {
    pub max_scan_gap: i64,
    pub percent_no_psm: f64,
    pub lookup_error: bool,
}

impl Default for ScanCoverage {
    fn default() -> Self {
        // Conservative: no coverage until proven otherwise.
        ScanCoverage {
            max_scan_gap: 0,
            percent_no_psm: 100.0,
            lookup_error: false,
        }
    }
}

/// Compute coverage metrics over observed scan numbers, optionally
/// partitioned by dataset. A failed lookup (or a non-positive scan total)
/// sets the sticky `lookup_error` flag and leaves the metrics at their
/// conservative defaults instead of raising.
pub fn analyze(
    scans_by_dataset: &FnvHashMap<String, Vec<i64>>,
    source: &dyn ScanTotalsSource,
) -> ScanCoverage {
    let mut lookup_error = false;
    let mut max_gap = 0i64;
    let mut observed = 0usize;
    let mut total_msn = 0i64;

    for (dataset, scans) in scans_by_dataset {
        let totals = match source.totals(dataset) {
            Ok(totals) if totals.total_scans > 0 => totals,
            Ok(totals) => {
                log::warn!(
                    "dataset `{}` reports {} total scans; skipping coverage",
                    dataset,
                    totals.total_scans
                );
                lookup_error = true;
                continue;
            }
            Err(e) => {
                log::warn!("{}", e);
                lookup_error = true;
                continue;
            }
        };

        let mut scans = scans.clone();
        scans.sort_unstable();
        scans.dedup();

        if let Some(&last) = scans.last() {
            for pair in scans.windows(2) {
                max_gap = max_gap.max(pair[1] - pair[0]);
            }
            max_gap = max_gap.max(totals.total_scans - 1 - last);
        }

        observed += scans.len();
        total_msn += totals.total_msn_scans;
    }

    if lookup_error {
        return ScanCoverage {
            lookup_error: true,
            ..Default::default()
        };
    }

    let percent_no_psm = if total_msn > 0 {
        (1.0 - observed as f64 / total_msn as f64) * 100.0
    } else {
        100.0
    };

    ScanCoverage {
        max_scan_gap: max_gap,
        percent_no_psm,
        lookup_error: false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scans(scans: &[i64]) -> FnvHashMap<String, Vec<i64>> {
        let mut map = FnvHashMap::default();
        map.insert("ds".to_string(), scans.to_vec());
        map
    }

    fn totals(total_scans: i64, total_msn_scans: i64) -> FnvHashMap<String, ScanTotals> {
        let mut map = FnvHashMap::default();
        map.insert(
            "ds".to_string(),
            ScanTotals {
                total_scans,
                total_msn_scans,
            },
        );
        map
    }

    #[test]
    fn adjacent_and_tail_gaps() {
        // Largest adjacent gap is 40 (60 -> 100); the tail gap to scan 199
        // is 99 and wins.
        let coverage = analyze(&scans(&[50, 60, 100]), &totals(200, 150));
        assert_eq!(coverage.max_scan_gap, 99);
        assert!(!coverage.lookup_error);
    }

    #[test]
    fn duplicate_scans_are_ignored() {
        let coverage = analyze(&scans(&[10, 10, 12]), &totals(13, 4));
        assert_eq!(coverage.max_scan_gap, 2);
        assert_eq!(coverage.percent_no_psm, 50.0);
    }

    #[test]
    fn percent_no_psm() {
        let coverage = analyze(&scans(&[1, 2, 3]), &totals(100, 12));
        assert_eq!(coverage.percent_no_psm, 75.0);
    }

    #[test]
    fn zero_msn_scans_is_pessimistic() {
        let coverage = analyze(&scans(&[1, 2, 3]), &totals(100, 0));
        assert_eq!(coverage.percent_no_psm, 100.0);
        assert!(!coverage.lookup_error);
    }

    #[test]
    fn failed_lookup_degrades_to_defaults() {
        let coverage = analyze(&scans(&[1, 2, 3]), &FnvHashMap::default());
        assert_eq!(
            coverage,
            ScanCoverage {
                max_scan_gap: 0,
                percent_no_psm: 100.0,
                lookup_error: true,
            }
        );
    }

    #[test]
    fn non_positive_total_degrades_to_defaults() {
        let coverage = analyze(&scans(&[1, 2, 3]), &totals(0, 10));
        assert!(coverage.lookup_error);
        assert_eq!(coverage.max_scan_gap, 0);
        assert_eq!(coverage.percent_no_psm, 100.0);
    }

    #[test]
    fn worst_gap_across_datasets() {
        let mut by_dataset = FnvHashMap::default();
        by_dataset.insert("a".to_string(), vec![1, 2, 3, 4]);
        by_dataset.insert("b".to_string(), vec![1, 50]);
        let mut lookup = FnvHashMap::default();
        lookup.insert(
            "a".to_string(),
            ScanTotals {
                total_scans: 5,
                total_msn_scans: 4,
            },
        );
        lookup.insert(
            "b".to_string(),
            ScanTotals {
                total_scans: 51,
                total_msn_scans: 40,
            },
        );

        let coverage = analyze(&by_dataset, &lookup);
        assert_eq!(coverage.max_scan_gap, 49);
        // 6 observed of 44 MSn scans.
        assert!((coverage.percent_no_psm - (1.0 - 6.0 / 44.0) * 100.0).abs() < 1e-9);
    }
}
