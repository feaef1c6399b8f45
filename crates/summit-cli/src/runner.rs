use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use fnv::FnvHashMap;
use summit_core::aggregate::{
    CleavageState, PsmRow, SequenceMaps, UNKNOWN_EVALUE, UNKNOWN_PRIMARY_SCORE,
};
use summit_core::scans::ScanTotals;
use summit_core::stats::StatsRecord;
use summit_core::summarize::{summarize, SummaryReport};

use crate::input::Search;

pub struct Runner {
    pub parameters: Search,
    start: Instant,
}

/// Header name -> column index, case-insensitive.
struct Columns(FnvHashMap<String, usize>);

impl Columns {
    fn new(headers: &csv::StringRecord) -> Columns {
        Columns(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
                .collect(),
        )
    }

    fn field<'a>(&self, record: &'a csv::StringRecord, name: &str) -> Option<&'a str> {
        self.0
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// First non-empty value among several header aliases.
    fn any<'a>(&self, record: &'a csv::StringRecord, names: &[&str]) -> Option<&'a str> {
        names.iter().find_map(|name| self.field(record, name))
    }
}

/// Remove flanking residues from a `K.PEPT*IDE.R` style annotation.
fn strip_flanking(peptide: &str) -> &str {
    let bytes = peptide.as_bytes();
    if bytes.len() >= 5 && bytes[1] == b'.' && bytes[bytes.len() - 2] == b'.' {
        &peptide[2..peptide.len() - 2]
    } else {
        peptide
    }
}

fn parse_cleavage_state(value: Option<&str>) -> CleavageState {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("full") => CleavageState::Full,
        Some("partial") => CleavageState::Partial,
        Some("nonspecific") | Some("non-specific") => CleavageState::NonSpecific,
        _ => CleavageState::Unknown,
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::to_ascii_lowercase).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

/// Parse a numeric field, falling back to its unknown sentinel. Data files
/// in the wild carry blanks; only a present-but-garbled value is worth a
/// warning.
fn parse_or(value: Option<&str>, default: f64, what: &str, scan: i64) -> f64 {
    match value {
        Some(s) => match s.parse() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("unparseable {} `{}` for scan {}", what, s, scan);
                default
            }
        },
        None => default,
    }
}

impl Runner {
    pub fn new(parameters: Search) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&parameters.output_directory)?;
        Ok(Runner {
            parameters,
            start: Instant::now(),
        })
    }

    pub fn run(self) -> anyhow::Result<()> {
        let rows = self.read_psms()?;
        let maps = self.read_sequence_maps()?;
        let scan_totals = self.read_scan_totals()?;

        let report = summarize(&rows, &maps, &scan_totals, &self.parameters.settings)?;

        self.write_summary(&report)?;
        self.write_scan_coverage(&report)?;
        self.write_settings()?;

        log::info!(
            "finished summarizing `{}` in {:.2}s",
            self.parameters.dataset,
            self.start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn read_psms(&self) -> anyhow::Result<Vec<PsmRow>> {
        let path = &self.parameters.psm_path;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to read PSM results from `{path}`"))?;
        let columns = Columns::new(reader.headers()?);

        let mut rows = Vec::new();
        let mut dropped = 0usize;
        for (line, record) in reader.records().enumerate() {
            let record = record?;

            // Only rank-1 hits reach the summarizer.
            if let Some(rank) = columns.field(&record, "rank") {
                if rank.parse::<u32>().map_or(false, |r| r > 1) {
                    dropped += 1;
                    continue;
                }
            }

            let scan_number = match columns
                .any(&record, &["scan", "scannr", "scan_number"])
                .and_then(|s| s.parse().ok())
            {
                Some(scan) => scan,
                None => {
                    log::warn!("row {} has no scan number; skipping", line + 2);
                    continue;
                }
            };
            let peptide = match columns.field(&record, "peptide") {
                Some(peptide) => strip_flanking(peptide).to_string(),
                None => {
                    log::warn!("scan {} has no peptide; skipping", scan_number);
                    continue;
                }
            };

            let proteins = columns
                .any(&record, &["proteins", "protein"])
                .map(|list| {
                    list.split(';')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            rows.push(PsmRow {
                result_id: match columns.field(&record, "result_id") {
                    Some(id) => id.parse().unwrap_or(line as i64 + 1),
                    None => line as i64 + 1,
                },
                dataset: columns
                    .field(&record, "dataset")
                    .unwrap_or(&self.parameters.dataset)
                    .to_string(),
                scan_number,
                peptide,
                proteins,
                cleavage_state: parse_cleavage_state(columns.field(&record, "cleavage_state")),
                missed_cleavage_count: columns
                    .field(&record, "missed_cleavages")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                fdr: columns
                    .any(&record, &["qvalue", "fdr"])
                    .and_then(|s| s.parse().ok()),
                primary_score: parse_or(
                    columns.any(&record, &["primary_score", "spec_evalue", "pep"]),
                    UNKNOWN_PRIMARY_SCORE,
                    "primary score",
                    scan_number,
                ),
                e_value: parse_or(
                    columns.any(&record, &["evalue", "e_value"]),
                    UNKNOWN_EVALUE,
                    "e-value",
                    scan_number,
                ),
                missing_n_term_reporter_ion: parse_flag(
                    columns.field(&record, "missing_nterm_reporter"),
                ),
                missing_reporter_ion: parse_flag(columns.field(&record, "missing_reporter")),
            });
        }

        log::info!(
            "read {} PSM rows from `{}` ({} rank > 1 dropped)",
            rows.len(),
            path,
            dropped
        );
        Ok(rows)
    }

    fn read_sequence_maps(&self) -> anyhow::Result<SequenceMaps> {
        let mut maps = SequenceMaps::default();

        if let Some(path) = &self.parameters.result_map_path {
            for (result_id, value) in read_pairs(path)? {
                if let Ok(seq_id) = value.parse() {
                    maps.result_to_seq.insert(result_id, seq_id);
                }
            }
        }
        if let Some(path) = &self.parameters.protein_map_path {
            for (seq_id, protein) in read_pairs(path)? {
                maps.seq_to_proteins.entry(seq_id).or_default().push(protein);
            }
        }
        if let Some(path) = &self.parameters.mod_map_path {
            for (seq_id, descriptor) in read_pairs(path)? {
                maps.seq_to_mod_descriptor.insert(seq_id, descriptor);
            }
        }

        log::info!(
            "sequence maps: {} result ids, {} protein lists, {} mod descriptors",
            maps.result_to_seq.len(),
            maps.seq_to_proteins.len(),
            maps.seq_to_mod_descriptor.len()
        );
        Ok(maps)
    }

    fn read_scan_totals(&self) -> anyhow::Result<FnvHashMap<String, ScanTotals>> {
        let mut totals = FnvHashMap::default();
        if let Some(path) = &self.parameters.scan_totals_path {
            let mut reader = csv::ReaderBuilder::new()
                .delimiter(b'\t')
                .from_path(path)
                .with_context(|| format!("Failed to read scan totals from `{path}`"))?;
            let columns = Columns::new(reader.headers()?);
            for record in reader.records() {
                let record = record?;
                let dataset = match columns.field(&record, "dataset") {
                    Some(dataset) => dataset.to_string(),
                    None => continue,
                };
                totals.insert(
                    dataset,
                    ScanTotals {
                        total_scans: columns
                            .field(&record, "total_scans")
                            .and_then(|s| s.parse().ok())
                            .unwrap_or(0),
                        total_msn_scans: columns
                            .field(&record, "total_msn_scans")
                            .and_then(|s| s.parse().ok())
                            .unwrap_or(0),
                    },
                );
            }
        }
        Ok(totals)
    }

    fn serialize_record(&self, pass: &str, record: &StatsRecord) -> csv::ByteRecord {
        let mut out = csv::ByteRecord::new();
        out.push_field(pass.as_bytes());
        out.push_field(itoa::Buffer::new().format(record.total_psms).as_bytes());
        out.push_field(
            itoa::Buffer::new()
                .format(record.unique_peptide_count)
                .as_bytes(),
        );
        out.push_field(
            itoa::Buffer::new()
                .format(record.unique_protein_count)
                .as_bytes(),
        );
        out.push_field(
            itoa::Buffer::new()
                .format(record.phosphopeptide_count)
                .as_bytes(),
        );
        out.push_field(
            itoa::Buffer::new()
                .format(record.phosphopeptide_c_term_k)
                .as_bytes(),
        );
        out.push_field(
            itoa::Buffer::new()
                .format(record.phosphopeptide_c_term_r)
                .as_bytes(),
        );
        out.push_field(itoa::Buffer::new().format(record.keratin_count).as_bytes());
        out.push_field(itoa::Buffer::new().format(record.trypsin_count).as_bytes());
        out.push_field(itoa::Buffer::new().format(record.tryptic_count).as_bytes());
        out.push_field(
            itoa::Buffer::new()
                .format(record.acetylated_count)
                .as_bytes(),
        );
        out.push_field(
            ryu::Buffer::new()
                .format(record.missed_cleavage_ratio)
                .as_bytes(),
        );
        out.push_field(
            ryu::Buffer::new()
                .format(record.phospho_missed_cleavage_ratio)
                .as_bytes(),
        );
        for percent in [
            record.percent_missing_n_term_reporter,
            record.percent_missing_reporter,
        ] {
            match percent {
                Some(p) => out.push_field(ryu::Buffer::new().format(p).as_bytes()),
                None => out.push_field(b""),
            }
        }
        out
    }

    fn write_summary(&self, report: &SummaryReport) -> anyhow::Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(vec![]);

        let headers = csv::ByteRecord::from(vec![
            "pass",
            "total_psms",
            "unique_peptides",
            "unique_proteins",
            "phosphopeptides",
            "phospho_c_term_k",
            "phospho_c_term_r",
            "keratin",
            "trypsin",
            "tryptic",
            "acetylated",
            "missed_cleavage_ratio",
            "phospho_missed_cleavage_ratio",
            "pct_missing_nterm_reporter",
            "pct_missing_reporter",
        ]);
        wtr.write_byte_record(&headers)?;

        for (pass, result) in [
            ("score", &report.score_pass),
            ("fdr", &report.fdr_pass),
        ] {
            match result {
                Ok(record) => wtr.write_byte_record(&self.serialize_record(pass, record))?,
                Err(e) => log::error!("{} pass produced no summary: {}", pass, e),
            }
        }

        wtr.flush()?;
        let bytes = wtr.into_inner()?;
        let path = self.make_path("summary.tsv");
        std::fs::write(&path, bytes)?;
        log::info!("wrote summary to {}", path);
        Ok(())
    }

    fn write_scan_coverage(&self, report: &SummaryReport) -> anyhow::Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(vec![]);
        wtr.write_byte_record(&csv::ByteRecord::from(vec![
            "max_scan_gap",
            "percent_no_psm",
            "lookup_error",
        ]))?;

        let coverage = &report.scan_coverage;
        let mut record = csv::ByteRecord::new();
        record.push_field(itoa::Buffer::new().format(coverage.max_scan_gap).as_bytes());
        record.push_field(
            ryu::Buffer::new()
                .format(coverage.percent_no_psm)
                .as_bytes(),
        );
        record.push_field(if coverage.lookup_error { b"1" } else { b"0" });
        wtr.write_byte_record(&record)?;

        wtr.flush()?;
        let bytes = wtr.into_inner()?;
        std::fs::write(self.make_path("scan_coverage.tsv"), bytes)?;
        Ok(())
    }

    fn write_settings(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.parameters)?;
        std::fs::write(self.make_path("summit.json"), json)?;
        Ok(())
    }

    fn make_path(&self, file: &str) -> String {
        Path::new(&self.parameters.output_directory)
            .join(file)
            .to_string_lossy()
            .into_owned()
    }
}

/// Read a two-column TSV of (integer id, value).
fn read_pairs(path: &str) -> anyhow::Result<Vec<(i64, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to read map from `{path}`"))?;

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record?;
        let id = match record.get(0).map(str::trim).and_then(|s| s.parse().ok()) {
            Some(id) => id,
            None => continue,
        };
        let value = match record.get(1).map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => continue,
        };
        pairs.push((id, value));
    }
    Ok(pairs)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strip_flanking_residues() {
        assert_eq!(strip_flanking("K.PEPT*IDER.S"), "PEPT*IDER");
        assert_eq!(strip_flanking("-.MTEYKLVVVGAGGVGK.S"), "MTEYKLVVVGAGGVGK");
        // Already clean, or too short to carry flanks.
        assert_eq!(strip_flanking("PEPTIDER"), "PEPTIDER");
        assert_eq!(strip_flanking("K.R"), "K.R");
    }

    #[test]
    fn cleavage_state_parsing() {
        assert_eq!(parse_cleavage_state(Some("Full")), CleavageState::Full);
        assert_eq!(
            parse_cleavage_state(Some("partial")),
            CleavageState::Partial
        );
        assert_eq!(
            parse_cleavage_state(Some("nonspecific")),
            CleavageState::NonSpecific
        );
        assert_eq!(parse_cleavage_state(None), CleavageState::Unknown);
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some("True")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(None));
    }
}
