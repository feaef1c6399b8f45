use summit_cli::input::Input;
use summit_cli::Runner;

const PSMS: &str = "\
result_id\tdataset\tscan\trank\tpeptide\tproteins\tcleavage_state\tmissed_cleavages\tqvalue\tprimary_score\tmissing_nterm_reporter\tmissing_reporter
1\tQC01\t100\t1\tK.LS*SPATLNSR.V\tsp|P11111\tfull\t0\t0.0\t1e-12\t0\t0
2\tQC01\t200\t1\tK.VEGAQNQGK.L\tsp|P22222\tfull\t0\t0.0\t1e-10\t1\t1
3\tQC01\t300\t1\tR.ELVISLIVESK.T\tsp|P33333\tfull\t0\t0.02\t1e-8\t0\t0
4\tQC01\t300\t2\tR.AAAAAAK.T\tsp|P44444\tfull\t0\t0.5\t1e-2\t0\t0
";

const SCAN_TOTALS: &str = "\
dataset\ttotal_scans\ttotal_msn_scans
QC01\t1000\t500
";

#[test]
fn integration() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("summit-integration-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;

    let psm_path = dir.join("QC01_psms.tsv");
    std::fs::write(&psm_path, PSMS)?;
    let totals_path = dir.join("scan_totals.tsv");
    std::fs::write(&totals_path, SCAN_TOTALS)?;

    let config = serde_json::json!({
        "psm_path": psm_path.to_str().unwrap(),
        "scan_totals_path": totals_path.to_str().unwrap(),
        "output_directory": dir.join("out").to_str().unwrap(),
        "primary_threshold": 1.0,
        "fdr_threshold": 0.01,
        "result_kind": "msgfplus",
    });
    let config_path = dir.join("summit.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    let input = Input::load(config_path.to_str().unwrap())?;
    let runner = input.build().and_then(Runner::new)?;
    runner.run()?;

    let summary = std::fs::read_to_string(dir.join("out").join("summary.tsv"))?;
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("pass\ttotal_psms\tunique_peptides"));

    // Rank-2 row is dropped; score filtering is disabled at threshold 1.
    let score: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(score[0], "score");
    assert_eq!(score[1], "3");
    assert_eq!(score[2], "3");

    // The 0.02 identity is above the 0.01 FDR threshold.
    let fdr: Vec<&str> = lines[2].split('\t').collect();
    assert_eq!(fdr[0], "fdr");
    assert_eq!(fdr[1], "2");
    assert_eq!(fdr[2], "2");

    let coverage = std::fs::read_to_string(dir.join("out").join("scan_coverage.tsv"))?;
    let metrics: Vec<&str> = coverage.lines().nth(1).unwrap().split('\t').collect();
    // Largest gap is from scan 300 to the end of the run (scan 999).
    assert_eq!(metrics[0], "699");
    assert_eq!(metrics[2], "0");

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
