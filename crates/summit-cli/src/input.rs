use anyhow::{ensure, Context};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use summit_core::filter::{FilterSettings, ResultKind};
use summit_core::summarize::{ReporterIon, SummarySettings};

#[derive(Serialize)]
/// Actual run parameters - may include overrides or default values not set
/// by user
pub struct Search {
    pub version: String,
    pub dataset: String,
    pub psm_path: String,
    pub result_map_path: Option<String>,
    pub protein_map_path: Option<String>,
    pub mod_map_path: Option<String>,
    pub scan_totals_path: Option<String>,
    pub output_directory: String,
    pub settings: SummarySettings,
}

#[derive(Deserialize)]
/// Input run parameters deserialized from JSON file
pub struct Input {
    dataset: Option<String>,
    psm_path: Option<String>,
    result_map_path: Option<String>,
    protein_map_path: Option<String>,
    mod_map_path: Option<String>,
    scan_totals_path: Option<String>,
    output_directory: Option<String>,

    primary_threshold: Option<f64>,
    fdr_threshold: Option<f64>,
    result_kind: Option<ResultKind>,
    dynamic_reporter_ion: Option<ReporterIon>,
}

impl Input {
    pub fn from_arguments(matches: ArgMatches) -> anyhow::Result<Self> {
        let path = matches
            .get_one::<String>("parameters")
            .expect("required parameters");
        let mut input = Input::load(path)
            .with_context(|| format!("Failed to read parameters from `{path}`"))?;

        // Handle JSON configuration overrides
        if let Some(psm_path) = matches.get_one::<String>("psm_path") {
            log::trace!("overriding `psm_path` parameter.");
            input.psm_path = Some(psm_path.into());
        }
        if let Some(output_directory) = matches.get_one::<String>("output_directory") {
            log::trace!("overriding `output_directory` parameter.");
            input.output_directory = Some(output_directory.into());
        }
        if let Some(dataset) = matches.get_one::<String>("dataset") {
            log::trace!("overriding `dataset` parameter.");
            input.dataset = Some(dataset.into());
        }

        ensure!(
            input.psm_path.is_some(),
            "`psm_path` must be set. For more information try '--help'"
        );

        Ok(input)
    }

    pub fn load<S: AsRef<str>>(path: S) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&contents).map_err(anyhow::Error::from)
    }

    fn check_threshold(name: &str, threshold: f64) -> f64 {
        if threshold < 0.0 {
            log::warn!("`{}` is negative; clamping to 0", name);
            return 0.0;
        }
        if threshold >= 1.0 {
            log::warn!("`{}` is >= 1; this pass will keep everything", name);
        }
        threshold
    }

    pub fn build(self) -> anyhow::Result<Search> {
        let psm_path = self.psm_path.expect("'psm_path' must be provided!");

        // Default the dataset name to the result file's stem.
        let dataset = match self.dataset {
            Some(dataset) => dataset,
            None => std::path::Path::new(&psm_path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("dataset")
                .to_string(),
        };

        let output_directory = match self.output_directory {
            Some(path) => {
                std::fs::create_dir_all(&path)?;
                path
            }
            None => std::env::current_dir()?
                .to_str()
                .context("current directory is not valid UTF-8")?
                .to_string(),
        };

        let settings = SummarySettings {
            filter: FilterSettings {
                primary_threshold: Self::check_threshold(
                    "primary_threshold",
                    self.primary_threshold.unwrap_or(1.0),
                ),
                fdr_threshold: Self::check_threshold(
                    "fdr_threshold",
                    self.fdr_threshold.unwrap_or(1.0),
                ),
                result_kind: self.result_kind.unwrap_or_default(),
            },
            reporter_ion: self.dynamic_reporter_ion,
        };

        Ok(Search {
            version: clap::crate_version!().into(),
            dataset,
            psm_path,
            result_map_path: self.result_map_path,
            protein_map_path: self.protein_map_path,
            mod_map_path: self.mod_map_path,
            scan_totals_path: self.scan_totals_path,
            output_directory,
            settings,
        })
    }
}
