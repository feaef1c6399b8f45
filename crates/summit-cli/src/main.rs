use clap::{Arg, Command, ValueHint};
use summit_cli::input::Input;
use summit_cli::Runner;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("SUMMIT_LOG", "error,summit=info"))
        .init();

    let matches = Command::new("summit")
        .version(clap::crate_version!())
        .about("Summarize peptide identifications from proteomics search results")
        .arg(
            Arg::new("parameters")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to configuration parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("psm_path")
                .num_args(1)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path to the PSM results file to summarize. Overrides the path \
                     listed in the configuration file.",
                )
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("dataset")
                .short('d')
                .long("dataset")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Dataset name to report under. Overrides the name specified \
                     in the configuration file.",
                )
                .value_hint(ValueHint::Other),
        )
        .arg(
            Arg::new("output_directory")
                .short('o')
                .long("output_directory")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path where summary results will be written. Overrides the \
                     directory specified in the configuration file.",
                )
                .value_hint(ValueHint::DirPath),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let input = Input::from_arguments(matches)?;
    let runner = input.build().and_then(Runner::new)?;
    runner.run()
}
