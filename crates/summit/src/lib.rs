pub mod aggregate;
pub mod fdr;
pub mod filter;
pub mod identity;
pub mod peptide;
pub mod scans;
pub mod stats;
pub mod summarize;

use crate::peptide::SequenceId;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// No usable primary score or e-value anywhere, and fewer than 20% of
    /// identities carry an authoritative FDR.
    MissingScoreData,
    /// Decoy-ratio estimation found zero decoy proteins and the known-FDR
    /// fallback is unavailable.
    NoDecoyProteins,
    /// A modification descriptor contained an empty name. Fatal: the
    /// sequence metadata is corrupt.
    EmptyModificationName {
        id: SequenceId,
        descriptor: String,
    },
    /// The external scan-count lookup failed or returned a non-positive
    /// total for this dataset.
    ScanLookupFailure { dataset: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingScoreData => {
                f.write_str("no usable score or e-value data for FDR estimation")
            }
            Self::NoDecoyProteins => {
                f.write_str("no decoy proteins found; cannot estimate FDR by decoy ratio")
            }
            Self::EmptyModificationName { id, descriptor } => write!(
                f,
                "empty modification name in descriptor `{}` for sequence {}",
                descriptor, id
            ),
            Self::ScanLookupFailure { dataset } => {
                write!(f, "scan count lookup failed for dataset `{}`", dataset)
            }
        }
    }
}

impl std::error::Error for Error {}
