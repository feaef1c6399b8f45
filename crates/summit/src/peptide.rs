use crate::Error;

pub type SequenceId = i64;

/// A single modification on a peptide: the modification name paired with the
/// residue position it was reported at.
///
/// # Important note about positions
/// * Symbol-annotated sequences yield 0-based positions (the length of the
///   clean sequence at the time the symbol is encountered), while descriptor
///   strings carry 1-based residue numbers. The resolver's ±1 tolerance
///   absorbs the difference; see [`crate::identity::IdentityResolver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modification {
    pub name: String,
    pub position: i32,
}

/// Canonical form of a modified peptide: clean letters plus an ordered
/// modification list.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct NormalizedPeptide {
    pub clean_sequence: String,
    pub modifications: Vec<Modification>,
}

impl NormalizedPeptide {
    /// Normalize a symbol-annotated sequence, e.g. `LS*SPATLNSR`.
    ///
    /// Letters append to the clean sequence; any other character is recorded
    /// as a modification named by that character, positioned at the number
    /// of residues seen so far.
    pub fn from_symbol_form(raw: &str) -> NormalizedPeptide {
        let mut clean_sequence = String::with_capacity(raw.len());
        let mut modifications = Vec::new();
        for c in raw.chars() {
            if c.is_ascii_alphabetic() {
                clean_sequence.push(c);
            } else {
                modifications.push(Modification {
                    name: c.to_string(),
                    position: clean_sequence.len() as i32,
                });
            }
        }
        NormalizedPeptide {
            clean_sequence,
            modifications,
        }
    }

    /// Normalize from a clean sequence plus a comma-separated modification
    /// descriptor, e.g. `Phosph:3,Acetyl:1`.
    ///
    /// Used when authoritative sequence metadata is available; `id` only
    /// appears in the error message.
    pub fn from_descriptor(
        clean: &str,
        id: SequenceId,
        descriptor: &str,
    ) -> Result<NormalizedPeptide, Error> {
        Ok(NormalizedPeptide {
            clean_sequence: clean.to_string(),
            modifications: parse_descriptor(id, descriptor)?,
        })
    }
}

/// Parse a comma-separated modification descriptor into an ordered list.
/// A token without a colon gets position 0; an empty name is fatal.
pub fn parse_descriptor(id: SequenceId, descriptor: &str) -> Result<Vec<Modification>, Error> {
    let mut modifications = Vec::new();
    for token in descriptor.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (name, position) = match token.split_once(':') {
            Some((name, pos)) => (name.trim(), pos.trim().parse::<i32>().unwrap_or(0)),
            None => (token, 0),
        };
        if name.is_empty() {
            return Err(Error::EmptyModificationName {
                id,
                descriptor: descriptor.to_string(),
            });
        }
        modifications.push(Modification {
            name: name.to_string(),
            position,
        });
    }
    Ok(modifications)
}

impl std::fmt::Display for NormalizedPeptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.clean_sequence)?;
        for m in &self.modifications {
            write!(f, " [{}:{}]", m.name, m.position)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn symbol_form() {
        let p = NormalizedPeptide::from_symbol_form("LS*SPATLNSR");
        assert_eq!(p.clean_sequence, "LSSPATLNSR");
        assert_eq!(
            p.modifications,
            vec![Modification {
                name: "*".into(),
                position: 2
            }]
        );

        let p = NormalizedPeptide::from_symbol_form("K#VEGAQNQ@GK");
        assert_eq!(p.clean_sequence, "KVEGAQNQGK");
        assert_eq!(
            p.modifications,
            vec![
                Modification {
                    name: "#".into(),
                    position: 1
                },
                Modification {
                    name: "@".into(),
                    position: 8
                },
            ]
        );
    }

    #[test]
    fn symbol_form_unmodified() {
        let p = NormalizedPeptide::from_symbol_form("VEGAQNQGK");
        assert_eq!(p.clean_sequence, "VEGAQNQGK");
        assert!(p.modifications.is_empty());
    }

    #[test]
    fn descriptor_form() {
        let p = NormalizedPeptide::from_descriptor("LSSPATLNSR", 7, "Phosph:3").unwrap();
        assert_eq!(p.clean_sequence, "LSSPATLNSR");
        assert_eq!(
            p.modifications,
            vec![Modification {
                name: "Phosph".into(),
                position: 3
            }]
        );

        // missing position defaults to 0
        let p = NormalizedPeptide::from_descriptor("VEGAQNQGK", 8, "Acetyl, Phosph:5").unwrap();
        assert_eq!(
            p.modifications,
            vec![
                Modification {
                    name: "Acetyl".into(),
                    position: 0
                },
                Modification {
                    name: "Phosph".into(),
                    position: 5
                },
            ]
        );
    }

    #[test]
    fn descriptor_empty_name_is_fatal() {
        let err = NormalizedPeptide::from_descriptor("VEGAQNQGK", 12, ":3,Phosph:5").unwrap_err();
        assert_eq!(
            err,
            Error::EmptyModificationName {
                id: 12,
                descriptor: ":3,Phosph:5".into()
            }
        );
    }

    // The two normalization forms disagree by one on purpose: symbol
    // positions count residues seen so far (0-based), descriptors carry
    // 1-based residue numbers. Pin it so nobody "fixes" one side.
    #[test]
    fn position_conventions_differ_by_one() {
        let symbol = NormalizedPeptide::from_symbol_form("LSS*PATLNSR");
        let descriptor = NormalizedPeptide::from_descriptor("LSSPATLNSR", 1, "*:3").unwrap();
        assert_eq!(symbol.modifications[0].position, 3);
        assert_eq!(descriptor.modifications[0].position, 3);

        let symbol = NormalizedPeptide::from_symbol_form("LS*SPATLNSR");
        assert_eq!(symbol.modifications[0].position, 2);
    }
}
