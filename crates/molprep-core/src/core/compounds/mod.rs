//! Chemical component reference data.
//!
//! A [`CompoundLibrary`] answers one question: what is known about the residue
//! called `id`. Preparation uses it to classify residues, to check that ligands
//! are known, and to connect ligand atoms. [`CompoundLib`] ships the standard amino
//! acids, nucleotides and water, and can be extended from TOML or CSV files.

pub mod processor;

use crate::core::models::residue::ChemClass;
use crate::core::models::topology::BondOrder;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundBond {
    pub atom1: String,
    pub atom2: String,
    pub order: BondOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compound {
    pub id: String,
    pub chem_class: ChemClass,
    pub one_letter_code: Option<char>,
    /// Every atom name the component may carry, hydrogens included.
    pub atom_names: Vec<String>,
    pub bonds: Vec<CompoundBond>,
}

impl Compound {
    pub fn has_atom(&self, name: &str) -> bool {
        self.atom_names.iter().any(|n| n == name)
    }
}

pub trait CompoundLibrary {
    fn find_compound(&self, id: &str) -> Option<&Compound>;
}

#[derive(Debug, Error)]
pub enum CompoundLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Compound '{compound}' has a bond with unknown order '{value}'")]
    InvalidBondOrder { compound: String, value: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompoundEntry {
    chem_class: ChemClass,
    #[serde(default)]
    one_letter_code: Option<char>,
    #[serde(default)]
    atoms: Vec<String>,
    #[serde(default)]
    bonds: Vec<(String, String, String)>,
}

#[derive(Debug, Deserialize)]
struct CompoundFile {
    #[serde(default)]
    compounds: HashMap<String, CompoundEntry>,
}

#[derive(Debug, Deserialize)]
struct CompoundRow {
    id: String,
    chem_class: ChemClass,
    one_letter_code: Option<char>,
    /// Whitespace-separated atom names.
    #[serde(default)]
    atoms: String,
}

const BACKBONE_PEPTIDE: &str = "N CA C O OXT H H1 H2 H3 HXT";
const BACKBONE_DNA: &str =
    "OP3 P OP1 OP2 O5' C5' C4' O4' C3' O3' C2' C1' H5' H5'' H4' H3' H2' H2'' H1' HO3' HO5' HOP2 HOP3";
const BACKBONE_RNA: &str =
    "OP3 P OP1 OP2 O5' C5' C4' O4' C3' O3' C2' O2' C1' H5' H5'' H4' H3' H2' HO2' H1' HO3' HO5' HOP2 HOP3";

// id, class, one-letter code, backbone, side chain or base atoms
static BUILTIN: &[(&str, ChemClass, Option<char>, &str, &str)] = &[
    ("ALA", ChemClass::Peptide, Some('A'), BACKBONE_PEPTIDE, "HA CB HB1 HB2 HB3"),
    ("ARG", ChemClass::Peptide, Some('R'), BACKBONE_PEPTIDE,
        "HA CB CG CD NE CZ NH1 NH2 HB2 HB3 HG2 HG3 HD2 HD3 HE HH11 HH12 HH21 HH22"),
    ("ASN", ChemClass::Peptide, Some('N'), BACKBONE_PEPTIDE, "HA CB CG OD1 ND2 HB2 HB3 HD21 HD22"),
    ("ASP", ChemClass::Peptide, Some('D'), BACKBONE_PEPTIDE, "HA CB CG OD1 OD2 HB2 HB3 HD2"),
    ("CYS", ChemClass::Peptide, Some('C'), BACKBONE_PEPTIDE, "HA CB SG HB2 HB3 HG"),
    ("GLN", ChemClass::Peptide, Some('Q'), BACKBONE_PEPTIDE,
        "HA CB CG CD OE1 NE2 HB2 HB3 HG2 HG3 HE21 HE22"),
    ("GLU", ChemClass::Peptide, Some('E'), BACKBONE_PEPTIDE, "HA CB CG CD OE1 OE2 HB2 HB3 HG2 HG3 HE2"),
    ("GLY", ChemClass::Peptide, Some('G'), BACKBONE_PEPTIDE, "HA2 HA3"),
    ("HIS", ChemClass::Peptide, Some('H'), BACKBONE_PEPTIDE,
        "HA CB CG ND1 CD2 CE1 NE2 HB2 HB3 HD1 HD2 HE1 HE2"),
    ("ILE", ChemClass::Peptide, Some('I'), BACKBONE_PEPTIDE,
        "HA CB CG1 CG2 CD1 HB HG12 HG13 HG21 HG22 HG23 HD11 HD12 HD13"),
    ("LEU", ChemClass::Peptide, Some('L'), BACKBONE_PEPTIDE,
        "HA CB CG CD1 CD2 HB2 HB3 HG HD11 HD12 HD13 HD21 HD22 HD23"),
    ("LYS", ChemClass::Peptide, Some('K'), BACKBONE_PEPTIDE,
        "HA CB CG CD CE NZ HB2 HB3 HG2 HG3 HD2 HD3 HE2 HE3 HZ1 HZ2 HZ3"),
    ("MET", ChemClass::Peptide, Some('M'), BACKBONE_PEPTIDE,
        "HA CB CG SD CE HB2 HB3 HG2 HG3 HE1 HE2 HE3"),
    ("MSE", ChemClass::Peptide, Some('M'), BACKBONE_PEPTIDE,
        "HA CB CG SE CE HB2 HB3 HG2 HG3 HE1 HE2 HE3"),
    ("PHE", ChemClass::Peptide, Some('F'), BACKBONE_PEPTIDE,
        "HA CB CG CD1 CD2 CE1 CE2 CZ HB2 HB3 HD1 HD2 HE1 HE2 HZ"),
    ("PRO", ChemClass::Peptide, Some('P'), BACKBONE_PEPTIDE, "HA CB CG CD HB2 HB3 HG2 HG3 HD2 HD3"),
    ("SER", ChemClass::Peptide, Some('S'), BACKBONE_PEPTIDE, "HA CB OG HB2 HB3 HG"),
    ("THR", ChemClass::Peptide, Some('T'), BACKBONE_PEPTIDE, "HA CB OG1 CG2 HB HG1 HG21 HG22 HG23"),
    ("TRP", ChemClass::Peptide, Some('W'), BACKBONE_PEPTIDE,
        "HA CB CG CD1 CD2 NE1 CE2 CE3 CZ2 CZ3 CH2 HB2 HB3 HD1 HE1 HE3 HZ2 HZ3 HH2"),
    ("TYR", ChemClass::Peptide, Some('Y'), BACKBONE_PEPTIDE,
        "HA CB CG CD1 CD2 CE1 CE2 CZ OH HB2 HB3 HD1 HD2 HE1 HE2 HH"),
    ("VAL", ChemClass::Peptide, Some('V'), BACKBONE_PEPTIDE,
        "HA CB CG1 CG2 HB HG11 HG12 HG13 HG21 HG22 HG23"),
    ("DA", ChemClass::DnaLinking, Some('A'), BACKBONE_DNA, "N9 C8 N7 C5 C6 N6 N1 C2 N3 C4 H8 H61 H62 H2"),
    ("DC", ChemClass::DnaLinking, Some('C'), BACKBONE_DNA, "N1 C2 O2 N3 C4 N4 C5 C6 H41 H42 H5 H6"),
    ("DG", ChemClass::DnaLinking, Some('G'), BACKBONE_DNA, "N9 C8 N7 C5 C6 O6 N1 C2 N2 N3 C4 H8 H1 H21 H22"),
    ("DT", ChemClass::DnaLinking, Some('T'), BACKBONE_DNA, "N1 C2 O2 N3 C4 O4 C5 C7 C6 H3 H71 H72 H73 H6"),
    ("A", ChemClass::RnaLinking, Some('A'), BACKBONE_RNA, "N9 C8 N7 C5 C6 N6 N1 C2 N3 C4 H8 H61 H62 H2"),
    ("C", ChemClass::RnaLinking, Some('C'), BACKBONE_RNA, "N1 C2 O2 N3 C4 N4 C5 C6 H41 H42 H5 H6"),
    ("G", ChemClass::RnaLinking, Some('G'), BACKBONE_RNA, "N9 C8 N7 C5 C6 O6 N1 C2 N2 N3 C4 H8 H1 H21 H22"),
    ("U", ChemClass::RnaLinking, Some('U'), BACKBONE_RNA, "N1 C2 O2 N3 C4 O4 C5 C6 H3 H5 H6"),
    ("HOH", ChemClass::Water, None, "", "O H1 H2"),
];

#[derive(Debug, Clone, Default)]
pub struct CompoundLib {
    compounds: HashMap<String, Compound>,
}

impl CompoundLib {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard amino acids, nucleotides and water.
    pub fn builtin() -> Self {
        let mut lib = Self::new();
        for &(id, chem_class, one_letter_code, backbone, rest) in BUILTIN {
            lib.insert(Compound {
                id: id.to_string(),
                chem_class,
                one_letter_code,
                atom_names: backbone
                    .split_whitespace()
                    .chain(rest.split_whitespace())
                    .map(str::to_string)
                    .collect(),
                bonds: Vec::new(),
            });
        }
        lib
    }

    /// Adds or replaces a compound.
    pub fn insert(&mut self, compound: Compound) {
        self.compounds.insert(compound.id.clone(), compound);
    }

    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }

    /// Merges the `[compounds.<ID>]` tables of a TOML file into the library.
    pub fn load_toml(&mut self, path: &Path) -> Result<usize, CompoundLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| CompoundLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: CompoundFile = toml::from_str(&content).map_err(|e| CompoundLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;

        let count = file.compounds.len();
        for (id, entry) in file.compounds {
            let bonds = entry
                .bonds
                .into_iter()
                .map(|(atom1, atom2, order)| {
                    let parsed = order
                        .parse()
                        .map_err(|_| CompoundLoadError::InvalidBondOrder {
                            compound: id.clone(),
                            value: order.clone(),
                        })?;
                    Ok(CompoundBond {
                        atom1,
                        atom2,
                        order: parsed,
                    })
                })
                .collect::<Result<Vec<_>, CompoundLoadError>>()?;
            self.insert(Compound {
                id,
                chem_class: entry.chem_class,
                one_letter_code: entry.one_letter_code,
                atom_names: entry.atoms,
                bonds,
            });
        }
        debug!("Loaded {} compounds from {}", count, path.display());
        Ok(count)
    }

    /// Merges a flat `id,chem_class,one_letter_code,atoms` table into the library.
    pub fn load_csv(&mut self, path: &Path) -> Result<usize, CompoundLoadError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| CompoundLoadError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;

        let mut count = 0;
        for result in reader.deserialize::<CompoundRow>() {
            let row = result.map_err(|e| CompoundLoadError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
            self.insert(Compound {
                id: row.id,
                chem_class: row.chem_class,
                one_letter_code: row.one_letter_code,
                atom_names: row.atoms.split_whitespace().map(str::to_string).collect(),
                bonds: Vec::new(),
            });
            count += 1;
        }
        debug!("Loaded {} compounds from {}", count, path.display());
        Ok(count)
    }
}

impl CompoundLibrary for CompoundLib {
    fn find_compound(&self, id: &str) -> Option<&Compound> {
        self.compounds.get(id)
    }
}
