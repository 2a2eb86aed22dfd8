use super::ids::{AtomId, ChainId};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chemical class of a residue as defined by the chemical component dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ChemClass {
    Peptide,
    DnaLinking,
    RnaLinking,
    NonPolymer,
    Water,
    #[default]
    Unknown,
}

impl ChemClass {
    pub fn is_peptide(self) -> bool {
        self == ChemClass::Peptide
    }

    pub fn is_nucleotide(self) -> bool {
        matches!(self, ChemClass::DnaLinking | ChemClass::RnaLinking)
    }
}

#[derive(Debug, Error)]
#[error("Invalid chemical class string: '{0}'")]
pub struct ParseChemClassError(pub String);

impl FromStr for ChemClass {
    type Err = ParseChemClassError;

    /// Accepts the short names used in compound tables as well as the
    /// `_chem_comp.type` values of the component dictionary.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "peptide" => Ok(ChemClass::Peptide),
            "dna" | "dna-linking" => Ok(ChemClass::DnaLinking),
            "rna" | "rna-linking" => Ok(ChemClass::RnaLinking),
            "non-polymer" | "nonpolymer" | "ligand" => Ok(ChemClass::NonPolymer),
            "water" => Ok(ChemClass::Water),
            "unknown" | "other" => Ok(ChemClass::Unknown),
            _ if lowered.contains("peptide") => Ok(ChemClass::Peptide),
            _ if lowered.starts_with("dna") => Ok(ChemClass::DnaLinking),
            _ if lowered.starts_with("rna") => Ok(ChemClass::RnaLinking),
            _ => Err(ParseChemClassError(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChemClass {
    type Error = ParseChemClassError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ChemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ChemClass::Peptide => "peptide",
                ChemClass::DnaLinking => "dna-linking",
                ChemClass::RnaLinking => "rna-linking",
                ChemClass::NonPolymer => "non-polymer",
                ChemClass::Water => "water",
                ChemClass::Unknown => "unknown",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub residue_number: isize,                   // Residue sequence number from source file
    pub insertion_code: Option<char>,            // Insertion code, if any
    pub name: String,                            // Name of the residue (e.g., "ALA", "UNK")
    pub chain_id: ChainId,                       // ID of the parent chain
    pub chem_class: ChemClass,                   // Assigned by the rule-based processor
    pub one_letter_code: Option<char>,           // Assigned by the rule-based processor
    pub(crate) atoms: Vec<AtomId>,               // Atoms belonging to this residue, in file order
    atom_name_map: HashMap<String, Vec<AtomId>>, // Atom name -> IDs (names may repeat)
}

impl Residue {
    pub(crate) fn new(residue_number: isize, name: &str, chain_id: ChainId) -> Self {
        Self {
            residue_number,
            insertion_code: None,
            name: name.to_string(),
            chain_id,
            chem_class: ChemClass::Unknown,
            one_letter_code: None,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.push(atom_id);
        self.atom_name_map
            .entry(atom_name.to_string())
            .or_default()
            .push(atom_id);
    }

    pub(crate) fn remove_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.retain(|&id| id != atom_id);
        if let Some(ids) = self.atom_name_map.get_mut(atom_name) {
            ids.retain(|&id| id != atom_id);
            if ids.is_empty() {
                self.atom_name_map.remove(atom_name);
            }
        }
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn get_atom_ids_by_name(&self, name: &str) -> Option<&[AtomId]> {
        self.atom_name_map.get(name).map(|ids| ids.as_slice())
    }

    /// Returns the first atom carrying `name`.
    pub fn get_first_atom_id_by_name(&self, name: &str) -> Option<AtomId> {
        self.get_atom_ids_by_name(name)
            .and_then(|ids| ids.first().copied())
    }
}
