use phf::{Map, Set, phf_map, phf_set};

static ONE_LETTER_CODES: Map<&'static str, char> = phf_map! {
    "ALA" => 'A', "ARG" => 'R', "ASN" => 'N', "ASP" => 'D', "CYS" => 'C',
    "GLN" => 'Q', "GLU" => 'E', "GLY" => 'G', "HIS" => 'H', "ILE" => 'I',
    "LEU" => 'L', "LYS" => 'K', "MET" => 'M', "PHE" => 'F', "PRO" => 'P',
    "SER" => 'S', "THR" => 'T', "TRP" => 'W', "TYR" => 'Y', "VAL" => 'V',
    "SEC" => 'U', "PYL" => 'O', "MSE" => 'M',
    "A" => 'A', "C" => 'C', "G" => 'G', "U" => 'U', "I" => 'I',
    "DA" => 'A', "DC" => 'C', "DG" => 'G', "DT" => 'T', "DU" => 'U', "DI" => 'I',
};

static WATER_NAMES: Set<&'static str> = phf_set! {
    "HOH", "WAT", "H2O", "DOD", "SOL", "TIP3",
};

// Single-bond covalent radii in Angstrom.
static COVALENT_RADII: Map<&'static str, f64> = phf_map! {
    "H" => 0.31, "D" => 0.31, "B" => 0.84, "C" => 0.76, "N" => 0.71, "O" => 0.66,
    "F" => 0.57, "Na" => 1.66, "Mg" => 1.41, "Al" => 1.21, "Si" => 1.11, "P" => 1.07,
    "S" => 1.05, "Cl" => 1.02, "K" => 2.03, "Ca" => 1.76, "Mn" => 1.39, "Fe" => 1.32,
    "Co" => 1.26, "Ni" => 1.24, "Cu" => 1.32, "Zn" => 1.22, "Se" => 1.20, "Br" => 1.20,
    "I" => 1.39, "Pt" => 1.36, "Hg" => 1.32,
};

/// One-letter code of a standard amino acid or nucleotide.
pub fn one_letter_code(residue_name: &str) -> Option<char> {
    ONE_LETTER_CODES.get(residue_name.trim()).copied()
}

pub fn is_water(residue_name: &str) -> bool {
    WATER_NAMES.contains(residue_name.trim())
}

/// Covalent radius for a normalized element symbol.
pub fn covalent_radius(element: &str) -> Option<f64> {
    COVALENT_RADII.get(element).copied()
}
