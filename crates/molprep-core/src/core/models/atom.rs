use super::ids::ResidueId;
use nalgebra::Point3;

/// Represents an atom in a molecular structure with the attributes the codecs care about.
///
/// The element symbol is stored normalized (first letter upper case, remaining letters
/// lower case) so that lookups such as hydrogen detection or covalent radii do not have
/// to deal with the mixed casing found in real files.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The name of the atom (e.g., "CA", "N", or "6" for connection-table atoms).
    pub name: String,
    /// The ID of the parent residue this atom belongs to.
    pub residue_id: ResidueId,
    /// Normalized element symbol (e.g., "C", "Cl", "Mg").
    pub element: String,
    /// Formal integer charge in elementary charge units.
    pub formal_charge: i32,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// Whether the atom originated from a hetero record.
    pub is_hetatm: bool,
}

impl Atom {
    /// Creates a new uncharged `Atom`.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `element` - Element symbol in any casing; it is normalized on construction.
    /// * `residue_id` - The ID of the residue this atom belongs to.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, element: &str, residue_id: ResidueId, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            residue_id,
            element: normalize_element(element),
            formal_charge: 0,
            position,
            is_hetatm: false,
        }
    }

    /// Returns `true` for hydrogen and deuterium atoms.
    pub fn is_hydrogen(&self) -> bool {
        matches!(self.element.as_str(), "H" | "D")
    }
}

/// Normalizes an element symbol to the conventional capitalization.
pub fn normalize_element(symbol: &str) -> String {
    let mut chars = symbol.trim().chars();
    match chars.next() {
        Some(first) => {
            let mut normalized = first.to_ascii_uppercase().to_string();
            normalized.extend(chars.map(|c| c.to_ascii_lowercase()));
            normalized
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::ResidueId;

    #[test]
    fn new_atom_has_expected_default_fields() {
        let residue_id = ResidueId::default();
        let atom = Atom::new("CA", "C", residue_id, Point3::new(1.0, 2.0, 3.0));

        assert_eq!(atom.name, "CA");
        assert_eq!(atom.element, "C");
        assert_eq!(atom.residue_id, residue_id);
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.formal_charge, 0);
        assert!(!atom.is_hetatm);
    }

    #[test]
    fn element_symbols_are_normalized() {
        assert_eq!(normalize_element("CL"), "Cl");
        assert_eq!(normalize_element(" mg "), "Mg");
        assert_eq!(normalize_element("c"), "C");
        assert_eq!(normalize_element(""), "");
    }

    #[test]
    fn hydrogen_and_deuterium_are_detected() {
        let id = ResidueId::default();
        assert!(Atom::new("H1", "H", id, Point3::origin()).is_hydrogen());
        assert!(Atom::new("D1", "d", id, Point3::origin()).is_hydrogen());
        assert!(!Atom::new("HG", "Hg", id, Point3::origin()).is_hydrogen());
        assert!(!Atom::new("N", "N", id, Point3::origin()).is_hydrogen());
    }
}
