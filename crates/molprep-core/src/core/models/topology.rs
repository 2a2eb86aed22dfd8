use super::ids::AtomId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bond order as stored in connection-table bond blocks.
///
/// The discriminants are the on-disk codes. `Dative` (code 9) is the coordination
/// bond extension written by several toolkits; it is not part of the base V2000 format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BondOrder {
    #[default]
    Single = 1,
    Double = 2,
    Triple = 3,
    Aromatic = 4,
    Dative = 9,
}

impl BondOrder {
    /// Decodes an on-disk bond type code.
    ///
    /// Query bond types (5-8) and anything else unknown yield `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Triple),
            4 => Some(Self::Aromatic),
            9 => Some(Self::Dative),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Error)]
#[error("Invalid bond order string")]
pub struct ParseBondOrderError;

impl FromStr for BondOrder {
    type Err = ParseBondOrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "s" | "single" | "sing" => Ok(Self::Single),
            "2" | "d" | "double" | "doub" => Ok(Self::Double),
            "3" | "t" | "triple" | "trip" => Ok(Self::Triple),
            "4" | "ar" | "arom" | "aromatic" => Ok(Self::Aromatic),
            "9" | "dative" | "coordination" | "metalc" => Ok(Self::Dative),
            _ => Err(ParseBondOrderError),
        }
    }
}

impl fmt::Display for BondOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Single => "Single",
                Self::Double => "Double",
                Self::Triple => "Triple",
                Self::Aromatic => "Aromatic",
                Self::Dative => "Dative",
            }
        )
    }
}

/// A bond between two atoms. The pair is ordered: for dative bonds `atom1_id` is
/// the donor as it appeared in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1_id: AtomId,
    pub atom2_id: AtomId,
    pub order: BondOrder,
}

impl Bond {
    pub fn new(atom1_id: AtomId, atom2_id: AtomId, order: BondOrder) -> Self {
        Self {
            atom1_id,
            atom2_id,
            order,
        }
    }

    pub fn contains(&self, atom_id: AtomId) -> bool {
        self.atom1_id == atom_id || self.atom2_id == atom_id
    }

    /// Returns the bonded partner of `atom_id`, if the bond contains it.
    pub fn partner(&self, atom_id: AtomId) -> Option<AtomId> {
        if self.atom1_id == atom_id {
            Some(self.atom2_id)
        } else if self.atom2_id == atom_id {
            Some(self.atom1_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn dummy_atom_id(n: u64) -> AtomId {
        AtomId::from(KeyData::from_ffi(n))
    }

    #[test]
    fn bond_order_codes_match_connection_table_values() {
        assert_eq!(BondOrder::Single.code(), 1);
        assert_eq!(BondOrder::Double.code(), 2);
        assert_eq!(BondOrder::Triple.code(), 3);
        assert_eq!(BondOrder::Aromatic.code(), 4);
        assert_eq!(BondOrder::Dative.code(), 9);
    }

    #[test]
    fn from_code_rejects_query_and_unknown_types() {
        assert_eq!(BondOrder::from_code(9), Some(BondOrder::Dative));
        for code in [0, 5, 6, 7, 8, 10, 255] {
            assert_eq!(BondOrder::from_code(code), None, "code {code}");
        }
    }

    #[test]
    fn bond_order_from_str_parses_valid_strings() {
        assert_eq!("1".parse::<BondOrder>().unwrap(), BondOrder::Single);
        assert_eq!("DOUB".parse::<BondOrder>().unwrap(), BondOrder::Double);
        assert_eq!("T".parse::<BondOrder>().unwrap(), BondOrder::Triple);
        assert_eq!("arom".parse::<BondOrder>().unwrap(), BondOrder::Aromatic);
        assert_eq!("metalc".parse::<BondOrder>().unwrap(), BondOrder::Dative);
        assert!("quadruple".parse::<BondOrder>().is_err());
        assert!("".parse::<BondOrder>().is_err());
    }

    #[test]
    fn bond_order_default_is_single() {
        assert_eq!(BondOrder::default(), BondOrder::Single);
        assert_eq!(BondOrder::Dative.to_string(), "Dative");
    }

    #[test]
    fn bond_partner_resolves_both_directions() {
        let a1 = dummy_atom_id(1);
        let a2 = dummy_atom_id(2);
        let unrelated = dummy_atom_id(3);
        let bond = Bond::new(a1, a2, BondOrder::Dative);
        assert!(bond.contains(a1));
        assert!(bond.contains(a2));
        assert!(!bond.contains(unrelated));
        assert_eq!(bond.partner(a1), Some(a2));
        assert_eq!(bond.partner(a2), Some(a1));
        assert_eq!(bond.partner(unrelated), None);
    }
}
