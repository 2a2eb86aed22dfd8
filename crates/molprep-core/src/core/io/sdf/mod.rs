//! Connection-table (SDF / MDL molfile) codec.
//!
//! Both the fixed-column V2000 dialect and the keyword-based V3000 dialect are read.
//! Every record (molecule) becomes one chain named `NNNNN_<record name>` holding a
//! single residue `UNK` numbered 1; atoms are named by their 1-based position in
//! the record.
//!
//! Charges come from the `M  CHG` block when a record has one. In that case the
//! legacy per-atom charge column is ignored for every atom, listed or not. Bond
//! order 9 (dative) is a toolkit extension and is only accepted by fault-tolerant
//! reads.

mod reader;
mod writer;

use crate::core::error::ErrorCategory;
use crate::core::io::profile::{ProfileError, Tolerance};
use crate::core::io::traits::MolecularFile;
use crate::core::models::chain::ChainName;
use crate::core::models::system::MolecularSystem;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Largest charge magnitude the writer accepts.
pub const MAX_ABS_CHARGE: i32 = 3;

/// Largest atom or bond count a V2000 counts line can hold.
pub const V2000_MAX_COUNT: usize = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SdfDialect {
    /// V3000 when a record needs it (dative bonds, counts above 999), else V2000.
    #[default]
    Auto,
    V2000,
    V3000,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdfReadOptions {
    pub tolerance: Tolerance,
}

impl SdfReadOptions {
    pub fn fault_tolerant(flag: bool) -> Self {
        Self {
            tolerance: Tolerance::Explicit(flag),
        }
    }

    pub fn profile(name: &str) -> Self {
        Self {
            tolerance: Tolerance::profile(name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SdfWriteOptions {
    pub dialect: SdfDialect,
}

/// One `> <KEY>` data item following the connection table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub key: String,
    pub value: String,
}

/// Header lines and data items of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdfRecordInfo {
    /// Chain the record was loaded into.
    pub chain: ChainName,
    pub name: String,
    pub program: String,
    pub comment: String,
    pub data_items: Vec<DataItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdfMetadata {
    pub records: Vec<SdfRecordInfo>,
}

impl SdfMetadata {
    pub fn record_for(&self, chain: &ChainName) -> Option<&SdfRecordInfo> {
        self.records.iter().find(|record| &record.chain == chain)
    }
}

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error in record {record} on line {line}: {kind}")]
    Parse {
        record: usize,
        line: usize,
        kind: SdfParseErrorKind,
    },
    #[error("Atom '{atom}' in chain '{chain}' has charge {charge}, outside the writable range [-3, 3]")]
    ChargeOutOfRange {
        chain: String,
        atom: String,
        charge: i32,
    },
    #[error("Chain '{chain}' has {atoms} atoms and {bonds} bonds, too many for a V2000 counts line")]
    TooLargeForV2000 {
        chain: String,
        atoms: usize,
        bonds: usize,
    },
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SdfParseErrorKind {
    #[error("Record ends before the counts line")]
    MissingHeader,
    #[error("Unsupported connection table version '{0}'")]
    UnsupportedVersion(String),
    #[error("Invalid integer in {field} (value: '{value}')")]
    InvalidInt { field: String, value: String },
    #[error("Invalid float in {field} (value: '{value}')")]
    InvalidFloat { field: String, value: String },
    #[error("Unrecognized legacy charge code {0}")]
    InvalidChargeCode(i32),
    #[error("Charge override {0} is outside [-3, 3]")]
    ChargeOutOfRange(i32),
    #[error("Atom index {index} is outside 1..={count}")]
    AtomIndexOutOfRange { index: usize, count: usize },
    #[error("Unrecognized bond order code {0}")]
    InvalidBondOrder(i64),
    #[error("Bond {bond} has order 9 (dative), which is only accepted in fault tolerant mode")]
    DativeBondNotAllowed { bond: usize },
    #[error("Record ends after {found} of {expected} {block} lines")]
    Truncated {
        block: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Missing 'M  END' line")]
    MissingEnd,
    #[error("Malformed V3000 line: {0}")]
    MalformedV3000(String),
    #[error("Malformed property line: {0}")]
    MalformedProperty(String),
}

impl SdfError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SdfError::Io(_) | SdfError::Parse { .. } => ErrorCategory::Format,
            SdfError::ChargeOutOfRange { .. } | SdfError::TooLargeForV2000 { .. } => {
                ErrorCategory::Range
            }
            SdfError::Profile(_) => ErrorCategory::Lookup,
        }
    }
}

pub struct SdfFile;

impl MolecularFile for SdfFile {
    type Metadata = SdfMetadata;
    type ReadOptions = SdfReadOptions;
    type WriteOptions = SdfWriteOptions;
    type Error = SdfError;

    fn read_from(
        reader: &mut impl BufRead,
        options: &Self::ReadOptions,
    ) -> Result<(MolecularSystem, Self::Metadata), Self::Error> {
        let fault_tolerant = options.tolerance.resolve()?;
        reader::read_records(reader, fault_tolerant)
    }

    fn write_to(
        system: &MolecularSystem,
        metadata: &Self::Metadata,
        options: &Self::WriteOptions,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        writer::write_records(system, metadata, options.dialect, writer)
    }

    fn write_system_to(
        system: &MolecularSystem,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        Self::write_to(
            system,
            &SdfMetadata::default(),
            &SdfWriteOptions::default(),
            writer,
        )
    }
}

/// Decodes a legacy V2000 charge column value.
///
/// Code 4 flags a doublet radical and carries no charge.
pub fn charge_from_legacy_code(code: i32) -> Option<i32> {
    match code {
        0 => Some(0),
        1 => Some(3),
        2 => Some(2),
        3 => Some(1),
        4 => Some(0),
        5 => Some(-1),
        6 => Some(-2),
        7 => Some(-3),
        _ => None,
    }
}

/// Encodes a charge in [-3, 3] as a legacy V2000 charge column value.
pub fn legacy_code_from_charge(charge: i32) -> Option<i32> {
    match charge {
        0 => Some(0),
        -3..=-1 | 1..=3 => Some(4 - charge),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::profile::{DefaultProfileGuard, SLOPPY_PROFILE};
    use crate::core::logging::capture::{capture, has_event};
    use crate::core::models::atom::Atom;
    use crate::core::models::ids::AtomId;
    use crate::core::models::topology::BondOrder;
    use serial_test::serial;
    use tracing::Level;

    type AtomSpec<'a> = (&'a str, f64, f64, f64, i32);

    fn v2000_record(
        name: &str,
        atoms: &[AtomSpec],
        bonds: &[(usize, usize, u8)],
        properties: &[&str],
    ) -> String {
        let mut text = format!(
            "{}\n  test\n\n{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000\n",
            name,
            atoms.len(),
            bonds.len()
        );
        for (element, x, y, z, code) in atoms {
            text += &format!(
                "{:>10.4}{:>10.4}{:>10.4} {:<3} 0{:>3}  0  0  0  0  0  0  0  0  0  0\n",
                x, y, z, element, code
            );
        }
        for (a1, a2, order) in bonds {
            text += &format!("{:>3}{:>3}{:>3}  0\n", a1, a2, order);
        }
        for line in properties {
            text += line;
            text.push('\n');
        }
        text += "M  END\n$$$$\n";
        text
    }

    const RING_ATOMS: [AtomSpec<'static>; 6] = [
        ("C", 0.0, 0.0, 0.0, 0),
        ("C", 1.4, 0.0, 0.0, 0),
        ("C", 2.1, 1.2124, 0.0, 0),
        ("C", 1.4, 2.4249, 0.0, 0),
        ("C", 0.0, 2.4249, 0.0, 0),
        ("N", -0.7, 1.2124, 0.0, 0),
    ];
    const RING_BONDS: [(usize, usize, u8); 6] =
        [(1, 2, 1), (2, 3, 2), (3, 4, 1), (4, 5, 2), (5, 6, 1), (6, 1, 2)];

    fn simple_ligand() -> String {
        v2000_record("Simple Ligand", &RING_ATOMS, &RING_BONDS, &[])
    }

    fn dative_ligand() -> String {
        let mut bonds = RING_BONDS.to_vec();
        bonds[4] = (5, 6, 9);
        v2000_record("Simple Ligand", &RING_ATOMS, &bonds, &[])
    }

    fn strict() -> SdfReadOptions {
        SdfReadOptions::fault_tolerant(false)
    }

    fn read(text: &str, options: &SdfReadOptions) -> Result<(MolecularSystem, SdfMetadata), SdfError> {
        SdfFile::read_from_str(text, options)
    }

    fn find_atom(system: &MolecularSystem, chain: &str, name: &str) -> (AtomId, Atom) {
        let chain_id = system.find_chain_by_name(&ChainName::new(chain)).unwrap();
        let residue_id = system.find_residue(chain_id, 1, None).unwrap();
        let atom_id = system
            .residue(residue_id)
            .unwrap()
            .get_first_atom_id_by_name(name)
            .unwrap();
        (atom_id, system.atom(atom_id).unwrap().clone())
    }

    fn first_bond_order(system: &MolecularSystem, chain: &str, name: &str) -> BondOrder {
        let (atom_id, _) = find_atom(system, chain, name);
        system.bonds_of(atom_id).next().unwrap().order
    }

    #[test]
    fn legacy_charge_code_table_matches_format() {
        let expected = [(0, 0), (1, 3), (2, 2), (3, 1), (4, 0), (5, -1), (6, -2), (7, -3)];
        for (code, charge) in expected {
            assert_eq!(charge_from_legacy_code(code), Some(charge), "code {}", code);
        }
        assert_eq!(charge_from_legacy_code(8), None);
        assert_eq!(charge_from_legacy_code(-1), None);

        for charge in -3..=3 {
            let code = legacy_code_from_charge(charge).unwrap();
            assert_eq!(charge_from_legacy_code(code), Some(charge));
        }
        assert_eq!(legacy_code_from_charge(4), None);
        assert_eq!(legacy_code_from_charge(-4), None);
    }

    #[test]
    fn reads_v2000_record_into_named_chain() {
        let (system, metadata) = read(&simple_ligand(), &strict()).unwrap();

        assert_eq!(system.chain_count(), 1);
        assert_eq!(system.atom_count(), 6);
        assert_eq!(system.bonds().len(), 6);

        let chain_id = system
            .find_chain_by_name(&ChainName::new("00001_Simple Ligand"))
            .unwrap();
        let residue_id = system.find_residue(chain_id, 1, None).unwrap();
        assert_eq!(system.residue(residue_id).unwrap().name, "UNK");

        let (_, nitrogen) = find_atom(&system, "00001_Simple Ligand", "6");
        assert_eq!(nitrogen.element, "N");
        assert_eq!(nitrogen.formal_charge, 0);
        assert!((nitrogen.position.x + 0.7).abs() < 1e-6);

        assert_eq!(first_bond_order(&system, "00001_Simple Ligand", "2"), BondOrder::Single);
        assert_eq!(metadata.records[0].name, "Simple Ligand");
    }

    #[test]
    fn each_record_becomes_its_own_chain() {
        let text = format!(
            "{}{}",
            simple_ligand(),
            v2000_record("Water", &[("O", 0.0, 0.0, 0.0, 0)], &[], &[])
        );
        let (system, metadata) = read(&text, &strict()).unwrap();

        let names: Vec<String> = system.chains_iter().map(|(_, c)| c.name.to_string()).collect();
        assert_eq!(names, vec!["00001_Simple Ligand", "00002_Water"]);
        assert_eq!(system.atom_count(), 7);
        assert_eq!(metadata.records.len(), 2);
    }

    #[test]
    fn crlf_line_endings_do_not_shift_columns() {
        let mut atoms = RING_ATOMS;
        atoms[5].4 = 3;
        let text = v2000_record("Simple Ligand", &atoms, &RING_BONDS, &[]).replace('\n', "\r\n");

        let (system, _) = read(&text, &strict()).unwrap();
        assert_eq!(system.atom_count(), 6);
        assert_eq!(system.bonds().len(), 6);
        let (_, nitrogen) = find_atom(&system, "00001_Simple Ligand", "6");
        assert_eq!(nitrogen.element, "N");
        assert_eq!(nitrogen.formal_charge, 1);
    }

    #[test]
    fn legacy_charge_codes_are_decoded() {
        let atoms: Vec<AtomSpec> = (0..8).map(|code| ("C", code as f64, 0.0, 0.0, code)).collect();
        let (system, _) = read(&v2000_record("Charges", &atoms, &[], &[]), &strict()).unwrap();

        let charges: Vec<i32> = (1..=8)
            .map(|i| find_atom(&system, "00001_Charges", &i.to_string()).1.formal_charge)
            .collect();
        assert_eq!(charges, vec![0, 3, 2, 1, 0, -1, -2, -3]);
    }

    #[test]
    fn unknown_legacy_charge_code_is_a_format_error() {
        let text = v2000_record("Bad", &[("C", 0.0, 0.0, 0.0, 8)], &[], &[]);
        let err = read(&text, &strict()).unwrap_err();
        assert!(matches!(
            err,
            SdfError::Parse {
                record: 1,
                line: 5,
                kind: SdfParseErrorKind::InvalidChargeCode(8)
            }
        ));
    }

    #[test]
    fn charge_override_block_supersedes_legacy_codes() {
        let atoms = [
            ("N", 0.0, 0.0, 0.0, 0),
            ("C", 1.4, 0.0, 0.0, 0),
            ("O", 2.1, 1.2, 0.0, 3),
            ("C", 1.4, 2.4, 0.0, 0),
            ("C", 0.0, 2.4, 0.0, 0),
            ("Cl", -0.7, 1.2, 0.0, 0),
        ];
        let text = v2000_record(
            "Simple Ligand",
            &atoms,
            &RING_BONDS,
            &["M  CHG  2   1   1   6  -1"],
        );
        let (system, _) = read(&text, &strict()).unwrap();

        assert_eq!(find_atom(&system, "00001_Simple Ligand", "1").1.formal_charge, 1);
        assert_eq!(find_atom(&system, "00001_Simple Ligand", "6").1.formal_charge, -1);
        assert_eq!(find_atom(&system, "00001_Simple Ligand", "6").1.element, "Cl");
        // Legacy code 3 on the oxygen is ignored once an override block is present.
        assert_eq!(find_atom(&system, "00001_Simple Ligand", "3").1.formal_charge, 0);
    }

    #[test]
    fn charge_override_outside_range_is_rejected() {
        let text = v2000_record("Bad", &RING_ATOMS, &RING_BONDS, &["M  CHG  1   1   4"]);
        let err = read(&text, &strict()).unwrap_err();
        assert!(matches!(
            err,
            SdfError::Parse {
                kind: SdfParseErrorKind::ChargeOutOfRange(4),
                ..
            }
        ));
    }

    #[test]
    fn charges_round_trip_through_writer() {
        let (mut system, _) = read(&simple_ligand(), &strict()).unwrap();

        for charge in -3..=3 {
            let (atom_id, _) = find_atom(&system, "00001_Simple Ligand", "6");
            system.atom_mut(atom_id).unwrap().formal_charge = charge;

            let text = SdfFile::write_system_to_string(&system).unwrap();
            assert!(text.contains("V2000"));
            system = read(&text, &strict()).unwrap().0;

            assert_eq!(
                find_atom(&system, "00001_Simple Ligand", "6").1.formal_charge,
                charge
            );
        }
    }

    #[test]
    fn writing_out_of_range_charge_fails() {
        for charge in [4, -4] {
            let (mut system, _) = read(&simple_ligand(), &strict()).unwrap();
            let (atom_id, _) = find_atom(&system, "00001_Simple Ligand", "6");
            system.atom_mut(atom_id).unwrap().formal_charge = charge;

            let err = SdfFile::write_system_to_string(&system).unwrap_err();
            assert!(matches!(
                err,
                SdfError::ChargeOutOfRange { charge: c, ref atom, .. } if c == charge && atom == "6"
            ));
            assert_eq!(err.category(), ErrorCategory::Range);
        }
    }

    #[test]
    fn bond_orders_round_trip_through_v2000() {
        let text = v2000_record(
            "Orders",
            &RING_ATOMS[..4],
            &[(1, 2, 1), (2, 3, 2), (3, 4, 3), (4, 1, 4)],
            &[],
        );
        let (system, _) = read(&text, &strict()).unwrap();
        let written = SdfFile::write_system_to_string(&system).unwrap();
        let (reread, _) = read(&written, &strict()).unwrap();

        let orders: Vec<BondOrder> = reread.bonds().iter().map(|b| b.order).collect();
        assert_eq!(
            orders,
            vec![BondOrder::Single, BondOrder::Double, BondOrder::Triple, BondOrder::Aromatic]
        );
    }

    #[test]
    #[serial]
    fn dative_bond_requires_fault_tolerance() {
        let text = dative_ligand();

        let err = read(&text, &SdfReadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SdfError::Parse {
                record: 1,
                kind: SdfParseErrorKind::DativeBondNotAllowed { bond: 5 },
                ..
            }
        ));
        assert_eq!(err.category(), ErrorCategory::Format);
        assert!(read(&text, &strict()).is_err());

        let (result, events) = capture(|| read(&text, &SdfReadOptions::fault_tolerant(true)));
        let (system, _) = result.unwrap();
        let (atom_id, _) = find_atom(&system, "00001_Simple Ligand", "5");
        assert!(system.bonds_of(atom_id).any(|b| b.order == BondOrder::Dative));
        assert!(has_event(&events, Level::ERROR, "dative"));

        let (result, events) = capture(|| read(&text, &SdfReadOptions::profile(SLOPPY_PROFILE)));
        assert!(result.is_ok());
        assert!(has_event(&events, Level::ERROR, "dative"));

        {
            let _guard = DefaultProfileGuard::set(SLOPPY_PROFILE).unwrap();
            let (system, _) = read(&text, &SdfReadOptions::default()).unwrap();
            assert_eq!(
                system.bonds().iter().filter(|b| b.order == BondOrder::Dative).count(),
                1
            );
        }

        assert!(read(&text, &SdfReadOptions::default()).is_err());
    }

    #[test]
    fn v2000_writer_downgrades_dative_bonds_with_warning() {
        let (system, _) = read(&dative_ligand(), &SdfReadOptions::fault_tolerant(true)).unwrap();

        let options = SdfWriteOptions {
            dialect: SdfDialect::V2000,
        };
        let (written, events) = capture(|| {
            let mut buffer = Vec::new();
            SdfFile::write_to(&system, &SdfMetadata::default(), &options, &mut buffer).map(|_| buffer)
        });
        let written = String::from_utf8(written.unwrap()).unwrap();
        assert!(has_event(&events, Level::WARN, "dative"));
        assert!(written.contains("V2000"));

        let (reread, _) = read(&written, &strict()).unwrap();
        assert_eq!(reread.bonds().len(), 6);
        let (atom5, _) = find_atom(&reread, "00001_Simple Ligand", "5");
        let (atom6, _) = find_atom(&reread, "00001_Simple Ligand", "6");
        let bond = reread
            .bonds()
            .iter()
            .find(|b| b.contains(atom5) && b.contains(atom6))
            .unwrap();
        assert_eq!(bond.order, BondOrder::Single);
    }

    #[test]
    fn auto_dialect_preserves_dative_bonds_through_v3000() {
        let (system, _) = read(&dative_ligand(), &SdfReadOptions::fault_tolerant(true)).unwrap();

        let written = SdfFile::write_system_to_string(&system).unwrap();
        assert!(written.contains("V3000"));

        assert!(read(&written, &strict()).is_err());
        let (reread, _) = read(&written, &SdfReadOptions::fault_tolerant(true)).unwrap();
        let (atom5, _) = find_atom(&reread, "00001_Simple Ligand", "5");
        let (atom6, _) = find_atom(&reread, "00001_Simple Ligand", "6");
        let bond = reread
            .bonds()
            .iter()
            .find(|b| b.contains(atom5) && b.contains(atom6))
            .unwrap();
        assert_eq!(bond.order, BondOrder::Dative);
    }

    const V3000_RECORD: &str = r#"BCL fragment
  test

  0  0  0     0  0            999 V3000
M  V30 BEGIN CTAB
M  V30 COUNTS 3 2 0 0 0
M  V30 BEGIN ATOM
M  V30 1 N 0.0000 0.0000 0.0000 0 CHG=1
M  V30 2 Mg 2.0000 0.0000 0.0000 0 -
M  V30 CHG=2
M  V30 3 O -1.0000 1.0000 0.0000 0 CHG=-1
M  V30 END ATOM
M  V30 BEGIN BOND
M  V30 1 9 1 2
M  V30 2 1 1 3
M  V30 END BOND
M  V30 END CTAB
M  END
> <SOURCE>
hand written

$$$$
"#;

    #[test]
    fn reads_v3000_with_continuation_lines() {
        let (system, metadata) = read(V3000_RECORD, &SdfReadOptions::fault_tolerant(true)).unwrap();

        assert_eq!(system.atom_count(), 3);
        let (mg_id, mg) = find_atom(&system, "00001_BCL fragment", "2");
        assert_eq!(mg.element, "Mg");
        assert_eq!(mg.formal_charge, 2);
        assert_eq!(find_atom(&system, "00001_BCL fragment", "3").1.formal_charge, -1);

        let (n_id, _) = find_atom(&system, "00001_BCL fragment", "1");
        let bond = system.bonds_of(mg_id).next().unwrap();
        assert_eq!(bond.order, BondOrder::Dative);
        assert_eq!(bond.atom1_id, n_id);

        assert_eq!(metadata.records[0].data_items[0].key, "SOURCE");
        assert_eq!(metadata.records[0].data_items[0].value, "hand written");
    }

    #[test]
    fn v3000_charge_outside_range_is_rejected() {
        let text = V3000_RECORD
            .replace("M  V30 1 9 1 2", "M  V30 1 1 1 2")
            .replace("CHG=-1", "CHG=5");
        let err = read(&text, &strict()).unwrap_err();
        assert!(matches!(
            err,
            SdfError::Parse {
                record: 1,
                line: 11,
                kind: SdfParseErrorKind::ChargeOutOfRange(5)
            }
        ));
    }

    #[test]
    fn missing_end_line_fails_strict_reads_in_both_dialects() {
        let v2000 = simple_ligand().replace("M  END\n", "");
        let v3000 = V3000_RECORD
            .replace("M  V30 1 9 1 2", "M  V30 1 1 1 2")
            .replace("M  END\n", "");
        for text in [&v2000, &v3000] {
            assert!(matches!(
                read(text, &strict()).unwrap_err(),
                SdfError::Parse {
                    kind: SdfParseErrorKind::MissingEnd,
                    ..
                }
            ));

            let (result, events) = capture(|| read(text, &SdfReadOptions::fault_tolerant(true)));
            let (system, _) = result.unwrap();
            assert_eq!(system.chain_count(), 1);
            assert!(has_event(&events, Level::WARN, "no 'M  END'"));
        }
    }

    #[test]
    fn v3000_dative_bond_fails_in_strict_mode() {
        let err = read(V3000_RECORD, &strict()).unwrap_err();
        assert!(matches!(
            err,
            SdfError::Parse {
                line: 14,
                kind: SdfParseErrorKind::DativeBondNotAllowed { bond: 1 },
                ..
            }
        ));
    }

    #[test]
    fn explicit_v3000_output_round_trips() {
        let (system, _) = read(&simple_ligand(), &strict()).unwrap();
        let options = SdfWriteOptions {
            dialect: SdfDialect::V3000,
        };
        let mut buffer = Vec::new();
        SdfFile::write_to(&system, &SdfMetadata::default(), &options, &mut buffer).unwrap();
        let written = String::from_utf8(buffer).unwrap();
        assert!(written.contains("M  V30 BEGIN CTAB"));

        let (reread, _) = read(&written, &strict()).unwrap();
        assert_eq!(reread.atom_count(), 6);
        assert_eq!(reread.bonds().len(), 6);
        assert!(reread.find_chain_by_name(&ChainName::new("00001_Simple Ligand")).is_some());
    }

    #[test]
    fn malformed_record_policy_depends_on_fault_tolerance() {
        let truncated = "Broken\n  test\n\n  3  0  0  0  0  0  0  0  0  0999 V2000\n    0.0000    0.0000    0.0000 C   0  0\n$$$$\n";
        let text = format!(
            "{}{}{}",
            simple_ligand(),
            truncated,
            v2000_record("Water", &[("O", 0.0, 0.0, 0.0, 0)], &[], &[])
        );

        let err = read(&text, &strict()).unwrap_err();
        assert!(matches!(
            err,
            SdfError::Parse {
                record: 2,
                kind: SdfParseErrorKind::Truncated { block: "atom", expected: 3, found: 1 },
                ..
            }
        ));

        let ((system, metadata), events) =
            capture(|| read(&text, &SdfReadOptions::fault_tolerant(true)).unwrap());
        let names: Vec<String> = system.chains_iter().map(|(_, c)| c.name.to_string()).collect();
        assert_eq!(names, vec!["00001_Simple Ligand", "00003_Water"]);
        assert_eq!(metadata.records.len(), 2);
        assert!(has_event(&events, Level::ERROR, "Skipping SDF record 2"));
    }

    #[test]
    fn bond_to_missing_atom_is_rejected() {
        let text = v2000_record("Bad", &RING_ATOMS[..2], &[(1, 3, 1)], &[]);
        let err = read(&text, &strict()).unwrap_err();
        assert!(matches!(
            err,
            SdfError::Parse {
                kind: SdfParseErrorKind::AtomIndexOutOfRange { index: 3, count: 2 },
                ..
            }
        ));
    }

    #[test]
    fn writer_re_emits_record_headers_and_data_items() {
        let text = simple_ligand().replace("M  END\n", "M  END\n> <ID>\nlig-1\n\n> <NOTE>\nfirst\nsecond\n\n");
        let (system, metadata) = read(&text, &strict()).unwrap();
        assert_eq!(metadata.records[0].data_items.len(), 2);

        let mut buffer = Vec::new();
        SdfFile::write_to(&system, &metadata, &SdfWriteOptions::default(), &mut buffer).unwrap();
        let written = String::from_utf8(buffer).unwrap();
        assert!(written.starts_with("Simple Ligand\n  test\n"));

        let (_, reread) = read(&written, &strict()).unwrap();
        assert_eq!(reread.records[0].data_items, metadata.records[0].data_items);
        assert_eq!(reread.records[0].data_items[1].value, "first\nsecond");
    }
}
