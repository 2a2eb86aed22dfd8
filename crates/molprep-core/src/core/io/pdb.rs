use crate::core::io::profile::{ProfileError, Tolerance};
use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::chain::ChainName;
use crate::core::models::ids::{AtomId, ResidueId};
use crate::core::models::system::MolecularSystem;
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdbReadOptions {
    pub tolerance: Tolerance,
}

impl PdbReadOptions {
    pub fn fault_tolerant(flag: bool) -> Self {
        Self {
            tolerance: Tolerance::Explicit(flag),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdbWriteOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdbMetadata {
    /// `HEADER`, `TITLE`, `REMARK` and other records before the first atom, verbatim.
    pub header_lines: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: PdbParseErrorKind,
    },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
    #[error("Invalid charge field '{0}'")]
    InvalidCharge(String),
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

struct AtomRecord<'a> {
    serial: Option<usize>,
    name: &'a str,
    alt_loc: Option<char>,
    residue_name: &'a str,
    chain: String,
    residue_number: isize,
    insertion_code: Option<char>,
    position: Point3<f64>,
    element: String,
    formal_charge: i32,
}

/// Parses the `2+` / `1-` charge columns.
fn parse_charge(field: &str) -> Result<i32, PdbParseErrorKind> {
    if field.is_empty() {
        return Ok(0);
    }
    let invalid = || PdbParseErrorKind::InvalidCharge(field.to_string());
    let (magnitude, sign) = match (field.strip_suffix('+'), field.strip_suffix('-')) {
        (Some(m), _) => (m, 1),
        (_, Some(m)) => (m, -1),
        _ => return Err(invalid()),
    };
    let magnitude: i32 = if magnitude.is_empty() {
        1
    } else {
        magnitude.parse().map_err(|_| invalid())?
    };
    Ok(sign * magnitude)
}

fn parse_atom_line(line: &str) -> Result<AtomRecord<'_>, PdbParseErrorKind> {
    if line.len() < 54 {
        return Err(PdbParseErrorKind::LineTooShort);
    }

    let name = slice_and_trim(line, 12, 16);
    if name.is_empty() {
        return Err(PdbParseErrorKind::MissingRequiredField {
            columns: "13-16".into(),
        });
    }
    let serial_str = slice_and_trim(line, 6, 11);
    // Serials overflow into hybrid encodings in large files; they only matter for CONECT.
    let serial = serial_str.parse::<usize>().ok();

    let res_id_str = slice_and_trim(line, 22, 26);
    let residue_number: isize = res_id_str
        .parse()
        .map_err(|_| PdbParseErrorKind::InvalidInt {
            columns: "23-26".into(),
            value: res_id_str.into(),
        })?;

    let coord = |start: usize, end: usize, columns: &str| -> Result<f64, PdbParseErrorKind> {
        let value = slice_and_trim(line, start, end);
        value.parse().map_err(|_| PdbParseErrorKind::InvalidFloat {
            columns: columns.into(),
            value: value.into(),
        })
    };
    let position = Point3::new(
        coord(30, 38, "31-38")?,
        coord(38, 46, "39-46")?,
        coord(46, 54, "47-54")?,
    );

    let element = match slice_and_trim(line, 76, 78) {
        "" => name
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_string())
            .unwrap_or_default(),
        symbol => symbol.to_string(),
    };

    let chain = match slice_and_trim(line, 21, 22) {
        "" => "A".to_string(),
        id => id.to_string(),
    };

    Ok(AtomRecord {
        serial,
        name,
        alt_loc: slice_and_trim(line, 16, 17).chars().next(),
        residue_name: slice_and_trim(line, 17, 20),
        chain,
        residue_number,
        insertion_code: slice_and_trim(line, 26, 27).chars().next(),
        position,
        element,
        formal_charge: parse_charge(slice_and_trim(line, 78, 80))?,
    })
}

pub struct PdbFile;

impl MolecularFile for PdbFile {
    type Metadata = PdbMetadata;
    type ReadOptions = PdbReadOptions;
    type WriteOptions = PdbWriteOptions;
    type Error = PdbError;

    fn read_from(
        reader: &mut impl BufRead,
        options: &Self::ReadOptions,
    ) -> Result<(MolecularSystem, Self::Metadata), Self::Error> {
        let fault_tolerant = options.tolerance.resolve()?;
        let mut system = MolecularSystem::new();
        let mut metadata = PdbMetadata::default();

        let mut serial_map: HashMap<usize, AtomId> = HashMap::new();
        let mut residue_alt: HashMap<ResidueId, char> = HashMap::new();
        let mut temp_conect: Vec<(usize, usize)> = Vec::new();
        let mut seen_atoms = false;
        let mut first_model_done = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let mut line = line_res?;
            if line.ends_with('\r') {
                line.pop();
            }
            let line_num = line_num + 1;

            let record_type = slice_and_trim(&line, 0, 6);
            match record_type {
                "ATOM" | "HETATM" if !first_model_done => {
                    let record = match parse_atom_line(&line) {
                        Ok(record) => record,
                        Err(kind) if fault_tolerant => {
                            warn!("Skipping {} record on line {}: {}", record_type, line_num, kind);
                            continue;
                        }
                        Err(kind) => {
                            return Err(PdbError::Parse {
                                line: line_num,
                                kind,
                            });
                        }
                    };
                    seen_atoms = true;

                    let chain_id = system.add_chain(ChainName::new(record.chain));
                    let Some(residue_id) = system.add_residue(
                        chain_id,
                        record.residue_number,
                        record.insertion_code,
                        record.residue_name,
                    ) else {
                        continue;
                    };
                    if let Some(alt) = record.alt_loc {
                        if *residue_alt.entry(residue_id).or_insert(alt) != alt {
                            continue;
                        }
                    }

                    let mut atom = Atom::new(record.name, &record.element, residue_id, record.position);
                    atom.formal_charge = record.formal_charge;
                    atom.is_hetatm = record_type == "HETATM";
                    if let Some(atom_id) = system.add_atom_to_residue(residue_id, atom) {
                        if let Some(serial) = record.serial {
                            serial_map.insert(serial, atom_id);
                        }
                    }
                }
                "CONECT" => {
                    let serials: Vec<usize> = [6, 11, 16, 21, 26]
                        .iter()
                        .filter_map(|&start| slice_and_trim(&line, start, start + 5).parse().ok())
                        .collect();
                    if let Some((&first, partners)) = serials.split_first() {
                        for &partner in partners {
                            temp_conect.push((first.min(partner), first.max(partner)));
                        }
                    }
                }
                "ENDMDL" => {
                    if !first_model_done {
                        debug!("Ignoring models after the first (line {})", line_num);
                    }
                    first_model_done = true;
                }
                "END" => break,
                "ATOM" | "HETATM" | "MODEL" | "TER" | "ANISOU" | "MASTER" => {}
                _ => {
                    if !seen_atoms && !line.trim().is_empty() {
                        metadata.header_lines.push(line.clone());
                    }
                }
            }
        }

        temp_conect.sort_unstable();
        temp_conect.dedup();
        for (a1, a2) in temp_conect {
            match (serial_map.get(&a1), serial_map.get(&a2)) {
                (Some(&id1), Some(&id2)) => {
                    system.add_bond(id1, id2, BondOrder::Single);
                }
                _ => debug!("Ignoring CONECT {}-{} to an atom that was not loaded", a1, a2),
            }
        }

        if !seen_atoms {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        Ok((system, metadata))
    }

    fn write_to(
        system: &MolecularSystem,
        metadata: &Self::Metadata,
        _options: &Self::WriteOptions,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        for line in &metadata.header_lines {
            writeln!(writer, "{}", line)?;
        }

        let mut serials: HashMap<AtomId, usize> = HashMap::new();
        for (chain_id, chain) in system.chains_iter() {
            let chain_char = chain
                .author_name
                .as_deref()
                .unwrap_or(&chain.name.name)
                .chars()
                .next()
                .unwrap_or('A');
            for (_, residue) in system.chain_residues(chain_id) {
                for &atom_id in residue.atoms() {
                    let Some(atom) = system.atom(atom_id) else {
                        continue;
                    };
                    let serial = serials.len() + 1;
                    serials.insert(atom_id, serial);

                    let name = if atom.name.len() < 4 && atom.element.len() == 1 {
                        format!(" {:<3}", atom.name)
                    } else {
                        format!("{:<4}", atom.name)
                    };
                    let charge = match atom.formal_charge {
                        0 => "  ".to_string(),
                        c if c > 0 => format!("{}+", c),
                        c => format!("{}-", -c),
                    };
                    writeln!(
                        writer,
                        "{:<6}{:>5} {} {:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}  1.00  0.00          {:>2}{}",
                        if atom.is_hetatm { "HETATM" } else { "ATOM" },
                        serial,
                        name,
                        residue.name,
                        chain_char,
                        residue.residue_number,
                        residue.insertion_code.unwrap_or(' '),
                        atom.position.x,
                        atom.position.y,
                        atom.position.z,
                        atom.element.to_ascii_uppercase(),
                        charge
                    )?;
                }
            }
        }

        let mut bond_map: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for bond in system.bonds() {
            if let (Some(&s1), Some(&s2)) = (serials.get(&bond.atom1_id), serials.get(&bond.atom2_id)) {
                bond_map.entry(s1).or_default().push(s2);
                bond_map.entry(s2).or_default().push(s1);
            }
        }
        for (serial, partners) in &bond_map {
            for chunk in partners.chunks(4) {
                write!(writer, "CONECT{:>5}", serial)?;
                for partner in chunk {
                    write!(writer, "{:>5}", partner)?;
                }
                writeln!(writer)?;
            }
        }

        writeln!(writer, "END")?;
        Ok(())
    }

    fn write_system_to(
        system: &MolecularSystem,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let metadata = PdbMetadata {
            header_lines: vec!["REMARK   1 GENERATED BY MOLPREP".to_string()],
        };
        Self::write_to(system, &metadata, &PdbWriteOptions, writer)
    }
}
