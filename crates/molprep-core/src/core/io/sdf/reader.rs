use super::{
    DataItem, MAX_ABS_CHARGE, SdfError, SdfMetadata, SdfParseErrorKind, SdfRecordInfo,
    charge_from_legacy_code,
};
use crate::core::models::atom::Atom;
use crate::core::models::chain::ChainName;
use crate::core::models::system::MolecularSystem;
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::BufRead;
use tracing::{debug, error, trace, warn};

const RECORD_SEPARATOR: &str = "$$$$";
const END_LINE: &str = "M  END";
const V30_PREFIX: &str = "M  V30 ";

#[derive(Debug)]
struct ParsedAtom {
    element: String,
    position: Point3<f64>,
    charge: i32,
}

#[derive(Debug)]
struct ParsedBond {
    atom1: usize,
    atom2: usize,
    order: BondOrder,
}

#[derive(Debug, Default)]
struct ParsedRecord {
    name: String,
    program: String,
    comment: String,
    atoms: Vec<ParsedAtom>,
    bonds: Vec<ParsedBond>,
    data_items: Vec<DataItem>,
}

/// The lines of one record plus where they came from, for error reporting.
struct RecordLines<'a> {
    record: usize,
    first_line: usize,
    lines: &'a [String],
}

impl RecordLines<'_> {
    fn error(&self, offset: usize, kind: SdfParseErrorKind) -> SdfError {
        SdfError::Parse {
            record: self.record,
            line: self.first_line + offset,
            kind,
        }
    }

    fn parse_int<T: std::str::FromStr>(
        &self,
        offset: usize,
        field: &str,
        value: &str,
    ) -> Result<T, SdfError> {
        value.parse().map_err(|_| {
            self.error(
                offset,
                SdfParseErrorKind::InvalidInt {
                    field: field.to_string(),
                    value: value.to_string(),
                },
            )
        })
    }

    fn parse_float(&self, offset: usize, field: &str, value: &str) -> Result<f64, SdfError> {
        value.parse().map_err(|_| {
            self.error(
                offset,
                SdfParseErrorKind::InvalidFloat {
                    field: field.to_string(),
                    value: value.to_string(),
                },
            )
        })
    }

    /// Validates a 1-based atom reference and converts it to a 0-based index.
    fn atom_index(&self, offset: usize, index: usize, count: usize) -> Result<usize, SdfError> {
        if index == 0 || index > count {
            return Err(self.error(
                offset,
                SdfParseErrorKind::AtomIndexOutOfRange { index, count },
            ));
        }
        Ok(index - 1)
    }

    fn bond_order(
        &self,
        offset: usize,
        bond: usize,
        code: i64,
        fault_tolerant: bool,
    ) -> Result<BondOrder, SdfError> {
        let order = u8::try_from(code)
            .ok()
            .and_then(BondOrder::from_code)
            .ok_or_else(|| self.error(offset, SdfParseErrorKind::InvalidBondOrder(code)))?;
        if order == BondOrder::Dative {
            if !fault_tolerant {
                return Err(self.error(offset, SdfParseErrorKind::DativeBondNotAllowed { bond }));
            }
            error!(
                "Record {} (line {}): bond {} has the non-standard order 9 (dative); accepted in fault tolerant mode",
                self.record,
                self.first_line + offset,
                bond
            );
        }
        Ok(order)
    }
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start..end).unwrap_or("").trim()
}

pub(super) fn read_records(
    reader: &mut impl BufRead,
    fault_tolerant: bool,
) -> Result<(MolecularSystem, SdfMetadata), SdfError> {
    let mut system = MolecularSystem::new();
    let mut metadata = SdfMetadata::default();

    let mut current: Vec<String> = Vec::new();
    let mut first_line = 1;
    let mut record = 0;

    for (line_num, line_res) in reader.lines().enumerate() {
        let mut line = line_res?;
        // `lines()` strips "\r\n"; a stray trailing '\r' must not shift fixed columns.
        if line.ends_with('\r') {
            line.pop();
        }

        if line.starts_with(RECORD_SEPARATOR) {
            record += 1;
            let lines = RecordLines {
                record,
                first_line,
                lines: &current,
            };
            handle_record(&lines, fault_tolerant, &mut system, &mut metadata)?;
            current.clear();
            first_line = line_num + 2;
        } else {
            current.push(line);
        }
    }

    if current.iter().any(|line| !line.trim().is_empty()) {
        record += 1;
        let lines = RecordLines {
            record,
            first_line,
            lines: &current,
        };
        handle_record(&lines, fault_tolerant, &mut system, &mut metadata)?;
    }

    debug!(
        "Read {} SDF record(s) with {} atoms and {} bonds",
        system.chain_count(),
        system.atom_count(),
        system.bonds().len()
    );
    Ok((system, metadata))
}

fn handle_record(
    lines: &RecordLines,
    fault_tolerant: bool,
    system: &mut MolecularSystem,
    metadata: &mut SdfMetadata,
) -> Result<(), SdfError> {
    match parse_record(lines, fault_tolerant) {
        Ok(parsed) => {
            add_record(system, metadata, lines.record, parsed);
            Ok(())
        }
        Err(e) if fault_tolerant => {
            error!("Skipping SDF record {}: {}", lines.record, e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn parse_record(rec: &RecordLines, fault_tolerant: bool) -> Result<ParsedRecord, SdfError> {
    if rec.lines.len() < 4 {
        return Err(rec.error(
            rec.lines.len().saturating_sub(1),
            SdfParseErrorKind::MissingHeader,
        ));
    }

    let version = slice_and_trim(&rec.lines[3], 33, 39);
    let (mut parsed, data_start) = match version {
        "" | "V2000" => parse_v2000(rec, fault_tolerant)?,
        "V3000" => parse_v3000(rec, fault_tolerant)?,
        other => {
            return Err(rec.error(3, SdfParseErrorKind::UnsupportedVersion(other.to_string())));
        }
    };

    parsed.name = rec.lines[0].trim().to_string();
    parsed.program = rec.lines[1].trim_end().to_string();
    parsed.comment = rec.lines[2].trim_end().to_string();
    parsed.data_items = parse_data_items(&rec.lines[data_start.min(rec.lines.len())..]);
    Ok(parsed)
}

fn parse_v2000(
    rec: &RecordLines,
    fault_tolerant: bool,
) -> Result<(ParsedRecord, usize), SdfError> {
    let counts = &rec.lines[3];
    let n_atoms: usize = rec.parse_int(3, "atom count", slice_and_trim(counts, 0, 3))?;
    let n_bonds: usize = rec.parse_int(3, "bond count", slice_and_trim(counts, 3, 6))?;

    let mut parsed = ParsedRecord::default();
    let mut offset = 4;

    for found in 0..n_atoms {
        let line = rec.lines.get(offset).ok_or_else(|| {
            rec.error(
                offset.saturating_sub(1),
                SdfParseErrorKind::Truncated {
                    block: "atom",
                    expected: n_atoms,
                    found,
                },
            )
        })?;
        let x = rec.parse_float(offset, "x (columns 1-10)", slice_and_trim(line, 0, 10))?;
        let y = rec.parse_float(offset, "y (columns 11-20)", slice_and_trim(line, 10, 20))?;
        let z = rec.parse_float(offset, "z (columns 21-30)", slice_and_trim(line, 20, 30))?;
        let element = slice_and_trim(line, 31, 34).to_string();

        let code_str = slice_and_trim(line, 36, 39);
        let code: i32 = if code_str.is_empty() {
            0
        } else {
            rec.parse_int(offset, "charge code (columns 37-39)", code_str)?
        };
        let charge = charge_from_legacy_code(code)
            .ok_or_else(|| rec.error(offset, SdfParseErrorKind::InvalidChargeCode(code)))?;
        if code == 4 {
            trace!("Atom {} of record {} carries a radical flag", found + 1, rec.record);
        }

        parsed.atoms.push(ParsedAtom {
            element,
            position: Point3::new(x, y, z),
            charge,
        });
        offset += 1;
    }

    for found in 0..n_bonds {
        let line = rec.lines.get(offset).ok_or_else(|| {
            rec.error(
                offset.saturating_sub(1),
                SdfParseErrorKind::Truncated {
                    block: "bond",
                    expected: n_bonds,
                    found,
                },
            )
        })?;
        let a1: usize = rec.parse_int(offset, "first atom (columns 1-3)", slice_and_trim(line, 0, 3))?;
        let a2: usize = rec.parse_int(offset, "second atom (columns 4-6)", slice_and_trim(line, 3, 6))?;
        let code: i64 = rec.parse_int(offset, "bond type (columns 7-9)", slice_and_trim(line, 6, 9))?;

        let atom1 = rec.atom_index(offset, a1, n_atoms)?;
        let atom2 = rec.atom_index(offset, a2, n_atoms)?;
        let order = rec.bond_order(offset, found + 1, code, fault_tolerant)?;
        parsed.bonds.push(ParsedBond {
            atom1,
            atom2,
            order,
        });
        offset += 1;
    }

    let mut overrides: Option<Vec<(usize, i32)>> = None;
    let mut terminated = false;
    while let Some(line) = rec.lines.get(offset) {
        if line.starts_with(END_LINE) {
            offset += 1;
            terminated = true;
            break;
        }
        if line.starts_with('>') {
            break;
        }
        if line.starts_with("M  CHG") {
            let pairs = parse_charge_block(rec, offset, line, n_atoms)?;
            overrides.get_or_insert_with(Vec::new).extend(pairs);
        } else {
            trace!("Ignoring property line '{}' in record {}", line, rec.record);
        }
        offset += 1;
    }
    if !terminated {
        missing_end(rec, offset.saturating_sub(1), fault_tolerant)?;
    }

    if let Some(overrides) = overrides {
        for atom in &mut parsed.atoms {
            atom.charge = 0;
        }
        for (index, charge) in overrides {
            parsed.atoms[index].charge = charge;
        }
    }

    Ok((parsed, offset))
}

/// A connection table without `M  END` fails strict reads in both dialects.
fn missing_end(rec: &RecordLines, offset: usize, fault_tolerant: bool) -> Result<(), SdfError> {
    if !fault_tolerant {
        return Err(rec.error(offset, SdfParseErrorKind::MissingEnd));
    }
    warn!(
        "Record {} has no 'M  END' line; reading it up to line {}",
        rec.record,
        rec.first_line + offset
    );
    Ok(())
}

/// Parses one `M  CHGnn8 aaa vvv ...` line into 0-based atom indices and charges.
fn parse_charge_block(
    rec: &RecordLines,
    offset: usize,
    line: &str,
    n_atoms: usize,
) -> Result<Vec<(usize, i32)>, SdfError> {
    let malformed = || rec.error(offset, SdfParseErrorKind::MalformedProperty(line.to_string()));
    let mut tokens = line.get(6..).unwrap_or("").split_whitespace();

    let count: usize = tokens
        .next()
        .ok_or_else(malformed)
        .and_then(|t| rec.parse_int(offset, "M  CHG entry count", t))?;
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let (Some(atom_str), Some(charge_str)) = (tokens.next(), tokens.next()) else {
            return Err(malformed());
        };
        let atom: usize = rec.parse_int(offset, "M  CHG atom index", atom_str)?;
        let charge: i32 = rec.parse_int(offset, "M  CHG charge", charge_str)?;
        if charge.abs() > MAX_ABS_CHARGE {
            return Err(rec.error(offset, SdfParseErrorKind::ChargeOutOfRange(charge)));
        }
        pairs.push((rec.atom_index(offset, atom, n_atoms)?, charge));
    }
    Ok(pairs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum V3000Block {
    Outside,
    Ctab,
    Atom,
    Bond,
    Skipped,
}

fn parse_v3000(
    rec: &RecordLines,
    fault_tolerant: bool,
) -> Result<(ParsedRecord, usize), SdfError> {
    // Join continuation lines; each logical line remembers where it started.
    let mut logical: Vec<(usize, String)> = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    let mut end = None;

    for (offset, line) in rec.lines.iter().enumerate().skip(4) {
        if line.starts_with(END_LINE) {
            end = Some(offset);
            break;
        }
        let Some(content) = line.strip_prefix(V30_PREFIX) else {
            trace!("Ignoring non-V30 line '{}' in record {}", line, rec.record);
            continue;
        };
        let (start, mut text) = pending.take().unwrap_or((offset, String::new()));
        let content = content.trim_end();
        match content.strip_suffix('-') {
            Some(head) => {
                text.push_str(head);
                pending = Some((start, text));
            }
            None => {
                text.push_str(content);
                logical.push((start, text));
            }
        }
    }

    let end = match end {
        Some(end) => end,
        None => {
            missing_end(rec, rec.lines.len() - 1, fault_tolerant)?;
            rec.lines.len()
        }
    };
    if let Some((start, _)) = pending {
        return Err(rec.error(
            start,
            SdfParseErrorKind::MalformedV3000("continuation line without successor".to_string()),
        ));
    }

    let mut parsed = ParsedRecord::default();
    let mut block = V3000Block::Outside;
    let mut declared: Option<(usize, usize)> = None;
    let mut atom_positions: HashMap<usize, usize> = HashMap::new();

    for (offset, text) in &logical {
        let offset = *offset;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let malformed = || rec.error(offset, SdfParseErrorKind::MalformedV3000(text.clone()));

        match (block, tokens.as_slice()) {
            (_, []) => {}
            (V3000Block::Outside, ["BEGIN", "CTAB", ..]) => block = V3000Block::Ctab,
            (V3000Block::Ctab, ["END", "CTAB", ..]) => block = V3000Block::Outside,
            (V3000Block::Ctab, ["COUNTS", na, nb, ..]) => {
                let na: usize = rec.parse_int(offset, "COUNTS atom count", na)?;
                let nb: usize = rec.parse_int(offset, "COUNTS bond count", nb)?;
                declared = Some((na, nb));
            }
            (V3000Block::Ctab, ["BEGIN", "ATOM", ..]) => block = V3000Block::Atom,
            (V3000Block::Ctab, ["BEGIN", "BOND", ..]) => block = V3000Block::Bond,
            (V3000Block::Ctab, ["BEGIN", ..]) => block = V3000Block::Skipped,
            (V3000Block::Atom, ["END", "ATOM", ..])
            | (V3000Block::Bond, ["END", "BOND", ..])
            | (V3000Block::Skipped, ["END", ..]) => block = V3000Block::Ctab,
            (V3000Block::Atom, [index, element, x, y, z, _aamap, props @ ..]) => {
                let index: usize = rec.parse_int(offset, "atom index", index)?;
                let position = Point3::new(
                    rec.parse_float(offset, "x", x)?,
                    rec.parse_float(offset, "y", y)?,
                    rec.parse_float(offset, "z", z)?,
                );
                let mut charge: i32 = 0;
                for prop in props {
                    if let Some(value) = prop.strip_prefix("CHG=") {
                        charge = rec.parse_int(offset, "CHG", value)?;
                        if charge.abs() > MAX_ABS_CHARGE {
                            return Err(rec.error(offset, SdfParseErrorKind::ChargeOutOfRange(charge)));
                        }
                    }
                }
                atom_positions.insert(index, parsed.atoms.len());
                parsed.atoms.push(ParsedAtom {
                    element: element.trim_matches('"').to_string(),
                    position,
                    charge,
                });
            }
            (V3000Block::Bond, [index, code, a1, a2, ..]) => {
                let bond: usize = rec.parse_int(offset, "bond index", index)?;
                let code: i64 = rec.parse_int(offset, "bond type", code)?;
                let count = atom_positions.len();
                let resolve = |raw: &str| -> Result<usize, SdfError> {
                    let index: usize = rec.parse_int(offset, "bond atom", raw)?;
                    atom_positions.get(&index).copied().ok_or_else(|| {
                        rec.error(offset, SdfParseErrorKind::AtomIndexOutOfRange { index, count })
                    })
                };
                let atom1 = resolve(*a1)?;
                let atom2 = resolve(*a2)?;
                let order = rec.bond_order(offset, bond, code, fault_tolerant)?;
                parsed.bonds.push(ParsedBond {
                    atom1,
                    atom2,
                    order,
                });
            }
            (V3000Block::Skipped, _) | (V3000Block::Ctab, _) | (V3000Block::Outside, _) => {
                trace!("Ignoring V3000 line '{}' in record {}", text, rec.record);
            }
            (V3000Block::Atom, _) | (V3000Block::Bond, _) => return Err(malformed()),
        }
    }

    if let Some((na, nb)) = declared {
        if parsed.atoms.len() != na {
            return Err(rec.error(
                end,
                SdfParseErrorKind::Truncated {
                    block: "atom",
                    expected: na,
                    found: parsed.atoms.len(),
                },
            ));
        }
        if parsed.bonds.len() != nb {
            return Err(rec.error(
                end,
                SdfParseErrorKind::Truncated {
                    block: "bond",
                    expected: nb,
                    found: parsed.bonds.len(),
                },
            ));
        }
    }

    Ok((parsed, end + 1))
}

/// Collects `> <KEY>` items. Values run until the next blank line.
fn parse_data_items(lines: &[String]) -> Vec<DataItem> {
    let mut items = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        i += 1;
        if !line.starts_with('>') {
            continue;
        }
        let key = match (line.find('<'), line.rfind('>')) {
            (Some(open), Some(close)) if close > open => line[open + 1..close].to_string(),
            _ => line[1..].trim().to_string(),
        };
        let mut value_lines = Vec::new();
        while i < lines.len() && !lines[i].trim().is_empty() {
            value_lines.push(lines[i].as_str());
            i += 1;
        }
        items.push(DataItem {
            key,
            value: value_lines.join("\n"),
        });
    }
    items
}

fn add_record(
    system: &mut MolecularSystem,
    metadata: &mut SdfMetadata,
    record: usize,
    parsed: ParsedRecord,
) {
    let chain_name = ChainName::new(format!("{:05}_{}", record, parsed.name));
    let chain_id = system.add_chain(chain_name.clone());
    let Some(residue_id) = system.add_residue(chain_id, 1, None, "UNK") else {
        return;
    };

    let mut atom_ids = Vec::with_capacity(parsed.atoms.len());
    for (i, parsed_atom) in parsed.atoms.into_iter().enumerate() {
        let mut atom = Atom::new(
            &(i + 1).to_string(),
            &parsed_atom.element,
            residue_id,
            parsed_atom.position,
        );
        atom.formal_charge = parsed_atom.charge;
        atom.is_hetatm = true;
        if let Some(id) = system.add_atom_to_residue(residue_id, atom) {
            atom_ids.push(id);
        }
    }

    for bond in parsed.bonds {
        if let (Some(&a1), Some(&a2)) = (atom_ids.get(bond.atom1), atom_ids.get(bond.atom2)) {
            system.add_bond(a1, a2, bond.order);
        }
    }

    metadata.records.push(SdfRecordInfo {
        chain: chain_name,
        name: parsed.name,
        program: parsed.program,
        comment: parsed.comment,
        data_items: parsed.data_items,
    });
}
