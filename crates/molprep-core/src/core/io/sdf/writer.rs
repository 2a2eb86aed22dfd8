use super::{
    MAX_ABS_CHARGE, SdfDialect, SdfError, SdfMetadata, SdfRecordInfo, V2000_MAX_COUNT,
    legacy_code_from_charge,
};
use crate::core::models::chain::Chain;
use crate::core::models::ids::{AtomId, ChainId};
use crate::core::models::system::MolecularSystem;
use crate::core::models::topology::BondOrder;
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, warn};

const PROGRAM_LINE: &str = "  molprep";

/// Atoms and bonds of one chain, with 1-based atom indices.
struct RecordTable<'a> {
    chain: &'a Chain,
    atoms: Vec<AtomId>,
    bonds: Vec<(usize, usize, BondOrder)>,
}

pub(super) fn write_records(
    system: &MolecularSystem,
    metadata: &SdfMetadata,
    dialect: SdfDialect,
    writer: &mut impl Write,
) -> Result<(), SdfError> {
    let tables = collect_tables(system);

    // Check every record before emitting anything so a failure leaves no partial output.
    for table in &tables {
        check_charges(system, table)?;
    }

    for table in &tables {
        let info = metadata.record_for(&table.chain.name);
        let use_v3000 = match dialect {
            SdfDialect::V3000 => true,
            SdfDialect::V2000 => {
                if table.atoms.len() > V2000_MAX_COUNT || table.bonds.len() > V2000_MAX_COUNT {
                    return Err(SdfError::TooLargeForV2000 {
                        chain: table.chain.name.to_string(),
                        atoms: table.atoms.len(),
                        bonds: table.bonds.len(),
                    });
                }
                false
            }
            SdfDialect::Auto => {
                table.atoms.len() > V2000_MAX_COUNT
                    || table.bonds.len() > V2000_MAX_COUNT
                    || table.bonds.iter().any(|(_, _, order)| *order == BondOrder::Dative)
            }
        };

        write_header(table, info, use_v3000, writer)?;
        if use_v3000 {
            write_v3000_table(system, table, writer)?;
        } else {
            write_v2000_table(system, table, writer)?;
        }
        writeln!(writer, "M  END")?;

        if let Some(info) = info {
            for item in &info.data_items {
                writeln!(writer, "> <{}>", item.key)?;
                writeln!(writer, "{}", item.value)?;
                writeln!(writer)?;
            }
        }
        writeln!(writer, "$$$$")?;
    }

    debug!("Wrote {} SDF record(s)", tables.len());
    Ok(())
}

fn collect_tables(system: &MolecularSystem) -> Vec<RecordTable<'_>> {
    let mut owner: HashMap<AtomId, (ChainId, usize)> = HashMap::new();
    let mut tables: Vec<RecordTable> = Vec::new();
    let mut table_index: HashMap<ChainId, usize> = HashMap::new();

    for (chain_id, chain) in system.chains_iter() {
        let atoms: Vec<AtomId> = system
            .chain_residues(chain_id)
            .flat_map(|(_, residue)| residue.atoms().iter().copied())
            .collect();
        for (i, &atom_id) in atoms.iter().enumerate() {
            owner.insert(atom_id, (chain_id, i + 1));
        }
        table_index.insert(chain_id, tables.len());
        tables.push(RecordTable {
            chain,
            atoms,
            bonds: Vec::new(),
        });
    }

    for bond in system.bonds() {
        match (owner.get(&bond.atom1_id), owner.get(&bond.atom2_id)) {
            (Some(&(c1, i1)), Some(&(c2, i2))) if c1 == c2 => {
                if let Some(&t) = table_index.get(&c1) {
                    tables[t].bonds.push((i1, i2, bond.order));
                }
            }
            _ => warn!(
                "Dropping a {} bond that spans two chains; SDF records cannot connect molecules",
                bond.order
            ),
        }
    }

    tables
}

fn check_charges(system: &MolecularSystem, table: &RecordTable) -> Result<(), SdfError> {
    for &atom_id in &table.atoms {
        if let Some(atom) = system.atom(atom_id) {
            if atom.formal_charge.abs() > MAX_ABS_CHARGE {
                return Err(SdfError::ChargeOutOfRange {
                    chain: table.chain.name.to_string(),
                    atom: atom.name.clone(),
                    charge: atom.formal_charge,
                });
            }
        }
    }
    Ok(())
}

/// Record name for a chain: the stored name, else the chain name without the
/// `NNNNN_` prefix the reader adds.
fn record_name(table: &RecordTable, info: Option<&SdfRecordInfo>) -> String {
    if let Some(info) = info {
        return info.name.clone();
    }
    let name = &table.chain.name.name;
    match name.split_once('_') {
        Some((prefix, rest)) if prefix.len() == 5 && prefix.bytes().all(|b| b.is_ascii_digit()) => {
            rest.to_string()
        }
        _ => name.clone(),
    }
}

fn write_header(
    table: &RecordTable,
    info: Option<&SdfRecordInfo>,
    use_v3000: bool,
    writer: &mut impl Write,
) -> Result<(), SdfError> {
    writeln!(writer, "{}", record_name(table, info))?;
    match info {
        Some(info) => {
            writeln!(writer, "{}", info.program)?;
            writeln!(writer, "{}", info.comment)?;
        }
        None => {
            writeln!(writer, "{}", PROGRAM_LINE)?;
            writeln!(writer)?;
        }
    }
    if use_v3000 {
        writeln!(writer, "  0  0  0     0  0            999 V3000")?;
    } else {
        writeln!(
            writer,
            "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
            table.atoms.len(),
            table.bonds.len()
        )?;
    }
    Ok(())
}

fn write_v2000_table(
    system: &MolecularSystem,
    table: &RecordTable,
    writer: &mut impl Write,
) -> Result<(), SdfError> {
    let mut charged: Vec<(usize, i32)> = Vec::new();

    for (i, &atom_id) in table.atoms.iter().enumerate() {
        let Some(atom) = system.atom(atom_id) else {
            continue;
        };
        let code = legacy_code_from_charge(atom.formal_charge).unwrap_or(0);
        if atom.formal_charge != 0 {
            charged.push((i + 1, atom.formal_charge));
        }
        writeln!(
            writer,
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0{:>3}  0  0  0  0  0  0  0  0  0  0",
            atom.position.x, atom.position.y, atom.position.z, atom.element, code
        )?;
    }

    for &(a1, a2, order) in &table.bonds {
        let order = if order == BondOrder::Dative {
            warn!(
                "Chain '{}': bond {}-{} is dative (order 9), which V2000 cannot represent; writing it as a single bond",
                table.chain.name, a1, a2
            );
            BondOrder::Single
        } else {
            order
        };
        writeln!(writer, "{:>3}{:>3}{:>3}  0", a1, a2, order.code())?;
    }

    for chunk in charged.chunks(8) {
        write!(writer, "M  CHG{:>3}", chunk.len())?;
        for (index, charge) in chunk {
            write!(writer, " {:>3} {:>3}", index, charge)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn write_v3000_table(
    system: &MolecularSystem,
    table: &RecordTable,
    writer: &mut impl Write,
) -> Result<(), SdfError> {
    writeln!(writer, "M  V30 BEGIN CTAB")?;
    writeln!(
        writer,
        "M  V30 COUNTS {} {} 0 0 0",
        table.atoms.len(),
        table.bonds.len()
    )?;

    writeln!(writer, "M  V30 BEGIN ATOM")?;
    for (i, &atom_id) in table.atoms.iter().enumerate() {
        let Some(atom) = system.atom(atom_id) else {
            continue;
        };
        write!(
            writer,
            "M  V30 {} {} {:.4} {:.4} {:.4} 0",
            i + 1,
            atom.element,
            atom.position.x,
            atom.position.y,
            atom.position.z
        )?;
        if atom.formal_charge != 0 {
            write!(writer, " CHG={}", atom.formal_charge)?;
        }
        writeln!(writer)?;
    }
    writeln!(writer, "M  V30 END ATOM")?;

    writeln!(writer, "M  V30 BEGIN BOND")?;
    for (i, &(a1, a2, order)) in table.bonds.iter().enumerate() {
        writeln!(writer, "M  V30 {} {} {} {}", i + 1, order.code(), a1, a2)?;
    }
    writeln!(writer, "M  V30 END BOND")?;
    writeln!(writer, "M  V30 END CTAB")?;
    Ok(())
}
