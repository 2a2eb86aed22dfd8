use super::info::MmcifInfo;
use super::lexer::{Category, CifBlock, Row};
use super::{MmcifError, MmcifMetadata, MmcifParseErrorKind};
use crate::core::models::atom::Atom;
use crate::core::models::chain::ChainName;
use crate::core::models::ids::ResidueId;
use crate::core::models::system::MolecularSystem;
use nalgebra::Point3;
use std::collections::HashMap;
use tracing::{debug, warn};

/// One `_atom_site` row, validated.
struct SiteRecord<'a> {
    model: Option<&'a str>,
    is_hetatm: bool,
    element: String,
    atom_name: &'a str,
    alt_id: Option<&'a str>,
    residue_name: &'a str,
    chain: &'a str,
    author_chain: Option<&'a str>,
    entity_id: Option<&'a str>,
    residue_number: isize,
    insertion_code: Option<char>,
    position: Point3<f64>,
    formal_charge: i32,
}

pub(super) fn read_block(
    block: &CifBlock,
    fault_tolerant: bool,
) -> Result<(MolecularSystem, MmcifMetadata), MmcifError> {
    let (mut info, asym_order) = MmcifInfo::from_block(block, fault_tolerant)?;
    let sites = block
        .category("atom_site")
        .ok_or(MmcifError::MissingCategory("atom_site"))?;

    let mut system = MolecularSystem::new();
    let mut first_model: Option<String> = None;
    let mut skipped_models = 0usize;
    // First alternate location seen per residue.
    let mut residue_alt: HashMap<ResidueId, String> = HashMap::new();

    for row in sites.rows() {
        let record = match parse_site(sites, row) {
            Ok(record) => record,
            Err(kind) if fault_tolerant => {
                warn!("Skipping _atom_site row on line {}: {}", row.line, kind);
                continue;
            }
            Err(kind) => {
                return Err(MmcifError::Parse {
                    line: row.line,
                    kind,
                });
            }
        };

        if let Some(model) = record.model {
            match &first_model {
                None => first_model = Some(model.to_string()),
                Some(first) if first != model => {
                    skipped_models += 1;
                    continue;
                }
                Some(_) => {}
            }
        }

        let chain_id = system.add_chain(ChainName::new(record.chain));
        if let Some(chain) = system.chain_mut(chain_id) {
            if chain.author_name.is_none() {
                chain.author_name = record.author_chain.map(str::to_string);
            }
        }
        if let Some(entity_id) = record.entity_id {
            info.set_chain_entity(record.chain, entity_id);
        }

        let Some(residue_id) = system.add_residue(
            chain_id,
            record.residue_number,
            record.insertion_code,
            record.residue_name,
        ) else {
            continue;
        };

        if let Some(alt) = record.alt_id {
            let first = residue_alt
                .entry(residue_id)
                .or_insert_with(|| alt.to_string());
            if first.as_str() != alt {
                continue;
            }
        }

        let mut atom = Atom::new(record.atom_name, &record.element, residue_id, record.position);
        atom.formal_charge = record.formal_charge;
        atom.is_hetatm = record.is_hetatm;
        system.add_atom_to_residue(residue_id, atom);
    }

    if skipped_models > 0 {
        debug!("Ignored {} _atom_site rows beyond the first model", skipped_models);
    }

    let chain_order: Vec<String> = if asym_order.is_empty() {
        system
            .chains_iter()
            .map(|(_, chain)| chain.name.name.clone())
            .collect()
    } else {
        asym_order
    };
    let seqres = info.chain_sequences(&chain_order);

    debug!(
        "Read {} atoms in {} chains from data block '{}'",
        system.atom_count(),
        system.chain_count(),
        block.name
    );
    Ok((system, MmcifMetadata { info, seqres }))
}

fn required<'a>(
    category: &Category,
    row: &'a Row,
    columns: &[&str],
) -> Result<&'a str, MmcifParseErrorKind> {
    columns
        .iter()
        .find_map(|column| category.value(row, column))
        .ok_or_else(|| MmcifParseErrorKind::MissingField(columns.join("|")))
}

fn parse_float(category: &Category, row: &Row, column: &str) -> Result<f64, MmcifParseErrorKind> {
    let value = required(category, row, &[column])?;
    value.parse().map_err(|_| MmcifParseErrorKind::InvalidFloat {
        field: column.to_string(),
        value: value.to_string(),
    })
}

fn parse_site<'a>(category: &Category, row: &'a Row) -> Result<SiteRecord<'a>, MmcifParseErrorKind> {
    let atom_name = required(category, row, &["label_atom_id", "auth_atom_id"])?;
    let residue_name = required(category, row, &["label_comp_id", "auth_comp_id"])?;
    let chain = required(category, row, &["label_asym_id", "auth_asym_id"])?;

    let number_str = required(category, row, &["auth_seq_id", "label_seq_id"])?;
    let residue_number: isize =
        number_str
            .parse()
            .map_err(|_| MmcifParseErrorKind::InvalidInt {
                field: "auth_seq_id".to_string(),
                value: number_str.to_string(),
            })?;

    let formal_charge = match category.value(row, "pdbx_formal_charge") {
        Some(value) => value.parse().map_err(|_| MmcifParseErrorKind::InvalidInt {
            field: "pdbx_formal_charge".to_string(),
            value: value.to_string(),
        })?,
        None => 0,
    };

    let element = match category.value(row, "type_symbol") {
        Some(symbol) => symbol.to_string(),
        None => atom_name
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_string())
            .ok_or_else(|| MmcifParseErrorKind::MissingField("type_symbol".to_string()))?,
    };

    Ok(SiteRecord {
        model: category.value(row, "pdbx_PDB_model_num"),
        is_hetatm: category
            .value(row, "group_PDB")
            .is_some_and(|group| group.eq_ignore_ascii_case("HETATM")),
        element,
        atom_name,
        alt_id: category.value(row, "label_alt_id"),
        residue_name,
        chain,
        author_chain: category.value(row, "auth_asym_id"),
        entity_id: category.value(row, "label_entity_id"),
        residue_number,
        insertion_code: category
            .value(row, "pdbx_PDB_ins_code")
            .and_then(|code| code.chars().next()),
        position: Point3::new(
            parse_float(category, row, "Cartn_x")?,
            parse_float(category, row, "Cartn_y")?,
            parse_float(category, row, "Cartn_z")?,
        ),
        formal_charge,
    })
}
