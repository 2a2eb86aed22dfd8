use super::lexer::{Category, CifBlock, Row};
use super::{MmcifError, MmcifParseErrorKind};
use crate::core::utils::identifiers::one_letter_code;
use nalgebra::{Matrix3, Vector3};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// `_entity` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDesc {
    pub entity_type: String,
    pub description: Option<String>,
}

/// One `_pdbx_struct_assembly_gen` row: an operator expression applied to chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyGenerator {
    pub chains: Vec<String>,
    pub oper_expression: String,
}

/// Biological assembly specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BioUnitSpec {
    pub id: String,
    pub generators: Vec<AssemblyGenerator>,
}

/// Rigid transform from `_pdbx_struct_oper_list`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryOperator {
    pub id: String,
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl SymmetryOperator {
    pub fn identity(id: &str) -> Self {
        Self {
            id: id.to_string(),
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

/// Canonical sequence of one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub name: String,
    pub sequence: String,
}

impl SequenceRecord {
    /// The sequence with alignment gaps removed.
    pub fn gapless(&self) -> String {
        self.sequence.chars().filter(|&c| c != '-').collect()
    }
}

/// Entity, sequence and assembly metadata of an mmCIF file.
#[derive(Debug, Clone, Default)]
pub struct MmcifInfo {
    chain_entities: HashMap<String, String>,
    entities: HashMap<String, EntityDesc>,
    entity_order: Vec<String>,
    entity_sequences: HashMap<String, String>,
    biounits: Vec<BioUnitSpec>,
    operators: HashMap<String, SymmetryOperator>,
}

impl MmcifInfo {
    /// Entity id of a chain (`label_asym_id`).
    pub fn entity_id_for_chain(&self, chain: &str) -> Option<&str> {
        self.chain_entities.get(chain).map(|s| s.as_str())
    }

    /// The `_entity` record, present only when the entity has a type.
    pub fn entity_desc(&self, entity_id: &str) -> Option<&EntityDesc> {
        self.entities.get(entity_id)
    }

    /// Entity ids in `_entity` order.
    pub fn entity_ids(&self) -> &[String] {
        &self.entity_order
    }

    /// Entity ids whose `_entity.type` equals `entity_type`, case-insensitively.
    pub fn entity_ids_of_type(&self, entity_type: &str) -> HashSet<String> {
        self.entity_order
            .iter()
            .filter(|id| {
                self.entities
                    .get(*id)
                    .is_some_and(|e| e.entity_type.eq_ignore_ascii_case(entity_type))
            })
            .cloned()
            .collect()
    }

    pub fn biounits(&self) -> &[BioUnitSpec] {
        &self.biounits
    }

    pub fn biounit(&self, id: &str) -> Option<&BioUnitSpec> {
        self.biounits.iter().find(|bu| bu.id == id)
    }

    pub fn operator(&self, id: &str) -> Option<&SymmetryOperator> {
        self.operators.get(id)
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    pub fn entity_sequence(&self, entity_id: &str) -> Option<&str> {
        self.entity_sequences.get(entity_id).map(|s| s.as_str())
    }

    /// Canonical sequences named by chain, in `_struct_asym` order.
    pub(super) fn chain_sequences(&self, chain_order: &[String]) -> Vec<SequenceRecord> {
        chain_order
            .iter()
            .filter_map(|chain| {
                let entity_id = self.chain_entities.get(chain)?;
                let sequence = self.entity_sequences.get(entity_id)?;
                Some(SequenceRecord {
                    name: chain.clone(),
                    sequence: sequence.clone(),
                })
            })
            .collect()
    }

    pub(super) fn set_chain_entity(&mut self, chain: &str, entity_id: &str) {
        self.chain_entities
            .entry(chain.to_string())
            .or_insert_with(|| entity_id.to_string());
    }

    pub(super) fn from_block(block: &CifBlock, fault_tolerant: bool) -> Result<(Self, Vec<String>), MmcifError> {
        let mut info = MmcifInfo::default();
        let mut asym_order = Vec::new();

        if let Some(entity) = block.category("entity") {
            for row in entity.rows() {
                let Some(id) = entity.value(row, "id") else {
                    continue;
                };
                info.entity_order.push(id.to_string());
                if let Some(entity_type) = entity.value(row, "type") {
                    info.entities.insert(
                        id.to_string(),
                        EntityDesc {
                            entity_type: entity_type.to_string(),
                            description: entity.value(row, "pdbx_description").map(str::to_string),
                        },
                    );
                }
            }
        }

        if let Some(asym) = block.category("struct_asym") {
            for row in asym.rows() {
                if let (Some(id), Some(entity_id)) = (asym.value(row, "id"), asym.value(row, "entity_id")) {
                    info.chain_entities.insert(id.to_string(), entity_id.to_string());
                    asym_order.push(id.to_string());
                }
            }
        }

        read_sequences(block, &mut info);

        if let Some(gen_cat) = block.category("pdbx_struct_assembly_gen") {
            for row in gen_cat.rows() {
                let (Some(id), Some(expression), Some(chains)) = (
                    gen_cat.value(row, "assembly_id"),
                    gen_cat.value(row, "oper_expression"),
                    gen_cat.value(row, "asym_id_list"),
                ) else {
                    continue;
                };
                let generator = AssemblyGenerator {
                    chains: chains
                        .split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect(),
                    oper_expression: expression.to_string(),
                };
                match info.biounits.iter_mut().find(|bu| bu.id == id) {
                    Some(bu) => bu.generators.push(generator),
                    None => info.biounits.push(BioUnitSpec {
                        id: id.to_string(),
                        generators: vec![generator],
                    }),
                }
            }
        }

        if let Some(oper_cat) = block.category("pdbx_struct_oper_list") {
            for row in oper_cat.rows() {
                match read_operator(oper_cat, row) {
                    Ok(Some(op)) => {
                        info.operators.insert(op.id.clone(), op);
                    }
                    Ok(None) => {}
                    Err(kind) if fault_tolerant => {
                        warn!("Skipping operator on line {}: {}", row.line, kind);
                    }
                    Err(kind) => {
                        return Err(MmcifError::Parse {
                            line: row.line,
                            kind,
                        });
                    }
                }
            }
        }

        Ok((info, asym_order))
    }
}

fn read_sequences(block: &CifBlock, info: &mut MmcifInfo) {
    if let Some(poly) = block.category("entity_poly") {
        for row in poly.rows() {
            if let (Some(entity_id), Some(seq)) = (
                poly.value(row, "entity_id"),
                poly.value(row, "pdbx_seq_one_letter_code_can"),
            ) {
                let sequence: String = seq.chars().filter(|c| !c.is_whitespace()).collect();
                info.entity_sequences.insert(entity_id.to_string(), sequence);
            }
        }
    }

    // Fall back to the monomer list for entities without a canonical one-letter string.
    if let Some(poly_seq) = block.category("entity_poly_seq") {
        let mut from_monomers: Vec<(String, String)> = Vec::new();
        let mut last_num: HashMap<String, String> = HashMap::new();
        for row in poly_seq.rows() {
            let (Some(entity_id), Some(mon_id)) =
                (poly_seq.value(row, "entity_id"), poly_seq.value(row, "mon_id"))
            else {
                continue;
            };
            if info.entity_sequences.contains_key(entity_id) {
                continue;
            }
            // Microheterogeneity lists several monomers for one position; keep the first.
            if let Some(num) = poly_seq.value(row, "num") {
                if last_num.get(entity_id).is_some_and(|last| last == num) {
                    continue;
                }
                last_num.insert(entity_id.to_string(), num.to_string());
            }
            let code = one_letter_code(mon_id).unwrap_or('X');
            match from_monomers.iter_mut().find(|(id, _)| id == entity_id) {
                Some((_, seq)) => seq.push(code),
                None => from_monomers.push((entity_id.to_string(), code.to_string())),
            }
        }
        for (entity_id, sequence) in from_monomers {
            info.entity_sequences.insert(entity_id, sequence);
        }
    }
}

fn parse_component(
    category: &Category,
    row: &Row,
    column: &str,
) -> Result<f64, MmcifParseErrorKind> {
    let value = category
        .value(row, column)
        .ok_or_else(|| MmcifParseErrorKind::MissingField(column.to_string()))?;
    value.parse().map_err(|_| MmcifParseErrorKind::InvalidFloat {
        field: column.to_string(),
        value: value.to_string(),
    })
}

/// Reads one operator row. Rows without an id are ignored.
fn read_operator(
    category: &Category,
    row: &Row,
) -> Result<Option<SymmetryOperator>, MmcifParseErrorKind> {
    let Some(id) = category.value(row, "id") else {
        return Ok(None);
    };
    let mut rotation = Matrix3::zeros();
    let mut translation = Vector3::zeros();
    for i in 0..3 {
        for j in 0..3 {
            rotation[(i, j)] = parse_component(category, row, &format!("matrix[{}][{}]", i + 1, j + 1))?;
        }
        translation[i] = parse_component(category, row, &format!("vector[{}]", i + 1))?;
    }
    Ok(Some(SymmetryOperator {
        id: id.to_string(),
        rotation,
        translation,
    }))
}
