use super::MmcifError;
use super::info::MmcifInfo;
use crate::core::models::system::MolecularSystem;
use std::io::Write;
use tracing::debug;

const ATOM_SITE_COLUMNS: [&str; 16] = [
    "group_PDB",
    "id",
    "type_symbol",
    "label_atom_id",
    "label_comp_id",
    "label_asym_id",
    "label_entity_id",
    "label_seq_id",
    "pdbx_PDB_ins_code",
    "Cartn_x",
    "Cartn_y",
    "Cartn_z",
    "pdbx_formal_charge",
    "auth_seq_id",
    "auth_asym_id",
    "pdbx_PDB_model_num",
];

/// Quotes a value when it would otherwise be read as something else.
fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value == "."
        || value == "?"
        || value.chars().any(char::is_whitespace)
        || value.starts_with(['_', '#', '$', '\'', '"', ';', '['])
        || value.to_ascii_lowercase().starts_with("data_")
        || value.eq_ignore_ascii_case("loop_");
    if !needs_quotes {
        value.to_string()
    } else if value.contains("' ") || value.ends_with('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

pub(super) fn write_block(
    system: &MolecularSystem,
    info: &MmcifInfo,
    block_name: &str,
    writer: &mut impl Write,
) -> Result<(), MmcifError> {
    let block_name = if block_name.is_empty() { "molprep" } else { block_name };
    writeln!(writer, "data_{}", block_name)?;
    writeln!(writer, "#")?;

    let typed: Vec<&String> = info
        .entity_ids()
        .iter()
        .filter(|id| info.entity_desc(id).is_some())
        .collect();
    if !typed.is_empty() {
        writeln!(writer, "loop_")?;
        writeln!(writer, "_entity.id")?;
        writeln!(writer, "_entity.type")?;
        writeln!(writer, "_entity.pdbx_description")?;
        for id in typed {
            if let Some(desc) = info.entity_desc(id) {
                let description = desc.description.as_deref().map(quote);
                writeln!(
                    writer,
                    "{} {} {}",
                    quote(id),
                    quote(&desc.entity_type),
                    description.as_deref().unwrap_or("?")
                )?;
            }
        }
        writeln!(writer, "#")?;
    }

    let asym: Vec<(String, &str)> = system
        .chains_iter()
        .filter_map(|(_, chain)| {
            info.entity_id_for_chain(&chain.name.name)
                .map(|entity| (chain.name.to_string(), entity))
        })
        .collect();
    if !asym.is_empty() {
        writeln!(writer, "loop_")?;
        writeln!(writer, "_struct_asym.id")?;
        writeln!(writer, "_struct_asym.entity_id")?;
        for (chain, entity) in &asym {
            writeln!(writer, "{} {}", quote(chain), quote(entity))?;
        }
        writeln!(writer, "#")?;
    }

    writeln!(writer, "loop_")?;
    for column in ATOM_SITE_COLUMNS {
        writeln!(writer, "_atom_site.{}", column)?;
    }

    let mut serial = 0usize;
    for (chain_id, chain) in system.chains_iter() {
        let label = chain.name.to_string();
        let entity = info.entity_id_for_chain(&chain.name.name).unwrap_or("?");
        let author = chain.author_name.as_deref().unwrap_or(&chain.name.name);
        for (_, residue) in system.chain_residues(chain_id) {
            let icode = residue
                .insertion_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "?".to_string());
            for &atom_id in residue.atoms() {
                let Some(atom) = system.atom(atom_id) else {
                    continue;
                };
                serial += 1;
                writeln!(
                    writer,
                    "{} {} {} {} {} {} {} {} {} {:.3} {:.3} {:.3} {} {} {} 1",
                    if atom.is_hetatm { "HETATM" } else { "ATOM" },
                    serial,
                    quote(&atom.element),
                    quote(&atom.name),
                    quote(&residue.name),
                    quote(&label),
                    entity,
                    residue.residue_number,
                    icode,
                    atom.position.x,
                    atom.position.y,
                    atom.position.z,
                    atom.formal_charge,
                    residue.residue_number,
                    quote(author),
                )?;
            }
        }
    }
    writeln!(writer, "#")?;

    debug!("Wrote {} atoms to data block '{}'", serial, block_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::quote;
    use crate::core::io::mmcif::fixtures::DIMER_WITH_HEME;
    use crate::core::io::mmcif::{MmcifFile, MmcifReadOptions, MmcifWriteOptions};
    use crate::core::io::traits::MolecularFile;
    use crate::core::models::chain::ChainName;

    #[test]
    fn quoting_follows_cif_token_rules() {
        assert_eq!(quote("CA"), "CA");
        assert_eq!(quote("O5'"), "O5'");
        assert_eq!(quote("HEME C"), "'HEME C'");
        assert_eq!(quote("."), "'.'");
        assert_eq!(quote("_x"), "'_x'");
        assert_eq!(quote("it' s"), "\"it' s\"");
    }

    #[test]
    fn written_block_reads_back_with_entities() {
        let options = MmcifReadOptions::fault_tolerant(false);
        let (system, metadata) = MmcifFile::read_from_str(DIMER_WITH_HEME, &options).unwrap();

        let mut buffer = Vec::new();
        MmcifFile::write_to(&system, &metadata, &MmcifWriteOptions::default(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("data_molprep\n"));
        assert!(text.contains("2 non-polymer 'PROTOPORPHYRIN IX CONTAINING FE'"));

        let (reread, remeta) = MmcifFile::read_from_str(&text, &options).unwrap();
        assert_eq!(reread.atom_count(), system.atom_count());
        assert_eq!(reread.chain_count(), system.chain_count());
        assert_eq!(remeta.info.entity_id_for_chain("C"), Some("2"));
        assert_eq!(remeta.info.entity_ids_of_type("polymer").len(), 1);

        let chain_a = reread.find_chain_by_name(&ChainName::new("A")).unwrap();
        let ser = reread.find_residue(chain_a, 3, None).unwrap();
        let n = reread.residue(ser).unwrap().get_first_atom_id_by_name("N").unwrap();
        assert_eq!(reread.atom(n).unwrap().formal_charge, 1);
        assert_eq!(reread.chain(chain_a).unwrap().author_name.as_deref(), Some("X"));
    }
}
