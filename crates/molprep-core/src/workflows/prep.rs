use super::config::PrepConfig;
use super::error::PrepError;
use super::progress::{Progress, ProgressReporter};
use crate::core::assembly::build_biounit;
use crate::core::compounds::CompoundLibrary;
use crate::core::compounds::processor::RuleBasedProcessor;
use crate::core::io::mmcif::{MmcifFile, MmcifInfo, MmcifReadOptions, SequenceRecord};
use crate::core::io::pdb::{PdbFile, PdbReadOptions};
use crate::core::io::profile::Tolerance;
use crate::core::io::traits::MolecularFile;
use crate::core::logging::push_verbosity;
use crate::core::models::chain::ChainName;
use crate::core::models::system::MolecularSystem;
use crate::core::utils::connectivity::{connect_by_distance, connect_from_compound};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, instrument, warn};

/// How a chain was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
    Polymer,
    NonPolymer,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct PrepResult {
    /// Polymer chains, cleaned of hydrogens.
    pub polymer: MolecularSystem,
    /// Classification of every chain of the (assembly) structure.
    pub classification: HashMap<ChainName, EntityClass>,
    /// One single-residue system per non-polymer chain, when requested.
    pub non_polymers: Option<Vec<MolecularSystem>>,
    /// Gapless sequences named by entity id, when requested and complete.
    pub seqres: Option<Vec<SequenceRecord>>,
    /// Polymer chain to entity id, when requested and complete.
    pub seqres_mapping: Option<HashMap<ChainName, String>>,
}

/// Removes hydrogen and deuterium atoms, then re-annotates residues.
///
/// Annotation runs again because a residue rejected for unknown hydrogen names is
/// recognized once those atoms are gone.
pub fn clean_hydrogens<L>(system: &MolecularSystem, clib: &L) -> MolecularSystem
where
    L: CompoundLibrary + ?Sized,
{
    let mut cleaned = system.extract(|_, _, atom| !atom.is_hydrogen());
    let report = RuleBasedProcessor::new(clib).process(&mut cleaned);
    debug!(
        "Removed {} hydrogens; {} residues annotated",
        system.atom_count() - cleaned.atom_count(),
        report.annotated
    );
    cleaned
}

/// Prepares an mmCIF file for scoring.
///
/// # Errors
///
/// See [`mmcif_prep_from_reader`].
pub fn mmcif_prep<L>(
    path: &Path,
    clib: &L,
    config: &PrepConfig,
    reporter: &ProgressReporter,
) -> Result<PrepResult, PrepError>
where
    L: CompoundLibrary + ?Sized,
{
    let file = File::open(path).map_err(|e| PrepError::Mmcif(e.into()))?;
    let mut reader = BufReader::new(file);
    mmcif_prep_from_reader(&mut reader, clib, config, reporter)
}

/// Loads an mmCIF structure, removes hydrogens, optionally builds an assembly and
/// splits the result into polymer and non-polymer parts.
///
/// # Errors
///
/// Load failures, an unknown biounit and non-polymer chains that are not exactly one
/// residue are always errors. Missing entity types, sequences or ligand compounds
/// are errors only when the resolved tolerance is strict; otherwise they are logged
/// and a fallback is used.
#[instrument(skip_all, name = "mmcif_prep")]
pub fn mmcif_prep_from_reader<L>(
    reader: &mut impl BufRead,
    clib: &L,
    config: &PrepConfig,
    reporter: &ProgressReporter,
) -> Result<PrepResult, PrepError>
where
    L: CompoundLibrary + ?Sized,
{
    let fault_tolerant = config.tolerance.resolve()?;

    // === Stage 1: Load ===
    reporter.report(Progress::PhaseStart { name: "Loading" });
    let (raw, metadata) = {
        let _quiet = push_verbosity(LevelFilter::ERROR);
        MmcifFile::read_from(reader, &MmcifReadOptions::fault_tolerant(fault_tolerant))?
    };
    let info = &metadata.info;
    reporter.report(Progress::PhaseFinish);

    // === Stage 2: Hydrogen cleanup ===
    reporter.report(Progress::PhaseStart {
        name: "Hydrogen Cleanup",
    });
    let mut entity = clean_hydrogens(&raw, clib);
    reporter.report(Progress::PhaseFinish);

    // === Stage 3: Biological assembly ===
    if let Some(id) = &config.biounit {
        reporter.report(Progress::PhaseStart {
            name: "Assembly Construction",
        });
        let spec = info
            .biounit(id)
            .ok_or_else(|| PrepError::BiounitNotFound(id.clone()))?;
        entity = build_biounit(&entity, info, spec)?;
        reporter.report(Progress::PhaseFinish);
    }

    // === Stage 4: Entity classification ===
    reporter.report(Progress::PhaseStart {
        name: "Entity Classification",
    });
    let missing_types = chains_without_entity_type(&entity, info);
    let (polymer, classification) = if missing_types.is_empty() {
        classify_by_entity_type(&entity, info)
    } else if fault_tolerant {
        warn!(
            "mmCIF file does not contain entity type information for chains: {}. \
             Classifying chains by peptide/nucleotide residue composition instead.",
            missing_types.join(", ")
        );
        reporter.fallback("Entity Classification", "classified by residue composition");
        classify_by_composition(&entity)
    } else {
        return Err(PrepError::MissingEntityTypes {
            chains: missing_types,
        });
    };
    reporter.report(Progress::PhaseFinish);

    // === Stage 5: Non-polymer extraction ===
    let non_polymers = if config.extract_nonpoly {
        reporter.report(Progress::PhaseStart {
            name: "Non-polymer Extraction",
        });
        if !missing_types.is_empty() {
            return Err(PrepError::NonPolymerWithoutEntityTypes {
                chains: missing_types,
            });
        }
        let extracted = extract_non_polymers(&entity, info, clib, fault_tolerant, reporter)?;
        reporter.report(Progress::PhaseFinish);
        Some(extracted)
    } else {
        None
    };

    // === Stage 6: Sequence mapping ===
    let (seqres, seqres_mapping) = if config.extract_seqres_mapping {
        reporter.report(Progress::PhaseStart {
            name: "Sequence Mapping",
        });
        let mapped = map_sequences(&polymer, info, &metadata.seqres, fault_tolerant, reporter)?;
        reporter.report(Progress::PhaseFinish);
        match mapped {
            Some((seqres, mapping)) => (Some(seqres), Some(mapping)),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    info!(
        "Prepared {} polymer chains with {} atoms",
        polymer.chain_count(),
        polymer.atom_count()
    );
    Ok(PrepResult {
        polymer,
        classification,
        non_polymers,
        seqres,
        seqres_mapping,
    })
}

/// Prepares a PDB file for scoring: load, then hydrogen cleanup.
pub fn pdb_prep<L>(path: &Path, clib: &L, tolerance: &Tolerance) -> Result<MolecularSystem, PrepError>
where
    L: CompoundLibrary + ?Sized,
{
    let file = File::open(path).map_err(|e| PrepError::Pdb(e.into()))?;
    let mut reader = BufReader::new(file);
    pdb_prep_from_reader(&mut reader, clib, tolerance)
}

#[instrument(skip_all, name = "pdb_prep")]
pub fn pdb_prep_from_reader<L>(
    reader: &mut impl BufRead,
    clib: &L,
    tolerance: &Tolerance,
) -> Result<MolecularSystem, PrepError>
where
    L: CompoundLibrary + ?Sized,
{
    let options = PdbReadOptions {
        tolerance: tolerance.clone(),
    };
    let (raw, _) = {
        let _quiet = push_verbosity(LevelFilter::ERROR);
        PdbFile::read_from(reader, &options)?
    };
    Ok(clean_hydrogens(&raw, clib))
}

/// Asymmetric-unit names of chains whose entity type cannot be resolved, in chain order.
fn chains_without_entity_type(entity: &MolecularSystem, info: &MmcifInfo) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for (_, chain) in entity.chains_iter() {
        let au_name = &chain.name.name;
        let typed = info
            .entity_id_for_chain(au_name)
            .and_then(|id| info.entity_desc(id))
            .is_some();
        if !typed && !missing.contains(au_name) {
            missing.push(au_name.clone());
        }
    }
    missing
}

fn classify_by_entity_type(
    entity: &MolecularSystem,
    info: &MmcifInfo,
) -> (MolecularSystem, HashMap<ChainName, EntityClass>) {
    let polymer_ids = info.entity_ids_of_type("polymer");
    let non_polymer_ids = info.entity_ids_of_type("non-polymer");

    let classification = entity
        .chains_iter()
        .map(|(_, chain)| {
            let class = match info.entity_id_for_chain(&chain.name.name) {
                Some(id) if polymer_ids.contains(id) => EntityClass::Polymer,
                Some(id) if non_polymer_ids.contains(id) => EntityClass::NonPolymer,
                _ => EntityClass::Unknown,
            };
            (chain.name.clone(), class)
        })
        .collect();

    let polymer = entity.extract(|chain, _, _| {
        info.entity_id_for_chain(&chain.name.name)
            .is_some_and(|id| polymer_ids.contains(id))
    });
    (polymer, classification)
}

fn classify_by_composition(entity: &MolecularSystem) -> (MolecularSystem, HashMap<ChainName, EntityClass>) {
    let polymer = entity.extract(|_, residue, _| {
        residue.chem_class.is_peptide() || residue.chem_class.is_nucleotide()
    });
    let classification = entity
        .chains_iter()
        .map(|(_, chain)| {
            let class = if polymer.find_chain_by_name(&chain.name).is_some() {
                EntityClass::Polymer
            } else {
                EntityClass::Unknown
            };
            (chain.name.clone(), class)
        })
        .collect();
    (polymer, classification)
}

fn extract_non_polymers<L>(
    entity: &MolecularSystem,
    info: &MmcifInfo,
    clib: &L,
    fault_tolerant: bool,
    reporter: &ProgressReporter,
) -> Result<Vec<MolecularSystem>, PrepError>
where
    L: CompoundLibrary + ?Sized,
{
    let non_polymer_ids = info.entity_ids_of_type("non-polymer");
    let mut extracted = Vec::new();

    for (_, chain) in entity.chains_iter() {
        let is_non_polymer = info
            .entity_id_for_chain(&chain.name.name)
            .is_some_and(|id| non_polymer_ids.contains(id));
        if !is_non_polymer {
            continue;
        }

        let count = chain.residues().len();
        if count != 1 {
            return Err(PrepError::NonPolymerResidueCount {
                chain: chain.name.to_string(),
                count,
            });
        }

        let target = chain.name.clone();
        let mut ligand = entity.extract(|c, _, _| c.name == target);
        let Some((residue_id, residue_name)) = ligand
            .residues_iter()
            .next()
            .map(|(id, residue)| (id, residue.name.clone()))
        else {
            debug!("Non-polymer chain {} has no atoms left after cleanup", chain.name);
            continue;
        };

        match clib.find_compound(&residue_name) {
            Some(compound) if !compound.bonds.is_empty() => {
                connect_from_compound(&mut ligand, residue_id, compound);
            }
            Some(_) => {
                connect_by_distance(&mut ligand, residue_id);
            }
            None if fault_tolerant => {
                warn!(
                    "Non-polymer '{}' in chain {} is not in the compound library; \
                     connectivity is guessed from interatomic distances",
                    residue_name, chain.name
                );
                reporter.fallback(
                    "Non-polymer Extraction",
                    format!("distance-based connectivity for '{}'", residue_name),
                );
                connect_by_distance(&mut ligand, residue_id);
            }
            None => {
                return Err(PrepError::UnknownCompound {
                    chain: chain.name.to_string(),
                    residue: residue_name,
                });
            }
        }
        debug!("Extracted non-polymer {} from chain {}", residue_name, chain.name);
        reporter.report(Progress::NonPolymerExtracted {
            chain: chain.name.clone(),
        });
        extracted.push(ligand);
    }
    Ok(extracted)
}

type SequenceMapping = (Vec<SequenceRecord>, HashMap<ChainName, String>);

fn map_sequences(
    polymer: &MolecularSystem,
    info: &MmcifInfo,
    chain_sequences: &[SequenceRecord],
    fault_tolerant: bool,
    reporter: &ProgressReporter,
) -> Result<Option<SequenceMapping>, PrepError> {
    let mut seqres = Vec::new();
    let mut seqres_ids: HashSet<String> = HashSet::new();
    for record in chain_sequences {
        let Some(entity_id) = info.entity_id_for_chain(&record.name) else {
            continue;
        };
        if seqres_ids.insert(entity_id.to_string()) {
            seqres.push(SequenceRecord {
                name: entity_id.to_string(),
                sequence: record.gapless(),
            });
        }
    }

    let mut mapping = HashMap::new();
    let mut missing: Vec<String> = Vec::new();
    for (_, chain) in polymer.chains_iter() {
        // Assembly copies map through their asymmetric-unit chain.
        match info.entity_id_for_chain(&chain.name.name) {
            Some(entity_id) if seqres_ids.contains(entity_id) => {
                mapping.insert(chain.name.clone(), entity_id.to_string());
            }
            _ => {
                if !missing.contains(&chain.name.name) {
                    missing.push(chain.name.name.clone());
                }
            }
        }
    }

    if missing.is_empty() {
        return Ok(Some((seqres, mapping)));
    }
    if !fault_tolerant {
        return Err(PrepError::MissingSequences { chains: missing });
    }
    warn!(
        "mmCIF file does not contain SEQRES information for all polymer chains ({}). \
         No sequences or chain mapping will be returned.",
        missing.join(", ")
    );
    reporter.fallback("Sequence Mapping", "sequence outputs omitted");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compounds::{Compound, CompoundLib};
    use crate::core::error::ErrorCategory;
    use crate::core::io::mmcif::MmcifError;
    use crate::core::io::mmcif::fixtures::DIMER_WITH_HEME;
    use crate::core::io::profile::{DefaultProfileGuard, SLOPPY_PROFILE};
    use crate::core::logging::capture::{capture, has_event};
    use crate::core::models::residue::ChemClass;
    use crate::workflows::config::PrepConfigBuilder;
    use serial_test::serial;
    use std::sync::Mutex;
    use tracing::Level;

    fn library_with_heme() -> CompoundLib {
        let mut lib = CompoundLib::builtin();
        lib.insert(Compound {
            id: "HEM".into(),
            chem_class: ChemClass::NonPolymer,
            one_letter_code: None,
            atom_names: vec!["FE".into()],
            bonds: Vec::new(),
        });
        lib
    }

    fn run(text: &str, clib: &CompoundLib, config: &PrepConfig) -> Result<PrepResult, PrepError> {
        mmcif_prep_from_reader(&mut text.as_bytes(), clib, config, &ProgressReporter::new())
    }

    fn chain_names(system: &MolecularSystem) -> Vec<String> {
        system.chains_iter().map(|(_, c)| c.name.to_string()).collect()
    }

    /// Chain B points at an entity that has no `_entity` record.
    fn untyped_chain_b() -> String {
        DIMER_WITH_HEME.replace("\nB 1\n", "\nB 4\n")
    }

    #[test]
    fn clean_hydrogens_removes_h_and_d_and_reannotates() {
        let (raw, _) =
            MmcifFile::read_from_str(DIMER_WITH_HEME, &MmcifReadOptions::fault_tolerant(false)).unwrap();
        let lib = CompoundLib::builtin();
        let cleaned = clean_hydrogens(&raw, &lib);
        assert_eq!(cleaned.atom_count(), raw.atom_count() - 2);
        assert!(cleaned.atoms_iter().all(|(_, a)| !a.is_hydrogen()));

        let water = cleaned.find_chain_by_name(&ChainName::new("D")).unwrap();
        let (_, hoh) = cleaned.chain_residues(water).next().unwrap();
        assert_eq!(hoh.chem_class, ChemClass::Water);
    }

    #[test]
    fn polymer_chains_follow_entity_types() {
        let lib = library_with_heme();
        let config = PrepConfigBuilder::new().fault_tolerant(false).build().unwrap();
        let result = run(DIMER_WITH_HEME, &lib, &config).unwrap();

        assert_eq!(chain_names(&result.polymer), vec!["A", "B"]);
        assert_eq!(result.polymer.atom_count(), 8);
        assert_eq!(result.classification[&ChainName::new("C")], EntityClass::NonPolymer);
        assert_eq!(result.classification[&ChainName::new("D")], EntityClass::Unknown);
        assert!(result.non_polymers.is_none());
        assert!(result.seqres.is_none());
        assert!(result.seqres_mapping.is_none());
    }

    #[test]
    fn missing_entity_type_fails_strict_naming_the_chain() {
        let lib = library_with_heme();
        let config = PrepConfigBuilder::new().fault_tolerant(false).build().unwrap();
        let err = run(&untyped_chain_b(), &lib, &config).unwrap_err();
        assert!(matches!(&err, PrepError::MissingEntityTypes { chains } if chains == &["B"]));
        assert_eq!(err.category(), ErrorCategory::Metadata);
    }

    #[test]
    fn missing_entity_type_falls_back_to_composition_when_tolerant() {
        let lib = library_with_heme();
        let config = PrepConfigBuilder::new().fault_tolerant(true).build().unwrap();
        let (result, events) = capture(|| run(&untyped_chain_b(), &lib, &config));
        let result = result.unwrap();

        assert!(has_event(&events, Level::WARN, "chains: B"));
        assert_eq!(chain_names(&result.polymer), vec!["A", "B"]);
        assert_eq!(result.classification[&ChainName::new("C")], EntityClass::Unknown);
        assert_eq!(result.classification[&ChainName::new("B")], EntityClass::Polymer);
    }

    #[test]
    #[serial]
    fn default_profile_selects_the_classification_fallback() {
        let lib = library_with_heme();
        let config = PrepConfig::default();
        assert!(matches!(
            run(&untyped_chain_b(), &lib, &config),
            Err(PrepError::MissingEntityTypes { .. })
        ));

        let _guard = DefaultProfileGuard::set(SLOPPY_PROFILE).unwrap();
        let result = run(&untyped_chain_b(), &lib, &config).unwrap();
        assert_eq!(chain_names(&result.polymer), vec!["A", "B"]);
    }

    #[test]
    fn non_polymer_extraction_requires_entity_types_in_every_mode() {
        let lib = library_with_heme();
        for tolerant in [false, true] {
            let config = PrepConfigBuilder::new()
                .fault_tolerant(tolerant)
                .extract_nonpoly(true)
                .build()
                .unwrap();
            let err = run(&untyped_chain_b(), &lib, &config).unwrap_err();
            if tolerant {
                assert!(matches!(err, PrepError::NonPolymerWithoutEntityTypes { .. }));
            } else {
                assert!(matches!(err, PrepError::MissingEntityTypes { .. }));
            }
        }
    }

    #[test]
    fn non_polymer_with_two_residues_fails_in_both_modes() {
        let text = DIMER_WITH_HEME.replace(
            "ATOM   14 ",
            "HETATM 15 FE FE  . HEM C 2 . ? 3.000 3.000 3.000 ? 102 X 1\nATOM   14 ",
        );
        let lib = library_with_heme();
        for tolerant in [false, true] {
            let config = PrepConfigBuilder::new()
                .fault_tolerant(tolerant)
                .extract_nonpoly(true)
                .build()
                .unwrap();
            let err = run(&text, &lib, &config).unwrap_err();
            assert!(
                matches!(&err, PrepError::NonPolymerResidueCount { chain, count: 2 } if chain == "C"),
                "unexpected error: {err}"
            );
            assert!(err.to_string().contains("Got 2 in chain C"));
        }
    }

    #[test]
    fn non_polymers_are_extracted_one_system_per_chain() {
        let lib = library_with_heme();
        let config = PrepConfigBuilder::new()
            .fault_tolerant(false)
            .extract_nonpoly(true)
            .build()
            .unwrap();
        let result = run(DIMER_WITH_HEME, &lib, &config).unwrap();
        let ligands = result.non_polymers.unwrap();
        assert_eq!(ligands.len(), 1);
        assert_eq!(chain_names(&ligands[0]), vec!["C"]);
        assert_eq!(ligands[0].atom_count(), 1);
    }

    #[test]
    fn unknown_ligand_fails_strict_and_warns_when_tolerant() {
        let lib = CompoundLib::builtin();
        let strict = PrepConfigBuilder::new()
            .fault_tolerant(false)
            .extract_nonpoly(true)
            .build()
            .unwrap();
        let err = run(DIMER_WITH_HEME, &lib, &strict).unwrap_err();
        assert!(matches!(&err, PrepError::UnknownCompound { residue, .. } if residue == "HEM"));
        assert_eq!(err.category(), ErrorCategory::Lookup);

        let tolerant = PrepConfigBuilder::new()
            .fault_tolerant(true)
            .extract_nonpoly(true)
            .build()
            .unwrap();
        let (result, events) = capture(|| run(DIMER_WITH_HEME, &lib, &tolerant));
        assert_eq!(result.unwrap().non_polymers.unwrap().len(), 1);
        assert!(has_event(&events, Level::WARN, "'HEM'"));
    }

    #[test]
    fn seqres_is_deduplicated_per_entity() {
        let lib = library_with_heme();
        let config = PrepConfigBuilder::new()
            .fault_tolerant(false)
            .extract_seqres_mapping(true)
            .build()
            .unwrap();
        let result = run(DIMER_WITH_HEME, &lib, &config).unwrap();

        let seqres = result.seqres.unwrap();
        assert_eq!(
            seqres,
            vec![SequenceRecord {
                name: "1".into(),
                sequence: "GAS".into()
            }]
        );
        let mapping = result.seqres_mapping.unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping[&ChainName::new("A")], "1");
        assert_eq!(mapping[&ChainName::new("B")], "1");
    }

    #[test]
    fn assembly_chains_map_through_their_asymmetric_unit_name() {
        let lib = library_with_heme();
        let config = PrepConfigBuilder::new()
            .fault_tolerant(false)
            .biounit("2")
            .extract_seqres_mapping(true)
            .build()
            .unwrap();
        let result = run(DIMER_WITH_HEME, &lib, &config).unwrap();

        assert_eq!(chain_names(&result.polymer), vec!["1.A", "2.A"]);
        let mapping = result.seqres_mapping.unwrap();
        assert_eq!(mapping[&ChainName::with_instance("1", "A")], "1");
        assert_eq!(mapping[&ChainName::with_instance("2", "A")], "1");
    }

    #[test]
    fn unknown_biounit_is_always_an_error() {
        let lib = library_with_heme();
        for tolerant in [false, true] {
            let config = PrepConfigBuilder::new()
                .fault_tolerant(tolerant)
                .biounit("42")
                .build()
                .unwrap();
            let err = run(DIMER_WITH_HEME, &lib, &config).unwrap_err();
            assert!(matches!(&err, PrepError::BiounitNotFound(id) if id == "42"));
        }
    }

    #[test]
    fn missing_sequences_fail_strict_and_disable_mapping_when_tolerant() {
        let text = DIMER_WITH_HEME.replace(
            "_entity_poly.entity_id 1\n_entity_poly.pdbx_seq_one_letter_code_can GAS\n",
            "",
        );
        let lib = library_with_heme();
        let strict = PrepConfigBuilder::new()
            .fault_tolerant(false)
            .extract_seqres_mapping(true)
            .build()
            .unwrap();
        let err = run(&text, &lib, &strict).unwrap_err();
        assert!(matches!(&err, PrepError::MissingSequences { chains } if chains == &["A", "B"]));

        let tolerant = PrepConfigBuilder::new()
            .fault_tolerant(true)
            .extract_seqres_mapping(true)
            .build()
            .unwrap();
        let (result, events) = capture(|| run(&text, &lib, &tolerant));
        let result = result.unwrap();
        assert!(result.seqres.is_none());
        assert!(result.seqres_mapping.is_none());
        assert!(has_event(&events, Level::WARN, "SEQRES"));
    }

    #[test]
    fn load_diagnostics_are_suppressed_below_error() {
        // The trailing row is incomplete; the tolerant lexer warns and drops it.
        let text = format!("{}loop_\n_extra.a\n_extra.b\n1\n", DIMER_WITH_HEME);
        let lib = library_with_heme();
        let config = PrepConfigBuilder::new().fault_tolerant(true).build().unwrap();
        let (result, events) = capture(|| run(&text, &lib, &config));
        assert!(result.is_ok());
        assert!(!has_event(&events, Level::WARN, "incomplete trailing row"));
        assert_eq!(crate::core::logging::current_verbosity(), None);
    }

    #[test]
    fn stages_are_reported_in_order() {
        let lib = library_with_heme();
        let config = PrepConfigBuilder::new()
            .fault_tolerant(false)
            .biounit("1")
            .extract_nonpoly(true)
            .extract_seqres_mapping(true)
            .build()
            .unwrap();
        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| match event {
            Progress::PhaseStart { name } => phases.lock().unwrap().push(name.to_string()),
            Progress::NonPolymerExtracted { chain } => {
                phases.lock().unwrap().push(format!("ligand {chain}"))
            }
            _ => {}
        }));
        mmcif_prep_from_reader(&mut DIMER_WITH_HEME.as_bytes(), &lib, &config, &reporter).unwrap();
        drop(reporter);
        assert_eq!(
            phases.into_inner().unwrap(),
            vec![
                "Loading",
                "Hydrogen Cleanup",
                "Assembly Construction",
                "Entity Classification",
                "Non-polymer Extraction",
                "ligand 1.C",
                "Sequence Mapping"
            ]
        );
    }

    #[test]
    fn mmcif_prep_reads_from_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cif");
        std::fs::write(&path, DIMER_WITH_HEME).unwrap();
        let lib = library_with_heme();
        let config = PrepConfigBuilder::new().fault_tolerant(false).build().unwrap();
        let result = mmcif_prep(&path, &lib, &config, &ProgressReporter::new()).unwrap();
        assert_eq!(result.polymer.chain_count(), 2);

        let missing = dir.path().join("missing.cif");
        assert!(matches!(
            mmcif_prep(&missing, &lib, &config, &ProgressReporter::new()),
            Err(PrepError::Mmcif(MmcifError::Io(_)))
        ));
    }

    #[test]
    fn pdb_prep_cleans_hydrogens() {
        let text = "\
ATOM      1  N   GLY A   1       0.000   0.000   0.000  1.00  0.00           N
ATOM      2  CA  GLY A   1       1.458   0.000   0.000  1.00  0.00           C
ATOM      3  HA2 GLY A   1       1.800   1.000   0.000  1.00  0.00           H
END
";
        let lib = CompoundLib::builtin();
        let system = pdb_prep_from_reader(&mut text.as_bytes(), &lib, &Tolerance::Explicit(false)).unwrap();
        assert_eq!(system.atom_count(), 2);
        let (_, residue) = system.residues_iter().next().unwrap();
        assert_eq!(residue.one_letter_code, Some('G'));
    }
}
