use super::CompoundLibrary;
use crate::core::models::residue::ChemClass;
use crate::core::models::system::MolecularSystem;
use tracing::debug;

/// Counts from one annotation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub annotated: usize,
    pub unknown_compound: usize,
    pub unknown_atoms: usize,
}

/// Assigns residue chemical classes and one-letter codes from a compound library.
///
/// A residue is annotated only when every one of its atom names belongs to its
/// compound. Residues carrying foreign atoms, typically hydrogens named by another
/// convention, are reset to [`ChemClass::Unknown`]; removing those atoms and running
/// the processor again annotates them.
pub struct RuleBasedProcessor<'a, L: CompoundLibrary + ?Sized> {
    library: &'a L,
}

impl<'a, L: CompoundLibrary + ?Sized> RuleBasedProcessor<'a, L> {
    pub fn new(library: &'a L) -> Self {
        Self { library }
    }

    pub fn process(&self, system: &mut MolecularSystem) -> ProcessReport {
        let mut report = ProcessReport::default();
        let residue_ids: Vec<_> = system.residues_iter().map(|(id, _)| id).collect();

        for residue_id in residue_ids {
            let Some(residue) = system.residue(residue_id) else {
                continue;
            };
            let annotation = match self.library.find_compound(&residue.name) {
                None => {
                    report.unknown_compound += 1;
                    None
                }
                Some(compound) => {
                    let foreign = residue
                        .atoms()
                        .iter()
                        .filter_map(|&id| system.atom(id))
                        .find(|atom| !compound.has_atom(&atom.name));
                    match foreign {
                        Some(atom) => {
                            debug!(
                                "Residue {} {} has atom '{}' unknown to its compound",
                                residue.name, residue.residue_number, atom.name
                            );
                            report.unknown_atoms += 1;
                            None
                        }
                        None => {
                            report.annotated += 1;
                            Some((compound.chem_class, compound.one_letter_code))
                        }
                    }
                }
            };

            if let Some(residue) = system.residue_mut(residue_id) {
                let (chem_class, one_letter_code) = annotation.unwrap_or((ChemClass::Unknown, None));
                residue.chem_class = chem_class;
                residue.one_letter_code = one_letter_code;
            }
        }
        report
    }
}
