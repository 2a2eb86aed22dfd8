//! Bond assignment for residues whose connection table is not in the file.

use crate::core::compounds::Compound;
use crate::core::models::ids::{AtomId, ResidueId};
use crate::core::models::system::MolecularSystem;
use crate::core::models::topology::BondOrder;
use crate::core::utils::identifiers::covalent_radius;
use tracing::{debug, warn};

/// Slack added to the sum of covalent radii when deciding whether two atoms bond.
pub const BOND_TOLERANCE: f64 = 0.45;

/// Pairs closer than this are treated as overlapping sites, not bonds.
const MIN_BOND_DISTANCE: f64 = 0.4;

// Used for elements missing from the radius table.
const FALLBACK_RADIUS: f64 = 1.5;

/// Bonds every pair of atoms in `residue_id` whose distance is within the sum of
/// their covalent radii plus [`BOND_TOLERANCE`]. All inferred bonds are single.
///
/// Returns the number of bonds added.
pub fn connect_by_distance(system: &mut MolecularSystem, residue_id: ResidueId) -> usize {
    let Some(residue) = system.residue(residue_id) else {
        return 0;
    };
    let atoms: Vec<(AtomId, f64, nalgebra::Point3<f64>)> = residue
        .atoms()
        .iter()
        .filter_map(|&id| {
            let atom = system.atom(id)?;
            let radius = covalent_radius(&atom.element).unwrap_or_else(|| {
                debug!("No covalent radius for element '{}', using {}", atom.element, FALLBACK_RADIUS);
                FALLBACK_RADIUS
            });
            Some((id, radius, atom.position))
        })
        .collect();

    let mut pairs = Vec::new();
    for (i, (id1, r1, p1)) in atoms.iter().enumerate() {
        for (id2, r2, p2) in &atoms[i + 1..] {
            let distance = nalgebra::distance(p1, p2);
            if distance > MIN_BOND_DISTANCE && distance <= r1 + r2 + BOND_TOLERANCE {
                pairs.push((*id1, *id2));
            }
        }
    }

    let mut added = 0;
    for (a, b) in pairs {
        if system.add_bond(a, b, BondOrder::Single).is_some() {
            added += 1;
        }
    }
    added
}

/// Adds the bonds of `compound` between atoms of `residue_id`, matched by name.
///
/// Bonds whose atoms are absent from the residue (typically removed hydrogens) are
/// skipped. Returns the number of bonds added.
pub fn connect_from_compound(
    system: &mut MolecularSystem,
    residue_id: ResidueId,
    compound: &Compound,
) -> usize {
    let Some(residue) = system.residue(residue_id) else {
        return 0;
    };
    let resolved: Vec<(AtomId, AtomId, BondOrder)> = compound
        .bonds
        .iter()
        .filter_map(|bond| {
            Some((
                residue.get_first_atom_id_by_name(&bond.atom1)?,
                residue.get_first_atom_id_by_name(&bond.atom2)?,
                bond.order,
            ))
        })
        .collect();
    if resolved.len() < compound.bonds.len() {
        debug!(
            "{} of {} bonds of compound '{}' reference missing atoms",
            compound.bonds.len() - resolved.len(),
            compound.bonds.len(),
            compound.id
        );
    }

    let mut added = 0;
    for (a, b, order) in resolved {
        if system.add_bond(a, b, order).is_some() {
            added += 1;
        }
    }
    if added == 0 && !compound.bonds.is_empty() {
        warn!("No bonds of compound '{}' could be matched to atom names", compound.id);
    }
    added
}
