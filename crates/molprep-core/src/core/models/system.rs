use super::atom::Atom;
use super::chain::{Chain, ChainName};
use super::ids::{AtomId, ChainId, ResidueId};
use super::residue::Residue;
use super::topology::{Bond, BondOrder};
use nalgebra::Point3;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;

/// Residue lookup key: parent chain, sequence number and insertion code.
type ResidueKey = (ChainId, isize, Option<char>);

/// Represents a complete molecular system with atoms, residues, chains, and bonds.
///
/// This is the canonical in-memory graph produced by every reader and consumed by
/// every writer. Chains are kept in insertion order so that files round-trip with
/// their record order intact; residues and atoms keep the order of their parent.
#[derive(Debug, Clone, Default)]
pub struct MolecularSystem {
    /// Primary storage for atoms using a slot map for efficient ID management.
    atoms: SlotMap<AtomId, Atom>,
    /// Primary storage for residues using a slot map for efficient ID management.
    residues: SlotMap<ResidueId, Residue>,
    /// Primary storage for chains using a slot map for efficient ID management.
    chains: SlotMap<ChainId, Chain>,
    /// Chain IDs in insertion order.
    chain_order: Vec<ChainId>,
    /// List of all bonds in the system.
    bonds: Vec<Bond>,
    /// Lookup map for finding residues by chain, number and insertion code.
    residue_id_map: HashMap<ResidueKey, ResidueId>,
    /// Lookup map for finding chains by their structured name.
    chain_name_map: HashMap<ChainName, ChainId>,
    /// Cached adjacency list for bond connectivity, indexed by atom ID.
    bond_adjacency: SecondaryMap<AtomId, Vec<AtomId>>,
}

impl MolecularSystem {
    /// Creates a new, empty molecular system.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    /// Returns an iterator over all atoms in storage order.
    ///
    /// Use [`MolecularSystem::atom_ids_in_order`] when file order matters.
    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    pub fn residue_mut(&mut self, id: ResidueId) -> Option<&mut Residue> {
        self.residues.get_mut(id)
    }

    pub fn residues_iter(&self) -> impl Iterator<Item = (ResidueId, &Residue)> {
        self.residues.iter()
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id)
    }

    pub fn chain_mut(&mut self, id: ChainId) -> Option<&mut Chain> {
        self.chains.get_mut(id)
    }

    /// Returns an iterator over all chains in insertion order.
    pub fn chains_iter(&self) -> impl Iterator<Item = (ChainId, &Chain)> {
        self.chain_order
            .iter()
            .filter_map(|&id| self.chains.get(id).map(|chain| (id, chain)))
    }

    /// Returns the residues of a chain in order.
    pub fn chain_residues(&self, chain_id: ChainId) -> impl Iterator<Item = (ResidueId, &Residue)> {
        self.chains
            .get(chain_id)
            .map(|chain| chain.residues.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|&id| self.residues.get(id).map(|residue| (id, residue)))
    }

    /// Returns all atom IDs ordered by chain, residue and position within the residue.
    pub fn atom_ids_in_order(&self) -> Vec<AtomId> {
        self.chains_iter()
            .flat_map(|(chain_id, _)| self.chain_residues(chain_id))
            .flat_map(|(_, residue)| residue.atoms.iter().copied())
            .collect()
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn chain_count(&self) -> usize {
        self.chain_order.len()
    }

    pub fn find_chain_by_name(&self, name: &ChainName) -> Option<ChainId> {
        self.chain_name_map.get(name).copied()
    }

    pub fn find_residue(
        &self,
        chain_id: ChainId,
        residue_number: isize,
        insertion_code: Option<char>,
    ) -> Option<ResidueId> {
        self.residue_id_map
            .get(&(chain_id, residue_number, insertion_code))
            .copied()
    }

    /// Adds a new chain to the system or returns the existing one.
    ///
    /// This method is idempotent; if a chain with the given name already exists,
    /// it returns the existing chain ID without creating a duplicate.
    pub fn add_chain(&mut self, name: ChainName) -> ChainId {
        if let Some(&id) = self.chain_name_map.get(&name) {
            return id;
        }
        let id = self.chains.insert(Chain::new(name.clone()));
        self.chain_name_map.insert(name, id);
        self.chain_order.push(id);
        id
    }

    /// Adds a new residue to the system or returns the existing one.
    ///
    /// Returns `None` if the chain does not exist.
    pub fn add_residue(
        &mut self,
        chain_id: ChainId,
        residue_number: isize,
        insertion_code: Option<char>,
        name: &str,
    ) -> Option<ResidueId> {
        let chain = self.chains.get_mut(chain_id)?;
        let key = (chain_id, residue_number, insertion_code);

        let residue_id = *self.residue_id_map.entry(key).or_insert_with(|| {
            let mut residue = Residue::new(residue_number, name, chain_id);
            residue.insertion_code = insertion_code;
            self.residues.insert(residue)
        });

        if !chain.residues.contains(&residue_id) {
            chain.residues.push(residue_id);
        }

        Some(residue_id)
    }

    /// Adds an atom to a specific residue.
    ///
    /// The atom's `residue_id` is overwritten with `residue_id`. Returns `None` if
    /// the residue does not exist.
    pub fn add_atom_to_residue(&mut self, residue_id: ResidueId, mut atom: Atom) -> Option<AtomId> {
        let residue = self.residues.get_mut(residue_id)?;
        atom.residue_id = residue_id;
        let name = atom.name.clone();

        let atom_id = self.atoms.insert(atom);
        self.bond_adjacency.insert(atom_id, Vec::new());
        residue.add_atom(&name, atom_id);

        Some(atom_id)
    }

    /// Adds a bond between two atoms.
    ///
    /// Adding a bond that already exists (in either direction) succeeds without
    /// creating a duplicate. Returns `None` if either atom does not exist.
    pub fn add_bond(&mut self, atom1_id: AtomId, atom2_id: AtomId, order: BondOrder) -> Option<()> {
        if !self.atoms.contains_key(atom1_id) || !self.atoms.contains_key(atom2_id) {
            return None;
        }

        if let Some(neighbors) = self.bond_adjacency.get(atom1_id) {
            if neighbors.contains(&atom2_id) {
                return Some(());
            }
        }

        self.bonds.push(Bond::new(atom1_id, atom2_id, order));
        self.bond_adjacency[atom1_id].push(atom2_id);
        self.bond_adjacency[atom2_id].push(atom1_id);
        Some(())
    }

    /// Removes an atom together with every bond that references it.
    pub fn remove_atom(&mut self, atom_id: AtomId) -> Option<Atom> {
        let atom = self.atoms.remove(atom_id)?;

        if let Some(residue) = self.residues.get_mut(atom.residue_id) {
            residue.remove_atom(&atom.name, atom_id);
        }

        self.bonds.retain(|bond| !bond.contains(atom_id));

        let neighbors = self.bond_adjacency.remove(atom_id).unwrap_or_default();
        for neighbor_id in neighbors {
            if let Some(adjacency) = self.bond_adjacency.get_mut(neighbor_id) {
                adjacency.retain(|&id| id != atom_id);
            }
        }

        Some(atom)
    }

    /// Removes a residue and all of its atoms.
    pub fn remove_residue(&mut self, residue_id: ResidueId) -> Option<Residue> {
        let atom_ids = self.residues.get(residue_id)?.atoms.clone();
        for atom_id in atom_ids {
            self.remove_atom(atom_id);
        }

        let residue = self.residues.remove(residue_id)?;
        if let Some(chain) = self.chains.get_mut(residue.chain_id) {
            chain.residues.retain(|&id| id != residue_id);
        }
        self.residue_id_map.remove(&(
            residue.chain_id,
            residue.residue_number,
            residue.insertion_code,
        ));

        Some(residue)
    }

    pub fn get_bonded_neighbors(&self, atom_id: AtomId) -> Option<&[AtomId]> {
        self.bond_adjacency.get(atom_id).map(|v| v.as_slice())
    }

    /// Returns the bonds touching `atom_id`.
    pub fn bonds_of(&self, atom_id: AtomId) -> impl Iterator<Item = &Bond> {
        self.bonds.iter().filter(move |bond| bond.contains(atom_id))
    }

    /// Creates a new system containing only the atoms accepted by `keep`.
    ///
    /// Residues and chains left without atoms are dropped; bonds survive only when
    /// both of their atoms do. Residue annotations are carried over unchanged.
    pub fn extract<F>(&self, keep: F) -> MolecularSystem
    where
        F: Fn(&Chain, &Residue, &Atom) -> bool,
    {
        let chain_ids: Vec<ChainId> = self.chain_order.clone();
        let mut target = MolecularSystem::new();
        self.copy_chains_into(
            &mut target,
            &chain_ids,
            &keep,
            |name| name.clone(),
            |p| *p,
        );
        target
    }

    /// Appends copies of `chain_ids` from `source`, renaming chains with `rename` and
    /// mapping every coordinate through `transform`.
    ///
    /// Bonds are copied when both atoms belong to the copied chains.
    pub fn append_transformed<R, T>(
        &mut self,
        source: &MolecularSystem,
        chain_ids: &[ChainId],
        rename: R,
        transform: T,
    ) where
        R: Fn(&ChainName) -> ChainName,
        T: Fn(&Point3<f64>) -> Point3<f64>,
    {
        source.copy_chains_into(
            self,
            chain_ids,
            &|_: &Chain, _: &Residue, _: &Atom| true,
            rename,
            transform,
        );
    }

    fn copy_chains_into<F, R, T>(
        &self,
        target: &mut MolecularSystem,
        chain_ids: &[ChainId],
        keep: &F,
        rename: R,
        transform: T,
    ) where
        F: Fn(&Chain, &Residue, &Atom) -> bool,
        R: Fn(&ChainName) -> ChainName,
        T: Fn(&Point3<f64>) -> Point3<f64>,
    {
        let mut atom_map: HashMap<AtomId, AtomId> = HashMap::new();

        for &chain_id in chain_ids {
            let Some(chain) = self.chains.get(chain_id) else {
                continue;
            };
            let mut new_chain_id = None;

            for (_, residue) in self.chain_residues(chain_id) {
                let kept: Vec<AtomId> = residue
                    .atoms
                    .iter()
                    .copied()
                    .filter(|&id| self.atoms.get(id).is_some_and(|atom| keep(chain, residue, atom)))
                    .collect();
                if kept.is_empty() {
                    continue;
                }

                let target_chain = *new_chain_id.get_or_insert_with(|| {
                    let id = target.add_chain(rename(&chain.name));
                    if let Some(new_chain) = target.chains.get_mut(id) {
                        new_chain.author_name = chain.author_name.clone();
                    }
                    id
                });
                let Some(new_residue_id) = target.add_residue(
                    target_chain,
                    residue.residue_number,
                    residue.insertion_code,
                    &residue.name,
                ) else {
                    continue;
                };
                if let Some(new_residue) = target.residues.get_mut(new_residue_id) {
                    new_residue.chem_class = residue.chem_class;
                    new_residue.one_letter_code = residue.one_letter_code;
                }

                for old_id in kept {
                    let mut atom = self.atoms[old_id].clone();
                    atom.position = transform(&atom.position);
                    if let Some(new_id) = target.add_atom_to_residue(new_residue_id, atom) {
                        atom_map.insert(old_id, new_id);
                    }
                }
            }
        }

        for bond in &self.bonds {
            if let (Some(&a1), Some(&a2)) = (atom_map.get(&bond.atom1_id), atom_map.get(&bond.atom2_id)) {
                target.add_bond(a1, a2, bond.order);
            }
        }
    }
}
