//! Biological assembly expansion.
//!
//! An assembly is a list of generators, each applying an operator expression to a
//! set of asymmetric-unit chains. Every operator combination produced by an
//! expression is one instance; instances are numbered from 1 across all generators
//! and become the `instance` part of the copied chains' [`ChainName`].

use crate::core::io::mmcif::{BioUnitSpec, MmcifInfo, SymmetryOperator};
use crate::core::models::chain::ChainName;
use crate::core::models::system::MolecularSystem;
use nalgebra::{Matrix3, Vector3};
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound on the operator combinations one expression may produce.
pub const MAX_OPERATOR_COMBINATIONS: usize = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Malformed operator expression '{0}'")]
    MalformedExpression(String),
    #[error("Operator '{operator}' used by assembly '{assembly}' is not in the operator list")]
    UnknownOperator { assembly: String, operator: String },
    #[error("Operator expression '{expression}' expands beyond {limit} entries")]
    ExpressionTooLarge { expression: String, limit: usize },
}

/// Expands an operator expression of `assembly` into operator-id combinations.
///
/// `"1,2"` and `"(1-3)"` list alternatives; `"(1,2)(3-4)"` is the Cartesian
/// product of its groups, where each combination is applied right to left.
/// Every id must be in the operator list of `info`. A range may not be wider than
/// that list, and the product may not exceed [`MAX_OPERATOR_COMBINATIONS`].
pub fn parse_oper_expression(
    info: &MmcifInfo,
    assembly: &str,
    expression: &str,
) -> Result<Vec<Vec<String>>, AssemblyError> {
    let malformed = || AssemblyError::MalformedExpression(expression.to_string());
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(malformed());
    }

    let groups: Vec<&str> = if trimmed.contains('(') {
        let mut groups = Vec::new();
        let mut rest = trimmed;
        while !rest.is_empty() {
            let inner = rest.strip_prefix('(').ok_or_else(malformed)?;
            let end = inner.find(')').ok_or_else(malformed)?;
            groups.push(&inner[..end]);
            rest = inner[end + 1..].trim_start();
        }
        groups
    } else {
        vec![trimmed]
    };

    let mut combinations: Vec<Vec<String>> = vec![Vec::new()];
    for group in groups {
        let ids = expand_group(info, assembly, expression, group)?;
        if combinations.len().saturating_mul(ids.len()) > MAX_OPERATOR_COMBINATIONS {
            return Err(AssemblyError::ExpressionTooLarge {
                expression: expression.to_string(),
                limit: MAX_OPERATOR_COMBINATIONS,
            });
        }
        combinations = combinations
            .into_iter()
            .flat_map(|prefix| {
                ids.iter().map(move |id| {
                    let mut combination = prefix.clone();
                    combination.push(id.clone());
                    combination
                })
            })
            .collect();
    }
    Ok(combinations)
}

fn expand_group(
    info: &MmcifInfo,
    assembly: &str,
    expression: &str,
    group: &str,
) -> Result<Vec<String>, AssemblyError> {
    let malformed = || AssemblyError::MalformedExpression(expression.to_string());
    let checked = |id: String| {
        if info.operator(&id).is_some() {
            Ok(id)
        } else {
            Err(AssemblyError::UnknownOperator {
                assembly: assembly.to_string(),
                operator: id,
            })
        }
    };

    let mut ids = Vec::new();
    for item in group.split(',') {
        let item = item.trim();
        if item.is_empty() {
            return Err(malformed());
        }
        match item.split_once('-') {
            Some((start, end)) => {
                let start: i64 = start.trim().parse().map_err(|_| malformed())?;
                let end: i64 = end.trim().parse().map_err(|_| malformed())?;
                if end < start {
                    return Err(malformed());
                }
                // A range wider than the operator list names at least one unknown id.
                let width = end.abs_diff(start).saturating_add(1);
                if width > info.operator_count() as u64 {
                    return Err(AssemblyError::ExpressionTooLarge {
                        expression: expression.to_string(),
                        limit: info.operator_count(),
                    });
                }
                for i in start..=end {
                    ids.push(checked(i.to_string())?);
                }
            }
            None => ids.push(checked(item.to_string())?),
        }
    }
    Ok(ids)
}

/// Composes a combination of operators; the rightmost operator applies first.
fn compose(
    info: &MmcifInfo,
    assembly: &str,
    combination: &[String],
) -> Result<SymmetryOperator, AssemblyError> {
    let mut rotation = Matrix3::identity();
    let mut translation = Vector3::zeros();
    for id in combination {
        let op = info.operator(id).ok_or_else(|| AssemblyError::UnknownOperator {
            assembly: assembly.to_string(),
            operator: id.clone(),
        })?;
        translation += rotation * op.translation;
        rotation *= op.rotation;
    }
    Ok(SymmetryOperator {
        id: combination.join("x"),
        rotation,
        translation,
    })
}

/// Builds the assembly described by `spec` from the asymmetric unit `system`.
///
/// Generator chains that are absent from `system` are skipped.
pub fn build_biounit(
    system: &MolecularSystem,
    info: &MmcifInfo,
    spec: &BioUnitSpec,
) -> Result<MolecularSystem, AssemblyError> {
    let mut assembly = MolecularSystem::new();
    let mut instance = 0usize;

    for generator in &spec.generators {
        let chain_ids: Vec<_> = generator
            .chains
            .iter()
            .filter_map(|name| {
                let found = system.find_chain_by_name(&ChainName::new(name.as_str()));
                if found.is_none() {
                    debug!("Assembly '{}' chain '{}' is not in the structure", spec.id, name);
                }
                found
            })
            .collect();

        for combination in parse_oper_expression(info, &spec.id, &generator.oper_expression)? {
            let op = compose(info, &spec.id, &combination)?;
            instance += 1;
            let instance_id = instance.to_string();
            assembly.append_transformed(
                system,
                &chain_ids,
                |name| ChainName::with_instance(instance_id.as_str(), name.name.as_str()),
                |p| op.rotation * p + op.translation,
            );
        }
    }

    info!(
        "Built assembly '{}': {} instances, {} chains",
        spec.id,
        instance,
        assembly.chain_count()
    );
    Ok(assembly)
}
