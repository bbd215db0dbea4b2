//! Dependency resolution within a step
//!
//! Determines a safe execution order for a step's operation list: creates
//! before uses, uses before drops, foreign key drops before table drops.
//! Independent operations keep their author order — the resolver reorders
//! only when a hard dependency would otherwise be violated.
//!
//! Seed operations always execute after schema operations of the same step,
//! preserving relative author order inside each group.

use crate::operations::{SchemaOp, StepOp};
use crate::schema::SchemaObjectModel;
use crate::{MigrateError, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// A named schema resource an operation provides, needs, or removes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Resource {
	Table(String),
	Column(String, String),
	Index(String),
	ForeignKey(String),
}

#[derive(Debug, Default)]
struct OpEffects {
	provides: Vec<Resource>,
	needs: Vec<Resource>,
	removes: Vec<Resource>,
}

fn effects(op: &SchemaOp) -> OpEffects {
	let mut fx = OpEffects::default();
	match op {
		SchemaOp::CreateTable { name, columns, .. } => {
			fx.provides.push(Resource::Table(name.clone()));
			for column in columns {
				fx.provides
					.push(Resource::Column(name.clone(), column.name.clone()));
			}
		}
		SchemaOp::DropTable { name } => {
			fx.removes.push(Resource::Table(name.clone()));
		}
		SchemaOp::AddColumn { table, column } => {
			fx.needs.push(Resource::Table(table.clone()));
			fx.provides
				.push(Resource::Column(table.clone(), column.name.clone()));
		}
		SchemaOp::DropColumn { table, column } => {
			fx.removes.push(Resource::Column(table.clone(), column.clone()));
		}
		SchemaOp::RenameColumn { table, from, to } => {
			fx.needs.push(Resource::Column(table.clone(), from.clone()));
			fx.removes.push(Resource::Column(table.clone(), from.clone()));
			fx.provides.push(Resource::Column(table.clone(), to.clone()));
		}
		SchemaOp::CreateIndex { table, columns, .. } => {
			for column in columns {
				fx.needs.push(Resource::Column(table.clone(), column.clone()));
			}
			fx.provides
				.push(Resource::Index(crate::operations::index_name(table, columns)));
		}
		SchemaOp::DropIndex { name } => {
			fx.removes.push(Resource::Index(name.clone()));
		}
		SchemaOp::AddForeignKey {
			table,
			column,
			principal_table,
			principal_column,
			..
		} => {
			fx.needs.push(Resource::Column(table.clone(), column.clone()));
			fx.needs.push(Resource::Column(
				principal_table.clone(),
				principal_column.clone(),
			));
			fx.provides.push(Resource::ForeignKey(
				crate::operations::foreign_key_name(table, principal_table, column),
			));
		}
		SchemaOp::DropForeignKey { name, .. } => {
			fx.removes.push(Resource::ForeignKey(name.clone()));
		}
	}
	fx
}

/// Tables a dropped resource is tied to, looked up in the pre-step model or
/// among foreign keys added earlier in the same list.
fn foreign_key_tables(
	name: &str,
	ops: &[(usize, &SchemaOp)],
	model: &SchemaObjectModel,
) -> Vec<String> {
	if let Some(fk) = model.foreign_key(name) {
		return vec![fk.table.clone(), fk.principal_table.clone()];
	}
	for (_, op) in ops {
		if let SchemaOp::AddForeignKey {
			table,
			column,
			principal_table,
			..
		} = op
			&& crate::operations::foreign_key_name(table, principal_table, column) == name
		{
			return vec![table.clone(), principal_table.clone()];
		}
	}
	Vec::new()
}

fn index_table(name: &str, ops: &[(usize, &SchemaOp)], model: &SchemaObjectModel) -> Option<String> {
	if let Some(ix) = model.index(name) {
		return Some(ix.table.clone());
	}
	for (_, op) in ops {
		if let SchemaOp::CreateIndex { table, columns, .. } = op
			&& crate::operations::index_name(table, columns) == name
		{
			return Some(table.clone());
		}
	}
	None
}

/// Computes execution order within a single step.
pub struct DependencyResolver;

impl DependencyResolver {
	/// Order a step's `up` list for execution.
	///
	/// Returns indices into `ops`: schema operations first in a stable
	/// minimal reordering, then seed operations in author order. A
	/// dependency cycle is an `InvalidDependencyOrder` error.
	pub fn resolve(ops: &[StepOp], model: &SchemaObjectModel) -> Result<Vec<usize>> {
		let (schema_ops, seed_indices) = split(ops);
		let edges = build_edges(&schema_ops, model);
		let mut order = stable_topological(&schema_ops, &edges)?;
		order.extend(seed_indices);
		Ok(order)
	}

	/// Validate that an author-supplied list (a step's `down`) already
	/// satisfies every hard dependency without reordering.
	///
	/// This is the registration-time check: a `down` that drops a table
	/// before dropping its dependent foreign key is rejected here, never at
	/// execution. Returns the execution order (schema then seed, both in
	/// author order).
	pub fn validate(ops: &[StepOp], model: &SchemaObjectModel) -> Result<Vec<usize>> {
		let (schema_ops, seed_indices) = split(ops);
		let edges = build_edges(&schema_ops, model);
		let position: HashMap<usize, usize> = schema_ops
			.iter()
			.enumerate()
			.map(|(pos, (index, _))| (*index, pos))
			.collect();
		for (from, to) in &edges {
			if position[from] >= position[to] {
				let before = &schema_ops[position[from]].1;
				let after = &schema_ops[position[to]].1;
				return Err(MigrateError::InvalidDependencyOrder(format!(
					"'{}' must run before '{}'",
					before.describe(),
					after.describe()
				)));
			}
		}
		let mut order: Vec<usize> = schema_ops.iter().map(|(index, _)| *index).collect();
		order.extend(seed_indices);
		Ok(order)
	}
}

fn split(ops: &[StepOp]) -> (Vec<(usize, &SchemaOp)>, Vec<usize>) {
	let mut schema_ops = Vec::new();
	let mut seed_indices = Vec::new();
	for (index, op) in ops.iter().enumerate() {
		match op {
			StepOp::Schema(op) => schema_ops.push((index, op)),
			StepOp::Seed(_) => seed_indices.push(index),
		}
	}
	(schema_ops, seed_indices)
}

/// Hard ordering constraints between schema operations, as pairs of op
/// indices (`from` must execute before `to`).
fn build_edges(ops: &[(usize, &SchemaOp)], model: &SchemaObjectModel) -> Vec<(usize, usize)> {
	let mut edges = Vec::new();
	let mut providers: HashMap<Resource, usize> = HashMap::new();
	let mut removers: HashMap<Resource, usize> = HashMap::new();
	let per_op: Vec<(usize, OpEffects)> = ops
		.iter()
		.map(|(index, op)| (*index, effects(op)))
		.collect();

	for (index, fx) in &per_op {
		for resource in &fx.provides {
			providers.insert(resource.clone(), *index);
		}
		for resource in &fx.removes {
			removers.insert(resource.clone(), *index);
		}
	}

	for (index, fx) in &per_op {
		// Created before used.
		for resource in &fx.needs {
			if let Some(provider) = providers.get(resource)
				&& provider != index
			{
				edges.push((*provider, *index));
			}
			// Used before removed.
			if let Some(remover) = removers.get(resource)
				&& remover != index
			{
				edges.push((*index, *remover));
			}
		}
	}

	// Drops of dependent objects precede the drop of their table; the table
	// drop in turn precedes nothing else here (cross-step violations surface
	// during registry simulation).
	for (index, op) in ops {
		match op {
			SchemaOp::DropForeignKey { name, .. } => {
				for table in foreign_key_tables(name, ops, model) {
					if let Some(remover) = removers.get(&Resource::Table(table.clone()))
						&& remover != index
					{
						edges.push((*index, *remover));
					}
				}
				// The constraint also pins any column drop beneath it.
				if let Some(fk) = model.foreign_key(name) {
					for resource in [
						Resource::Column(fk.table.clone(), fk.column.clone()),
						Resource::Column(fk.principal_table.clone(), fk.principal_column.clone()),
					] {
						if let Some(remover) = removers.get(&resource)
							&& remover != index
						{
							edges.push((*index, *remover));
						}
					}
				}
			}
			SchemaOp::DropIndex { name } => {
				if let Some(table) = index_table(name, ops, model) {
					if let Some(remover) = removers.get(&Resource::Table(table.clone()))
						&& remover != index
					{
						edges.push((*index, *remover));
					}
					if let Some(ix) = model.index(name) {
						for column in &ix.columns {
							if let Some(remover) =
								removers.get(&Resource::Column(table.clone(), column.clone()))
								&& remover != index
							{
								edges.push((*index, *remover));
							}
						}
					}
				}
			}
			_ => {}
		}
	}

	edges.sort_unstable();
	edges.dedup();
	edges
}

/// Kahn's algorithm, always picking the ready operation with the smallest
/// author index so independent operations keep their written order.
fn stable_topological(ops: &[(usize, &SchemaOp)], edges: &[(usize, usize)]) -> Result<Vec<usize>> {
	let mut graph: DiGraph<usize, ()> = DiGraph::new();
	let mut nodes: HashMap<usize, NodeIndex> = HashMap::new();
	for (index, _) in ops {
		nodes.insert(*index, graph.add_node(*index));
	}
	for (from, to) in edges {
		graph.add_edge(nodes[from], nodes[to], ());
	}

	let mut in_degree: HashMap<usize, usize> = ops.iter().map(|(index, _)| (*index, 0)).collect();
	for (_, to) in edges {
		if let Some(degree) = in_degree.get_mut(to) {
			*degree += 1;
		}
	}

	let mut ready: BinaryHeap<Reverse<usize>> = in_degree
		.iter()
		.filter(|(_, degree)| **degree == 0)
		.map(|(index, _)| Reverse(*index))
		.collect();
	let mut order = Vec::with_capacity(ops.len());

	while let Some(Reverse(index)) = ready.pop() {
		order.push(index);
		for neighbor in graph.neighbors(nodes[&index]) {
			let target = graph[neighbor];
			if let Some(degree) = in_degree.get_mut(&target) {
				*degree -= 1;
				if *degree == 0 {
					ready.push(Reverse(target));
				}
			}
		}
	}

	if order.len() != ops.len() {
		return Err(MigrateError::InvalidDependencyOrder(
			"operation dependency cycle within step".to_string(),
		));
	}
	Ok(order)
}
