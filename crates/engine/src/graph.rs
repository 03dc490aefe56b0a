//! Field dependency graph built on `petgraph`.
//!
//! An edge `A -> B` means field `A` reads field `B`. References are found
//! statically in conditions, expressions, defaults, properties, validation
//! rules and option sources; nothing is evaluated. Nested fields also read
//! their parent, whose visibility and disabled state they inherit. Cycles are tolerated:
//! they are reported at build time and skipped during ordering.

use std::collections::{HashMap, VecDeque};

use formwork_expression::ExpressionEngine;
use formwork_schema::FormSchema;
use formwork_schema::path::{normalize, prefixes};
use indexmap::IndexSet;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Forward and reverse read relationships between fields.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index_map: HashMap<String, NodeIndex>,
    cycles: Vec<Vec<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Active,
    Done,
}

impl DependencyGraph {
    /// Scan `schema` and build the graph.
    ///
    /// Expressions that fail to parse contribute no edges; structural
    /// validation reports them.
    pub fn build(schema: &FormSchema, expressions: &ExpressionEngine) -> Self {
        let flat = schema.flatten();
        let mut graph = DiGraph::new();
        let mut index_map = HashMap::new();

        for field in flat.iter() {
            let idx = graph.add_node(field.path.to_string());
            index_map.insert(field.path.to_string(), idx);
        }

        let mut this = Self {
            graph,
            index_map,
            cycles: Vec::new(),
        };

        for field in flat.iter() {
            if let Some(parent) = field.parent {
                this.add_edge(field.path, parent);
            }
            let mut references: Vec<String> = field
                .field
                .field_references()
                .into_iter()
                .map(str::to_string)
                .collect();
            for text in field.field.expressions() {
                match expressions.references(&text) {
                    Ok(refs) => references.extend(refs),
                    Err(err) => {
                        tracing::debug!(field = field.path, error = %err, "skipping unparsable expression");
                    }
                }
            }

            for reference in references {
                match this.resolve_reference(&reference) {
                    Some(target) if target != field.path => {
                        this.add_edge(field.path, &target);
                    }
                    Some(_) => {}
                    None => {
                        tracing::trace!(field = field.path, reference = %reference, "reference is not a field");
                    }
                }
            }
        }

        this.cycles = this.find_cycles();
        if !this.cycles.is_empty() {
            tracing::warn!(cycles = ?this.cycles, "dependency cycles detected; evaluation will skip back-edges");
        }
        tracing::debug!(
            schema = %schema.id,
            fields = this.graph.node_count(),
            edges = this.graph.edge_count(),
            "dependency graph built"
        );
        this
    }

    /// Record that `from` reads `to`. Unknown ids are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if let (Some(&a), Some(&b)) = (self.index_map.get(from), self.index_map.get(to))
            && a != b
        {
            self.graph.update_edge(a, b, ());
        }
    }

    /// The longest known field path that prefixes `reference`, if any.
    #[must_use]
    pub fn resolve_reference(&self, reference: &str) -> Option<String> {
        let normalized = normalize(reference);
        prefixes(&normalized)
            .into_iter()
            .find(|candidate| self.index_map.contains_key(*candidate))
            .map(str::to_string)
    }

    /// `changed` plus every field that transitively reads one of them.
    ///
    /// Unknown ids are ignored; indexed paths normalise to their item
    /// template. Terminates on cyclic graphs.
    pub fn affected_fields<I, S>(&self, changed: I) -> IndexSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut visited: IndexSet<NodeIndex> = IndexSet::new();
        let mut queue = VecDeque::new();

        for id in changed {
            match self.index_map.get(&normalize(id.as_ref())) {
                Some(&idx) => {
                    if visited.insert(idx) {
                        queue.push_back(idx);
                    }
                }
                None => tracing::debug!(id = id.as_ref(), "changed id is not a field"),
            }
        }

        while let Some(idx) = queue.pop_front() {
            for reader in self.sorted_neighbors(idx, Direction::Incoming) {
                if visited.insert(reader) {
                    queue.push_back(reader);
                }
            }
        }

        visited.into_iter().map(|idx| self.graph[idx].clone()).collect()
    }

    /// Every field, dependencies before dependents, otherwise in declaration
    /// order.
    ///
    /// A back-edge closing a cycle is skipped with a warning, so the result
    /// always lists each field exactly once.
    #[must_use]
    pub fn evaluation_order(&self) -> Vec<String> {
        let mut marks = vec![Mark::New; self.graph.node_count()];
        let mut order = Vec::with_capacity(self.graph.node_count());

        for start in self.graph.node_indices() {
            if marks[start.index()] != Mark::New {
                continue;
            }
            marks[start.index()] = Mark::Active;
            let mut stack = vec![(start, self.pending(start))];

            loop {
                let Some((node, pending)) = stack.last_mut() else {
                    break;
                };
                let node = *node;
                match pending.pop() {
                    Some(next) => match marks[next.index()] {
                        Mark::New => {
                            marks[next.index()] = Mark::Active;
                            stack.push((next, self.pending(next)));
                        }
                        Mark::Active => {
                            tracing::warn!(
                                from = %self.graph[node],
                                to = %self.graph[next],
                                "skipping cyclic dependency"
                            );
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[node.index()] = Mark::Done;
                        order.push(self.graph[node].clone());
                        stack.pop();
                    }
                }
            }
        }
        order
    }

    /// Strongly connected groups of two or more fields found at build time.
    #[must_use]
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    #[must_use]
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Fields that `id` reads directly.
    #[must_use]
    pub fn dependencies_of(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Fields that read `id` directly.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Incoming)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index_map.contains_key(&normalize(id))
    }

    /// Field paths in declaration order.
    #[must_use]
    pub fn field_ids(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.index_map.get(&normalize(id)) else {
            return Vec::new();
        };
        self.sorted_neighbors(idx, direction)
            .into_iter()
            .map(|i| self.graph[i].clone())
            .collect()
    }

    /// Neighbours in declaration order.
    fn sorted_neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
        out.sort_unstable();
        out
    }

    /// Dependencies left to visit, reversed so `pop` yields declaration order.
    fn pending(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = self.sorted_neighbors(idx, Direction::Outgoing);
        out.reverse();
        out
    }

    fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|mut component| {
                component.sort_unstable();
                component
                    .into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect()
            })
            .collect();
        cycles.sort();
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_schema::{Condition, FieldKind, FieldSpec, OptionsConfig};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn build(schema: &FormSchema) -> DependencyGraph {
        DependencyGraph::build(schema, &ExpressionEngine::new())
    }

    fn chain() -> FormSchema {
        FormSchema::new("chain")
            .with_field(FieldSpec::text("a").visible_when(Condition::eq("b", json!(1))))
            .with_field(FieldSpec::text("b").visible_when(Condition::eq("c", json!(1))))
            .with_field(FieldSpec::text("c"))
    }

    #[test]
    fn affected_follows_reverse_edges() {
        let graph = build(&chain());
        let affected: Vec<String> = graph.affected_fields(["c"]).into_iter().collect();
        assert_eq!(affected, vec!["c", "b", "a"]);
        assert_eq!(graph.affected_fields(["a"]).len(), 1);
        assert!(graph.affected_fields(["nope"]).is_empty());
    }

    #[test]
    fn order_puts_dependencies_first() {
        let graph = build(&chain());
        assert_eq!(graph.evaluation_order(), vec!["c", "b", "a"]);
        assert_eq!(graph.dependencies_of("a"), vec!["b"]);
        assert_eq!(graph.dependents_of("c"), vec!["b"]);
        assert!(!graph.has_cycles());
    }

    #[test]
    fn cycles_are_reported_and_skipped() {
        let schema = FormSchema::new("loop")
            .with_field(FieldSpec::text("a").visible_when(Condition::exists("b")))
            .with_field(FieldSpec::text("b").with_label("After ${a}"))
            .with_field(FieldSpec::text("c").with_default(json!("${b}")));
        let graph = build(&schema);

        assert_eq!(graph.cycles(), &[vec!["a".to_string(), "b".to_string()]]);
        assert_eq!(graph.evaluation_order(), vec!["b", "a", "c"]);
        let affected: Vec<String> = graph.affected_fields(["a"]).into_iter().collect();
        assert_eq!(affected, vec!["a", "b", "c"]);
    }

    #[test]
    fn references_resolve_to_longest_field_prefix() {
        let schema = FormSchema::new("nested")
            .with_field(
                FieldSpec::new("address", FieldKind::Group)
                    .with_field(FieldSpec::text("city"))
                    .with_field(FieldSpec::text("zip")),
            )
            .with_field(
                FieldSpec::new("items", FieldKind::Array).with_field(FieldSpec::text("qty")),
            )
            .with_field(
                FieldSpec::text("summary")
                    .with_label("${address.city.name} ${items[0].qty} ${currency} ${summary}")
                    .with_property("zip_hint", json!({"text": "${address.zip}"})),
            )
            .with_field(
                FieldSpec::new("city_choice", FieldKind::Select)
                    .with_options(OptionsConfig::dependent("address.city", [])),
            );
        let graph = build(&schema);

        assert_eq!(
            graph.dependencies_of("summary"),
            vec!["address.city", "address.zip", "items[].qty"]
        );
        assert_eq!(graph.dependencies_of("city_choice"), vec!["address.city"]);
        assert_eq!(graph.resolve_reference("items[4].qty.extra"), Some("items[].qty".into()));
        assert_eq!(graph.resolve_reference("currency"), None);
        assert!(graph.contains("items[9].qty"));
    }

    #[test]
    fn children_follow_their_parent() {
        let schema = FormSchema::new("nested")
            .with_field(FieldSpec::new("toggle", FieldKind::Boolean))
            .with_field(
                FieldSpec::new("extra", FieldKind::Group)
                    .visible_when(Condition::eq("toggle", json!(true)))
                    .with_field(FieldSpec::text("note")),
            );
        let graph = build(&schema);

        assert_eq!(graph.dependencies_of("extra.note"), vec!["extra"]);
        let affected: Vec<String> = graph.affected_fields(["toggle"]).into_iter().collect();
        assert_eq!(affected, vec!["toggle", "extra", "extra.note"]);
        assert_eq!(graph.evaluation_order(), vec!["toggle", "extra", "extra.note"]);
    }

    #[test]
    fn every_edge_propagates() {
        let schema = FormSchema::new("mixed")
            .with_field(FieldSpec::text("x"))
            .with_field(FieldSpec::text("y").required_when(Condition::simple(
                "x",
                formwork_schema::Operator::Ne,
                json!(""),
            )))
            .with_field(FieldSpec::text("z").with_placeholder("${y} ${x}"));
        let graph = build(&schema);

        for id in graph.field_ids() {
            for dependency in graph.dependencies_of(id) {
                let affected = graph.affected_fields([dependency.as_str()]);
                assert!(affected.contains(id), "{id} should be affected by {dependency}");
                assert_eq!(affected, graph.affected_fields([dependency.as_str()]));
            }
        }
    }
}
