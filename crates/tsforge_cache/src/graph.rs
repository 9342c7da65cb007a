//! File-level import graph used to propagate invalidation.
//!
//! Edges are structural: they are added whenever the module resolver links
//! an importer to an imported file and are only ever removed wholesale by
//! [`DependencyGraph::clear`].

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tsforge_common::FileId;

/// A single "dependent imports dependency" relationship.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The importing file.
    pub dependent: FileId,
    /// The imported file.
    pub dependency: FileId,
}

/// Directed edge set between files, indexed in both directions.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// `dependent -> dependencies`.
    dependencies: BTreeMap<FileId, BTreeSet<FileId>>,
    /// `dependency -> dependents`.
    dependents: BTreeMap<FileId, BTreeSet<FileId>>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `dependent` imports `dependency`.
    ///
    /// Returns `false` if the edge was already present.
    pub fn add_edge(&mut self, dependency: FileId, dependent: FileId) -> bool {
        let inserted = self
            .dependencies
            .entry(dependent.clone())
            .or_default()
            .insert(dependency.clone());
        if inserted {
            self.dependents.entry(dependency).or_default().insert(dependent);
            self.edge_count += 1;
        }
        inserted
    }

    /// Returns `true` if `dependent` imports `dependency`.
    pub fn contains_edge(&self, dependency: &FileId, dependent: &FileId) -> bool {
        self.dependencies
            .get(dependent)
            .is_some_and(|deps| deps.contains(dependency))
    }

    /// Files that directly import `id`.
    pub fn dependents_of<'a>(&'a self, id: &FileId) -> impl Iterator<Item = &'a FileId> + 'a {
        self.dependents.get(id).into_iter().flatten()
    }

    /// Files that `id` directly imports.
    pub fn dependencies_of<'a>(&'a self, id: &FileId) -> impl Iterator<Item = &'a FileId> + 'a {
        self.dependencies.get(id).into_iter().flatten()
    }

    /// Every file connected to `roots`, following edges in either direction.
    ///
    /// Roots are yielded first, then their neighbours breadth-first with
    /// dependents before dependencies. Each file appears exactly once, so
    /// import cycles terminate.
    pub fn reachable_from<'a>(&self, roots: impl IntoIterator<Item = &'a FileId>) -> Vec<FileId> {
        let mut visited: HashSet<&FileId> = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();

        for root in roots {
            if visited.insert(root) {
                queue.push_back(root.clone());
            }
        }

        while let Some(id) = queue.pop_front() {
            for next in self.dependents_of(&id).chain(self.dependencies_of(&id)) {
                if visited.insert(next) {
                    queue.push_back(next.clone());
                }
            }
            order.push(id);
        }
        order
    }

    /// All edges in `(dependent, dependency)` order.
    pub fn edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.dependencies.iter().flat_map(|(dependent, deps)| {
            deps.iter().map(move |dependency| DependencyEdge {
                dependent: dependent.clone(),
                dependency: dependency.clone(),
            })
        })
    }

    /// Number of distinct edges.
    pub fn len(&self) -> usize {
        self.edge_count
    }

    /// Returns `true` if there are no edges.
    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }

    /// Removes every edge.
    pub fn clear(&mut self) {
        self.dependencies.clear();
        self.dependents.clear();
        self.edge_count = 0;
    }
}

impl Extend<DependencyEdge> for DependencyGraph {
    fn extend<I: IntoIterator<Item = DependencyEdge>>(&mut self, edges: I) {
        for edge in edges {
            self.add_edge(edge.dependency, edge.dependent);
        }
    }
}
