//! Static library dependency graph.
//!
//! Nodes are indices into the register's library list. Edges point from a
//! library to the libraries listed in its `depends_on`.

use crate::errors::BuildError;
use crate::register::Register;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// `dependencies[i]`: libraries `i` depends on
    dependencies: Vec<Vec<usize>>,
    /// `dependents[i]`: libraries depending on `i`
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn from_register(register: &Register) -> Result<Self, BuildError> {
        Self::new(
            register
                .static_libraries
                .iter()
                .map(|l| (l.name.as_str(), l.depends_on.as_slice())),
        )
    }

    /// Build a graph from `(name, depends_on)` pairs in declaration order.
    pub fn new<'a, I, D>(libraries: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: AsRef<[String]>,
    {
        let declared: Vec<(&str, D)> = libraries.into_iter().collect();
        let names: Vec<String> = declared.iter().map(|(n, _)| n.to_string()).collect();
        let index: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();

        let mut dependencies = vec![Vec::new(); names.len()];
        let mut dependents = vec![Vec::new(); names.len()];
        for (from, (name, deps)) in declared.iter().enumerate() {
            for dep in deps.as_ref() {
                let to = *index.get(dep).ok_or_else(|| BuildError::UnknownDependency {
                    library: name.to_string(),
                    missing: dep.clone(),
                })?;
                if !dependencies[from].contains(&to) {
                    dependencies[from].push(to);
                    dependents[to].push(from);
                }
            }
        }

        Ok(Self {
            names,
            index,
            dependencies,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Topological order: every library comes after all of its dependencies.
    ///
    /// Ties are broken by declaration order. On a cycle the error lists every
    /// library that could not be ordered, sorted by name.
    pub fn resolve_order(&self) -> Result<Vec<usize>, BuildError> {
        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: VecDeque<usize> = (0..self.len()).filter(|&i| remaining[i] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(node) = ready.pop_front() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() != self.len() {
            let mut members: Vec<String> = (0..self.len())
                .filter(|&i| remaining[i] > 0)
                .map(|i| self.names[i].clone())
                .collect();
            members.sort();
            return Err(BuildError::DependencyCycle { members });
        }
        Ok(order)
    }

    /// Every library reachable from `roots`, roots included.
    ///
    /// The walk is bounded so a cyclic graph cannot loop forever even if
    /// [`DependencyGraph::resolve_order`] was skipped.
    pub fn expand(&self, roots: &[usize]) -> Result<Vec<bool>, BuildError> {
        let n = self.len();
        let mut seen = vec![false; n];
        let mut queue: VecDeque<usize> = roots.iter().copied().collect();
        let mut budget = n * n + n + 1;

        while let Some(node) = queue.pop_front() {
            budget = budget.checked_sub(1).ok_or_else(|| BuildError::DependencyCycle {
                members: roots.iter().map(|&r| self.names[r].clone()).collect(),
            })?;
            if seen[node] {
                continue;
            }
            seen[node] = true;
            queue.extend(self.dependencies[node].iter().copied());
        }
        Ok(seen)
    }

    /// Libraries to pass to the linker for `roots`, dependents first.
    ///
    /// This is the reverse topological order restricted to the transitive
    /// closure of `roots`, so with `A -> B -> C` the result is `A, B, C`.
    pub fn link_order(&self, roots: &[usize]) -> Result<Vec<usize>, BuildError> {
        let closure = self.expand(roots)?;
        let mut order: Vec<usize> = self
            .resolve_order()?
            .into_iter()
            .filter(|&i| closure[i])
            .collect();
        order.reverse();
        Ok(order)
    }

    /// Resolve library names to indices, reporting the first unknown one.
    pub fn lookup(&self, owner: &str, names: &[String]) -> Result<Vec<usize>, BuildError> {
        names
            .iter()
            .map(|name| {
                self.index_of(name).ok_or_else(|| BuildError::UnknownLibrary {
                    owner: owner.to_string(),
                    name: name.clone(),
                })
            })
            .collect()
    }
}
