use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, btree_set};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::plugin_system::metadata::PlateMetadata;
use crate::plugin_system::namespace::PlatformNamespace;
use crate::plugin_system::relation::{Relation, RelationType};

/// A plugin class discovered in a container, before instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCandidate {
    pub metadata: Arc<PlateMetadata>,
    /// Name of the container the class was found in
    pub container: String,
    pub class_name: String,
    /// Containers whose own included copy of this plugin was dropped in
    /// favour of this one
    pub included_copies: Vec<String>,
}

impl PluginCandidate {
    pub fn new(metadata: impl Into<Arc<PlateMetadata>>, container: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            metadata: metadata.into(),
            container: container.into(),
            class_name: class_name.into(),
            included_copies: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.metadata.id()
    }

    fn ships_in(&self, container: &str) -> bool {
        self.container == container || self.included_copies.iter().any(|c| c == container)
    }
}

/// A required relation nothing satisfies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    pub plugin_id: String,
    pub relation: RelationType,
    pub namespace: String,
    pub target_id: String,
    /// Version of the target when it exists outside the accepted ranges
    pub found_version: Option<String>,
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {} '{}:{}'", self.plugin_id, self.relation, self.namespace, self.target_id)?;
        match &self.found_version {
            Some(version) => write!(f, " (found unsupported version {version})"),
            None => write!(f, " (not found)"),
        }
    }
}

/// An INCOMPATIBLE relation satisfied by a present plugin or platform entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incompatibility {
    pub plugin_id: String,
    pub namespace: String,
    pub target_id: String,
    pub target_version: String,
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is incompatible with '{}:{}' {}",
            self.plugin_id, self.namespace, self.target_id, self.target_version
        )
    }
}

/// An INCLUDED relation whose target comes from another container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisplacedInclusion {
    pub plugin_id: String,
    pub container: String,
    pub target_id: String,
    pub target_container: String,
}

impl fmt::Display for MisplacedInclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' from '{}' includes '{}' but it was loaded from '{}'",
            self.plugin_id, self.container, self.target_id, self.target_container
        )
    }
}

/// Error that can occur when resolving dependencies
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("Missing required dependencies: {}", join(.0))]
    MissingDependencies(Vec<MissingDependency>),

    /// Every strongly connected component of the load graph
    #[error("Circular dependency detected: {}", format_cycles(.0))]
    CyclicDependency(Vec<Vec<String>>),

    #[error("Incompatible plugins: {}", join(.0))]
    Incompatible(Vec<Incompatibility>),

    #[error("Included plugins provided by another container: {}", join(.0))]
    IncludedElsewhere(Vec<MisplacedInclusion>),

    #[error("Plugin id '{0}' was given to the resolver more than once")]
    DuplicateId(String),
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles.iter().map(|cycle| cycle.join(" <-> ")).collect::<Vec<_>>().join("; ")
}

/// Computes a load order honoring the relations between plugins.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    platform: PlatformNamespace,
}

impl DependencyResolver {
    pub fn new(platform: PlatformNamespace) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &PlatformNamespace {
        &self.platform
    }

    /// Resolves plugins that all come from a single container.
    pub fn resolve_order(&self, plugins: &[PlateMetadata]) -> Result<Vec<String>, DependencyError> {
        let candidates: Vec<PluginCandidate> = plugins
            .iter()
            .map(|metadata| PluginCandidate::new(metadata.clone(), "", metadata.id()))
            .collect();
        self.resolve(&candidates)
    }

    /// Returns the ids of `candidates` in load order.
    ///
    /// Ties are broken by input position, so unrelated plugins keep the order
    /// they were given in. Failures are reported in this order:
    /// incompatibilities, misplaced inclusions, missing dependencies, cycles.
    pub fn resolve(&self, candidates: &[PluginCandidate]) -> Result<Vec<String>, DependencyError> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(candidates.len());
        for (position, candidate) in candidates.iter().enumerate() {
            if index.insert(candidate.id(), position).is_some() {
                return Err(DependencyError::DuplicateId(candidate.id().to_string()));
            }
        }

        // edges[a] holds every plugin that must load after `a`
        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); candidates.len()];
        let mut missing = Vec::new();
        let mut incompatible = Vec::new();
        let mut misplaced = Vec::new();

        for (position, candidate) in candidates.iter().enumerate() {
            for relation in candidate.metadata.relations() {
                if relation.is_platform() {
                    self.check_platform(candidate, relation, &mut missing, &mut incompatible);
                    continue;
                }
                if !relation.is_plate() {
                    log::warn!(
                        "Ignoring relation of '{}' to unknown namespace '{}'",
                        candidate.id(),
                        relation.namespace()
                    );
                    continue;
                }

                let target = index.get(relation.id()).copied();
                if target == Some(position) {
                    log::debug!("Ignoring relation of '{}' to itself", candidate.id());
                    continue;
                }
                let present = target.filter(|&t| relation.contains(&candidates[t].metadata));

                match (relation.kind(), present) {
                    (kind, Some(t)) if kind.is_before() => {
                        edges[t].insert(position);
                    }
                    (kind, Some(t)) if kind.is_after() => {
                        edges[position].insert(t);
                    }
                    (kind, None) if kind.is_required() => missing.push(MissingDependency {
                        plugin_id: candidate.id().to_string(),
                        relation: kind,
                        namespace: relation.namespace().to_string(),
                        target_id: relation.id().to_string(),
                        found_version: target.map(|t| candidates[t].metadata.version().to_string()),
                    }),
                    (RelationType::Incompatible, Some(t)) => incompatible.push(Incompatibility {
                        plugin_id: candidate.id().to_string(),
                        namespace: relation.namespace().to_string(),
                        target_id: relation.id().to_string(),
                        target_version: candidates[t].metadata.version().to_string(),
                    }),
                    (RelationType::Included, Some(t)) if !candidates[t].ships_in(&candidate.container) => {
                        misplaced.push(MisplacedInclusion {
                            plugin_id: candidate.id().to_string(),
                            container: candidate.container.clone(),
                            target_id: relation.id().to_string(),
                            target_container: candidates[t].container.clone(),
                        })
                    }
                    _ => {}
                }
            }
        }

        if !incompatible.is_empty() {
            return Err(DependencyError::Incompatible(incompatible));
        }
        if !misplaced.is_empty() {
            return Err(DependencyError::IncludedElsewhere(misplaced));
        }
        if !missing.is_empty() {
            return Err(DependencyError::MissingDependencies(missing));
        }

        let cycles = strongly_connected_cycles(&edges);
        if !cycles.is_empty() {
            let named = cycles
                .into_iter()
                .map(|cycle| cycle.into_iter().map(|i| candidates[i].id().to_string()).collect())
                .collect();
            return Err(DependencyError::CyclicDependency(named));
        }

        let order = topological_order(&edges);
        log::debug!("Resolved load order for {} plugins", order.len());
        Ok(order.into_iter().map(|i| candidates[i].id().to_string()).collect())
    }

    fn check_platform(
        &self,
        candidate: &PluginCandidate,
        relation: &Relation,
        missing: &mut Vec<MissingDependency>,
        incompatible: &mut Vec<Incompatibility>,
    ) {
        let entry = self.platform.get(relation.id());
        let present = entry.filter(|version| relation.matches_platform(relation.id(), version));

        match (relation.kind(), present) {
            (kind, None) if kind.is_required() => missing.push(MissingDependency {
                plugin_id: candidate.id().to_string(),
                relation: kind,
                namespace: relation.namespace().to_string(),
                target_id: relation.id().to_string(),
                found_version: entry.map(ToString::to_string),
            }),
            (RelationType::Incompatible, Some(version)) => incompatible.push(Incompatibility {
                plugin_id: candidate.id().to_string(),
                namespace: relation.namespace().to_string(),
                target_id: relation.id().to_string(),
                target_version: version.to_string(),
            }),
            _ => {}
        }
    }
}

/// Kahn's algorithm, always emitting the lowest ready index first.
fn topological_order(edges: &[BTreeSet<usize>]) -> Vec<usize> {
    let mut in_degree = vec![0usize; edges.len()];
    for successors in edges {
        for &next in successors {
            in_degree[next] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> =
        (0..edges.len()).filter(|&i| in_degree[i] == 0).map(Reverse).collect();
    let mut order = Vec::with_capacity(edges.len());

    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &next in &edges[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    order
}

/// Tarjan's algorithm driven by an explicit frame stack; the call stack depth
/// does not depend on the length of dependency chains. Returns every component with
/// more than one member, members sorted by index, components sorted by their
/// lowest member.
fn strongly_connected_cycles(edges: &[BTreeSet<usize>]) -> Vec<Vec<usize>> {
    struct Tarjan {
        next_index: usize,
        index: Vec<Option<usize>>,
        low_link: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        components: Vec<Vec<usize>>,
    }

    impl Tarjan {
        fn open(&mut self, node: usize) {
            self.index[node] = Some(self.next_index);
            self.low_link[node] = self.next_index;
            self.next_index += 1;
            self.stack.push(node);
            self.on_stack[node] = true;
        }

        fn close(&mut self, node: usize) {
            if Some(self.low_link[node]) != self.index[node] {
                return;
            }
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            if component.len() > 1 {
                component.sort_unstable();
                self.components.push(component);
            }
        }
    }

    let mut tarjan = Tarjan {
        next_index: 0,
        index: vec![None; edges.len()],
        low_link: vec![0; edges.len()],
        on_stack: vec![false; edges.len()],
        stack: Vec::new(),
        components: Vec::new(),
    };
    // (node, successors not yet followed)
    let mut frames: Vec<(usize, btree_set::Iter<'_, usize>)> = Vec::new();

    for root in 0..edges.len() {
        if tarjan.index[root].is_some() {
            continue;
        }
        tarjan.open(root);
        frames.push((root, edges[root].iter()));

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            match frame.1.next().copied() {
                Some(next) => match tarjan.index[next] {
                    None => {
                        tarjan.open(next);
                        frames.push((next, edges[next].iter()));
                    }
                    Some(next_index) if tarjan.on_stack[next] => {
                        tarjan.low_link[node] = tarjan.low_link[node].min(next_index);
                    }
                    Some(_) => {}
                },
                None => {
                    frames.pop();
                    if let Some(&(parent, _)) = frames.last() {
                        tarjan.low_link[parent] = tarjan.low_link[parent].min(tarjan.low_link[node]);
                    }
                    tarjan.close(node);
                }
            }
        }
    }

    let mut components = tarjan.components;
    components.sort_by_key(|component| component[0]);
    components
}
