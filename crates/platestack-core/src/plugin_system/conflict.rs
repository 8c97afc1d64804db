use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::plugin_system::dependency::PluginCandidate;
use crate::plugin_system::relation::{Relation, RelationType};

/// Types of plugin conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictType {
    /// The same id was declared twice inside one container
    SameContainer,
    /// The same id was declared by two containers
    AcrossContainers,
    /// A container ships its own copy of a plugin another container provides
    IncludedCopy,
}

impl ConflictType {
    /// Check if this conflict type fails the load
    pub fn is_critical(&self) -> bool {
        match self {
            ConflictType::SameContainer | ConflictType::AcrossContainers => true,
            ConflictType::IncludedCopy => false,
        }
    }

    /// Get a human-readable description of this conflict type
    pub fn description(&self) -> &str {
        match self {
            ConflictType::SameContainer => "Duplicate plugin in one container",
            ConflictType::AcrossContainers => "Duplicate plugin in two containers",
            ConflictType::IncludedCopy => "Included copy of a plugin provided elsewhere",
        }
    }
}

/// Strategies for resolving plugin conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Keep the copy discovered first, drop the later one
    KeepFirst,
}

/// Two plugin classes declaring the same id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConflict {
    /// The duplicated plugin id
    pub plugin_id: String,
    /// Container of the copy discovered first
    pub first_container: String,
    /// Class of the copy discovered first
    pub first_class: String,
    /// Container of the later copy
    pub second_container: String,
    /// Class of the later copy
    pub second_class: String,
    /// Type of conflict
    pub conflict_type: ConflictType,
    /// Resolution applied, if any
    pub resolution: Option<ResolutionStrategy>,
}

impl PluginConflict {
    fn between(first: &PluginCandidate, second: &PluginCandidate, conflict_type: ConflictType) -> Self {
        Self {
            plugin_id: first.metadata.id().to_string(),
            first_container: first.container.clone(),
            first_class: first.class_name.clone(),
            second_container: second.container.clone(),
            second_class: second.class_name.clone(),
            conflict_type,
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Check if this is a critical conflict that must be resolved
    pub fn is_critical(&self) -> bool {
        self.conflict_type.is_critical()
    }
}

impl fmt::Display for PluginConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' ({}) in '{}' [{}] and in '{}' [{}]",
            self.plugin_id,
            self.conflict_type.description(),
            self.first_container,
            self.first_class,
            self.second_container,
            self.second_class
        )
    }
}

#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("Duplicate plugins detected: {}", format_conflicts(.0))]
    DuplicatePlugins(Vec<PluginConflict>),
}

fn format_conflicts(conflicts: &[PluginConflict]) -> String {
    conflicts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Detects plugin ids declared more than once in a scan batch
#[derive(Debug, Default)]
pub struct ConflictManager {
    conflicts: Vec<PluginConflict>,
}

impl ConflictManager {
    /// Create a new conflict manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all conflicts seen so far, resolved ones included
    pub fn get_conflicts(&self) -> &[PluginConflict] {
        &self.conflicts
    }

    /// Get critical unresolved conflicts
    pub fn get_critical_unresolved_conflicts(&self) -> Vec<&PluginConflict> {
        self.conflicts
            .iter()
            .filter(|c| !c.is_resolved() && c.is_critical())
            .collect()
    }

    /// Check if a conflict was recorded for `id` between the two containers
    /// (order doesn't matter).
    pub fn has_conflict_between(&self, id: &str, container1: &str, container2: &str) -> bool {
        self.conflicts.iter().any(|c| {
            c.plugin_id == id
                && ((c.first_container == container1 && c.second_container == container2)
                    || (c.first_container == container2 && c.second_container == container1))
        })
    }

    /// Removes duplicate ids from `candidates`, keeping discovery order.
    ///
    /// A later copy is dropped when a plugin of its container declares an
    /// INCLUDED relation that the first copy satisfies; the kept candidate
    /// remembers that container in `included_copies`. Any other duplicate
    /// fails with [`ConflictError::DuplicatePlugins`].
    pub fn deduplicate(&mut self, candidates: Vec<PluginCandidate>) -> Result<Vec<PluginCandidate>, ConflictError> {
        let mut inclusions: HashMap<&str, Vec<&Relation>> = HashMap::new();
        for candidate in &candidates {
            inclusions
                .entry(candidate.container.as_str())
                .or_default()
                .extend(candidate.metadata.relations_of(RelationType::Included));
        }

        let mut kept: Vec<PluginCandidate> = Vec::with_capacity(candidates.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut dropped: Vec<(usize, String)> = Vec::new();
        let first_new = self.conflicts.len();

        for candidate in &candidates {
            let Some(&position) = index.get(candidate.metadata.id()) else {
                index.insert(candidate.metadata.id().to_string(), kept.len());
                kept.push(candidate.clone());
                continue;
            };

            let first = &kept[position];
            if first.container == candidate.container {
                self.conflicts.push(PluginConflict::between(first, candidate, ConflictType::SameContainer));
                continue;
            }

            let included = inclusions
                .get(candidate.container.as_str())
                .is_some_and(|relations| relations.iter().any(|relation| relation.contains(&first.metadata)));

            if included {
                log::warn!(
                    "Ignoring the copy of '{}' included in '{}', it is already provided by '{}'",
                    candidate.metadata.id(),
                    candidate.container,
                    first.container
                );
                let mut conflict = PluginConflict::between(first, candidate, ConflictType::IncludedCopy);
                conflict.resolution = Some(ResolutionStrategy::KeepFirst);
                self.conflicts.push(conflict);
                dropped.push((position, candidate.container.clone()));
            } else {
                self.conflicts.push(PluginConflict::between(first, candidate, ConflictType::AcrossContainers));
            }
        }

        let critical: Vec<PluginConflict> = self.conflicts[first_new..]
            .iter()
            .filter(|c| !c.is_resolved() && c.is_critical())
            .cloned()
            .collect();
        if !critical.is_empty() {
            return Err(ConflictError::DuplicatePlugins(critical));
        }

        for (position, container) in dropped {
            let copies = &mut kept[position].included_copies;
            if !copies.contains(&container) {
                copies.push(container);
            }
        }

        Ok(kept)
    }
}
