//! The package/version/dependency data model.

use indexmap::IndexMap;

use solvent_semver::{Version, VersionConstraint};

/// Stable identifier of a package within one graph: its insertion index.
pub type PackageId = usize;

/// Stable identifier of a version within its package: its insertion index.
pub type VersionId = usize;

/// A dependency edge from one package version to a target package.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub target: PackageId,
    pub constraint: VersionConstraint,
}

/// One released version of a package, with its outgoing dependencies.
///
/// The dependency list is append-only after creation.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    version: Version,
    dependencies: Vec<Dependency>,
}

impl PackageVersion {
    fn new(version: Version) -> Self {
        Self {
            version,
            dependencies: Vec::new(),
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }
}

/// A named package with its known versions.
///
/// Versions are kept in insertion order; [`Package::sorted_version_ids`]
/// yields them ascending. A package that was only ever referenced (never
/// given a version) is *non-existent*: it can participate as a dependency
/// target but no solution may include it.
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    versions: Vec<PackageVersion>,
}

impl Package {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            versions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn versions(&self) -> &[PackageVersion] {
        &self.versions
    }

    /// Existence is a property of having at least one version.
    pub fn exists(&self) -> bool {
        !self.versions.is_empty()
    }

    /// Version ids in ascending version order.
    pub fn sorted_version_ids(&self) -> Vec<VersionId> {
        let mut ids: Vec<VersionId> = (0..self.versions.len()).collect();
        ids.sort_by(|&a, &b| self.versions[a].version().cmp(self.versions[b].version()));
        ids
    }

    /// The versions accepted by `constraint`, ascending.
    pub fn versions_matching(&self, constraint: &VersionConstraint) -> Vec<&PackageVersion> {
        self.sorted_version_ids()
            .into_iter()
            .map(|id| &self.versions[id])
            .filter(|pv| constraint.matches(pv.version()))
            .collect()
    }

    fn find_version(&self, version: &Version) -> Option<VersionId> {
        self.versions.iter().position(|pv| pv.version() == version)
    }
}

/// An insertion-ordered collection of packages, indexed by name.
///
/// `package(name)` auto-vivifies: referencing a name creates an empty
/// placeholder package and repeated lookups return the same id. Dependency
/// edges store target ids, so cyclic package graphs need no special
/// handling.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    packages: IndexMap<String, Package>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the id for a package name, creating an empty package if the name
    /// is new.
    pub fn package(&mut self, name: &str) -> PackageId {
        if let Some(id) = self.packages.get_index_of(name) {
            return id;
        }
        let (id, _) = self.packages.insert_full(name.to_string(), Package::new(name));
        id
    }

    /// Look up a package id without vivifying.
    pub fn lookup(&self, name: &str) -> Option<PackageId> {
        self.packages.get_index_of(name)
    }

    pub fn get(&self, id: PackageId) -> &Package {
        &self.packages[id]
    }

    pub fn name(&self, id: PackageId) -> &str {
        self.packages.get_index(id).map(|(name, _)| name.as_str()).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn packages(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.packages.values().enumerate()
    }

    /// Add a version to a package, returning its id. Adding a version that
    /// is already present returns the existing id.
    pub fn add_version(&mut self, package: PackageId, version: Version) -> VersionId {
        if let Some(existing) = self.packages[package].find_version(&version) {
            return existing;
        }
        let versions = &mut self.packages[package].versions;
        versions.push(PackageVersion::new(version));
        versions.len() - 1
    }

    /// Append a dependency to a package version.
    pub fn add_dependency(
        &mut self,
        package: PackageId,
        version: VersionId,
        target: PackageId,
        constraint: VersionConstraint,
    ) {
        self.packages[package].versions[version]
            .dependencies
            .push(Dependency { target, constraint });
    }
}
