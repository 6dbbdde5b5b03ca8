//! Static boot manifest.
//!
//! The manifest is the single source of truth for which components exist,
//! the fixed order the top-level init drives them in, and the conventional
//! dependencies attached to registrations that declared none. It replaces
//! runtime discovery: feature modules are listed here at build time.

/// Name the session manager registers under. Every dashboard-facing
/// component implicitly depends on it.
pub const SESSION_MANAGER: &str = "session-manager";

#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub name: String,
    pub dependencies: Vec<String>,
}

/// Ordered list of known components and their conventional dependencies.
#[derive(Debug, Clone, Default)]
pub struct BootManifest {
    entries: Vec<ManifestEntry>,
}

impl BootManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production manifest: the session manager first, then every
    /// feature module of the job board, each depending on the session
    /// manager so no dashboard renders against an unsettled identity.
    pub fn standard() -> Self {
        let mut manifest = Self::new();
        manifest.push(SESSION_MANAGER, [] as [&str; 0]);
        for feature in [
            "jobs-feed",
            "candidate-dashboard",
            "employer-dashboard",
            "agency-dashboard",
            "admin-dashboard",
            "chat-panel",
        ] {
            manifest.push(feature, [SESSION_MANAGER]);
        }
        manifest
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.entries.push(ManifestEntry {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Fixed init order.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn dependencies_of(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.dependencies.as_slice())
    }
}
