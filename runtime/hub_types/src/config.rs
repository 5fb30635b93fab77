//! Hierarchy configuration.
//!
//! Built once, handed to [`TypeHierarchy`](crate::TypeHierarchy), never mutated.
//! Defaults suit a VM bootstrapping a standard class library; `from_env`
//! lets a launcher override the two knobs worth tuning without a rebuild.

/// Whether concrete-subtype facts are propagated to implemented interfaces.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InterfacePropagation {
    /// Interfaces get `UNSET -> unique -> MULTIPLE` facts like classes, and
    /// their dependents are re-checked when a new implementor appears.
    #[default]
    Track,
    /// Interfaces never record a concrete subtype. Assumptions on interface
    /// contexts are then always rejected.
    Ignore,
}

impl InterfacePropagation {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "track" => Some(Self::Track),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

/// Runtime type model configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HierarchyConfig {
    /// Entries in the fixed prefix of the identity table. Ids beyond it go to
    /// the growable overflow.
    pub registry_prefix: usize,
    /// Names of the two capability interfaces every array implements.
    pub array_interfaces: [String; 2],
    pub interface_concrete_subtypes: InterfacePropagation,
    /// Re-check a still-valid batch at install time. A mismatch means an
    /// invalidation was missed and is fatal.
    pub validate_on_install: bool,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            registry_prefix: Self::DEFAULT_REGISTRY_PREFIX,
            array_interfaces: ["Cloneable".to_owned(), "Serializable".to_owned()],
            interface_concrete_subtypes: InterfacePropagation::default(),
            validate_on_install: false,
        }
    }
}

impl HierarchyConfig {
    pub const DEFAULT_REGISTRY_PREFIX: usize = 4096;

    pub const REGISTRY_PREFIX_VAR: &'static str = "HUB_REGISTRY_PREFIX";
    pub const INTERFACE_SUBTYPES_VAR: &'static str = "HUB_INTERFACE_SUBTYPES";

    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `HUB_REGISTRY_PREFIX` and
    /// `HUB_INTERFACE_SUBTYPES=track|ignore`. Unparsable values are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `from_env` over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::REGISTRY_PREFIX_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(prefix) => config.registry_prefix = prefix,
                Err(_) => tracing::warn!(
                    var = Self::REGISTRY_PREFIX_VAR,
                    value = %raw,
                    "ignoring unparsable registry prefix"
                ),
            }
        }

        if let Some(raw) = lookup(Self::INTERFACE_SUBTYPES_VAR) {
            match InterfacePropagation::parse(&raw) {
                Some(mode) => config.interface_concrete_subtypes = mode,
                None => tracing::warn!(
                    var = Self::INTERFACE_SUBTYPES_VAR,
                    value = %raw,
                    "expected `track` or `ignore`"
                ),
            }
        }

        config
    }

    #[must_use]
    pub fn registry_prefix(mut self, prefix: usize) -> Self {
        self.registry_prefix = prefix;
        self
    }

    #[must_use]
    pub fn array_interfaces(
        mut self,
        cloneable: impl Into<String>,
        serializable: impl Into<String>,
    ) -> Self {
        self.array_interfaces = [cloneable.into(), serializable.into()];
        self
    }

    #[must_use]
    pub fn interface_concrete_subtypes(mut self, mode: InterfacePropagation) -> Self {
        self.interface_concrete_subtypes = mode;
        self
    }

    #[must_use]
    pub fn validate_on_install(mut self, enabled: bool) -> Self {
        self.validate_on_install = enabled;
        self
    }
}
