use crate::error::DeploymentError;
use crate::unit::DeploymentUnit;
use std::fmt;

/// Decides whether a chain handles a deployment unit.
///
/// Selectors are evaluated while dispatching every deployment and must be cheap
/// and free of side effects.
pub trait Selector: Send + Sync {
    /// # Errors
    /// An error aborts chain determination for the unit.
    fn supports(&self, unit: &DeploymentUnit) -> Result<bool, DeploymentError>;
}

/// Adapts a closure into a [`Selector`].
pub struct FnSelector<F>(F);

impl<F> FnSelector<F>
where
    F: Fn(&DeploymentUnit) -> Result<bool, DeploymentError> + Send + Sync,
{
    pub const fn new(predicate: F) -> Self {
        Self(predicate)
    }
}

impl<F> Selector for FnSelector<F>
where
    F: Fn(&DeploymentUnit) -> Result<bool, DeploymentError> + Send + Sync,
{
    fn supports(&self, unit: &DeploymentUnit) -> Result<bool, DeploymentError> {
        (self.0)(unit)
    }
}

/// Matches units by name suffix, or by a descriptor entry in exploded roots,
/// unless the manifest carries an excluded attribute.
#[derive(Debug, Clone)]
pub struct ArchiveSelector {
    suffixes: Vec<&'static str>,
    descriptor: Option<&'static str>,
    excluded_attributes: Vec<&'static str>,
}

impl ArchiveSelector {
    /// `suffix` is compared case-insensitively, e.g. `".war"`.
    #[must_use]
    pub fn new(suffix: &'static str) -> Self {
        Self { suffixes: vec![suffix], descriptor: None, excluded_attributes: Vec::new() }
    }

    #[must_use]
    pub fn or_suffix(mut self, suffix: &'static str) -> Self {
        self.suffixes.push(suffix);
        self
    }

    /// Also match exploded roots containing `entry` whatever their name.
    #[must_use]
    pub const fn descriptor(mut self, entry: &'static str) -> Self {
        self.descriptor = Some(entry);
        self
    }

    #[must_use]
    pub fn exclude_attribute(mut self, attribute: &'static str) -> Self {
        self.excluded_attributes.push(attribute);
        self
    }

    /// Plain libraries; OSGi bundles are left to other chains.
    #[must_use]
    pub fn jar() -> Self {
        Self::new(".jar").exclude_attribute("Bundle-SymbolicName")
    }

    #[must_use]
    pub fn war() -> Self {
        Self::new(".war").descriptor("WEB-INF/web.xml")
    }

    #[must_use]
    pub fn ear() -> Self {
        Self::new(".ear").descriptor("META-INF/application.xml")
    }

    #[must_use]
    pub fn rar() -> Self {
        Self::new(".rar").descriptor("META-INF/ra.xml")
    }

    fn matches_name(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.suffixes.iter().any(|suffix| name.ends_with(&suffix.to_ascii_lowercase()))
    }
}

impl Selector for ArchiveSelector {
    fn supports(&self, unit: &DeploymentUnit) -> Result<bool, DeploymentError> {
        let by_descriptor = || {
            self.descriptor.is_some_and(|entry| {
                unit.deployment_root().is_some_and(|root| root.is_exploded() && root.has_entry(entry))
            })
        };
        if !self.matches_name(unit.name()) && !by_descriptor() {
            return Ok(false);
        }

        let excluded = unit
            .manifest()
            .is_some_and(|manifest| self.excluded_attributes.iter().any(|attr| manifest.contains(attr)));
        Ok(!excluded)
    }
}

impl fmt::Display for ArchiveSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archive({})", self.suffixes.join("|"))
    }
}
