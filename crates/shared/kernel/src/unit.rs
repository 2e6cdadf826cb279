use crate::attachment::{AttachmentKey, AttachmentList, Attachments};
use crate::error::{DeploymentError, DeploymentErrorExt};
use dhub_services::ServiceName;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Mounted content of a unit; present from the moment the unit is created.
pub const DEPLOYMENT_ROOT: AttachmentKey<DeploymentRoot> = AttachmentKey::new("deployment-root");
/// Main section of `META-INF/MANIFEST.MF` when the root contains one.
pub const MANIFEST: AttachmentKey<Manifest> = AttachmentKey::new("manifest");
/// Child units discovered during processing; deployed after the parent's chain.
pub const SUB_DEPLOYMENTS: AttachmentList<DeploymentUnit> = AttachmentList::new("sub-deployments");

/// Filesystem view of deployment content.
///
/// Exploded (directory) roots list their entries as `/`-separated paths
/// relative to the root. Archive roots are opaque.
#[derive(Debug, Clone)]
pub struct DeploymentRoot {
    path: PathBuf,
    exploded: bool,
    files: BTreeSet<String>,
    dirs: BTreeSet<String>,
}

impl DeploymentRoot {
    /// Scans `path`, walking it when it is a directory.
    ///
    /// # Errors
    /// Returns an I/O error when `path` does not exist, or a walk error when a
    /// directory below it cannot be read.
    pub fn scan(path: &Path) -> Result<Self, DeploymentError> {
        let metadata = fs::metadata(path).context(format!("Cannot stat {}", path.display()))?;
        let mut root = Self {
            path: path.to_path_buf(),
            exploded: metadata.is_dir(),
            files: BTreeSet::new(),
            dirs: BTreeSet::new(),
        };
        if !root.exploded {
            return Ok(root);
        }

        for entry in WalkDir::new(path).min_depth(1).follow_links(true) {
            let entry = entry.context(format!("Cannot walk {}", path.display()))?;
            let Ok(relative) = entry.path().strip_prefix(path) else { continue };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if entry.file_type().is_dir() {
                root.dirs.insert(relative);
            } else {
                root.files.insert(relative);
            }
        }
        trace!(root = %path.display(), files = root.files.len(), dirs = root.dirs.len(), "Deployment root scanned");
        Ok(root)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_exploded(&self) -> bool {
        self.exploded
    }

    /// True when a file or directory exists at `entry` (relative, `/`-separated).
    #[must_use]
    pub fn has_entry(&self, entry: &str) -> bool {
        let entry = entry.trim_matches('/');
        self.files.contains(entry) || self.dirs.contains(entry)
    }

    #[must_use]
    pub fn has_dir(&self, entry: &str) -> bool {
        self.dirs.contains(entry.trim_matches('/'))
    }

    /// Top-level entries (files and directories) of an exploded root.
    pub fn top_level(&self) -> impl Iterator<Item = &str> {
        self.files.iter().chain(&self.dirs).map(String::as_str).filter(|entry| !entry.contains('/'))
    }

    /// Files under `dir`, recursively.
    pub fn files_under<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = &'a str> {
        let prefix = format!("{}/", dir.trim_matches('/'));
        self.files.iter().map(String::as_str).filter(move |file| file.starts_with(&prefix))
    }
}

/// Main attributes of a JAR manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    attributes: BTreeMap<String, String>,
}

impl Manifest {
    /// Parses the main section: `Name: value` lines, where a line starting with a
    /// single space continues the previous value. Parsing stops at the first
    /// blank line. Malformed lines are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut attributes: BTreeMap<String, String> = BTreeMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some(value) = current.as_ref().and_then(|name| attributes.get_mut(name)) {
                    value.push_str(continuation);
                }
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    let name = name.trim().to_owned();
                    attributes.insert(name.clone(), value.strip_prefix(' ').unwrap_or(value).to_owned());
                    current = Some(name);
                },
                _ => {
                    trace!(line, "Skipping malformed manifest line");
                    current = None;
                },
            }
        }
        Self { attributes }
    }

    /// Attribute value; names compare case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whitespace-separated `Class-Path` entries.
    #[must_use]
    pub fn class_path(&self) -> Vec<String> {
        self.get("Class-Path")
            .map(|cp| cp.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A deployment in progress: its name, content and the attachments processors
/// add to it.
#[derive(Debug)]
pub struct DeploymentUnit {
    name: String,
    root: PathBuf,
    parent: Option<String>,
    attachments: Attachments,
}

impl DeploymentUnit {
    /// Creates a unit named after the last component of `path` and mounts its content.
    ///
    /// # Errors
    /// See [`DeploymentRoot::scan`]; also fails for paths without a file name or
    /// an unreadable manifest.
    pub fn mount(path: impl AsRef<Path>) -> Result<Self, DeploymentError> {
        Self::mount_as(path.as_ref(), None)
    }

    fn mount_as(path: &Path, parent: Option<String>) -> Result<Self, DeploymentError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DeploymentError::Mount {
                message: format!("{} has no file name", path.display()).into(),
                context: None,
            })?;

        let root = DeploymentRoot::scan(path)?;
        let mut attachments = Attachments::default();

        if root.is_exploded() && root.has_entry(MANIFEST_PATH) {
            let text = fs::read_to_string(path.join(MANIFEST_PATH))
                .context(format!("Cannot read manifest of {name}"))?;
            attachments.put(MANIFEST, Manifest::parse(&text));
        }
        attachments.put(DEPLOYMENT_ROOT, root);

        debug!(unit = %name, parent = parent.as_deref(), "Deployment unit mounted");
        Ok(Self { name, root: path.to_path_buf(), parent, attachments })
    }

    /// Creates an unmounted unit with an empty archive root; meant for tests and
    /// units whose content lives elsewhere.
    #[must_use]
    pub fn detached(name: impl Into<String>) -> Self {
        let name = name.into();
        let root = PathBuf::from(&name);
        let mut attachments = Attachments::default();
        attachments.put(
            DEPLOYMENT_ROOT,
            DeploymentRoot {
                path: root.clone(),
                exploded: false,
                files: BTreeSet::new(),
                dirs: BTreeSet::new(),
            },
        );
        Self { name, root, parent: None, attachments }
    }

    /// Mounts the child `entry` of this exploded unit as a sub-deployment.
    ///
    /// # Errors
    /// Returns [`DeploymentError::Mount`] when the entry does not exist.
    pub fn sub_deployment(&self, entry: &str) -> Result<Self, DeploymentError> {
        if !self.deployment_root().is_some_and(|root| root.has_entry(entry)) {
            return Err(DeploymentError::Mount {
                message: format!("{entry} is not an entry of {}", self.name).into(),
                context: None,
            });
        }
        Self::mount_as(&self.root.join(entry), Some(self.name.clone()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the enclosing unit for sub-deployments.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Lower-cased extension of the unit name, without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name).extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    #[must_use]
    pub fn has_entry(&self, entry: &str) -> bool {
        self.deployment_root().is_some_and(|root| root.has_entry(entry))
    }

    #[must_use]
    pub fn has_dir(&self, entry: &str) -> bool {
        self.deployment_root().is_some_and(|root| root.has_dir(entry))
    }

    #[must_use]
    pub fn deployment_root(&self) -> Option<&DeploymentRoot> {
        self.attachments.get(DEPLOYMENT_ROOT)
    }

    #[must_use]
    pub fn manifest(&self) -> Option<&Manifest> {
        self.attachments.get(MANIFEST)
    }

    /// Root of every service installed for this unit:
    /// `dhub.deployment.unit."<name>"`, or the parent's name extended with this
    /// unit's name for sub-deployments.
    #[must_use]
    pub fn service_name(&self) -> ServiceName {
        match &self.parent {
            Some(parent) => Self::top_level_service_name(parent).append(self.name.as_str()),
            None => Self::top_level_service_name(&self.name),
        }
    }

    /// Service name root of the top-level deployment `name`.
    #[must_use]
    pub fn top_level_service_name(name: &str) -> ServiceName {
        ServiceName::of(["dhub", "deployment", "unit"]).append(name)
    }

    #[must_use]
    pub const fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub const fn attachments_mut(&mut self) -> &mut Attachments {
        &mut self.attachments
    }
}
