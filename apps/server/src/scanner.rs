//! Hot deployment of a directory, driven by marker files next to the content.
//!
//! For content `app.war` the scanner reads and writes `app.war.<marker>`:
//!
//! | Marker         | Meaning                                                        |
//! |----------------|----------------------------------------------------------------|
//! | `.dodeploy`    | Written by the user: (re)deploy now. Removed once picked up.   |
//! | `.skipdeploy`  | Written by the user: no automatic deployment for this content. |
//! | `.isdeploying` | Deployment in progress.                                        |
//! | `.deployed`    | Deployed. Delete it to undeploy.                               |
//! | `.failed`      | Deployment failed; holds the reason.                           |
//! | `.undeployed`  | Undeployed by the scanner.                                     |
//!
//! Archives deploy automatically unless a `.deployed`, `.failed` or `.undeployed`
//! marker is at least as new as the content. Exploded directories wait for
//! `.dodeploy` unless automatic exploded deployment is enabled.

use anyhow::{Context, Result};
use dhub::domain::config::ScannerConfig;
use dhub::kernel::prelude::DeploymentManager;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

pub const DO_DEPLOY: &str = ".dodeploy";
pub const SKIP_DEPLOY: &str = ".skipdeploy";
pub const IS_DEPLOYING: &str = ".isdeploying";
pub const DEPLOYED: &str = ".deployed";
pub const FAILED: &str = ".failed";
pub const UNDEPLOYED: &str = ".undeployed";

const MARKERS: [&str; 6] = [DO_DEPLOY, SKIP_DEPLOY, IS_DEPLOYING, DEPLOYED, FAILED, UNDEPLOYED];
/// Markers that record an outcome for the current content.
const OUTCOMES: [&str; 3] = [DEPLOYED, FAILED, UNDEPLOYED];

/// What a single [`DeploymentScanner::scan`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub deployed: Vec<String>,
    pub undeployed: Vec<String>,
    pub failed: Vec<String>,
}

impl ScanReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deployed.is_empty() && self.undeployed.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug)]
struct Content {
    name: String,
    path: PathBuf,
    exploded: bool,
    modified: SystemTime,
}

/// Deploys and undeploys the content of one directory through a [`DeploymentManager`].
///
/// Only deployments the scanner made itself are undeployed by it.
#[derive(Debug)]
pub struct DeploymentScanner {
    root: PathBuf,
    auto_deploy_archives: bool,
    auto_deploy_exploded: bool,
    manager: Arc<DeploymentManager>,
    owned: Mutex<BTreeSet<String>>,
}

impl DeploymentScanner {
    #[must_use]
    pub fn new(config: &ScannerConfig, manager: Arc<DeploymentManager>) -> Self {
        Self {
            root: config.path.clone(),
            auto_deploy_archives: config.auto_deploy_archives,
            auto_deploy_exploded: config.auto_deploy_exploded,
            manager,
            owned: Mutex::default(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the deployments this scanner made and still holds.
    #[must_use]
    pub fn owned(&self) -> Vec<String> {
        self.owned.lock().iter().cloned().collect()
    }

    /// Runs one pass: undeploys removed content first, then deploys what the
    /// markers and timestamps ask for.
    ///
    /// # Errors
    /// Returns an error when the directory cannot be listed. Marker write failures
    /// and deployment failures are logged and reported, not returned.
    pub fn scan(&self) -> Result<ScanReport> {
        let contents = self.contents()?;
        let mut report = ScanReport::default();

        for name in self.owned() {
            if !contents.iter().any(|content| content.name == name) {
                self.undeploy(&name, "content removed", &mut report);
            } else if !self.marker(&name, DEPLOYED).exists() {
                self.undeploy(&name, "deployed marker removed", &mut report);
            }
        }

        for content in &contents {
            self.process(content, &mut report);
        }

        if !report.is_empty() {
            debug!(
                deployed = report.deployed.len(),
                undeployed = report.undeployed.len(),
                failed = report.failed.len(),
                "Deployment scan finished"
            );
        }
        Ok(report)
    }

    fn process(&self, content: &Content, report: &mut ScanReport) {
        let dodeploy = self.marker(&content.name, DO_DEPLOY);
        if dodeploy.exists() {
            remove_marker(&dodeploy);
            self.deploy(content, report);
            return;
        }

        let owned = self.owned.lock().contains(&content.name);
        // A `.deployed` marker without a deployment is left over from a previous run.
        if !owned && self.marker(&content.name, DEPLOYED).exists() {
            self.deploy(content, report);
            return;
        }

        if self.marker(&content.name, SKIP_DEPLOY).exists() || !self.auto_deploys(content) {
            return;
        }
        if !self.is_current(content) {
            self.deploy(content, report);
        }
    }

    const fn auto_deploys(&self, content: &Content) -> bool {
        if content.exploded { self.auto_deploy_exploded } else { self.auto_deploy_archives }
    }

    fn is_current(&self, content: &Content) -> bool {
        OUTCOMES.iter().any(|suffix| {
            modified(&self.marker(&content.name, suffix)).is_some_and(|at| at >= content.modified)
        })
    }

    fn deploy(&self, content: &Content, report: &mut ScanReport) {
        let name = content.name.as_str();
        let was_owned = self.owned.lock().remove(name);
        if was_owned && let Err(err) = self.manager.undeploy(name) {
            warn!(deployment = name, error = %err, "Previous deployment already gone");
        }
        for suffix in OUTCOMES {
            remove_marker(&self.marker(name, suffix));
        }

        let deploying = self.marker(name, IS_DEPLOYING);
        write_marker(&deploying, "");
        let outcome = self.manager.deploy_path(&content.path);
        remove_marker(&deploying);

        match outcome {
            Ok(info) => {
                self.owned.lock().insert(info.name.clone());
                write_marker(&self.marker(name, DEPLOYED), &info.chain);
                info!(deployment = name, chain = %info.chain, "Deployed by scanner");
                report.deployed.push(info.name);
            },
            Err(err) => {
                error!(deployment = name, error = %err, "Scanner deployment failed");
                write_marker(&self.marker(name, FAILED), &err.to_string());
                report.failed.push(name.to_owned());
            },
        }
    }

    fn undeploy(&self, name: &str, reason: &str, report: &mut ScanReport) {
        self.owned.lock().remove(name);
        match self.manager.undeploy(name) {
            Ok(()) => {
                info!(deployment = name, reason, "Undeployed by scanner");
                report.undeployed.push(name.to_owned());
            },
            Err(err) => warn!(deployment = name, error = %err, "Nothing to undeploy"),
        }
        remove_marker(&self.marker(name, DEPLOYED));
        write_marker(&self.marker(name, UNDEPLOYED), "");
    }

    fn contents(&self) -> Result<Vec<Content>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Cannot read deployment directory {}", self.root.display()))?;

        let mut contents = Vec::new();
        for entry in entries {
            let entry = entry.context("Cannot read deployment directory entry")?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || MARKERS.iter().any(|suffix| name.ends_with(suffix)) {
                continue;
            }
            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "Skipping unreadable entry");
                    continue;
                },
            };
            contents.push(Content {
                name,
                exploded: metadata.is_dir(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                path,
            });
        }
        contents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(contents)
    }

    fn marker(&self, name: &str, suffix: &str) -> PathBuf {
        self.root.join(format!("{name}{suffix}"))
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|metadata| metadata.modified()).ok()
}

fn write_marker(path: &Path, contents: &str) {
    if let Err(err) = fs::write(path, contents) {
        warn!(marker = %path.display(), error = %err, "Cannot write marker");
    }
}

fn remove_marker(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {},
        Err(err) if err.kind() == ErrorKind::NotFound => {},
        Err(err) => warn!(marker = %path.display(), error = %err, "Cannot remove marker"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_files_are_not_content() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["app.jar", "app.jar.deployed", "other.war.dodeploy", ".hidden"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let config = ScannerConfig { path: dir.path().to_path_buf(), ..ScannerConfig::default() };
        let manager = Arc::new(DeploymentManager::new(
            Arc::default(),
            dhub::kernel::prelude::ServiceContainer::new(),
            dhub_event_bus::EventBus::new(),
        ));

        let scanner = DeploymentScanner::new(&config, manager);
        let names: Vec<String> = scanner.contents().unwrap().into_iter().map(|c| c.name).collect();

        assert_eq!(names, ["app.jar"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScannerConfig { path: dir.path().join("absent"), ..ScannerConfig::default() };
        let manager = Arc::new(DeploymentManager::new(
            Arc::default(),
            dhub::kernel::prelude::ServiceContainer::new(),
            dhub_event_bus::EventBus::new(),
        ));

        assert!(DeploymentScanner::new(&config, manager).scan().is_err());
    }
}
