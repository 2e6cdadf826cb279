use serde::{Deserialize, Serialize};

/// Lifecycle notifications published by the deployment manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeploymentEvent {
    Deployed { name: String, chain: String },
    Undeployed { name: String },
    Failed { name: String, reason: String },
}

impl DeploymentEvent {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Deployed { name, .. } | Self::Undeployed { name } | Self::Failed { name, .. } => {
                name
            },
        }
    }
}

/// Names of everything currently deployed, kept on a watch channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDeployments {
    pub names: Vec<String>,
}
