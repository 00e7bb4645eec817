//! Mirror of the host portal's publishers and datasets.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq, Hash)]
pub struct Publisher {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_state")]
    pub state: String,
}

fn default_state() -> String {
    "active".to_string()
}

impl Publisher {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq, Hash)]
pub struct Dataset {
    pub name: String,
    pub title: String,
    pub publisher_name: String,
    pub state: String,
    pub private: bool,
}

impl Dataset {
    /// Active and public datasets are the only ones reported on.
    pub fn is_listed(&self) -> bool {
        self.state == "active" && !self.private
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Resource {
    pub url: String,
    pub dataset_name: String,
    pub format: String,
}

/// JSON export of the portal catalog, as read by `import-catalog`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogDump {
    #[serde(default)]
    pub publishers: Vec<Publisher>,
    #[serde(default)]
    pub datasets: Vec<DatasetDump>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetDump {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "owner_org", alias = "organization")]
    pub publisher_name: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub resources: Vec<ResourceDump>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDump {
    pub url: String,
    #[serde(default)]
    pub format: String,
}

impl DatasetDump {
    pub fn dataset(&self) -> Dataset {
        Dataset {
            name: self.name.clone(),
            title: if self.title.is_empty() {
                self.name.clone()
            } else {
                self.title.clone()
            },
            publisher_name: self.publisher_name.clone(),
            state: self.state.clone(),
            private: self.private,
        }
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.resources
            .iter()
            .map(|r| Resource {
                url: r.url.clone(),
                dataset_name: self.name.clone(),
                format: r.format.clone(),
            })
            .collect()
    }
}
