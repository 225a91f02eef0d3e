//! Pipeline-node surface.
//!
//! Hosts discover nodes through [`NodeRegistry`], which maps a stable
//! identifier to a factory plus the metadata the host needs to render the
//! node (display name, category, input schema). Execution takes host-style
//! JSON inputs and returns the `{"ui": ...}` payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult};
use crate::image_processor::ImageFrame;
use crate::storage::StorageConnector;
use crate::uploader::{UiPayload, UploadRequest, Uploader};

pub const STORAGE_GCP_NODE_ID: &str = "StorageGCP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InputKind {
    String,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputField {
    pub name: &'static str,
    pub kind: InputKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
    pub multiline: bool,
}

impl InputField {
    const fn string(name: &'static str, default: Option<&'static str>) -> Self {
        Self {
            name,
            kind: InputKind::String,
            required: true,
            default,
            multiline: false,
        }
    }
}

/// Everything a host needs to list a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
    pub output_node: bool,
    pub inputs: Vec<InputField>,
}

#[async_trait]
pub trait Node: Send + Sync {
    async fn execute(&self, inputs: NodeInputs) -> AppResult<UiPayload>;
}

pub type NodeFactory =
    fn(&UploaderConfig, Arc<dyn StorageConnector>) -> AppResult<Box<dyn Node>>;

pub struct NodeDefinition {
    pub info: NodeInfo,
    pub factory: NodeFactory,
}

#[derive(Default)]
pub struct NodeRegistry {
    definitions: BTreeMap<&'static str, NodeDefinition>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every node this crate ships.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(NodeDefinition {
            info: storage_gcp_info(),
            factory: create_storage_gcp_node,
        });
        registry
    }

    /// Later registrations replace earlier ones with the same id.
    pub fn register(&mut self, definition: NodeDefinition) {
        if self
            .definitions
            .insert(definition.info.id, definition)
            .is_some()
        {
            log::warn!("Replaced an existing node registration");
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.definitions.keys().copied()
    }

    pub fn display_name(&self, id: &str) -> Option<&'static str> {
        self.definitions.get(id).map(|d| d.info.display_name)
    }

    pub fn describe(&self) -> Vec<NodeInfo> {
        self.definitions.values().map(|d| d.info.clone()).collect()
    }

    pub fn create(
        &self,
        id: &str,
        config: &UploaderConfig,
        connector: Arc<dyn StorageConnector>,
    ) -> AppResult<Box<dyn Node>> {
        let definition = self
            .definitions
            .get(id)
            .ok_or_else(|| AppError::validation("node", &format!("Unknown node '{}'", id)))?;
        (definition.factory)(config, connector)
    }
}

fn storage_gcp_info() -> NodeInfo {
    NodeInfo {
        id: STORAGE_GCP_NODE_ID,
        display_name: "Storage GCP",
        category: "image",
        output_node: true,
        inputs: vec![
            InputField::string("file_name", Some("file")),
            InputField::string("bucket_name", Some("bucket")),
            InputField::string("bucket_folder_prefix", None),
            InputField::string("gcp_service_json", Some("path")),
            InputField::string("local_file_path", Some("")),
            InputField {
                name: "images",
                kind: InputKind::Image,
                required: false,
                default: None,
                multiline: false,
            },
        ],
    }
}

fn default_file_name() -> String {
    "file".to_string()
}

fn default_bucket_name() -> String {
    "bucket".to_string()
}

fn default_service_json() -> String {
    "path".to_string()
}

/// Inputs as a host sends them. Missing strings take the schema defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInputs {
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,
    #[serde(default)]
    pub bucket_folder_prefix: Option<String>,
    #[serde(default = "default_service_json")]
    pub gcp_service_json: String,
    #[serde(default)]
    pub local_file_path: String,
    #[serde(default)]
    pub images: Option<Vec<ImageFrame>>,
}

impl Default for NodeInputs {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            bucket_name: default_bucket_name(),
            bucket_folder_prefix: None,
            gcp_service_json: default_service_json(),
            local_file_path: String::new(),
            images: None,
        }
    }
}

pub struct StorageGcpNode {
    uploader: Uploader,
    default_folder_prefix: String,
}

fn create_storage_gcp_node(
    config: &UploaderConfig,
    connector: Arc<dyn StorageConnector>,
) -> AppResult<Box<dyn Node>> {
    Ok(Box::new(StorageGcpNode {
        uploader: Uploader::from_config(config, connector)?,
        default_folder_prefix: config.default_folder_prefix.clone(),
    }))
}

#[async_trait]
impl Node for StorageGcpNode {
    async fn execute(&self, inputs: NodeInputs) -> AppResult<UiPayload> {
        let request = UploadRequest {
            file_name_prefix: inputs.file_name,
            bucket_name: inputs.bucket_name,
            bucket_folder_prefix: inputs
                .bucket_folder_prefix
                .unwrap_or_else(|| self.default_folder_prefix.clone()),
            credentials_path: inputs.gcp_service_json,
            local_file_path: Some(inputs.local_file_path),
            images: inputs.images,
        };

        let result = self.uploader.run(&request).await?;
        Ok(result.into())
    }
}
