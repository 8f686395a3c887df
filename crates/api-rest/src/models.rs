//! Request and response bodies of the REST API.

use media_files::SidecarSync;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Plain acknowledgement, for example `{"status": "created"}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusRes {
    pub status: String,
}

impl StatusRes {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// Result of deleting an asset.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRes {
    pub status: String,
    pub filename: String,
    pub tenant_id: String,
    pub collection_id: String,
    /// `synced`, `absent` or `failed`
    pub sidecar: String,
}

/// Result of moving or renaming an asset.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelocatedRes {
    pub status: String,
    pub filename: String,
    pub dir: String,
    /// `synced`, `absent` or `failed`
    pub sidecar: String,
}

pub fn sidecar_label(sync: &SidecarSync) -> String {
    match sync {
        SidecarSync::Synced => "synced",
        SidecarSync::Absent => "absent",
        SidecarSync::Failed(_) => "failed",
    }
    .to_string()
}

/// Multipart form of an upload.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Directory inside the collection; may also be passed as a query parameter
    pub dir: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DirQuery {
    /// Directory inside the collection; omitted for the top level
    pub dir: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PathQuery {
    /// Directory to list; omitted for the top level
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive substring; empty matches every file
    pub query: Option<String>,
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FolderReq {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveReq {
    #[serde(default)]
    pub from_dir: String,
    #[serde(default)]
    pub to_dir: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameReq {
    #[serde(default)]
    pub new_name: String,
    #[serde(default)]
    pub dir: String,
}
