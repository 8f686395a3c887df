//! HTTP handlers for the media routes.
//!
//! Handlers only translate between HTTP and [`MediaService`]; every storage rule lives in the
//! storage crate.

use crate::error::{ApiError, ErrorRes};
use crate::models::{
    sidecar_label, DeletedRes, DirQuery, FolderReq, HealthRes, MoveReq, PathQuery, RelocatedRes,
    RenameReq, SearchQuery, StatusRes, UploadForm,
};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use media_core::MediaService;
use media_files::{
    AssetMetadata, CommitRequest, DirectoryListing, Metadata, OpenedAsset, DEFAULT_MIME_TYPE,
};
use tokio_util::io::ReaderStream;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: MediaService,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
pub async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Media API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/{tenant}/{collection}/upload",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id"),
        DirQuery
    ),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Asset stored", body = AssetMetadata),
        (status = 400, description = "Missing file or invalid address", body = ErrorRes),
        (status = 413, description = "Upload too large", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Upload a file into a collection.
///
/// The `file` part is streamed into the staging area as it arrives and only becomes visible in
/// the collection once fully received. A `dir` text part overrides the `dir` query parameter.
///
/// # Errors
/// Returns `400 Bad Request` if there is no `file` part or the address is invalid, and
/// `413 Payload Too Large` if the body exceeds the configured limit. A staged upload is
/// discarded on every error path.
#[axum::debug_handler]
pub async fn upload(
    State(state): State<AppState>,
    Path((tenant, collection)): Path<(String, String)>,
    Query(query): Query<DirQuery>,
    mut multipart: Multipart,
) -> Result<Json<AssetMetadata>, ApiError> {
    let mut dir = query.dir;
    let mut received = None;

    while let Some(mut field) = multipart.next_field().await.map_err(ApiError::multipart)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") if received.is_none() => {
                let original_name = field.file_name().unwrap_or_default().to_owned();
                let mime_type = field.content_type().map(str::to_owned);
                let mut session = state.service.begin_upload(&original_name).await?;
                while let Some(chunk) = field.chunk().await.map_err(ApiError::multipart)? {
                    session.write(chunk).await?;
                }
                received = Some((session, mime_type));
            }
            Some("dir") => {
                dir = Some(field.text().await.map_err(ApiError::multipart)?);
            }
            _ => {}
        }
    }

    let Some((session, mime_type)) = received else {
        return Err(ApiError::missing_parameter("No file uploaded"));
    };

    let request = CommitRequest::new(tenant, collection)
        .with_subdir(dir.unwrap_or_default())
        .with_mime_type(mime_type);
    let outcome = session.commit(request).await?;
    Ok(Json(outcome.asset))
}

#[utoipa::path(
    get,
    path = "/{tenant}/{collection}/{filename}",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id"),
        ("filename" = String, Path, description = "Stored filename"),
        DirQuery
    ),
    responses(
        (status = 200, description = "Raw file bytes"),
        (status = 404, description = "File not found", body = ErrorRes)
    )
)]
/// Serve a stored file inline, with the content type recorded at upload.
#[axum::debug_handler]
pub async fn get_file(
    State(state): State<AppState>,
    Path((tenant, collection, filename)): Path<(String, String, String)>,
    Query(query): Query<DirQuery>,
) -> Result<Response, ApiError> {
    let asset = state
        .service
        .open(&tenant, &collection, &query.dir.unwrap_or_default(), &filename)
        .await?;
    Ok(file_response(asset, false))
}

#[utoipa::path(
    get,
    path = "/{tenant}/{collection}/{filename}/download",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id"),
        ("filename" = String, Path, description = "Stored filename"),
        DirQuery
    ),
    responses(
        (status = 200, description = "File bytes as an attachment"),
        (status = 404, description = "File not found", body = ErrorRes)
    )
)]
/// Serve a stored file as an attachment.
#[axum::debug_handler]
pub async fn download(
    State(state): State<AppState>,
    Path((tenant, collection, filename)): Path<(String, String, String)>,
    Query(query): Query<DirQuery>,
) -> Result<Response, ApiError> {
    let asset = state
        .service
        .open(&tenant, &collection, &query.dir.unwrap_or_default(), &filename)
        .await?;
    Ok(file_response(asset, true))
}

fn file_response(asset: OpenedAsset, attachment: bool) -> Response {
    let content_type = HeaderValue::from_str(&asset.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_MIME_TYPE));
    let body = Body::from_stream(ReaderStream::new(tokio::fs::File::from_std(asset.file)));
    let mut response = (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(asset.size)),
        ],
        body,
    )
        .into_response();
    if attachment {
        if let Ok(value) = HeaderValue::from_str(&content_disposition(&asset.filename)) {
            response
                .headers_mut()
                .insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

/// `attachment` disposition with an ASCII fallback name and the exact name in RFC 5987 form.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

#[utoipa::path(
    get,
    path = "/meta/{tenant}/{collection}/{filename}",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id"),
        ("filename" = String, Path, description = "Stored filename"),
        DirQuery
    ),
    responses(
        (status = 200, description = "Sidecar metadata, or fallback metadata carrying a note", body = AssetMetadata),
        (status = 404, description = "File not found", body = ErrorRes)
    )
)]
/// Read an asset's metadata.
#[axum::debug_handler]
pub async fn get_metadata(
    State(state): State<AppState>,
    Path((tenant, collection, filename)): Path<(String, String, String)>,
    Query(query): Query<DirQuery>,
) -> Result<Json<Metadata>, ApiError> {
    let metadata = state
        .service
        .metadata(&tenant, &collection, &query.dir.unwrap_or_default(), &filename)
        .await?;
    Ok(Json(metadata))
}

#[utoipa::path(
    delete,
    path = "/{tenant}/{collection}/{filename}",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id"),
        ("filename" = String, Path, description = "Stored filename"),
        DirQuery
    ),
    responses(
        (status = 200, description = "File deleted", body = DeletedRes),
        (status = 404, description = "File not found", body = ErrorRes)
    )
)]
/// Delete an asset and its sidecar.
#[axum::debug_handler]
pub async fn delete_file(
    State(state): State<AppState>,
    Path((tenant, collection, filename)): Path<(String, String, String)>,
    Query(query): Query<DirQuery>,
) -> Result<Json<DeletedRes>, ApiError> {
    let outcome = state
        .service
        .delete(&tenant, &collection, &query.dir.unwrap_or_default(), &filename)
        .await?;
    Ok(Json(DeletedRes {
        status: "deleted".into(),
        filename: outcome.filename,
        tenant_id: outcome.address.tenant().to_string(),
        collection_id: outcome.address.collection().to_string(),
        sidecar: sidecar_label(&outcome.sidecar),
    }))
}

#[utoipa::path(
    get,
    path = "/{tenant}/{collection}/dir",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id"),
        PathQuery
    ),
    responses(
        (status = 200, description = "Folders and files in the directory", body = DirectoryListing),
        (status = 400, description = "Invalid path", body = ErrorRes)
    )
)]
/// List the folders and files directly inside a directory.
#[axum::debug_handler]
pub async fn list_dir(
    State(state): State<AppState>,
    Path((tenant, collection)): Path<(String, String)>,
    Query(query): Query<PathQuery>,
) -> Result<Json<DirectoryListing>, ApiError> {
    let listing = state
        .service
        .list_children(&tenant, &collection, &query.path.unwrap_or_default())
        .await?;
    Ok(Json(listing))
}

#[utoipa::path(
    get,
    path = "/{tenant}/{collection}/search",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id"),
        SearchQuery
    ),
    responses(
        (status = 200, description = "Matching filenames", body = Vec<String>)
    )
)]
/// Search filenames in one directory.
#[axum::debug_handler]
pub async fn search(
    State(state): State<AppState>,
    Path((tenant, collection)): Path<(String, String)>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let matches = state
        .service
        .search(
            &tenant,
            &collection,
            &query.dir.unwrap_or_default(),
            &query.query.unwrap_or_default(),
        )
        .await?;
    Ok(Json(matches))
}

#[utoipa::path(
    post,
    path = "/{tenant}/{collection}/create-folder",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id")
    ),
    request_body = FolderReq,
    responses(
        (status = 200, description = "Folder created", body = StatusRes),
        (status = 400, description = "Missing or invalid path", body = ErrorRes)
    )
)]
/// Create a folder (and its parents) inside a collection.
#[axum::debug_handler]
pub async fn create_folder(
    State(state): State<AppState>,
    Path((tenant, collection)): Path<(String, String)>,
    payload: Result<Json<FolderReq>, JsonRejection>,
) -> Result<Json<StatusRes>, ApiError> {
    let Json(req) = payload?;
    state
        .service
        .create_folder(&tenant, &collection, &req.path)
        .await?;
    Ok(Json(StatusRes::new("created")))
}

#[utoipa::path(
    delete,
    path = "/{tenant}/{collection}/delete-folder",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id")
    ),
    request_body = FolderReq,
    responses(
        (status = 200, description = "Folder and its contents deleted", body = StatusRes),
        (status = 404, description = "Folder not found", body = ErrorRes)
    )
)]
/// Recursively delete a folder inside a collection.
#[axum::debug_handler]
pub async fn delete_folder(
    State(state): State<AppState>,
    Path((tenant, collection)): Path<(String, String)>,
    payload: Result<Json<FolderReq>, JsonRejection>,
) -> Result<Json<StatusRes>, ApiError> {
    let Json(req) = payload?;
    state
        .service
        .delete_folder(&tenant, &collection, &req.path)
        .await?;
    Ok(Json(StatusRes::new("deleted")))
}

#[utoipa::path(
    post,
    path = "/{tenant}/{collection}/{filename}/move",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id"),
        ("filename" = String, Path, description = "Stored filename")
    ),
    request_body = MoveReq,
    responses(
        (status = 200, description = "File moved", body = RelocatedRes),
        (status = 404, description = "Source file not found", body = ErrorRes)
    )
)]
/// Move a file between directories of the same collection.
#[axum::debug_handler]
pub async fn move_file(
    State(state): State<AppState>,
    Path((tenant, collection, filename)): Path<(String, String, String)>,
    payload: Result<Json<MoveReq>, JsonRejection>,
) -> Result<Json<RelocatedRes>, ApiError> {
    let Json(req) = payload?;
    let outcome = state
        .service
        .move_asset(&tenant, &collection, &filename, &req.from_dir, &req.to_dir)
        .await?;
    Ok(Json(RelocatedRes {
        status: "moved".into(),
        filename: outcome.filename,
        dir: outcome.address.subdir().to_string(),
        sidecar: sidecar_label(&outcome.sidecar),
    }))
}

#[utoipa::path(
    post,
    path = "/{tenant}/{collection}/{filename}/rename",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id"),
        ("filename" = String, Path, description = "Stored filename")
    ),
    request_body = RenameReq,
    responses(
        (status = 200, description = "File renamed", body = RelocatedRes),
        (status = 400, description = "Missing or invalid new name", body = ErrorRes),
        (status = 404, description = "Source file not found", body = ErrorRes)
    )
)]
/// Rename a file in place.
#[axum::debug_handler]
pub async fn rename_file(
    State(state): State<AppState>,
    Path((tenant, collection, filename)): Path<(String, String, String)>,
    payload: Result<Json<RenameReq>, JsonRejection>,
) -> Result<Json<RelocatedRes>, ApiError> {
    let Json(req) = payload?;
    let outcome = state
        .service
        .rename_asset(&tenant, &collection, &filename, &req.dir, &req.new_name)
        .await?;
    Ok(Json(RelocatedRes {
        status: "renamed".into(),
        filename: outcome.filename,
        dir: outcome.address.subdir().to_string(),
        sidecar: sidecar_label(&outcome.sidecar),
    }))
}

#[utoipa::path(
    get,
    path = "/{tenant}",
    context_path = "/media",
    params(("tenant" = String, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Collection names", body = Vec<String>)
    )
)]
/// List a tenant's collections.
#[axum::debug_handler]
pub async fn list_collections(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.service.list_collections(&tenant).await?))
}

#[utoipa::path(
    post,
    path = "/{tenant}/{collection}",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id")
    ),
    responses(
        (status = 200, description = "Collection exists", body = StatusRes)
    )
)]
/// Create a collection; succeeds if it already exists.
#[axum::debug_handler]
pub async fn create_collection(
    State(state): State<AppState>,
    Path((tenant, collection)): Path<(String, String)>,
) -> Result<Json<StatusRes>, ApiError> {
    state.service.create_collection(&tenant, &collection).await?;
    Ok(Json(StatusRes::new("created")))
}

#[utoipa::path(
    get,
    path = "/{tenant}/{collection}",
    context_path = "/media",
    params(
        ("tenant" = String, Path, description = "Tenant id"),
        ("collection" = String, Path, description = "Collection id")
    ),
    responses(
        (status = 200, description = "Filenames at the collection's top level", body = Vec<String>)
    )
)]
/// List the files at a collection's top level.
#[axum::debug_handler]
pub async fn list_files(
    State(state): State<AppState>,
    Path((tenant, collection)): Path<(String, String)>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.service.list_files(&tenant, &collection).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_keeps_ascii_and_encodes_exact_name() {
        assert_eq!(
            content_disposition("report 1.pdf"),
            "attachment; filename=\"report 1.pdf\"; filename*=UTF-8''report%201.pdf"
        );
        let header = content_disposition("résumé\".pdf");
        assert!(header.starts_with("attachment; filename=\"r_sum__.pdf\""));
        assert!(HeaderValue::from_str(&header).is_ok());
    }
}
