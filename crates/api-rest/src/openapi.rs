use crate::error::ErrorRes;
use crate::handlers;
use crate::models::{
    DeletedRes, FolderReq, HealthRes, MoveReq, RelocatedRes, RenameReq, StatusRes, UploadForm,
};
use media_files::{AssetMetadata, DerivedMetadata, DirectoryListing};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Media API", description = "Tenant-scoped media asset store"),
    paths(
        handlers::health,
        handlers::upload,
        handlers::get_file,
        handlers::download,
        handlers::get_metadata,
        handlers::delete_file,
        handlers::list_dir,
        handlers::search,
        handlers::create_folder,
        handlers::delete_folder,
        handlers::move_file,
        handlers::rename_file,
        handlers::list_collections,
        handlers::create_collection,
        handlers::list_files,
    ),
    components(schemas(
        HealthRes,
        StatusRes,
        DeletedRes,
        RelocatedRes,
        FolderReq,
        MoveReq,
        RenameReq,
        UploadForm,
        ErrorRes,
        AssetMetadata,
        DerivedMetadata,
        DirectoryListing,
    ))
)]
pub struct ApiDoc;
