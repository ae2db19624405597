//! HTTP handlers for the manager's file browser.
//!
//! Every response uses the same JSON envelope: `success`, `message`, and
//! either `object` or `results` + `total`. Failures go through [`AppError`].

use crate::{
    config::SourceConfig,
    errors::AppError,
    handlers::AppState,
    models::{menu::Permissions, upload::UploadedFile},
    services::listing::RequestContext,
};
use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::Field},
    http::HeaderMap,
};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{io, path::Path};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Comma list of granted permissions, e.g. `file_remove,file_update`.
pub const PERMISSIONS_HEADER: &str = "x-manager-permissions";
/// Token forwarded to the thumbnail renderer as `HTTP_MODAUTH`.
pub const AUTH_HEADER: &str = "x-manager-auth";

/// Parts larger than this are spooled to disk while they are received.
const IN_MEMORY_PART_LIMIT: usize = 256 * 1024;
/// Spool directory below the storage dir. Bucket names never start with `.`.
const UPLOAD_SPOOL_DIR: &str = ".uploads";

#[derive(Debug, Deserialize)]
pub struct DirQuery {
    #[serde(default)]
    pub dir: String,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ThumbSrcQuery {
    pub src: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDirectoryReq {
    pub name: String,
    #[serde(default)]
    pub parent: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameReq {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveReq {
    pub from: String,
    #[serde(default)]
    pub to: String,
}

/// Permissions and auth token for this request; missing permissions fall
/// back to the configured set.
pub fn request_context(headers: &HeaderMap, config: &SourceConfig) -> RequestContext {
    let permissions = headers
        .get(PERMISSIONS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(Permissions::from_list)
        .unwrap_or_else(|| config.permissions.clone());
    let auth_token = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    RequestContext::new(permissions, auth_token)
}

fn success(message: impl Into<String>, object: impl Serialize) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message.into(),
        "object": object,
    }))
}

fn results<T: Serialize>(items: &[T]) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "",
        "total": items.len(),
        "results": items,
    }))
}

/// `GET /browser/source`
pub async fn get_source(State(state): State<AppState>) -> Json<Value> {
    success(
        "",
        json!({
            "id": state.config.source_id,
            "type": state.source.type_name(),
            "description": state.source.type_description(),
            "bucket": state.objects.bucket(),
            "baseUrl": state.config.base_url,
        }),
    )
}

/// `GET /browser/thumb-src?src=`
///
/// Absolute source URL for the thumbnail renderer.
pub async fn get_thumb_src(
    State(state): State<AppState>,
    Query(q): Query<ThumbSrcQuery>,
) -> Json<Value> {
    success("", json!({ "src": state.source.prepare_src_for_thumb(&q.src) }))
}

/// `GET /browser/tree?dir=`
pub async fn get_tree(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<DirQuery>,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(&headers, &state.config);
    let listing = state.source.list_directory(&q.dir, &ctx).await?;
    Ok(results(&listing))
}

/// `GET /browser/files?dir=`
pub async fn get_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<DirQuery>,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(&headers, &state.config);
    let files = state.source.files_in_directory(&q.dir, &ctx).await?;
    Ok(results(&files))
}

/// `POST /browser/directories`
pub async fn create_directory(
    State(state): State<AppState>,
    Json(req): Json<CreateDirectoryReq>,
) -> Result<Json<Value>, AppError> {
    let path = state.source.create_folder(&req.name, &req.parent).await?;
    Ok(success("folder created", json!({ "path": path })))
}

/// `DELETE /browser/directories?path=`
pub async fn remove_directory(
    State(state): State<AppState>,
    Query(q): Query<PathQuery>,
) -> Result<Json<Value>, AppError> {
    state.source.remove_folder(&q.path).await?;
    Ok(success("folder removed", json!({ "path": q.path })))
}

/// `DELETE /browser/files?path=`
pub async fn remove_file(
    State(state): State<AppState>,
    Query(q): Query<PathQuery>,
) -> Result<Json<Value>, AppError> {
    state.source.remove_file(&q.path).await?;
    Ok(success("file removed", json!({ "path": q.path })))
}

/// `POST /browser/files/rename`
pub async fn rename_file(
    State(state): State<AppState>,
    Json(req): Json<RenameReq>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.source.rename_file(&req.path, &req.name).await?;
    Ok(success(
        "file renamed",
        json!({
            "path": outcome.new_path,
            "staleSource": outcome.stale_source,
        }),
    ))
}

/// `POST /browser/move`
pub async fn move_object(
    State(state): State<AppState>,
    Json(req): Json<MoveReq>,
) -> Result<Json<Value>, AppError> {
    let path = state.source.move_object(&req.from, &req.to).await?;
    Ok(success("file moved", json!({ "path": path })))
}

/// `POST /browser/upload?path=`
///
/// Each multipart part with a file name becomes one [`UploadedFile`]. The
/// batch always succeeds; rejected files are reported in `errors`.
pub async fn upload_files(
    State(state): State<AppState>,
    Query(q): Query<PathQuery>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let spool = state.objects.base_path.join(UPLOAD_SPOOL_DIR);
    fs::create_dir_all(&spool)
        .await
        .map_err(|err| AppError::internal(format!("could not prepare upload spool: {}", err)))?;

    let mut files = Vec::new();
    let mut spooled = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                warn!("multipart stream ended early: {}", err);
                break;
            }
        };
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let spool_path = spool.join(Uuid::new_v4().to_string());
        let file = match receive_part(field, &name, &spool_path).await {
            Ok(file) => file,
            Err(err) => UploadedFile::failed(&name, err.to_string()),
        };
        spooled.push(spool_path);
        files.push(file);
    }
    debug!(files = files.len(), path = %q.path, "received upload parts");

    let report = state.source.upload_to_folder(&q.path, files).await;

    for path in spooled {
        if let Err(err) = fs::remove_file(&path).await {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("could not remove spooled upload {}: {}", path.display(), err);
            }
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("{} file(s) uploaded", report.uploaded.len()),
        "errors": report.errors,
        "object": report,
    })))
}

/// Read one part, keeping it in memory until it outgrows
/// [`IN_MEMORY_PART_LIMIT`], then continuing into `spool_path`.
async fn receive_part(
    mut field: Field<'_>,
    name: &str,
    spool_path: &Path,
) -> io::Result<UploadedFile> {
    let mut buffer = BytesMut::new();
    let mut spill: Option<File> = None;
    let mut size_bytes: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(io::Error::other)? {
        size_bytes += chunk.len() as u64;
        match spill.as_mut() {
            Some(file) => file.write_all(&chunk).await?,
            None if buffer.len() + chunk.len() > IN_MEMORY_PART_LIMIT => {
                let mut file = File::create(spool_path).await?;
                file.write_all(&buffer).await?;
                file.write_all(&chunk).await?;
                buffer.clear();
                spill = Some(file);
            }
            None => buffer.extend_from_slice(&chunk),
        }
    }

    match spill {
        Some(mut file) => {
            file.flush().await?;
            Ok(UploadedFile::on_disk(
                name,
                spool_path.to_path_buf(),
                size_bytes,
            ))
        }
        None => Ok(UploadedFile::in_memory(name, buffer.freeze())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::menu::Permission;
    use axum::http::HeaderValue;

    #[test]
    fn headers_override_configured_permissions() {
        let config = SourceConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(
            PERMISSIONS_HEADER,
            HeaderValue::from_static("file_remove,bogus"),
        );
        headers.insert(AUTH_HEADER, HeaderValue::from_static("abc123"));

        let ctx = request_context(&headers, &config);
        assert!(ctx.permissions.has(Permission::FileRemove));
        assert!(!ctx.permissions.has(Permission::FileUpdate));
        assert_eq!(ctx.auth_token, "abc123");
    }

    #[test]
    fn missing_headers_use_configured_permissions() {
        let config = SourceConfig::default();
        let ctx = request_context(&HeaderMap::new(), &config);
        assert_eq!(ctx.permissions, config.permissions);
        assert_eq!(ctx.auth_token, "");
    }

    #[test]
    fn listing_envelope_carries_total() {
        let Json(body) = results(&["a", "b"]);
        assert_eq!(body["success"], true);
        assert_eq!(body["total"], 2);
        assert_eq!(body["results"][1], "b");
    }
}
