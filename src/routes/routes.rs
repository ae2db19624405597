//! Routes for the media browser and public object downloads.
//!
//! ## Structure
//! - **Browser endpoints** (JSON envelope)
//!   - `GET    /browser/source`           source type, description and bucket
//!   - `GET    /browser/thumb-src?src=`   absolute renderer source URL
//!   - `GET    /browser/tree?dir=`        tree view of one directory
//!   - `GET    /browser/files?dir=`       grid view of one directory
//!   - `POST   /browser/directories`      create folder `{name, parent}`
//!   - `DELETE /browser/directories?path=`
//!   - `DELETE /browser/files?path=`
//!   - `POST   /browser/files/rename`     `{path, name}`
//!   - `POST   /browser/move`             `{from, to}`
//!   - `POST   /browser/upload?path=`     multipart, one file per part
//!
//! - **Object endpoints**
//!   - `GET | HEAD /objects/{*key}` public-read objects only
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::handlers::{
    AppState,
    browser_handlers::{
        create_directory, get_files, get_source, get_thumb_src, get_tree, move_object,
        remove_directory, remove_file, rename_file, upload_files,
    },
    health_handlers::{healthz, readyz},
    object_handlers::{get_object, head_object},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. `upload_limit` caps the multipart body of one upload
/// batch.
pub fn routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Browser routes
        .route("/browser/source", get(get_source))
        .route("/browser/thumb-src", get(get_thumb_src))
        .route("/browser/tree", get(get_tree))
        .route("/browser/files", get(get_files).delete(remove_file))
        .route("/browser/files/rename", post(rename_file))
        .route(
            "/browser/directories",
            post(create_directory).delete(remove_directory),
        )
        .route("/browser/move", post(move_object))
        .route(
            "/browser/upload",
            post(upload_files).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Object routes
        .route("/objects/{*key}", get(get_object).head(head_object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Credentials, SourceConfig},
        services::{
            audit::SqliteAuditLog,
            media_source::ObjectStoreSource,
            object_store::{Acl, ObjectStoreClient, PutBody},
            sqlite_store::{SqliteObjectStore, StoreConfig, apply_schema},
            thumbnail::NoProbe,
        },
    };
    use axum::{
        body::{Body, Bytes, to_bytes},
        http::{HeaderMap, Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "media-source-boundary";

    async fn app() -> (Router, SqliteObjectStore, TempDir) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        let db = Arc::new(pool);
        let dir = TempDir::new().unwrap();
        let objects = SqliteObjectStore::connect(
            db.clone(),
            StoreConfig {
                bucket: "media".into(),
                base_path: dir.path().to_path_buf(),
                credentials: Credentials::default(),
            },
        )
        .await
        .unwrap();

        let config = SourceConfig {
            probe_images: false,
            ..SourceConfig::default()
        };
        let source = Arc::new(ObjectStoreSource::new(
            Arc::new(objects.clone()),
            Arc::new(SqliteAuditLog::new(db)),
            Arc::new(NoProbe),
            config.clone(),
        ));
        let state = AppState {
            source,
            objects: objects.clone(),
            config: Arc::new(config),
        };
        (routes(16 * 1024 * 1024).with_state(state), objects, dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::delete(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload(dir: &str, files: &[(&str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\n\
                     Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::post(format!("/browser/upload?path={dir}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_batch_reports_rejections_and_spools_large_parts() {
        let (app, objects, dir) = app().await;
        let large = vec![b'x'; 300 * 1024];
        let request = upload(
            "photos/",
            &[
                ("a.jpg", b"jpeg".as_slice()),
                ("evil.exe", b"MZ".as_slice()),
                ("big.pdf", large.as_slice()),
            ],
        );

        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
        assert_eq!(body["errors"][0]["id"], "path");
        assert_eq!(
            body["object"]["uploaded"],
            json!(["photos/a.jpg", "photos/big.pdf"])
        );

        let listing = objects.list_objects("photos/", Some("/")).await.unwrap();
        let sizes: Vec<_> = listing
            .objects
            .iter()
            .map(|o| (o.key.as_str(), o.size_bytes))
            .collect();
        assert_eq!(
            sizes,
            vec![("photos/a.jpg", Some(4)), ("photos/big.pdf", Some(300 * 1024))]
        );

        let leftovers = std::fs::read_dir(dir.path().join(".uploads")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn browser_round_trip() {
        let (app, _objects, _dir) = app().await;

        let (status, body) = send_json(
            &app,
            post_json("/browser/directories", json!({ "name": "photos", "parent": "/" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["object"]["path"], "photos/");

        let (status, body) = send_json(
            &app,
            post_json("/browser/directories", json!({ "name": "photos", "parent": "/" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, _) = send_json(&app, upload("photos/", &[("a.jpg", b"jpeg".as_slice())])).await;
        assert_eq!(status, StatusCode::OK);

        let (_, tree) = send_json(&app, get("/browser/tree?dir=")).await;
        assert_eq!(tree["total"], 1);
        assert_eq!(tree["results"][0]["id"], "photos/");
        assert_eq!(tree["results"][0]["type"], "dir");

        let (_, files) = send_json(&app, get("/browser/files?dir=photos/")).await;
        assert_eq!(files["total"], 1);
        assert_eq!(
            files["results"][0]["url"],
            "http://127.0.0.1:3000/objects/photos/a.jpg"
        );

        let (status, body) = send_json(
            &app,
            post_json("/browser/files/rename", json!({ "path": "photos/a.jpg", "name": "b.jpg" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["object"]["path"], "photos/b.jpg");

        let (status, body) = send_json(
            &app,
            post_json("/browser/move", json!({ "from": "photos/", "to": "/" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (_, body) = send_json(
            &app,
            post_json("/browser/move", json!({ "from": "photos/b.jpg", "to": "/" })),
        )
        .await;
        assert_eq!(body["object"]["path"], "b.jpg");

        let (status, _) = send_json(&app, delete("/browser/files?path=b.jpg")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send_json(&app, delete("/browser/directories?path=photos/")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send_json(&app, delete("/browser/files?path=b.jpg")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, tree) = send_json(&app, get("/browser/tree?dir=")).await;
        assert_eq!(tree["total"], 0);
    }

    #[tokio::test]
    async fn public_objects_are_served_with_etag() {
        let (app, objects, _dir) = app().await;
        objects
            .put_object(
                "docs/readme.txt",
                PutBody::Bytes(Bytes::from_static(b"hello")),
                Acl::PublicRead,
            )
            .await
            .unwrap();
        objects
            .put_object(
                "docs/secret.txt",
                PutBody::Bytes(Bytes::from_static(b"s")),
                Acl::Private,
            )
            .await
            .unwrap();
        let etag = format!("\"{:x}\"", md5::compute("hello"));

        let (status, headers, body) = send(&app, get("/objects/docs/readme.txt")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"hello");
        assert_eq!(headers[header::ETAG], etag.as_str());
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");

        let head = Request::head("/objects/docs/readme.txt")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&app, head).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ETAG], etag.as_str());

        let (status, _, _) = send(&app, get("/objects/docs/secret.txt")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn source_info_and_thumbnail_source() {
        let (app, _objects, _dir) = app().await;

        let (_, body) = send_json(&app, get("/browser/source")).await;
        assert_eq!(body["object"]["type"], "Object Store");
        assert_eq!(body["object"]["bucket"], "media");
        assert!(!body["object"]["description"].as_str().unwrap().is_empty());

        let (_, body) = send_json(&app, get("/browser/thumb-src?src=/photos/a.jpg")).await;
        assert_eq!(
            body["object"]["src"],
            "http://127.0.0.1:3000/objects/photos/a.jpg"
        );
    }
}
