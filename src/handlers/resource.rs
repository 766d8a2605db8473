//! Generic CRUD + upload controller, parameterized over [`Resource`].
//!
//! Every request follows the same linear pipeline:
//! validate -> (stage upload) -> persist -> (delete superseded file) -> respond.
//! The controller alone coordinates the upload store and the repository; on a
//! persistence failure after a file was staged it compensates by deleting the
//! staged file, so no orphan files survive a failed request.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::database::repository::{ListParams, ListQuery, Pagination, Repository};
use crate::database::values::SqlValue;
use crate::error::ApiError;
use crate::middleware::auth::{jwt_auth, AuthUser};
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::resources::Resource;
use crate::state::AppState;
use crate::uploads::{StoredFile, UploadStore};

/// Routes for one resource kind. Reads are public; mutations sit behind the
/// bearer-token gate.
pub fn routes<R: Resource>(state: AppState) -> Router<AppState> {
    let guarded = Router::new()
        .route("/", post(create::<R>))
        .route("/:id", put(update::<R>).delete(remove::<R>))
        .route_layer(axum::middleware::from_fn_with_state(state, jwt_auth));

    Router::new()
        .route("/", get(list::<R>))
        .route("/:id", get(get_one::<R>))
        .merge(guarded)
}

/// One uploaded file part, held in memory until it is staged.
struct UploadedPart {
    original_name: String,
    content_type: String,
    bytes: Bytes,
}

/// Parsed request body: text fields plus at most one file.
struct Payload {
    fields: Map<String, Value>,
    file: Option<UploadedPart>,
}

/// Accept either a multipart form (text fields + optional file) or a plain
/// JSON object. Multipart is what the admin UI sends for kinds with media.
async fn read_payload(req: Request) -> Result<Payload, ApiError> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if !is_multipart {
        let Json(value) = Json::<Value>::from_request(req, &())
            .await
            .map_err(|e| ApiError::validation(format!("invalid JSON body: {e}")))?;
        let Value::Object(fields) = value else {
            return Err(ApiError::validation("request body must be a JSON object"));
        };
        return Ok(Payload { fields, file: None });
    }

    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart body: {e}")))?;

    let mut fields = Map::new();
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("failed to read multipart field: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_some() {
            if file.is_some() {
                return Err(ApiError::validation("only one file per request"));
            }
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("failed to read upload: {e}")))?;
            file = Some(UploadedPart {
                original_name,
                content_type,
                bytes,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::validation(format!("failed to read field {name}: {e}")))?;
            fields.insert(name, Value::String(value));
        }
    }

    Ok(Payload { fields, file })
}

fn parse_fields<T: DeserializeOwned>(fields: Map<String, Value>) -> Result<T, ApiError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| ApiError::validation(format!("invalid request fields: {e}")))
}

fn reject_unexpected_file<R: Resource>(payload: &Payload) -> Result<(), ApiError> {
    if payload.file.is_some() && R::MEDIA_COLUMN.is_none() {
        return Err(ApiError::validation(format!(
            "{} does not accept file uploads",
            R::KIND
        )));
    }
    Ok(())
}

/// Stage the uploaded part and append the media columns, verifying the file
/// really landed on disk before the reference is persisted.
async fn stage_media<R: Resource>(
    state: &AppState,
    part: &UploadedPart,
    values: &mut Vec<(&'static str, SqlValue)>,
) -> Result<StoredFile, ApiError> {
    let stored = state
        .uploads
        .store(&part.original_name, &part.content_type, &part.bytes)
        .await?;

    if !state.uploads.exists(&stored.relative_path).await {
        return Err(ApiError::storage(format!(
            "staged file missing after write: {}",
            stored.relative_path
        )));
    }

    if let Some(col) = R::MEDIA_COLUMN {
        values.push((col, SqlValue::Text(stored.relative_path.clone())));
    }
    if let Some(type_col) = R::MEDIA_TYPE_COLUMN {
        values.push((type_col, SqlValue::Text(part.content_type.clone())));
    }
    Ok(stored)
}

/// Run the persistence step for a request that may have staged a file. Any
/// failure deletes the staged file before the error is surfaced, so a failed
/// insert or update leaves no orphan behind.
async fn persist_or_discard<T>(
    uploads: &UploadStore,
    staged: Option<StoredFile>,
    persist: impl std::future::Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    match persist.await {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Some(stored) = staged {
                uploads.remove(&stored.relative_path).await;
            }
            Err(err)
        }
    }
}

/// After a replacement file has been persisted, drop the superseded one.
/// Only called once the row update has committed.
async fn remove_superseded(uploads: &UploadStore, old: Option<&str>, new: Option<&str>) {
    if let Some(old) = old {
        if new != Some(old) {
            uploads.remove(old).await;
        }
    }
}

fn audit_login(req: &Request) -> Option<String> {
    req.extensions()
        .get::<AuthUser>()
        .map(|user| user.login.clone())
}

/// GET / - paginated listing with optional search.
pub async fn list<R: Resource>(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let params = ListParams::for_resource::<R>(&query);
    let (rows, total) = Repository::<R>::new(state.pool.clone())
        .list(&params)
        .await
        .map_err(|e| e.into_api(R::KIND))?;

    let pagination = Pagination::new(&params, total);
    Ok(Json(json!({
        "success": true,
        "data": rows,
        "pagination": pagination,
    })))
}

/// GET /:id
pub async fn get_one<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<R> {
    let row = Repository::<R>::new(state.pool.clone())
        .find(id)
        .await
        .map_err(|e| e.into_api(R::KIND))?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", R::KIND)))?;
    Ok(ApiResponse::success(row))
}

/// POST / - create, optionally staging one uploaded file.
pub async fn create<R: Resource>(State(state): State<AppState>, req: Request) -> ApiResult<R> {
    let admin = audit_login(&req);
    let payload = read_payload(req).await?;
    let input: R::Create = parse_fields(payload.fields.clone())?;

    // Nothing is written anywhere until validation has passed.
    R::validate_create(&input)?;
    reject_unexpected_file::<R>(&payload)?;
    if R::MEDIA_REQUIRED && payload.file.is_none() {
        return Err(ApiError::validation(format!(
            "{} image is required",
            R::KIND
        )));
    }

    let mut values = R::insert_values(&input);
    let mut staged = None;
    if let Some(part) = payload.file.as_ref() {
        staged = Some(stage_media::<R>(&state, part, &mut values).await?);
    }

    let repo = Repository::<R>::new(state.pool.clone());
    let row = persist_or_discard(&state.uploads, staged, async {
        repo.insert(values).await.map_err(|e| e.into_api(R::KIND))
    })
    .await?;

    info!(kind = R::KIND, admin = ?admin, "resource created");
    Ok(ApiResponse::created(row))
}

/// PUT /:id - partial update; only supplied fields change. A replacement
/// file supersedes the old one, which is deleted only after the row update
/// has committed.
pub async fn update<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    req: Request,
) -> ApiResult<R> {
    let admin = audit_login(&req);
    let payload = read_payload(req).await?;
    let input: R::Update = parse_fields(payload.fields.clone())?;
    R::validate_update(&input)?;

    let repo = Repository::<R>::new(state.pool.clone());
    let existing = repo
        .find(id)
        .await
        .map_err(|e| e.into_api(R::KIND))?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", R::KIND)))?;

    reject_unexpected_file::<R>(&payload)?;
    let mut values = R::update_values(&input);
    if values.is_empty() && payload.file.is_none() {
        return Err(ApiError::validation("no fields to update"));
    }

    let mut staged = None;
    if let Some(part) = payload.file.as_ref() {
        staged = Some(stage_media::<R>(&state, part, &mut values).await?);
    }
    let replaced_media = staged.is_some();

    let row = persist_or_discard(&state.uploads, staged, async {
        match repo.update(id, values).await {
            Ok(Some(row)) => Ok(row),
            // Row vanished between find and update.
            Ok(None) => Err(ApiError::not_found(format!("{} not found", R::KIND))),
            Err(err) => Err(err.into_api(R::KIND)),
        }
    })
    .await?;

    if replaced_media {
        // The new state is durable; the superseded file can go now.
        remove_superseded(&state.uploads, existing.media_path(), row.media_path()).await;
    }
    info!(kind = R::KIND, id, admin = ?admin, "resource updated");
    Ok(ApiResponse::success(row))
}

/// DELETE /:id - the row is authoritative; the media file is removed
/// best-effort afterwards.
pub async fn remove<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    req: Request,
) -> ApiResult<Value> {
    let admin = audit_login(&req);
    let deleted = Repository::<R>::new(state.pool.clone())
        .delete(id)
        .await
        .map_err(|e| e.into_api(R::KIND))?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", R::KIND)))?;

    if let Some(media) = deleted.media_path() {
        if !state.uploads.remove(media).await {
            warn!(kind = R::KIND, id, media, "media file was already absent");
        }
    }

    info!(kind = R::KIND, id, admin = ?admin, "resource deleted");
    Ok(ApiResponse::success(json!({ "deletedId": id }))
        .with_message(format!("{} deleted", R::KIND)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::resources::article::CreateArticle;
    use crate::resources::staff::UpdateStaff;

    fn fields(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn store_in(dir: &std::path::Path) -> UploadStore {
        UploadStore::new(&UploadConfig {
            dir: dir.to_path_buf(),
            public_prefix: "/uploads".to_string(),
            max_bytes: 1024,
        })
    }

    async fn stage_file(store: &UploadStore) -> StoredFile {
        store
            .store("image.png", "image/png", b"png bytes")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn failed_persist_deletes_the_staged_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        let staged = stage_file(&store).await;
        let reference = staged.relative_path.clone();
        assert!(store.exists(&reference).await);

        let result: Result<(), ApiError> = persist_or_discard(&store, Some(staged), async {
            Err(ApiError::conflict("letter with the same unique value already exists"))
        })
        .await;

        assert!(result.is_err());
        assert!(!store.exists(&reference).await);
    }

    #[tokio::test]
    async fn not_found_after_staging_deletes_the_staged_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        let staged = stage_file(&store).await;
        let reference = staged.relative_path.clone();

        let result: Result<(), ApiError> = persist_or_discard(&store, Some(staged), async {
            Err(ApiError::not_found("letter not found"))
        })
        .await;

        assert!(result.is_err());
        assert!(!store.exists(&reference).await);
    }

    #[tokio::test]
    async fn successful_persist_keeps_the_staged_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        let staged = stage_file(&store).await;
        let reference = staged.relative_path.clone();

        let row_id = persist_or_discard(&store, Some(staged), async { Ok(42_i32) })
            .await
            .unwrap();

        assert_eq!(row_id, 42);
        assert!(store.exists(&reference).await);
    }

    #[tokio::test]
    async fn replacement_deletes_only_the_superseded_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        let old = stage_file(&store).await;
        let new = stage_file(&store).await;

        remove_superseded(&store, Some(&old.relative_path), Some(&new.relative_path)).await;
        assert!(!store.exists(&old.relative_path).await);
        assert!(store.exists(&new.relative_path).await);

        // Same reference on both sides must not delete anything.
        remove_superseded(&store, Some(&new.relative_path), Some(&new.relative_path)).await;
        assert!(store.exists(&new.relative_path).await);
    }

    #[test]
    fn multipart_text_fields_deserialize_into_create_input() {
        let input: CreateArticle = parse_fields(fields(&[
            ("title", "Opening night"),
            ("date", "2024-03-01"),
            ("url", "https://example.com/a"),
        ]))
        .unwrap();
        assert_eq!(input.title.as_deref(), Some("Opening night"));
        assert!(input.date.is_some());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let input: UpdateStaff =
            parse_fields(fields(&[("position", "Lead"), ("bogus", "x")])).unwrap();
        assert_eq!(input.position.as_deref(), Some("Lead"));
        assert!(input.name.is_none());
    }

    #[test]
    fn unparseable_field_is_a_validation_error() {
        let err = parse_fields::<CreateArticle>(fields(&[("date", "not-a-date")])).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
