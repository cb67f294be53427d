//! Recipe image upload.

use std::path::Path;

use axum::Extension;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use validator::{ValidationError, ValidationErrors};

use crate::AppState;
use crate::crypto::random_token;
use crate::error::{Result, ServerError};
use crate::recipe::{Owner, RecipeImage, RecipeRepository};
use crate::response::Envelope;
use crate::router::Id;
use crate::user::User;

const IMAGE_FIELD: &str = "image";
/// Directory of recipe images, relative to the media root.
const UPLOAD_DIR: &str = "uploads/recipe";

fn invalid_image(message: &'static str) -> ServerError {
    let mut errors = ValidationErrors::new();
    errors.add(
        IMAGE_FIELD,
        ValidationError::new("invalid_image").with_message(message.into()),
    );
    errors.into()
}

/// File extension of supported image types.
fn extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Write image under `root` then record its path on the recipe.
///
/// The file is removed again when the recipe cannot be updated.
async fn store(
    repo: &RecipeRepository,
    root: &Path,
    id: i64,
    extension: &str,
    bytes: &Bytes,
) -> Result<RecipeImage> {
    let image = format!("{UPLOAD_DIR}/{}.{extension}", random_token());
    let path = root.join(&image);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| ServerError::internal("cannot create upload directory", err))?;
    }
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|err| ServerError::internal("cannot write uploaded image", err))?;

    match repo.set_image(id, &image).await {
        Ok(saved) => Ok(saved),
        Err(err) => {
            if let Err(io) = tokio::fs::remove_file(&path).await {
                tracing::warn!(recipe_id = id, %image, error = %io, "orphan image not removed");
            }
            Err(err)
        },
    }
}

/// Handler to attach an image to a recipe.
///
/// Replaced images are removed from disk.
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Id(id): Id,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Envelope<RecipeImage>> {
    let mut multipart = multipart.map_err(|err| ServerError::ParsingForm(Box::new(err)))?;
    let repo = RecipeRepository::new(state.db.postgres.clone(), Owner::from(&user));
    let current = repo.find_image(id).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let extension = field
            .content_type()
            .and_then(extension)
            .ok_or_else(|| invalid_image("Upload a valid image."))?;
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(invalid_image("The submitted file is empty."));
        }

        upload = Some((extension, bytes));
        break;
    }

    let Some((extension, bytes)) = upload else {
        return Err(invalid_image("No file was submitted."));
    };

    let saved = store(&repo, &state.config.media.root, id, extension, &bytes).await?;

    if let Some(previous) = current.image {
        if let Err(err) = tokio::fs::remove_file(state.config.media.root.join(&previous)).await {
            tracing::warn!(recipe_id = id, %previous, error = %err, "old image not removed");
        }
    }

    tracing::debug!(recipe_id = id, size_bytes = bytes.len(), "recipe image uploaded");
    Ok(Envelope::ok("Image uploaded successfully", saved))
}
