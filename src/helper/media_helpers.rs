use crate::error::BlogResult;
use crate::helper::form_helpers::ImageUpload;
use actix_web::web;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Writes an uploaded post image below `media_root` and returns its path
/// relative to the media root (the part that follows `/media/` in URLs).
pub async fn save_post_image(media_root: &Path, upload: ImageUpload) -> BlogResult<String> {
    let file_id = Uuid::new_v4().to_string();
    let relative = format!("posts/{}/{}.{}", &file_id[0..2], file_id, upload.extension);
    let final_path = media_root.join(&relative);

    web::block(move || -> std::io::Result<()> {
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = fs::File::create(&final_path)?;
        f.write_all(&upload.bytes)?;
        f.sync_all()
    })
    .await??;

    Ok(relative)
}

/// Removes a stored image. Failures are logged, not returned: the database
/// row is already gone or updated by the time this runs.
pub async fn remove_post_image(media_root: &Path, relative: &str) {
    let path = match resolve_media_path(media_root, relative) {
        Some(path) => path,
        None => {
            log::warn!("Refusing to remove media outside the media root: {}", relative);
            return;
        }
    };
    match web::block(move || fs::remove_file(path)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("Could not remove post image '{}': {}", relative, e),
        Err(e) => log::error!("Blocking task for removing '{}' failed: {}", relative, e),
    }
}

/// Passes `result` through, removing the freshly saved `image` first when the
/// write that was meant to reference it failed.
pub async fn discard_image_on_error<T>(media_root: &Path, image: Option<&str>, result: BlogResult<T>) -> BlogResult<T> {
    if let (Err(e), Some(image)) = (&result, image) {
        log::warn!("Removing uploaded image '{}' after a failed write: {}", image, e);
        remove_post_image(media_root, image).await;
    }
    result
}

fn resolve_media_path(media_root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let safe = relative
        .components()
        .all(|c| matches!(c, std::path::Component::Normal(_)));
    if safe {
        Some(media_root.join(relative))
    } else {
        None
    }
}
