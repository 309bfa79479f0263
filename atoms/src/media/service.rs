use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;

use super::model::{Department, Gallery, PhotoArtifact, PhotoPurpose, DEPARTMENTS};
use crate::error::{AtomError, AtomResult};

/// Decode a captured photo sent as a data URL (`data:image/png;base64,...`).
/// A bare base64 payload is accepted too. The format is sniffed from the
/// bytes; the declared MIME type is ignored.
pub fn decode_photo(data_url: &str) -> AtomResult<PhotoArtifact> {
    let trimmed = data_url.trim();
    if trimmed.is_empty() {
        return Err(AtomError::validation("photo is required"));
    }

    let encoded = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (meta, payload) = rest
                .split_once(',')
                .ok_or_else(|| AtomError::validation("malformed photo data URL"))?;
            if !meta.ends_with(";base64") {
                return Err(AtomError::validation("photo data URL must be base64 encoded"));
            }
            payload
        }
        None => trimmed,
    };

    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| AtomError::validation(format!("photo is not valid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(AtomError::validation("photo is empty"));
    }

    let format = image::guess_format(&bytes)
        .map_err(|_| AtomError::validation("photo is not a recognised image"))?;
    let (content_type, extension) = match format {
        ImageFormat::Png => ("image/png", "png"),
        ImageFormat::Jpeg => ("image/jpeg", "jpg"),
        ImageFormat::WebP => ("image/webp", "webp"),
        ImageFormat::Gif => ("image/gif", "gif"),
        other => {
            return Err(AtomError::validation(format!("unsupported photo format {:?}", other)));
        }
    };

    Ok(PhotoArtifact {
        bytes,
        content_type,
        extension,
    })
}

/// `borrows/{user_id}/{millis}-{suffix}.{ext}` or `returns/...`. The random
/// suffix keeps two uploads by one user in the same millisecond apart.
pub fn photo_key(purpose: PhotoPurpose, user_id: &str, artifact: &PhotoArtifact) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}/{}/{}-{}.{}",
        purpose.prefix(),
        user_id,
        chrono::Utc::now().timestamp_millis(),
        &suffix[..8],
        artifact.extension
    )
}

pub fn list_departments() -> Vec<Department> {
    DEPARTMENTS.to_vec()
}

pub fn gallery(asset_base_url: &str, folder: &str) -> AtomResult<Gallery> {
    let department =
        Department::lookup(folder).ok_or_else(|| AtomError::NotFound(format!("Department {}", folder)))?;
    let base = asset_base_url.trim_end_matches('/');
    let images = (1..=department.image_count)
        .map(|n| format!("{}/{}/{}.{}", base, department.folder, n, department.file_type))
        .collect();
    Ok(Gallery { department, images })
}
