use crate::dtos::{image_url, ProductCreatedResponse, StatusResponse};
use crate::models::Product;
use crate::services::enhancer::extension_of;
use crate::services::Storage;
use crate::startup::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use metrics::counter;
use service_core::error::AppError;
use uuid::Uuid;

const MAX_PRODUCT_NAME_CHARS: usize = 200;

/// Form fields shared by product upload and update.
#[derive(Debug, Default)]
struct ProductFields {
    artisan_id: Option<String>,
    product_name: Option<String>,
    description: Option<String>,
    price: Option<String>,
    file: Option<UploadedFile>,
}

#[derive(Debug)]
struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

/// Storage keys of one product image: the served image and the raw upload.
struct StoredImages {
    raw_key: String,
    image_key: String,
}

impl StoredImages {
    fn of(product: &Product) -> Self {
        Self {
            raw_key: product.raw_image_key.clone(),
            image_key: product.image_key.clone(),
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    }
}

async fn read_product_fields(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> Result<ProductFields, AppError> {
    let mut fields = ProductFields::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            if bytes.len() > max_upload_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "File too large (max {} bytes)",
                    max_upload_bytes
                )));
            }
            fields.file = Some(UploadedFile {
                filename,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let slot = match name.as_str() {
            "artisan_id" => &mut fields.artisan_id,
            "product_name" => &mut fields.product_name,
            "description" => &mut fields.description,
            "price" => &mut fields.price,
            _ => continue,
        };
        *slot = Some(field.text().await.map_err(multipart_error)?.trim().to_string());
    }

    Ok(fields)
}

fn check_product_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::bad_request("product_name must not be empty"));
    }
    if name.chars().count() > MAX_PRODUCT_NAME_CHARS {
        return Err(AppError::bad_request(format!(
            "product_name must be at most {} characters",
            MAX_PRODUCT_NAME_CHARS
        )));
    }
    Ok(())
}

fn check_file(file: &UploadedFile) -> Result<(), AppError> {
    if file.bytes.is_empty() {
        return Err(AppError::bad_request("Uploaded file is empty"));
    }
    Ok(())
}

/// Enhance the upload, then write the raw bytes to the originals store and the
/// enhanced image to the served media store.
async fn store_images(
    state: &AppState,
    file: UploadedFile,
) -> Result<(StoredImages, bool), AppError> {
    let stem = Uuid::new_v4().simple().to_string();
    let raw_key = format!("{}.{}", stem, extension_of(&file.filename));

    let enhanced = state
        .enhancer
        .enhance(file.bytes.clone(), &file.filename)
        .await?;
    let image_key = format!("{}.{}", stem, enhanced.extension);

    state.originals.upload(&raw_key, file.bytes).await?;
    if let Err(e) = state.storage.upload(&image_key, enhanced.bytes).await {
        remove_file(state.originals.as_ref(), &raw_key).await;
        return Err(e);
    }

    Ok((StoredImages { raw_key, image_key }, enhanced.enhanced))
}

/// Best-effort removal; failures are logged and otherwise ignored.
async fn remove_file(storage: &dyn Storage, key: &str) {
    if key.is_empty() {
        return;
    }
    if let Err(e) = storage.delete(key).await {
        tracing::warn!(key = %key, "Failed to remove media file: {}", e);
    }
}

async fn remove_images(state: &AppState, images: &StoredImages) {
    remove_file(state.storage.as_ref(), &images.image_key).await;
    remove_file(state.originals.as_ref(), &images.raw_key).await;
}

#[tracing::instrument(skip(state, multipart), fields(product_id = tracing::field::Empty))]
pub async fn upload_product(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let fields = read_product_fields(multipart, state.config.media.max_upload_bytes).await?;

    let artisan_id = fields
        .artisan_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing field: artisan_id"))?;
    let product_name = fields
        .product_name
        .ok_or_else(|| AppError::bad_request("Missing field: product_name"))?;
    check_product_name(&product_name)?;
    let file = fields
        .file
        .ok_or_else(|| AppError::bad_request("Missing field: file"))?;
    check_file(&file)?;

    // Nothing touches storage until the owner is known to exist.
    let artisan = state
        .catalog
        .get_artisan(&artisan_id)
        .await?
        .ok_or_else(|| AppError::not_found("Artisan not found"))?;

    let (stored, enhanced) = store_images(&state, file).await?;

    let mut product = Product::new(
        artisan.id,
        product_name,
        fields.description.unwrap_or_default(),
        fields.price.unwrap_or_default(),
    );
    product.raw_image_key = stored.raw_key;
    product.image_key = stored.image_key;
    product.enhanced = enhanced;

    if let Err(e) = state.catalog.insert_product(&product).await {
        remove_images(&state, &StoredImages::of(&product)).await;
        return Err(e);
    }

    tracing::Span::current().record("product_id", product.id.as_str());
    tracing::info!(enhanced = product.enhanced, "Product uploaded");
    counter!("products_uploaded_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Json(ProductCreatedResponse {
            image: image_url(state.backend_origin(), &product.image_key),
            id: product.id,
            enhanced: product.enhanced,
        }),
    ))
}

#[tracing::instrument(skip(state, multipart))]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<StatusResponse>, AppError> {
    let fields = read_product_fields(multipart, state.config.media.max_upload_bytes).await?;

    let mut product = state
        .catalog
        .get_product(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    if let Some(name) = fields.product_name {
        check_product_name(&name)?;
        product.name = name;
    }
    if let Some(description) = fields.description {
        product.description = description;
    }
    if let Some(price) = fields.price {
        product.price = price;
    }

    let previous = StoredImages::of(&product);
    let mut replaced = false;
    if let Some(file) = fields.file {
        check_file(&file)?;
        let (stored, enhanced) = store_images(&state, file).await?;
        product.raw_image_key = stored.raw_key;
        product.image_key = stored.image_key;
        product.enhanced = enhanced;
        replaced = true;
    }

    product.touch();
    // Only commit over the image this request read; a concurrent writer wins.
    if let Err(e) = state
        .catalog
        .update_product(&product, &previous.image_key)
        .await
    {
        if replaced {
            remove_images(&state, &StoredImages::of(&product)).await;
        }
        return Err(e);
    }

    if replaced {
        remove_images(&state, &previous).await;
    }

    tracing::info!(image_replaced = replaced, "Product updated");
    Ok(Json(StatusResponse::new("ok", product.id)))
}

#[tracing::instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let product = state
        .catalog
        .get_product(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    if !state.catalog.delete_product(&product.id).await? {
        return Err(AppError::not_found("Product not found"));
    }
    remove_images(&state, &StoredImages::of(&product)).await;

    tracing::info!("Product deleted");
    Ok(Json(StatusResponse::new("deleted", product.id)))
}
