use crate::dtos::{
    ArtisanProfile, ArtisanSummary, FindArtisanParams, ProductSummary, RegisterArtisanForm,
    RegisterArtisanResponse, StatusResponse, UpdateArtisanForm,
};
use crate::models::Artisan;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Form, Json,
};
use metrics::counter;
use service_core::error::AppError;
use validator::Validate;

/// `find_artisan` never returns more than this many rows.
const FIND_ARTISAN_LIMIT: usize = 50;

/// Bios are always enriched into this language.
const TARGET_LANGUAGE: &str = "English";

#[tracing::instrument(skip(state, form), fields(artisan_id = tracing::field::Empty))]
pub async fn register_artisan(
    State(state): State<AppState>,
    Form(form): Form<RegisterArtisanForm>,
) -> Result<impl IntoResponse, AppError> {
    let form = form.normalized();
    form.validate()?;

    let enrichment = state
        .storyteller
        .enrich_bio(&form.bio, &form.language, TARGET_LANGUAGE)
        .await?;

    let mut artisan = Artisan::new(form.name, form.location, form.language, form.contact_number);
    artisan.bio_original = form.bio;
    artisan.bio_translated = enrichment.translated;
    artisan.bio_enriched = enrichment.enriched;
    artisan.story_source = enrichment.source;

    state.catalog.insert_artisan(&artisan).await?;

    tracing::Span::current().record("artisan_id", artisan.id.as_str());
    tracing::info!(story_source = ?artisan.story_source, "Artisan registered");
    counter!("artisans_registered_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Json(RegisterArtisanResponse {
            id: artisan.id,
            name: artisan.name,
            story_source: artisan.story_source,
        }),
    ))
}

pub async fn get_artisan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ArtisanProfile>, AppError> {
    let artisan = state
        .catalog
        .get_artisan(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Artisan not found"))?;

    let origin = state.backend_origin();
    let products = state
        .catalog
        .products_for_artisan(&artisan.id)
        .await?
        .into_iter()
        .map(|p| ProductSummary::new(p, origin))
        .collect();

    Ok(Json(ArtisanProfile::new(artisan, products)))
}

#[tracing::instrument(skip(state, form))]
pub async fn update_artisan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<UpdateArtisanForm>,
) -> Result<Json<StatusResponse>, AppError> {
    let form = form.normalized();
    form.validate()?;

    let mut artisan = state
        .catalog
        .get_artisan(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Artisan not found"))?;

    if let Some(name) = form.name {
        artisan.name = name;
    }
    if let Some(location) = form.location {
        artisan.location = location;
    }
    if let Some(language) = form.language {
        artisan.language = language;
    }
    if let Some(contact_number) = form.contact_number {
        artisan.contact_number = contact_number;
    }
    // Runs after the language update so a new bio is read in the new language.
    if let Some(bio) = form.bio {
        let enrichment = state
            .storyteller
            .enrich_bio(&bio, &artisan.language, TARGET_LANGUAGE)
            .await?;
        artisan.bio_original = bio;
        artisan.bio_translated = enrichment.translated;
        artisan.bio_enriched = enrichment.enriched;
        artisan.story_source = enrichment.source;
    }

    artisan.touch();
    state.catalog.update_artisan(&artisan).await?;

    tracing::info!("Artisan profile updated");
    Ok(Json(StatusResponse::new("ok", artisan.id)))
}

pub async fn find_artisan(
    State(state): State<AppState>,
    Query(params): Query<FindArtisanParams>,
) -> Result<Json<Vec<ArtisanSummary>>, AppError> {
    let artisans = state
        .catalog
        .find_artisans(&params.name, &params.location, FIND_ARTISAN_LIMIT)
        .await?;

    Ok(Json(artisans.into_iter().map(ArtisanSummary::from).collect()))
}
