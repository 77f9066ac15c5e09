//! Root Hypercat catalogue
//!
//! GET /cat lists the catalogue item of every registered store.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::api::handlers::AppState;
use crate::registry::{
    CatalogueItem, Metadata, HYPERCAT_CATALOGUE_TYPE, HYPERCAT_CONTENT_TYPE_REL,
    HYPERCAT_DESCRIPTION_REL,
};

pub const ROOT_DESCRIPTION: &str = "Databox Root Catalogue";

/// Hypercat 3.0 catalogue document
#[derive(Debug, Serialize)]
pub struct Catalogue {
    #[serde(rename = "catalogue-metadata")]
    pub catalogue_metadata: Vec<Metadata>,
    pub items: Vec<CatalogueItem>,
}

impl Catalogue {
    /// Root catalogue containing `items`
    pub fn root(items: Vec<CatalogueItem>) -> Self {
        Self {
            catalogue_metadata: vec![
                Metadata::new(HYPERCAT_CONTENT_TYPE_REL, HYPERCAT_CATALOGUE_TYPE),
                Metadata::new(HYPERCAT_DESCRIPTION_REL, ROOT_DESCRIPTION),
            ],
            items,
        }
    }
}

/// GET /cat
pub async fn get_catalogue(State(state): State<Arc<AppState>>) -> Json<Catalogue> {
    Json(Catalogue::root(state.registry.catalogue_items()))
}
