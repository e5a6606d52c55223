use anyhow::{Context, Result};
use geojson::{FeatureCollection, GeoJson};
use std::path::Path;

/// Write a FeatureCollection to `path`, or to stdout when no path is given.
pub fn write_feature_collection(collection: FeatureCollection, path: Option<&Path>) -> Result<()> {
    let count = collection.features.len();
    let json = serde_json::to_string_pretty(&GeoJson::FeatureCollection(collection))
        .context("Failed to serialize GeoJSON")?;

    match path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {} features to {}", count, path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Wrap individual features into a collection.
pub fn collect(features: impl IntoIterator<Item = geojson::Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features.into_iter().collect(),
        foreign_members: None,
    }
}
