use tabled::Table;

use crate::{
    config, error,
    error::CatalogError,
    spotify::catalog::CatalogClient,
    success,
    types::{Collection, CollectionTableRow, Listing},
    utils, warning,
};

pub async fn list_collections() {
    let collections = match config::showcase_collections() {
        Ok(collections) => collections,
        Err(e) => error!("Invalid showcase configuration. Err: {}", e),
    };
    if collections.is_empty() {
        warning!("No collections configured. Set SHOWCASE_COLLECTIONS in your .env");
        return;
    }

    let Some(session) = super::require_session().await else {
        return;
    };
    let catalog = CatalogClient::from_env(session);

    let pb = super::spinner("Loading collections...");
    let mut rows = Vec::with_capacity(collections.len());
    for collection in &collections {
        let title = match catalog.collection_summary(collection).await {
            Ok(summary) => summary.title,
            Err(CatalogError::AccessDenied(_)) => {
                pb.finish_and_clear();
                super::access_denied_notice();
                return;
            }
            Err(CatalogError::NoToken | CatalogError::Unauthorized(_)) => {
                pb.finish_and_clear();
                super::signed_out_notice();
                return;
            }
            Err(e) => {
                pb.println(format!("Failed to load {}: {}", collection, e));
                String::from("-")
            }
        };
        rows.push(CollectionTableRow {
            key: collection.to_string(),
            title,
        });
    }
    pb.finish_and_clear();

    println!("{}", Table::new(rows));
    success!("{} collections", collections.len());
}

pub async fn list_tracks(collection: Collection) {
    let Some(session) = super::require_session().await else {
        return;
    };
    let catalog = CatalogClient::from_env(session);

    let pb = super::spinner(&format!("Loading {}...", collection));
    let listing = catalog.load_collection(&collection).await;
    pb.finish_and_clear();

    match listing {
        Listing::AccessDenied => super::access_denied_notice(),
        Listing::SignedOut => super::signed_out_notice(),
        Listing::Tracks(tracks) if tracks.is_empty() => {
            warning!("No tracks found for {}", collection)
        }
        Listing::Tracks(tracks) => {
            println!("{}", Table::new(utils::track_table_rows(&tracks)));
        }
    }
}
