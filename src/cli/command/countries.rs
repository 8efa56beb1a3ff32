use std::path::Path;

use anyhow::Result;

use crate::{config::Config, db};

pub async fn countries(config: &Config, csv: &Path) -> Result<u64> {
    let pool = db::connect(&config.database_url).await?;
    let inserted = db::countries::add_countries_to_db(&pool, csv).await?;
    pool.close().await;

    Ok(inserted)
}
