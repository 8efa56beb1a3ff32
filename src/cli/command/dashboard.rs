use std::sync::Arc;

use anyhow::Result;

use crate::{
    catalog::get_climatology,
    config::Config,
    dashboard::{start_server, DashboardState},
    db,
};

pub async fn dashboard(config: &Config, product: Option<&str>, port: u16) -> Result<()> {
    let product = get_climatology(product.unwrap_or(&config.product))?.product;

    let pool = db::connect(&config.database_url).await?;
    db::sqlite::create_product_table(&pool, product).await?;

    let state = Arc::new(DashboardState {
        pool,
        product,
        geojson_path: config.geojson_path(),
    });

    start_server(state, port).await
}
