use anyhow::{anyhow, Result};

use crate::{
    cli::Selection, config::Config, parquet, paths::ProductPaths, yearly::read_yearly_csv,
};

use super::{make_parquet_file_name, resolve_selection};

pub fn export(config: &Config, selection: &Selection) -> Result<String> {
    let (product, scenario, _) = resolve_selection(config, selection)?;
    let paths = ProductPaths::new(config, &product, scenario);

    let yearly_path = paths.yearly_aggregate();
    if !yearly_path.exists() {
        return Err(anyhow!(
            "No yearly aggregate at {}, run all twelve months first",
            yearly_path.display()
        ));
    }
    let records = read_yearly_csv(&yearly_path)?;

    let parquet_file_name =
        make_parquet_file_name(&product.product.to_string(), &scenario.to_string())?;
    parquet::save_yearly(&records, &parquet_file_name)?;

    Ok(parquet_file_name.to_string_lossy().to_string())
}

// -- Tests -------------------------------------------------------------------
