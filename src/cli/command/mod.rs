pub mod boundaries;
pub mod countries;
pub mod dashboard;
pub mod export;
pub mod run;

use std::{path::PathBuf, str::FromStr};

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local};
pub use boundaries::boundaries;
pub use countries::countries;
pub use dashboard::dashboard;
pub use export::export;
pub use run::{plan, run};

use crate::{
    catalog::{get_climatology, ChelsaProduct, Month, Scenario},
    cli::Selection,
    config::Config,
};

pub fn make_parquet_file_name(product: &str, scenario: &str) -> Result<PathBuf> {
    let today = Local::now();
    let file_name = format!(
        "chelsa-{}-{}-{}-{:02}-{:02}.parquet",
        product,
        scenario,
        today.year(),
        today.month(),
        today.day()
    );

    let home = dirs::home_dir().ok_or_else(|| anyhow!("No home directory"))?;
    Ok(home.join(file_name))
}

/// Command line values win over the config file.
pub fn resolve_selection(
    config: &Config,
    selection: &Selection,
) -> Result<(ChelsaProduct, Scenario, Month)> {
    let product = get_climatology(selection.product.as_deref().unwrap_or(&config.product))?;

    let scenario_name = selection.scenario.as_deref().unwrap_or(&config.scenario);
    let scenario = Scenario::from_str(scenario_name.trim()).map_err(|_| {
        anyhow!(
            "Unknown scenario `{}`. Options include {:?}",
            scenario_name,
            product
                .available_scenarios
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        )
    })?;

    let month = Month::from_str(selection.month.as_deref().unwrap_or(&config.month))?;

    Ok((product, scenario, month))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::{catalog::Product, paths::test::config_fixture};

    #[test]
    fn should_name_parquet_file_after_product_and_scenario() {
        let path = make_parquet_file_name("temp", "CCSM4_rcp60").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert!(name.starts_with("chelsa-temp-CCSM4_rcp60-"));
        assert!(name.ends_with(".parquet"));
    }

    #[test]
    fn should_fall_back_to_config_selection() {
        let tmp = TempDir::new().unwrap();
        let config = config_fixture(tmp.path());

        let (product, scenario, month) =
            resolve_selection(&config, &Selection::default()).unwrap();
        assert_eq!(product.product, Product::Temp);
        assert_eq!(scenario, Scenario::Access10Rcp45);
        assert_eq!(month, Month::January);

        let selection = Selection {
            product: Some("prec".into()),
            scenario: Some("BNU-ESM_rcp26".into()),
            month: Some("6".into()),
        };
        let (product, scenario, month) = resolve_selection(&config, &selection).unwrap();
        assert_eq!(product.product, Product::Prec);
        assert_eq!(scenario, Scenario::BnuEsmRcp26);
        assert_eq!(month, Month::June);
    }

    #[test]
    fn should_reject_unknown_scenario() {
        let tmp = TempDir::new().unwrap();
        let config = config_fixture(tmp.path());
        let selection = Selection {
            scenario: Some("rcp99".into()),
            ..Default::default()
        };

        let err = resolve_selection(&config, &selection).unwrap_err();
        assert!(err.to_string().contains("Unknown scenario `rcp99`"));
    }
}
