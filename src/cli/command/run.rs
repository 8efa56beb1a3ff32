use anyhow::Result;
use log::info;

use crate::{
    catalog::Month,
    cli::Selection,
    config::Config,
    paths::ProductPaths,
    steps::{describe_steps, get_processing_steps, Pipeline},
};

use super::resolve_selection;

pub async fn run(config: Config, selection: &Selection, all_months: bool) -> Result<()> {
    let (product, scenario, month) = resolve_selection(&config, selection)?;
    info!("Processing {} {}", product.product, scenario);

    let mut pipeline = Pipeline::new(config, product)?;
    if all_months {
        pipeline.run_all_months(scenario).await
    } else {
        pipeline.run_single_month(scenario, month).await?;
        Ok(())
    }
}

/// One line per month: the steps a run would take and the source URL.
/// Months are resolved against what is on disk now, not after earlier months
/// of the same run.
pub fn plan(config: &Config, selection: &Selection, all_months: bool) -> Result<Vec<String>> {
    let (product, scenario, month) = resolve_selection(config, selection)?;
    let paths = ProductPaths::new(config, &product, scenario);

    let months: Vec<Month> = if all_months {
        product.available_months.clone()
    } else {
        vec![month]
    };

    let mut lines = Vec::with_capacity(months.len());
    for month in months {
        let steps = get_processing_steps(&paths, month);
        lines.push(format!(
            "{} {} {}: {}\n    {}",
            product.product,
            scenario,
            month,
            describe_steps(&steps),
            product.url(scenario, month)?
        ));
    }
    Ok(lines)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::paths::test::config_fixture;

    #[test]
    fn should_plan_without_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let config = config_fixture(tmp.path());
        let selection = Selection {
            month: Some("march".into()),
            ..Default::default()
        };

        let lines = plan(&config, &selection, false).unwrap();

        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("temp ACCESS1-0_rcp45 March: Download -> Mask -> ZonalStatistics"));
        assert!(lines[0].contains("CHELSA_tas_mon_ACCESS1-0_rcp45_r1i1p1_g025.nc_3_"));
        assert!(!tmp.path().join("cmip5").exists());

        assert_eq!(plan(&config, &selection, true).unwrap().len(), 12);
    }
}
