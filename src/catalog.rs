//! CHELSA products, scenarios and months, and the download URLs built from them.

use std::str::FromStr;

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

const CHELSA_ROOT: &str = "https://os.zhdk.cloud.switch.ch/envicloud/chelsa/chelsa_V1";
const DEFAULT_TIME_PERIOD: &str = "2061-2080";

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("product `{requested}` is not available. Options include {available:?}")]
    ProductNotAvailable {
        requested: String,
        available: Vec<String>,
    },
    #[error("scenario {scenario} is not available for {product}. Options include {available:?}")]
    ScenarioNotAvailable {
        product: Product,
        scenario: Scenario,
        available: Vec<String>,
    },
    #[error("month {month} is not available for {product}")]
    MonthNotAvailable { product: Product, month: Month },
    #[error("`{0}` is not a month")]
    InvalidMonth(String),
}

/// CHELSA products available under CMIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Product {
    Temp,
    Bio,
    Prec,
    Tmax,
    Tmin,
}

impl Product {
    /// Monthly temperature climatologies are stored as °C/10.
    pub fn is_temperature(&self) -> bool {
        matches!(self, Product::Temp | Product::Tmax | Product::Tmin)
    }

    /// Name of the database table holding this product.
    pub fn table_name(&self) -> String {
        self.to_string()
    }
}

/// Sample of the CMIP5 scenarios published by CHELSA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Scenario {
    #[strum(to_string = "ACCESS1-0_rcp45", serialize = "ACCESS1_0_rcp45")]
    Access10Rcp45,
    #[strum(to_string = "ACCESS1-0_rcp85", serialize = "ACCESS1_0_rcp85")]
    Access10Rcp85,
    #[strum(to_string = "BNU-ESM_rcp26", serialize = "BNU_ESM_rcp26")]
    BnuEsmRcp26,
    #[strum(to_string = "BNU-ESM_rcp45", serialize = "BNU_ESM_rcp45")]
    BnuEsmRcp45,
    #[strum(to_string = "CCSM4_rcp60")]
    Ccsm4Rcp60,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Phase {
    #[default]
    Cmip5,
    Cmip6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
#[repr(u8)]
pub enum Month {
    January = 1,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Month::iter().find(|m| m.number() == number)
    }
}

impl FromStr for Month {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<u8>() {
            return Month::from_number(number).ok_or_else(|| CatalogError::InvalidMonth(s.into()));
        }

        Month::iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CatalogError::InvalidMonth(s.into()))
    }
}

/// A downloadable CHELSA product with the scenarios and months it covers.
#[derive(Debug, Clone)]
pub struct ChelsaProduct {
    pub product: Product,
    /// Variable name used in CHELSA file names, e.g. `tas`.
    pub variable: &'static str,
    pub available_scenarios: Vec<Scenario>,
    pub available_months: Vec<Month>,
    pub phase: Phase,
    pub time_period: String,
}

impl ChelsaProduct {
    pub fn new(product: Product) -> Self {
        let variable = match product {
            Product::Temp => "tas",
            Product::Bio => "bio",
            Product::Prec => "pr",
            Product::Tmax => "tasmax",
            Product::Tmin => "tasmin",
        };

        ChelsaProduct {
            product,
            variable,
            available_scenarios: Scenario::iter().collect(),
            available_months: Month::iter().collect(),
            phase: Phase::default(),
            time_period: DEFAULT_TIME_PERIOD.to_string(),
        }
    }

    /// Builds the URL of the GeoTIFF for a scenario and month.
    pub fn url(&self, scenario: Scenario, month: Month) -> Result<String, CatalogError> {
        if !self.available_scenarios.contains(&scenario) {
            return Err(CatalogError::ScenarioNotAvailable {
                product: self.product,
                scenario,
                available: self.available_scenarios.iter().map(|s| s.to_string()).collect(),
            });
        }

        if !self.available_months.contains(&month) {
            return Err(CatalogError::MonthNotAvailable {
                product: self.product,
                month,
            });
        }

        Ok(format!(
            "{root}/{phase}/{period}/{product}/CHELSA_{variable}_mon_{scenario}_r1i1p1_g025.nc_{month}_{period}_V1.2.tif",
            root = CHELSA_ROOT,
            phase = self.phase,
            period = self.time_period,
            product = self.product,
            variable = self.variable,
            scenario = scenario,
            month = month.number(),
        ))
    }
}

/// Returns the product matching a user supplied name.
pub fn get_climatology(name: &str) -> Result<ChelsaProduct, CatalogError> {
    let product = Product::from_str(name.trim()).map_err(|_| CatalogError::ProductNotAvailable {
        requested: name.to_string(),
        available: Product::iter().map(|p| p.to_string()).collect(),
    })?;

    Ok(ChelsaProduct::new(product))
}

// -- Tests -------------------------------------------------------------------
