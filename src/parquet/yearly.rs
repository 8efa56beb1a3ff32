//! Save a scenario's yearly table to a parquet file.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::Result;
use arrow::{
    array::{ArrayRef, Float64Array, StringArray, UInt64Array, UInt8Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};

use crate::yearly::YearlyRecord;

pub fn save_yearly(records: &[YearlyRecord], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("place_id", DataType::Utf8, false),
        Field::new("iso2_code", DataType::Utf8, true),
        Field::new("adm0_name", DataType::Utf8, true),
        Field::new("adm1_name", DataType::Utf8, true),
        Field::new("adm2_name", DataType::Utf8, true),
        Field::new("adm1_id", DataType::Utf8, true),
        Field::new("adm2_id", DataType::Utf8, true),
        Field::new("product", DataType::Utf8, false),
        Field::new("scenario", DataType::Utf8, false),
        Field::new("month", DataType::UInt8, false),
        Field::new("min_raw", DataType::Float64, true),
        Field::new("mean_raw", DataType::Float64, true),
        Field::new("max_raw", DataType::Float64, true),
        Field::new("median_raw", DataType::Float64, true),
        Field::new("pixel_count", DataType::UInt64, true),
        Field::new("min_celsius", DataType::Float64, true),
        Field::new("mean_celsius", DataType::Float64, true),
        Field::new("max_celsius", DataType::Float64, true),
        Field::new("median_celsius", DataType::Float64, true),
    ]));

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let text = |f: fn(&YearlyRecord) -> Option<&str>| -> ArrayRef {
        Arc::new(records.iter().map(f).collect::<StringArray>())
    };
    let float = |f: fn(&YearlyRecord) -> Option<f64>| -> ArrayRef {
        Arc::new(records.iter().map(f).collect::<Float64Array>())
    };

    let columns: Vec<ArrayRef> = vec![
        text(|r| Some(r.id.as_str())),
        text(|r| Some(r.place_id.as_str())),
        text(|r| r.iso2_code.as_deref()),
        text(|r| r.adm0_name.as_deref()),
        text(|r| r.adm1_name.as_deref()),
        text(|r| r.adm2_name.as_deref()),
        text(|r| r.adm1_id.as_deref()),
        text(|r| r.adm2_id.as_deref()),
        text(|r| Some(r.product.as_str())),
        text(|r| Some(r.scenario.as_str())),
        Arc::new(UInt8Array::from_iter_values(records.iter().map(|r| r.month))),
        float(|r| r.min_raw),
        float(|r| r.mean_raw),
        float(|r| r.max_raw),
        float(|r| r.median_raw),
        Arc::new(records.iter().map(|r| r.pixel_count).collect::<UInt64Array>()),
        float(|r| r.min_celsius),
        float(|r| r.mean_celsius),
        float(|r| r.max_celsius),
        float(|r| r.median_celsius),
    ];

    let batch = RecordBatch::try_new(schema, columns)?;

    writer.write(&batch)?;

    writer.close()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
