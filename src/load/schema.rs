// src/load/schema.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
use std::sync::Arc;

/// Column type of the output table, named after the warehouse's types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Int64,
    Float64,
}

/// One column of the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

/// Output table layout. Names match `AggregateRow`'s serialized fields.
pub const OUTPUT_SCHEMA: &[Column] = &[
    Column {
        name: "customerId",
        ty: ColumnType::String,
    },
    Column {
        name: "avgAmount",
        ty: ColumnType::Float64,
    },
    Column {
        name: "totalAmount",
        ty: ColumnType::Int64,
    },
    Column {
        name: "medianAmount",
        ty: ColumnType::Float64,
    },
    Column {
        name: "date",
        ty: ColumnType::String,
    },
];

pub fn map_to_arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::String => DataType::Utf8,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
    }
}

/// Build an ArrowSchema (inside an Arc) from a slice of output `Column`s.
pub fn build_arrow_schema(cols: &[Column]) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = cols
        .iter()
        .map(|col| ArrowField::new(col.name, map_to_arrow_type(col.ty), false))
        .collect();

    Arc::new(ArrowSchema::new(fields))
}
