//! Raw table cells and typed casting
//!
//! Every raw value is read out of polars once and turned into a [`Cell`];
//! casting a cell to a schema type either succeeds exactly or reports why.

use super::schema::FeatureType;
use polars::prelude::*;

/// One raw value from the upstream table
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    /// Convert a polars value into a cell
    pub fn from_any(value: &AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Cell::Missing,
            AnyValue::Boolean(b) => Cell::Bool(*b),
            AnyValue::Int32(v) => Cell::Int(*v as i64),
            AnyValue::Int64(v) => Cell::Int(*v),
            AnyValue::UInt32(v) => Cell::Int(*v as i64),
            AnyValue::UInt64(v) => match i64::try_from(*v) {
                Ok(v) => Cell::Int(v),
                Err(_) => Cell::Float(*v as f64),
            },
            AnyValue::Float32(v) => Cell::Float(*v as f64),
            AnyValue::Float64(v) => Cell::Float(*v),
            AnyValue::String(s) => Cell::Text((*s).to_string()),
            AnyValue::StringOwned(s) => Cell::Text(s.to_string()),
            other => match other.extract::<f64>() {
                Some(v) => Cell::Float(v),
                None => Cell::Text(other.to_string()),
            },
        }
    }

    /// Read row `row` of `series`
    pub fn read(series: &Series, row: usize) -> Self {
        match series.get(row) {
            Ok(value) => Self::from_any(&value),
            Err(_) => Cell::Missing,
        }
    }

    /// Blank strings count as missing
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Textual form used for identifiers and category values
    pub fn as_text(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        match self {
            Cell::Missing => None,
            Cell::Int(v) => Some(v.to_string()),
            Cell::Float(v) => Some(v.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Text(s) => Some(s.trim().to_string()),
        }
    }

    /// Cast to the numeric encoding of `dtype`
    pub fn cast(&self, dtype: FeatureType) -> std::result::Result<f64, String> {
        match dtype {
            FeatureType::Float => self.cast_float(),
            FeatureType::Int => self.cast_int(),
            FeatureType::Bool => self.cast_bool(),
        }
    }

    fn cast_float(&self) -> std::result::Result<f64, String> {
        if self.is_missing() {
            return Ok(f64::NAN);
        }
        match self {
            Cell::Int(v) => Ok(*v as f64),
            // NaN is how polars spells a missing float; infinities are not values
            Cell::Float(v) if v.is_infinite() => Err(format!("{} is not a finite float", v)),
            Cell::Float(v) => Ok(*v),
            Cell::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Cell::Text(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(format!("`{}` is not a finite float", s)),
            },
            Cell::Missing => Ok(f64::NAN),
        }
    }

    fn cast_int(&self) -> std::result::Result<f64, String> {
        match self {
            Cell::Int(v) => Ok(*v as f64),
            Cell::Float(v) if v.is_finite() && v.fract() == 0.0 => Ok(*v),
            Cell::Float(v) => Err(format!("{} is not an integer", v)),
            Cell::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if let Ok(v) = trimmed.parse::<i64>() {
                    return Ok(v as f64);
                }
                match trimmed.parse::<f64>() {
                    Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(v),
                    _ => Err(format!("`{}` is not an integer", s)),
                }
            }
            Cell::Missing => Err("missing value for integer feature".to_string()),
        }
    }

    fn cast_bool(&self) -> std::result::Result<f64, String> {
        match self {
            Cell::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Cell::Int(0) => Ok(0.0),
            Cell::Int(1) => Ok(1.0),
            Cell::Float(v) if *v == 0.0 || *v == 1.0 => Ok(*v),
            Cell::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(1.0),
                "false" | "no" | "0" => Ok(0.0),
                _ => Err(format!("`{}` is not a boolean", s)),
            },
            Cell::Missing => Err("missing value for boolean feature".to_string()),
            other => Err(format!("{:?} is not a boolean", other)),
        }
    }
}
