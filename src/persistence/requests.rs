//! Typed route inputs decoded from a normalized payload.
//!
//! Decoding is strict about types (an id must be an integer, not `"3"` or
//! `3.0`) and names the offending field in every validation message.
//! Unknown keys are ignored; `null` counts as absent.

use chrono::NaiveDateTime;

use crate::payload::{Mapping, Payload};
use crate::persistence::store::{
    DataRunType, DataRunTypeFilter, NewLog, NewOutcome, NewRun, OutcomeFilter, OutcomeValue,
    RunId,
};
use crate::protocol::ErrorDetail;

/// Read-only view over a request mapping with typed accessors.
pub struct Fields<'a> {
    map: &'a Mapping,
}

impl<'a> Fields<'a> {
    pub fn new(map: &'a Mapping) -> Self {
        Self { map }
    }

    fn present(&self, key: &str) -> Option<&'a Payload> {
        match self.map.get(key) {
            None | Some(Payload::Null) => None,
            Some(value) => Some(value),
        }
    }

    pub fn integer(&self, key: &str) -> Result<i64, ErrorDetail> {
        self.opt_integer(key)?.ok_or_else(|| missing(key))
    }

    pub fn opt_integer(&self, key: &str) -> Result<Option<i64>, ErrorDetail> {
        match self.present(key) {
            None => Ok(None),
            Some(Payload::Integer(i)) => Ok(Some(*i)),
            Some(other) => Err(wrong_type(key, "an integer", other)),
        }
    }

    pub fn number(&self, key: &str) -> Result<Number, ErrorDetail> {
        match self.present(key) {
            None => Err(missing(key)),
            Some(Payload::Integer(i)) => Ok(Number::Integer(*i)),
            Some(Payload::Float(f)) => Ok(Number::Float(*f)),
            Some(other) => Err(wrong_type(key, "a number", other)),
        }
    }

    pub fn opt_float(&self, key: &str) -> Result<Option<f64>, ErrorDetail> {
        match self.present(key) {
            None => Ok(None),
            Some(Payload::Integer(i)) => Ok(Some(*i as f64)),
            Some(Payload::Float(f)) => Ok(Some(*f)),
            Some(other) => Err(wrong_type(key, "a number", other)),
        }
    }

    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>, ErrorDetail> {
        match self.present(key) {
            None => Ok(None),
            Some(Payload::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(wrong_type(key, "a boolean", other)),
        }
    }

    pub fn string(&self, key: &str) -> Result<String, ErrorDetail> {
        self.opt_string(key)?.ok_or_else(|| missing(key))
    }

    pub fn opt_string(&self, key: &str) -> Result<Option<String>, ErrorDetail> {
        match self.present(key) {
            None => Ok(None),
            Some(Payload::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    /// `YYYY-MM-DDTHH:MM:SS[.fff]` or the same with a space separator.
    pub fn opt_timestamp(&self, key: &str) -> Result<Option<NaiveDateTime>, ErrorDetail> {
        let Some(raw) = self.opt_string(key)? else {
            return Ok(None);
        };
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
            .map(Some)
            .ok_or_else(|| {
                ErrorDetail::validation(format!(
                    "field `{}` must be a timestamp like 2024-01-01T00:00:00",
                    key
                ))
            })
    }

    /// Any payload, stored as JSON.
    pub fn opt_json(&self, key: &str) -> Option<serde_json::Value> {
        self.present(key).cloned().map(serde_json::Value::from)
    }
}

fn missing(key: &str) -> ErrorDetail {
    ErrorDetail::validation(format!("missing required field `{}`", key))
}

fn wrong_type(key: &str, expected: &str, found: &Payload) -> ErrorDetail {
    ErrorDetail::validation(format!(
        "field `{}` must be {}, found {}",
        key,
        expected,
        found.type_name()
    ))
}

/// A numeric operand that keeps the integer/float distinction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Integer + integer stays an integer (overflow is rejected); anything
    /// involving a float is a float.
    pub fn checked_add(self, other: Number) -> Result<Number, ErrorDetail> {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a
                .checked_add(b)
                .map(Number::Integer)
                .ok_or_else(|| ErrorDetail::validation("sum overflows a 64-bit integer")),
            (a, b) => {
                let sum = a.as_f64() + b.as_f64();
                if sum.is_finite() {
                    Ok(Number::Float(sum))
                } else {
                    Err(ErrorDetail::validation("sum is not a finite number"))
                }
            }
        }
    }
}

impl From<Number> for Payload {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => Payload::Integer(i),
            Number::Float(f) => Payload::Float(f),
        }
    }
}

/// Decode a typed input from a request mapping.
pub trait FromFields: Sized {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail>;
}

pub fn decode<T: FromFields>(payload: &Mapping) -> Result<T, ErrorDetail> {
    T::from_fields(&Fields::new(payload))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SumInput {
    pub a: Number,
    pub b: Number,
}

impl FromFields for SumInput {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(Self {
            a: fields.number("a")?,
            b: fields.number("b")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SumAndSaveInput {
    pub arg1: Number,
    pub arg2: Number,
    pub run: NewRun,
}

impl FromFields for SumAndSaveInput {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(Self {
            arg1: fields.number("arg1")?,
            arg2: fields.number("arg2")?,
            run: NewRun {
                id_script: fields.opt_integer("id_script")?.unwrap_or(0),
                id_run_father: fields.opt_integer("id_run_father")?,
            },
        })
    }
}

/// Input naming a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRef {
    pub id_run: RunId,
}

impl FromFields for RunRef {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(Self {
            id_run: fields.integer("id_run")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRunsQuery {
    pub father_run_id: RunId,
}

impl FromFields for ChildRunsQuery {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(Self {
            father_run_id: fields.integer("father_run_id")?,
        })
    }
}

/// Outcomes of one run with an exact category and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryTypeQuery {
    pub id_run: RunId,
    pub id_category: i64,
    pub id_type: i64,
}

impl FromFields for CategoryTypeQuery {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(Self {
            id_run: fields.integer("id_run")?,
            id_category: fields.integer("id_category")?,
            id_type: fields.integer("id_type")?,
        })
    }
}

impl From<CategoryTypeQuery> for OutcomeFilter {
    fn from(q: CategoryTypeQuery) -> Self {
        OutcomeFilter {
            id_run: Some(q.id_run),
            id_category: Some(q.id_category),
            id_type: Some(q.id_type),
            ..OutcomeFilter::default()
        }
    }
}

impl FromFields for NewRun {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(NewRun {
            id_script: fields.integer("id_script")?,
            id_run_father: fields.opt_integer("id_run_father")?,
        })
    }
}

impl FromFields for NewLog {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(NewLog {
            id_run: fields.integer("id_run")?,
            log: fields.string("log")?,
            debug: fields.opt_bool("debug")?.unwrap_or(false),
            warning: fields.opt_bool("warning")?.unwrap_or(false),
            error: fields.opt_bool("error")?.unwrap_or(false),
        })
    }
}

impl FromFields for NewOutcome {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(NewOutcome {
            id_run: fields.integer("id_run")?,
            id_category: fields.integer("id_category")?,
            id_type: fields.integer("id_type")?,
            value: OutcomeValue {
                v_integer: fields.opt_integer("v_integer")?,
                v_floatpoint: fields.opt_float("v_floatpoint")?,
                v_string: fields.opt_string("v_string")?,
                v_jsonb: fields.opt_json("v_jsonb"),
                v_boolean: fields.opt_bool("v_boolean")?,
                v_timestamp: fields.opt_timestamp("v_timestamp")?,
            },
        })
    }
}

impl FromFields for OutcomeFilter {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(OutcomeFilter {
            id_run: fields.opt_integer("id_run")?,
            id_category: fields.opt_integer("id_category")?,
            id_type: fields.opt_integer("id_type")?,
            v_integer: fields.opt_integer("v_integer")?,
            v_floatpoint: fields.opt_float("v_floatpoint")?,
            v_string: fields.opt_string("v_string")?,
            v_boolean: fields.opt_bool("v_boolean")?,
            v_timestamp: fields.opt_timestamp("v_timestamp")?,
        })
    }
}

impl FromFields for DataRunType {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(DataRunType {
            id_category: fields.integer("id_category")?,
            id_type: fields.integer("id_type")?,
            category_name: fields.string("category_name")?,
            type_name: fields.string("type_name")?,
        })
    }
}

impl FromFields for DataRunTypeFilter {
    fn from_fields(fields: &Fields<'_>) -> Result<Self, ErrorDetail> {
        Ok(DataRunTypeFilter {
            id_category: fields.opt_integer("id_category")?,
            id_type: fields.opt_integer("id_type")?,
            category_name: fields.opt_string("category_name")?,
            type_name: fields.opt_string("type_name")?,
        })
    }
}
