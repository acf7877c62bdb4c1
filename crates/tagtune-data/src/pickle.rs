//! Two-dimensional numeric arrays from pickle files.
//!
//! Accepts either nested Python lists (`[[f, ...], ...]`) or a pickled
//! `numpy.ndarray`. numpy arrays pickle as a `_reconstruct` call followed by
//! a `BUILD` whose state is `(version, shape, dtype, fortran_order, raw)`;
//! with unresolved globals replaced, serde-pickle hands back that state tuple.

use crate::error::{Error, Result};
use serde_pickle::{DeOptions, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

type DecodeResult<T> = std::result::Result<T, String>;

/// Read a pickle file as rows of `f32`.
///
/// Rows are returned as stored; callers check raggedness and width.
pub(crate) fn read_rows(path: &Path) -> Result<Vec<Vec<f32>>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let options = DeOptions::new().replace_unresolved_globals();

    let value = serde_pickle::value_from_reader(BufReader::new(file), options).map_err(|e| match e {
        serde_pickle::Error::Io(source) => Error::io(path, source),
        other => decode_error(path, other.to_string()),
    })?;

    rows_from_value(value).map_err(|message| decode_error(path, message))
}

fn decode_error(path: &Path, message: String) -> Error {
    Error::Decode {
        path: path.to_path_buf(),
        message,
    }
}

fn rows_from_value(value: Value) -> DecodeResult<Vec<Vec<f32>>> {
    match value {
        Value::Tuple(state) if is_ndarray_state(&state) => ndarray_rows(state),
        Value::List(rows) | Value::Tuple(rows) => rows
            .into_iter()
            .map(|row| match row {
                Value::List(items) | Value::Tuple(items) => {
                    items.iter().map(number).collect::<DecodeResult<Vec<f32>>>()
                }
                other => Err(format!("expected a row of numbers, found {}", kind(&other))),
            })
            .collect(),
        other => Err(format!("expected a 2-D array, found {}", kind(&other))),
    }
}

fn is_ndarray_state(state: &[Value]) -> bool {
    matches!(
        state,
        [Value::I64(_), Value::Tuple(_), _, Value::Bool(_), Value::Bytes(_) | Value::List(_)]
    )
}

fn ndarray_rows(state: Vec<Value>) -> DecodeResult<Vec<Vec<f32>>> {
    let [_, shape, dtype, fortran, raw]: [Value; 5] = state
        .try_into()
        .map_err(|_| "malformed ndarray state".to_string())?;

    let [rows, cols] = match shape {
        Value::Tuple(dims) => match dims.as_slice() {
            [Value::I64(r), Value::I64(c)] if *r >= 0 && *c >= 0 => [*r as usize, *c as usize],
            _ => return Err(format!("expected a 2-D ndarray, found shape {:?}", dims)),
        },
        other => return Err(format!("ndarray shape is {}", kind(&other))),
    };
    let count = rows * cols;

    let flat = match raw {
        Value::Bytes(bytes) => decode_buffer(&bytes, count, big_endian(&dtype))?,
        // dtype=object arrays carry their elements as a list
        Value::List(items) => items.iter().map(number).collect::<DecodeResult<_>>()?,
        other => return Err(format!("ndarray data is {}", kind(&other))),
    };
    if flat.len() != count {
        return Err(format!(
            "ndarray holds {} values, shape [{}, {}] needs {}",
            flat.len(),
            rows,
            cols,
            count
        ));
    }

    let column_major = matches!(fortran, Value::Bool(true));
    Ok((0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| {
                    if column_major {
                        flat[c * rows + r]
                    } else {
                        flat[r * cols + c]
                    }
                })
                .collect()
        })
        .collect())
}

/// Byte order from the dtype's `__setstate__` tuple, `(3, '<', ...)`.
fn big_endian(dtype: &Value) -> bool {
    match dtype {
        Value::Tuple(fields) => matches!(fields.get(1), Some(Value::String(order)) if order == ">"),
        _ => false,
    }
}

/// Decode a raw numpy buffer of `count` elements.
///
/// The dtype name does not survive decoding, so the element kind is read
/// from the buffer itself: 1-byte items are `bool`/`uint8`, 4- and 8-byte
/// items are floats unless every non-zero word is a float subnormal, which
/// is how small non-negative integers look.
fn decode_buffer(bytes: &[u8], count: usize, big_endian: bool) -> DecodeResult<Vec<f32>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if bytes.len() % count != 0 {
        return Err(format!(
            "ndarray buffer of {} bytes does not split into {} items",
            bytes.len(),
            count
        ));
    }

    match bytes.len() / count {
        1 => Ok(bytes.iter().map(|&b| f32::from(b)).collect()),
        4 => {
            let words: Vec<u32> = bytes
                .chunks_exact(4)
                .map(|chunk| u32::from_le_bytes(word(chunk, big_endian)))
                .collect();
            if words.iter().all(|&w| f32::from_bits(w).is_subnormal() || w == 0) {
                Ok(words.iter().map(|&w| w as i32 as f32).collect())
            } else {
                Ok(words.iter().map(|&w| f32::from_bits(w)).collect())
            }
        }
        8 => {
            let words: Vec<u64> = bytes
                .chunks_exact(8)
                .map(|chunk| u64::from_le_bytes(word(chunk, big_endian)))
                .collect();
            if words.iter().all(|&w| f64::from_bits(w).is_subnormal() || w == 0) {
                Ok(words.iter().map(|&w| w as i64 as f32).collect())
            } else {
                Ok(words.iter().map(|&w| f64::from_bits(w) as f32).collect())
            }
        }
        size => Err(format!("unsupported ndarray item size {}", size)),
    }
}

fn word<const N: usize>(chunk: &[u8], big_endian: bool) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(chunk);
    if big_endian {
        bytes.reverse();
    }
    bytes
}

fn number(value: &Value) -> DecodeResult<f32> {
    match value {
        Value::F64(v) => Ok(*v as f32),
        Value::I64(v) => Ok(*v as f32),
        Value::Bool(v) => Ok(f32::from(u8::from(*v))),
        other => Err(format!("expected a number, found {}", kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::None => "None",
        Value::Bool(_) => "bool",
        Value::I64(_) | Value::Int(_) => "int",
        Value::F64(_) => "float",
        Value::Bytes(_) => "bytes",
        Value::String(_) => "str",
        Value::List(_) => "list",
        Value::Tuple(_) => "tuple",
        Value::Set(_) | Value::FrozenSet(_) => "set",
        Value::Dict(_) => "dict",
    }
}
