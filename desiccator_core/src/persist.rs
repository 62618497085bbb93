//! Text format of the persisted load cell calibration file.
//!
//! One record per populated slot, in array order. Each record is
//! `data_pin,clock_pin,gain,channel,id,slope,intercept` followed by `|`.
//! Missing coefficients are written as `None`. No field can contain `,` or `|`.
//!
//! ```text
//! 5,6,128,A,1L,0.002380952380952381,-2006.9357142857143|13,19,128,A,1R,None,None|
//! ```

use std::path::Path;
use std::{fs, io::Write};

use crate::error::{CoreError, Result};
use crate::sensor::{CellId, Channel, HardwareBinding, Side};

pub const RECORD_DELIMITER: char = '|';
pub const FIELD_DELIMITER: char = ',';
pub const NONE_TOKEN: &str = "None";
const FIELDS_PER_RECORD: usize = 7;

/// Everything persisted about one load cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedCell {
    pub id: CellId,
    pub binding: HardwareBinding,
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
}

fn encode_coefficient(out: &mut String, v: Option<f64>) {
    match v {
        // Debug formatting is the shortest text that parses back to the same f64.
        Some(x) => out.push_str(&format!("{x:?}")),
        None => out.push_str(NONE_TOKEN),
    }
}

/// Append one record, including its trailing delimiter.
pub fn encode_record(out: &mut String, cell: &PersistedCell) {
    let b = &cell.binding;
    out.push_str(&format!(
        "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}",
        b.data_pin,
        b.clock_pin,
        b.gain,
        b.channel.as_char(),
        cell.id
    ));
    encode_coefficient(out, cell.slope);
    out.push(FIELD_DELIMITER);
    encode_coefficient(out, cell.intercept);
    out.push(RECORD_DELIMITER);
}

pub fn encode<'a>(cells: impl IntoIterator<Item = &'a PersistedCell>) -> String {
    let mut out = String::new();
    for cell in cells {
        encode_record(&mut out, cell);
    }
    out
}

fn corrupt(record: usize, msg: impl std::fmt::Display) -> CoreError {
    CoreError::CorruptPersistedState(format!("record {record}: {msg}"))
}

fn parse_u8(record: usize, name: &str, field: &str) -> Result<u8> {
    field
        .parse::<u8>()
        .map_err(|_| corrupt(record, format!("{name} {field:?} is not a number in 0..=255")))
}

fn parse_coefficient(record: usize, name: &str, field: &str) -> Result<Option<f64>> {
    if field == NONE_TOKEN {
        return Ok(None);
    }
    match field.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(corrupt(record, format!("{name} {field:?} is neither a number nor {NONE_TOKEN}"))),
    }
}

fn parse_id(record: usize, field: &str) -> Result<CellId> {
    let mut chars = field.chars();
    let (Some(c), Some(s), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(corrupt(record, format!("id {field:?} must be two characters")));
    };
    let chamber = c
        .to_digit(10)
        .filter(|d| (1..=4).contains(d))
        .ok_or_else(|| corrupt(record, format!("chamber {c:?} outside 1..=4")))?;
    let side = match s {
        'L' => Side::L,
        'R' => Side::R,
        other => return Err(corrupt(record, format!("side {other:?} is not L or R"))),
    };
    Ok(CellId::new(chamber as u8, side))
}

fn decode_record(record: usize, text: &str) -> Result<PersistedCell> {
    let fields: Vec<&str> = text.split(FIELD_DELIMITER).collect();
    if fields.len() != FIELDS_PER_RECORD {
        return Err(corrupt(
            record,
            format!("expected {FIELDS_PER_RECORD} fields, got {}", fields.len()),
        ));
    }
    let channel = match fields[3] {
        "A" => Channel::A,
        "B" => Channel::B,
        other => return Err(corrupt(record, format!("channel {other:?} is not A or B"))),
    };
    Ok(PersistedCell {
        binding: HardwareBinding {
            data_pin: parse_u8(record, "data_pin", fields[0])?,
            clock_pin: parse_u8(record, "clock_pin", fields[1])?,
            gain: parse_u8(record, "gain", fields[2])?,
            channel,
        },
        id: parse_id(record, fields[4])?,
        slope: parse_coefficient(record, "slope", fields[5])?,
        intercept: parse_coefficient(record, "intercept", fields[6])?,
    })
}

/// Parse a whole file. All-or-nothing: any malformed record, or two records
/// for the same cell, rejects the file.
pub fn decode(data: &str) -> Result<Vec<PersistedCell>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let body = data.strip_suffix(RECORD_DELIMITER).ok_or_else(|| {
        CoreError::CorruptPersistedState("missing trailing record delimiter".into())
    })?;

    let mut cells: Vec<PersistedCell> = Vec::new();
    for (i, text) in body.split(RECORD_DELIMITER).enumerate() {
        let cell = decode_record(i, text)?;
        if cells.iter().any(|c| c.id == cell.id) {
            return Err(corrupt(i, format!("duplicate cell {}", cell.id)));
        }
        cells.push(cell);
    }
    Ok(cells)
}

/// Write via a sibling temp file, fsync, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(id: &str, slope: Option<f64>, intercept: Option<f64>) -> PersistedCell {
        PersistedCell {
            id: id.parse().unwrap(),
            binding: HardwareBinding::new(5, 6),
            slope,
            intercept,
        }
    }

    #[test]
    fn encodes_pipe_delimited_records() {
        let s = encode(&[cell("1L", Some(10.0), Some(-0.5)), cell("2R", None, None)]);
        assert_eq!(s, "5,6,128,A,1L,10.0,-0.5|5,6,128,A,2R,None,None|");
    }

    #[test]
    fn coefficients_round_trip_bit_exact() {
        let cells = vec![
            cell("1L", Some(0.1 + 0.2), Some(-2006.9357142857143)),
            cell("4R", Some(1e-7), None),
        ];
        let back = decode(&encode(&cells)).unwrap();
        assert_eq!(back, cells);
        assert_eq!(back[0].slope.unwrap().to_bits(), (0.1f64 + 0.2).to_bits());
    }

    #[test]
    fn empty_file_is_empty_array() {
        assert_eq!(decode("").unwrap(), vec![]);
        assert_eq!(decode("  \n").unwrap(), vec![]);
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        let back = decode("5,6,128,A,1L,None,None|\n").unwrap();
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn rejects_malformed_records() {
        let cases = [
            "5,6,128,A,1L,None,None",           // no terminator
            "5,6,128,A,1L,None|",               // too few fields
            "5,6,128,A,1L,None,None,extra|",    // too many fields
            "x,6,128,A,1L,None,None|",          // non-numeric pin
            "5,6,big,A,1L,None,None|",          // non-numeric gain
            "5,6,128,C,1L,None,None|",          // unknown channel
            "5,6,128,A,5L,None,None|",          // chamber out of range
            "5,6,128,A,1X,None,None|",          // bad side
            "5,6,128,A,1,None,None|",           // short id
            "5,6,128,A,1L,abc,None|",           // bad slope
            "5,6,128,A,1L,NaN,None|",           // non-finite slope
            "5,6,128,A,1L,None,None||",         // empty record
            "5,6,128,A,1L,None,None|5,6,128,A,1L,None,None|", // duplicate
        ];
        for data in cases {
            assert!(
                matches!(decode(data), Err(CoreError::CorruptPersistedState(_))),
                "{data:?} should be rejected"
            );
        }
    }
}
