use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;

use crate::error::{ParseError, PatternStoreError};
use crate::frame::{Frame, JointPositions};
use crate::joint::{JointId, Position3};

use super::{Pattern, FRAME_SENTINEL};

const FIELD_COUNT: usize = 5;

/// Naive layouts seen in older logs, tried after RFC 3339.
const NAIVE_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

pub fn load_pattern(path: impl AsRef<Path>) -> Result<Pattern, PatternStoreError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let pattern = read_pattern(BufReader::new(file))?;
    info!(
        "Loaded pattern with {} frames from {}",
        pattern.len(),
        path.display()
    );
    Ok(pattern)
}

/// Parses a whole log. The first bad record fails the load; nothing partial is returned.
pub fn read_pattern<R: BufRead>(reader: R) -> Result<Pattern, PatternStoreError> {
    let mut frames = Vec::new();
    let mut joints = JointPositions::new();
    let mut timestamp: Option<DateTime<Utc>> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| match err.kind() {
            io::ErrorKind::InvalidData => {
                PatternStoreError::Parse(ParseError::InvalidEncoding { line: index + 1 })
            }
            _ => PatternStoreError::Io(err),
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line == FRAME_SENTINEL {
            seal(&mut frames, &mut joints, &mut timestamp);
            continue;
        }

        let (joint, position, captured_at) = parse_record(line, index + 1)?;
        joints.insert(joint, position);
        timestamp = Some(captured_at);
    }

    // an unterminated trailing frame still counts
    seal(&mut frames, &mut joints, &mut timestamp);

    Ok(Pattern::new(frames))
}

fn seal(
    frames: &mut Vec<Frame>,
    joints: &mut JointPositions,
    timestamp: &mut Option<DateTime<Utc>>,
) {
    if joints.is_empty() {
        return;
    }
    let captured_at = timestamp.take().unwrap_or(DateTime::<Utc>::MIN_UTC);
    frames.push(Frame::new(std::mem::take(joints), captured_at));
}

fn parse_record(line: &str, line_no: usize) -> Result<(JointId, Position3, DateTime<Utc>), ParseError> {
    let fields: Vec<&str> = line.split(';').map(str::trim).collect();
    if fields.len() != FIELD_COUNT {
        return Err(ParseError::FieldCount {
            line: line_no,
            found: fields.len(),
        });
    }

    let joint = JointId::from_str(fields[0]).map_err(|_| ParseError::UnknownJoint {
        line: line_no,
        token: fields[0].to_string(),
    })?;
    let position = Position3::new(
        parse_coordinate(fields[1], "x", line_no)?,
        parse_coordinate(fields[2], "y", line_no)?,
        parse_coordinate(fields[3], "z", line_no)?,
    );
    let captured_at = parse_timestamp(fields[4]).ok_or_else(|| ParseError::InvalidTimestamp {
        line: line_no,
        value: fields[4].to_string(),
    })?;

    Ok((joint, position, captured_at))
}

/// Accepts `0.25` and the decimal-comma form `0,25`.
fn parse_coordinate(raw: &str, field: &'static str, line_no: usize) -> Result<f32, ParseError> {
    let normalized = if raw.contains(',') && !raw.contains('.') {
        raw.replace(',', ".")
    } else {
        raw.to_string()
    };

    normalized
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber {
            line: line_no,
            field,
            value: raw.to_string(),
        })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
