//! In-memory NOTAM table and its flat-file loader.
//!
//! The database is one NOTAM per line:
//!
//! ```text
//! ID|FIR|LOCATION|START|END|AIRSPACE|LAT|LON|RADIUS|DESCRIPTION
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. The description is
//! the remainder of the line and may itself contain `|`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use notam_proto::{AirspaceInfo, Coordinate, Notam};
use tracing::{debug, info, warn};

use crate::error::{AdvisoryError, AdvisoryResult};

/// Number of `|`-separated fields in a record.
const FIELD_COUNT: usize = 10;

/// Parse one database line.
///
/// Returns `None` for comments, blank lines, lines with too few fields, and
/// lines whose coordinate or radius is not numeric.
#[must_use]
pub fn parse_notam_line(line: &str) -> Option<Notam> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = line.splitn(FIELD_COUNT, '|').collect();
    if fields.len() < FIELD_COUNT {
        return None;
    }

    let lat = fields[6].trim().parse::<f64>().ok()?;
    let lon = fields[7].trim().parse::<f64>().ok()?;
    let radius = fields[8].trim().parse::<f64>().ok()?;

    Some(Notam {
        identifier: fields[0].to_string(),
        fir: fields[1].to_string(),
        location: fields[2].to_string(),
        start_time: fields[3].to_string(),
        end_time: fields[4].to_string(),
        affected_airspace: AirspaceInfo::new(fields[5], Coordinate::new(lat, lon), radius),
        description: fields[9].to_string(),
    })
}

/// Read-only table of NOTAM records.
#[derive(Debug, Clone, Default)]
pub struct NotamIndex {
    notams: Vec<Notam>,
}

impl NotamIndex {
    /// Create an index from records.
    #[must_use]
    pub fn new(notams: Vec<Notam>) -> Self {
        Self { notams }
    }

    /// Read records from any buffered source, skipping malformed lines.
    pub fn from_reader<R: BufRead>(reader: R) -> AdvisoryResult<Self> {
        let mut notams = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_notam_line(&line) {
                Some(notam) => notams.push(notam),
                None => debug!(line = number + 1, "Skipping malformed NOTAM record"),
            }
        }
        Ok(Self { notams })
    }

    /// Load the database file.
    pub fn load_from_file(path: impl AsRef<Path>) -> AdvisoryResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| AdvisoryError::NotamFile {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), count = index.len(), "Loaded NOTAM database");
        Ok(index)
    }

    /// Load the database file, falling back to an empty index when it cannot
    /// be read.
    #[must_use]
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load_from_file(path) {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "NOTAM database unavailable, starting with no NOTAMs");
                Self::default()
            }
        }
    }

    /// All records, in load order.
    #[must_use]
    pub fn notams(&self) -> &[Notam] {
        &self.notams
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notams.len()
    }

    /// Whether the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notams.is_empty()
    }
}

impl FromIterator<Notam> for NotamIndex {
    fn from_iter<I: IntoIterator<Item = Notam>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
