// rust/lattice-io/src/metadata/info.rs

use chrono::Utc;

use super::xml::{TagTable, TagValue};
use crate::checksum::Checksum;
use crate::error::{LatticeError, Result};
use crate::layout::LatticeLayout;
use crate::volume::VolumeFormat;

pub const FILE_VERSION: &str = "1.1";
pub const RECORD_VERSION: &str = "1.1";
pub const CHECKSUM_VERSION: &str = "1.0";

fn str_of(table: &TagTable, name: &str) -> String {
    match table.get(name) {
        Some(TagValue::Str(s)) => s.clone(),
        _ => String::new(),
    }
}

fn int_of(table: &TagTable, name: &str) -> i64 {
    match table.get(name) {
        Some(TagValue::Int(i)) => *i,
        _ => 0,
    }
}

fn count_of(table: &TagTable, name: &str, error: fn(String) -> LatticeError) -> Result<usize> {
    let value = int_of(table, name);
    usize::try_from(value).map_err(|_| error(format!("<{name}> is negative: {value}")))
}

/// Private file metadata: lattice shape and volume format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub version: String,
    pub spacetime: usize,
    pub dims: Vec<usize>,
    pub volfmt: VolumeFormat,
}

impl FileInfo {
    pub fn new(dims: &[usize], volfmt: VolumeFormat) -> Self {
        Self {
            version: FILE_VERSION.to_string(),
            spacetime: dims.len(),
            dims: dims.to_vec(),
            volfmt,
        }
    }

    pub fn volume(&self) -> u64 {
        self.dims.iter().map(|&d| d as u64).product()
    }

    fn table() -> TagTable {
        TagTable::new("scidacFile", |m| LatticeError::bad_file_info(m))
            .with("version", TagValue::Str(String::new()))
            .with("spacetime", TagValue::Int(0))
            .with("dims", TagValue::IntList(Vec::new()))
            .with("volfmt", TagValue::Int(0))
    }

    pub fn to_xml(&self) -> Result<String> {
        TagTable::new("scidacFile", |m| LatticeError::bad_file_info(m))
            .with("version", TagValue::Str(self.version.clone()))
            .with("spacetime", TagValue::Int(self.spacetime as i64))
            .with(
                "dims",
                TagValue::IntList(self.dims.iter().map(|&d| d as i64).collect()),
            )
            .with("volfmt", TagValue::Int(self.volfmt.code() as i64))
            .encode()
    }

    pub fn from_xml(text: &str) -> Result<Self> {
        let mut table = Self::table();
        table.decode(text)?;

        let err = |m: String| LatticeError::bad_file_info(m);
        let spacetime = count_of(&table, "spacetime", err)?;
        let dims = match table.get("dims") {
            Some(TagValue::IntList(list)) => list
                .iter()
                .map(|&d| usize::try_from(d).ok().filter(|&d| d > 0))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| LatticeError::bad_file_info(format!("bad dims {list:?}")))?,
            _ => Vec::new(),
        };
        if dims.len() != spacetime {
            return Err(LatticeError::bad_file_info(format!(
                "spacetime {spacetime} but {} dims",
                dims.len()
            )));
        }
        let code = int_of(&table, "volfmt");
        let code = i32::try_from(code).map_err(|_| LatticeError::BadVolumeFormat { code: -1 })?;

        Ok(Self {
            version: str_of(&table, "version"),
            spacetime,
            dims,
            volfmt: VolumeFormat::from_code(code)?,
        })
    }

    /// Checks the file's shape against the layout it is read into.
    pub fn validate(&self, layout: &dyn LatticeLayout) -> Result<()> {
        if self.spacetime != layout.dims().len() {
            return Err(LatticeError::bad_file_info(format!(
                "file is {}-dimensional, layout is {}-dimensional",
                self.spacetime,
                layout.dims().len()
            )));
        }
        if self.dims != layout.dims() {
            return Err(LatticeError::bad_file_info(format!(
                "file dims {:?} differ from layout dims {:?}",
                self.dims,
                layout.dims()
            )));
        }
        Ok(())
    }
}

/// Private record metadata: what each site's datum is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    pub version: String,
    pub date: String,
    /// One datum for the whole lattice rather than one per site.
    pub globaldata: bool,
    pub datatype: String,
    /// `F` or `D` for single or double precision reals.
    pub precision: char,
    pub colors: usize,
    pub spins: usize,
    /// Bytes per element.
    pub typesize: usize,
    /// Elements per datum.
    pub datacount: usize,
}

impl RecordInfo {
    pub fn new(
        globaldata: bool,
        datatype: &str,
        precision: char,
        colors: usize,
        spins: usize,
        typesize: usize,
        datacount: usize,
    ) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            date: Utc::now().format("%a %b %e %H:%M:%S %Y UTC").to_string(),
            globaldata,
            datatype: datatype.to_string(),
            precision,
            colors,
            spins,
            typesize,
            datacount,
        }
    }

    /// A per-site field record.
    pub fn field(datatype: &str, precision: char, typesize: usize, datacount: usize) -> Self {
        Self::new(false, datatype, precision, 0, 0, typesize, datacount)
    }

    /// A record holding a single datum.
    pub fn global(datatype: &str, precision: char, typesize: usize, datacount: usize) -> Self {
        Self::new(true, datatype, precision, 0, 0, typesize, datacount)
    }

    /// Bytes per site.
    pub fn datum_size(&self) -> Result<usize> {
        self.typesize.checked_mul(self.datacount).ok_or_else(|| {
            LatticeError::bad_record_info(format!(
                "datum of {} elements of {} bytes overflows",
                self.datacount, self.typesize
            ))
        })
    }

    /// Word length that byte-order conversion works on.
    pub fn word_size(&self) -> usize {
        match self.precision {
            'F' => 4,
            'D' => 8,
            _ => self.typesize,
        }
    }

    fn table() -> TagTable {
        TagTable::new("scidacRecord", |m| LatticeError::bad_record_info(m))
            .with("version", TagValue::Str(String::new()))
            .with("date", TagValue::Str(String::new()))
            .with("globaldata", TagValue::Int(0))
            .with("datatype", TagValue::Str(String::new()))
            .with("precision", TagValue::Char(' '))
            .with("colors", TagValue::Int(0))
            .with("spins", TagValue::Int(0))
            .with("typesize", TagValue::Int(0))
            .with("datacount", TagValue::Int(0))
    }

    pub fn to_xml(&self) -> Result<String> {
        TagTable::new("scidacRecord", |m| LatticeError::bad_record_info(m))
            .with("version", TagValue::Str(self.version.clone()))
            .with("date", TagValue::Str(self.date.clone()))
            .with("globaldata", TagValue::Int(self.globaldata as i64))
            .with("datatype", TagValue::Str(self.datatype.clone()))
            .with("precision", TagValue::Char(self.precision))
            .with("colors", TagValue::Int(self.colors as i64))
            .with("spins", TagValue::Int(self.spins as i64))
            .with("typesize", TagValue::Int(self.typesize as i64))
            .with("datacount", TagValue::Int(self.datacount as i64))
            .encode()
    }

    pub fn from_xml(text: &str) -> Result<Self> {
        let mut table = Self::table();
        table.decode(text)?;

        let err = |m: String| LatticeError::bad_record_info(m);
        let globaldata = match int_of(&table, "globaldata") {
            0 => false,
            1 => true,
            other => {
                return Err(LatticeError::bad_record_info(format!(
                    "globaldata must be 0 or 1, found {other}"
                )))
            }
        };
        let precision = match table.get("precision") {
            Some(TagValue::Char(c)) => *c,
            _ => ' ',
        };

        Ok(Self {
            version: str_of(&table, "version"),
            date: str_of(&table, "date"),
            globaldata,
            datatype: str_of(&table, "datatype"),
            precision,
            colors: count_of(&table, "colors", err)?,
            spins: count_of(&table, "spins", err)?,
            typesize: count_of(&table, "typesize", err)?,
            datacount: count_of(&table, "datacount", err)?,
        })
    }

    /// Checks a record read from a file against what the caller expects.
    /// Version and date are not compared.
    pub fn compare(&self, expected: &RecordInfo) -> Result<()> {
        let mut diffs = Vec::new();
        if self.globaldata != expected.globaldata {
            diffs.push(format!(
                "globaldata {} != {}",
                self.globaldata, expected.globaldata
            ));
        }
        if self.datatype != expected.datatype {
            diffs.push(format!("datatype '{}' != '{}'", self.datatype, expected.datatype));
        }
        if self.precision != expected.precision {
            diffs.push(format!(
                "precision {} != {}",
                self.precision, expected.precision
            ));
        }
        if self.colors != expected.colors {
            diffs.push(format!("colors {} != {}", self.colors, expected.colors));
        }
        if self.spins != expected.spins {
            diffs.push(format!("spins {} != {}", self.spins, expected.spins));
        }
        if self.typesize != expected.typesize {
            diffs.push(format!("typesize {} != {}", self.typesize, expected.typesize));
        }
        if self.datacount != expected.datacount {
            diffs.push(format!(
                "datacount {} != {}",
                self.datacount, expected.datacount
            ));
        }

        if diffs.is_empty() {
            Ok(())
        } else {
            Err(LatticeError::bad_record_info(diffs.join(", ")))
        }
    }
}

/// Checksum record contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumInfo {
    pub version: String,
    pub suma: u32,
    pub sumb: u32,
}

impl ChecksumInfo {
    pub fn to_xml(&self) -> Result<String> {
        TagTable::new("scidacChecksum", checksum_error)
            .with("version", TagValue::Str(self.version.clone()))
            .with("suma", TagValue::Hex32(self.suma))
            .with("sumb", TagValue::Hex32(self.sumb))
            .encode()
    }

    pub fn from_xml(text: &str) -> Result<Self> {
        let mut table = TagTable::new("scidacChecksum", checksum_error)
            .with("version", TagValue::Str(String::new()))
            .with("suma", TagValue::Hex32(0))
            .with("sumb", TagValue::Hex32(0));
        table.decode(text)?;

        let hex = |name| match table.get(name) {
            Some(TagValue::Hex32(h)) => *h,
            _ => 0,
        };
        Ok(Self {
            version: str_of(&table, "version"),
            suma: hex("suma"),
            sumb: hex("sumb"),
        })
    }

    /// Compares the stored pair with a freshly computed one.
    pub fn verify(&self, computed: &Checksum) -> Result<()> {
        let stored = (self.suma, self.sumb);
        if stored != computed.as_pair() {
            return Err(LatticeError::ChecksumMismatch {
                expected: stored,
                computed: computed.as_pair(),
            });
        }
        Ok(())
    }
}

impl From<Checksum> for ChecksumInfo {
    fn from(checksum: Checksum) -> Self {
        Self {
            version: CHECKSUM_VERSION.to_string(),
            suma: checksum.suma,
            sumb: checksum.sumb,
        }
    }
}

fn checksum_error(message: String) -> LatticeError {
    LatticeError::bad_record_info(format!("checksum record: {message}"))
}
