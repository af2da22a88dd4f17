use crate::igfinder_utils::get_reader_from_path;
use anyhow::{bail, Context};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{info, warn};

/// 0-based index of the column holding gene ids in the exception file.
pub const UTR_ID_COLUMN: usize = 2;

/// Gene ids known to carry an intron in their UTR. A structurally intronless gene
/// listed here is not reported as intronless.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtrExceptionSet {
    ids: HashSet<String>,
}

impl UtrExceptionSet {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<T: Into<String>> FromIterator<T> for UtrExceptionSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        UtrExceptionSet {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Loads the UTR exception set from a headerless, tab-separated file, plain or gzipped.
/// Gene ids are taken from the third column; missing values are dropped and duplicates
/// collapse. An empty file gives an empty set.
///
/// ### Errors
///
/// The file must exist and be readable, and every non-empty file must have at least
/// three columns. These are configuration errors and are meant to stop a run before
/// any request is sent.
pub fn load_utr_exceptions<T: AsRef<Path>>(path: T) -> anyhow::Result<UtrExceptionSet> {
    let path = path.as_ref();
    if !path.is_file() {
        bail!("The UTR exception file {:?} does not exist.", path);
    }

    let mut buf = Vec::new();
    get_reader_from_path(path)?
        .read_to_end(&mut buf)
        .with_context(|| format!("Could not read the UTR exception file {:?}", path))?;

    if buf.iter().all(|b| b.is_ascii_whitespace()) {
        warn!("The UTR exception file {:?} is empty; no gene will be excepted.", path);
        return Ok(UtrExceptionSet::default());
    }

    // read every column as a string, ids must not be coerced
    let df = CsvReader::new(Cursor::new(buf))
        .has_header(false)
        .with_separator(b'\t')
        .infer_schema(Some(0))
        .finish()
        .with_context(|| format!("Could not parse the UTR exception file {:?}", path))?;

    let ids_col = match df.get_columns().get(UTR_ID_COLUMN) {
        Some(c) => c.cast(&DataType::String)?,
        None => bail!(
            "The UTR exception file {:?} has {} columns; gene ids are expected in column {}.",
            path,
            df.width(),
            UTR_ID_COLUMN + 1
        ),
    };

    let set: UtrExceptionSet = ids_col
        .str()?
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    info!(
        "Loaded {} UTR exception genes from {} rows of {:?}",
        set.len(),
        df.height(),
        path
    );
    Ok(set)
}
