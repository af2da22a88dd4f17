use anyhow::Context;
use flate2::bufread::MultiGzDecoder;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::trace;

/// Type alias for a line reader over either a plain or a gzip compressed file.
pub type TextReader = Box<dyn BufRead>;

/// Tests if the stream underlying the [BufReader] `reader` is gzipped or not by examining the
/// first 2 bytes for the magic header.  This function *requires*, but does not check, that
/// none of the stream has yet been consumed (i.e. that no read calls have yet been issued
/// to `reader`). It will fill the buffer to examine the first two bytes, but will not consume
/// them.
///
/// If the first 2 bytes could be succesfully read, this returns
/// [Ok]`(true)` if the file is a gzipped file
/// [Ok]`(false)` if it is not a gzipped file
///
/// If the first 2 bytes could not be succesfully read, then this
/// returns the relevant [std::io::Error].
pub fn is_gzipped<T: BufRead>(reader: &mut T) -> std::io::Result<bool> {
    const GZIP_MAGIC_NUMBER: [u8; 2] = [0x1f, 0x8b];

    let src = reader.fill_buf()?;
    if src.get(..2) == Some(&GZIP_MAGIC_NUMBER) {
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Creates a [TextReader] from the provided path. This function will automatically
/// determine if the provided path points to a gzip compressed or an uncompressed
/// file, and will return the appropriate reader accordingly.
///
/// It returns [Ok]`(`[TextReader]`)` on success and an [anyhow::Error] on failure.
pub fn get_reader_from_path<T: AsRef<Path>>(p: T) -> anyhow::Result<TextReader> {
    let p = p.as_ref();
    let file = File::open(p).with_context(|| format!("Could not open file {:?}", p))?;
    let mut inner_rdr = BufReader::new(file);
    if is_gzipped(&mut inner_rdr)? {
        trace!("auto-detected gzipped file {:?} - reading via decompression", p);
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(inner_rdr))))
    } else {
        Ok(Box::new(inner_rdr))
    }
}

/// Orders chromosome names the way karyotypes are usually listed: purely numeric
/// names first by value (`2` before `10`), then everything else lexically (`MT`, `X`, `Y`).
pub fn natural_chromosome_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Formats a region the way the overlap endpoint expects it, e.g. `1:1-1000000`.
pub fn region_string(chromosome: &str, start: u64, end: u64) -> String {
    format!("{}:{}-{}", chromosome, start, end)
}
