use crate::error::{ExportError, Result};
use crate::model::FlatRecord;
use std::borrow::Cow;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const HEADER: [&str; 5] = ["Chat", "Date", "Time", "Name", "Message"];

/// Quote a field if it contains the delimiter, a quote or a line break.
/// Embedded quotes are doubled.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn write_row<W: Write>(writer: &mut W, fields: [&str; 5]) -> io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        writer.write_all(escape_field(field).as_bytes())?;
    }
    writer.write_all(b"\n")
}

/// Write the header row followed by one row per record, in order.
pub fn write_csv<W: Write>(writer: &mut W, records: &[FlatRecord]) -> io::Result<()> {
    write_row(writer, HEADER)?;
    for r in records {
        write_row(
            writer,
            [&r.conversation, &r.date, &r.time, &r.author, &r.body],
        )?;
    }
    Ok(())
}

/// Create or replace the artifact at `path`.
///
/// Rows go to a temporary file next to the target which is renamed over it
/// only once everything is flushed, so a failure leaves any previous
/// artifact untouched and never a truncated one.
pub fn write_artifact(path: &Path, records: &[FlatRecord]) -> Result<()> {
    let write_err = |source: io::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    let mut writer = BufWriter::new(tmp);
    write_csv(&mut writer, records).map_err(write_err)?;
    let tmp = writer.into_inner().map_err(|e| write_err(e.into_error()))?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
