//! Export command implementation.

use anyhow::{Context, Result};
use prism_client::{ExportOptions, SearchClient};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Run the export command.
///
/// The body is written exactly as received; it is already JSONL.
pub async fn run_export(
    client: &SearchClient,
    collection: &str,
    options: &ExportOptions,
    output: Option<PathBuf>,
) -> Result<()> {
    let body = client
        .collection(collection)
        .documents()
        .export(options)
        .await
        .with_context(|| format!("Failed to export collection '{}'", collection))?;

    match output {
        Some(path) => {
            let file = File::create(&path).context("Cannot create output file")?;
            let mut writer = BufWriter::new(file);
            write_body(&mut writer, &body)?;
            eprintln!(
                "Exported {} documents to {}",
                count_records(&body),
                path.display()
            );
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_body(&mut writer, &body)?;
        }
    }

    Ok(())
}

fn write_body(writer: &mut impl Write, body: &str) -> Result<()> {
    writer.write_all(body.as_bytes())?;
    if !body.is_empty() && !body.ends_with('\n') {
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn count_records(body: &str) -> usize {
    body.lines().filter(|line| !line.trim().is_empty()).count()
}
