use anyhow::{Context, Result};
use prism_client::{
    ClientError, DirtyValues, Documents, ImportAction, ImportOptions, ImportRecordResult,
    SearchClient,
};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Source for documents to import
pub enum DocumentSource {
    FromFile(PathBuf),
    FromStdin,
}

impl DocumentSource {
    pub fn reader(&self) -> io::Result<Box<dyn BufRead + Send>> {
        match self {
            DocumentSource::FromFile(path) => {
                let file = File::open(path)?;
                Ok(Box::new(BufReader::new(file)))
            }
            DocumentSource::FromStdin => Ok(Box::new(BufReader::new(io::stdin()))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub action: ImportAction,
    pub dirty_values: Option<DirtyValues>,
    pub batch_size: usize,
    pub raw: bool,
    pub continue_on_error: bool,
    pub no_progress: bool,
}

impl ImportSettings {
    fn options(&self) -> ImportOptions {
        ImportOptions {
            action: Some(self.action),
            dirty_values: self.dirty_values,
            ..Default::default()
        }
    }
}

/// Progress tracking for import
struct ImportProgress {
    docs_sent: AtomicUsize,
    docs_failed: AtomicUsize,
    bytes_processed: AtomicUsize,
    start_time: Instant,
}

impl ImportProgress {
    fn new() -> Self {
        Self {
            docs_sent: AtomicUsize::new(0),
            docs_failed: AtomicUsize::new(0),
            bytes_processed: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    fn add(&self, docs: usize, failed: usize, bytes: usize) {
        self.docs_sent.fetch_add(docs, Ordering::Relaxed);
        self.docs_failed.fetch_add(failed, Ordering::Relaxed);
        self.bytes_processed.fetch_add(bytes, Ordering::Relaxed);
    }

    fn failed(&self) -> usize {
        self.docs_failed.load(Ordering::Relaxed)
    }

    fn print_progress(&self) {
        let docs = self.docs_sent.load(Ordering::Relaxed);
        let bytes = self.bytes_processed.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed().as_secs_f64();

        if elapsed > 0.0 {
            let docs_per_sec = docs as f64 / elapsed;
            let mb_per_sec = (bytes as f64 / 1_000_000.0) / elapsed;
            eprint!(
                "\r  Sent {} docs ({:.1} docs/s, {:.2} MB/s)    ",
                docs, docs_per_sec, mb_per_sec
            );
        }
    }

    fn finish(&self) {
        let docs = self.docs_sent.load(Ordering::Relaxed);
        let failed = self.failed();
        let bytes = self.bytes_processed.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed();

        eprintln!();
        eprintln!("Import completed:");
        eprintln!("  Documents: {} ({} succeeded, {} failed)", docs, docs - failed, failed);
        eprintln!("  Bytes:     {:.2} MB", bytes as f64 / 1_000_000.0);
        eprintln!("  Time:      {:.2}s", elapsed.as_secs_f64());
        if elapsed.as_secs_f64() > 0.0 {
            eprintln!(
                "  Throughput: {:.1} docs/s, {:.2} MB/s",
                docs as f64 / elapsed.as_secs_f64(),
                (bytes as f64 / 1_000_000.0) / elapsed.as_secs_f64()
            );
        }
    }
}

/// A batch of input lines plus the input line number of its first record
struct Batch {
    first_line: usize,
    lines: Vec<String>,
    bytes: usize,
}

impl Batch {
    fn new(capacity: usize) -> Self {
        Self {
            first_line: 0,
            lines: Vec::with_capacity(capacity),
            bytes: 0,
        }
    }

    fn push(&mut self, line_number: usize, line: String) {
        if self.lines.is_empty() {
            self.first_line = line_number;
        }
        self.bytes += line.len();
        self.lines.push(line);
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.bytes = 0;
    }
}

/// Run import command
pub async fn run_import(
    client: &SearchClient,
    collection: &str,
    source: DocumentSource,
    settings: ImportSettings,
) -> Result<()> {
    eprintln!(
        "Importing to collection '{}' (action: {}, batch size: {})",
        collection, settings.action, settings.batch_size
    );

    let documents = client.collection(collection).documents();
    let options = settings.options();
    let progress = ImportProgress::new();
    let reader = source.reader()?;

    let mut batch = Batch::new(settings.batch_size);
    let mut last_progress = Instant::now();

    for (index, line_result) in reader.lines().enumerate() {
        let line = line_result.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        batch.push(index + 1, line);

        if batch.len() >= settings.batch_size {
            send_batch(&documents, &batch, &options, &settings, &progress).await?;
            batch.clear();

            if !settings.no_progress && last_progress.elapsed().as_millis() > 100 {
                progress.print_progress();
                last_progress = Instant::now();
            }
        }
    }

    if !batch.is_empty() {
        send_batch(&documents, &batch, &options, &settings, &progress).await?;
    }

    if !settings.no_progress {
        progress.finish();
    }

    if progress.failed() > 0 {
        anyhow::bail!("{} document(s) failed to import", progress.failed());
    }

    Ok(())
}

async fn send_batch(
    documents: &Documents,
    batch: &Batch,
    options: &ImportOptions,
    settings: &ImportSettings,
    progress: &ImportProgress,
) -> Result<()> {
    if settings.raw {
        let response = documents
            .import_raw(batch.lines.join("\n"), options)
            .await
            .context("Failed to send batch")?;
        println!("{}", response);
        let failed = response.lines().filter(|line| is_failed_result(line)).count();
        progress.add(batch.len(), failed, batch.bytes);
        return Ok(());
    }

    let records = batch
        .lines
        .iter()
        .enumerate()
        .map(|(offset, line)| {
            serde_json::from_str::<Value>(line).with_context(|| {
                format!(
                    "Failed to parse JSON on line {}: {}",
                    batch.first_line + offset,
                    preview(line)
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    match documents.import(&records, options).await {
        Ok(results) => {
            progress.add(results.len(), 0, batch.bytes);
            Ok(())
        }
        Err(ClientError::Import(failure)) => {
            eprintln!();
            for (offset, result) in failure.failures() {
                report_failure(batch.first_line + offset, result);
            }
            progress.add(failure.results().len(), failure.failed(), batch.bytes);
            if settings.continue_on_error {
                Ok(())
            } else {
                Err(anyhow::anyhow!(
                    "Batch starting at line {}: {}",
                    batch.first_line,
                    failure.summary()
                ))
            }
        }
        Err(e) => Err(e).context("Failed to send batch"),
    }
}

/// First 100 characters of an input line, for error messages
fn preview(line: &str) -> String {
    line.chars().take(100).collect()
}

/// Whether a raw result line reports `"success": false`
fn is_failed_result(line: &str) -> bool {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|result| result.get("success").and_then(Value::as_bool))
        == Some(false)
}

fn report_failure(line: usize, result: &ImportRecordResult) {
    if let ImportRecordResult::Failure { error, code, .. } = result {
        eprintln!("  line {}: [{}] {}", line, code, error);
    }
}
