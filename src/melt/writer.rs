use crate::error::MeltError;
use crate::melt::types::{Batch, Record};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for melted records.
///
/// Records are appended one by one and become durable on `commit`. A sink
/// must not expose appended records before the commit that follows them.
pub trait RecordSink {
    fn append(&mut self, record: &Record) -> Result<()>;

    fn commit(&mut self) -> Result<()>;
}

impl Batch {
    /// Hand the whole batch to a sink: every record in order, then one commit
    pub fn persist<S: RecordSink + ?Sized>(&self, sink: &mut S) -> std::result::Result<(), MeltError> {
        for record in self.records() {
            sink.append(record).map_err(MeltError::Sink)?;
        }
        sink.commit().map_err(MeltError::Sink)
    }
}

/// Keeps committed records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pending: Vec<Record>,
    committed: Vec<Record>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &[Record] {
        &self.committed
    }

    /// Committed records of one table
    pub fn table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.committed.iter().filter(move |r| r.table() == table)
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &Record) -> Result<()> {
        self.pending.push(record.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.committed.append(&mut self.pending);
        Ok(())
    }
}

/// Writes records to JSON Lines files, one per table
pub struct JsonlSink {
    output_dir: PathBuf,
    pending: IndexMap<&'static str, Vec<String>>,
}

impl JsonlSink {
    /// Create a sink that appends to `<table>.jsonl` files in a directory
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&output_dir)
            .context("Failed to create output directory")?;

        Ok(JsonlSink {
            output_dir: output_dir.as_ref().to_path_buf(),
            pending: IndexMap::new(),
        })
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.output_dir.join(format!("{}.jsonl", table))
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, record: &Record) -> Result<()> {
        let json = serde_json::to_string(record)
            .context("Failed to serialize record")?;
        self.pending.entry(record.table()).or_default().push(json);
        Ok(())
    }

    /// Append every pending table, or none of them.
    ///
    /// All files are opened before anything is written. If a later write
    /// fails, the files already written are truncated back to their length
    /// before this commit.
    fn commit(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);

        let mut staged = Vec::with_capacity(pending.len());
        for (table, lines) in pending {
            let path = self.table_path(table);
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open file: {}", path.display()))?;
            let committed_len = file
                .metadata()
                .with_context(|| format!("Failed to read metadata of {}", path.display()))?
                .len();

            let mut buffer = String::new();
            for line in lines {
                buffer.push_str(&line);
                buffer.push('\n');
            }
            staged.push((path, file, committed_len, buffer));
        }

        let mut failure = None;
        for (index, (path, file, _, buffer)) in staged.iter_mut().enumerate() {
            let written = file
                .write_all(buffer.as_bytes())
                .and_then(|_| file.flush())
                .with_context(|| format!("Failed to write records to {}", path.display()));
            if let Err(err) = written {
                failure = Some((index, err));
                break;
            }
        }

        if let Some((failed_at, err)) = failure {
            for (path, file, committed_len, _) in &staged[..=failed_at] {
                if let Err(rollback) = file.set_len(*committed_len) {
                    tracing::error!(file = %path.display(), "failed to roll back partial commit: {}", rollback);
                }
            }
            return Err(err);
        }
        Ok(())
    }
}

/// Writes every record to a single stream, tagged with its table
pub struct StreamSink<W: Write> {
    writer: W,
    pending: Vec<String>,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        StreamSink {
            writer,
            pending: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for StreamSink<W> {
    fn append(&mut self, record: &Record) -> Result<()> {
        let mut data = serde_json::to_value(record)
            .context("Failed to serialize record")?;

        if let Some(object) = data.as_object_mut() {
            object.insert(
                "_table".to_string(),
                serde_json::Value::String(record.table().to_string()),
            );
        }

        self.pending.push(serde_json::to_string(&data).context("Failed to serialize record")?);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        for line in self.pending.drain(..) {
            writeln!(self.writer, "{}", line)
                .context("Failed to write record")?;
        }
        self.writer.flush().context("Failed to flush writer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melt::types::{RecordId, StringValue};

    fn value_record() -> Record {
        Record::StringValue(StringValue {
            element: RecordId(4),
            value: "Alice".to_string(),
            annotation: None,
        })
    }

    #[test]
    fn test_stream_sink_tags_table() {
        let mut buffer = Vec::new();
        {
            let mut sink = StreamSink::new(&mut buffer);
            sink.append(&value_record()).unwrap();
            sink.commit().unwrap();
        }

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("Alice"));
        assert!(output.contains(r#""_table":"svalue""#));
    }

    #[test]
    fn test_stream_sink_holds_back_until_commit() {
        let mut sink = StreamSink::new(Vec::new());
        sink.append(&value_record()).unwrap();
        assert!(sink.writer.is_empty());
        sink.commit().unwrap();
        assert!(!sink.into_inner().is_empty());
    }

    #[test]
    fn test_memory_sink_commit() {
        let mut sink = MemorySink::new();
        sink.append(&value_record()).unwrap();
        assert!(sink.committed().is_empty());

        sink.commit().unwrap();
        assert_eq!(sink.committed().len(), 1);
        assert_eq!(sink.table("svalue").count(), 1);
        assert_eq!(sink.table("ivalue").count(), 0);
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn append(&mut self, _record: &Record) -> Result<()> {
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            anyhow::bail!("database is read-only")
        }
    }

    #[test]
    fn test_persist_reports_commit_failure() {
        let batch = Batch::new(crate::melt::types::EnvironmentRecord {
            id: RecordId(1),
            path: None,
        });
        let result = batch.persist(&mut FailingSink);
        assert!(matches!(result, Err(MeltError::Sink(_))));
    }
}
