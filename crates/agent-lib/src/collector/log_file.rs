//! Tail a log file into a record batch

use super::LogSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Default number of trailing lines read per pass
pub const DEFAULT_MAX_LINES: usize = 500;

/// Bytes read per backwards step through the file
const CHUNK_SIZE: u64 = 64 * 1024;

/// Reads the last `max_lines` non-empty lines of a file on every pass
pub struct FileLogSource {
    path: PathBuf,
    max_lines: usize,
}

impl FileLogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_lines: DEFAULT_MAX_LINES,
        }
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines.max(1);
        self
    }

    /// Keep the trailing non-empty lines of `content`
    pub fn tail(content: &str, max_lines: usize) -> Vec<String> {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].iter().map(|l| l.to_string()).collect()
    }

    /// Read backwards from the end until the buffer holds more than
    /// `max_lines` non-blank lines, or the whole file
    async fn read_tail_bytes(&self) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to read log file {:?}", self.path))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("Failed to stat log file {:?}", self.path))?
            .len();

        let mut start = len;
        let mut buf: Vec<u8> = Vec::new();
        while start > 0 {
            let step = CHUNK_SIZE.min(start);
            start -= step;

            let mut chunk = vec![0u8; step as usize];
            file.seek(SeekFrom::Start(start)).await?;
            file.read_exact(&mut chunk)
                .await
                .with_context(|| format!("Failed to read log file {:?}", self.path))?;
            chunk.extend_from_slice(&buf);
            buf = chunk;

            // The first segment may be a partial line, hence strictly more
            if non_blank_lines(&buf) > self.max_lines {
                break;
            }
        }
        Ok(buf)
    }
}

fn non_blank_lines(bytes: &[u8]) -> usize {
    bytes
        .split(|b| *b == b'\n')
        .filter(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
        .count()
}

#[async_trait]
impl LogSource for FileLogSource {
    async fn read_batch(&self) -> Result<Vec<String>> {
        let bytes = self.read_tail_bytes().await?;
        // Invalid UTF-8 in one line must not drop the whole batch
        let content = String::from_utf8_lossy(&bytes);
        Ok(Self::tail(&content, self.max_lines))
    }
}
