use anyhow::{anyhow, Context};
use std::fs::File;
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Where the sender pulls file content from.
pub trait ByteSource {
    /// Fill as much of `buf` as the source allows. `Ok(0)` means end of stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R: Read> ByteSource for R {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// Where the receiver writes delivered bytes, one named file per session.
pub trait ByteSink {
    fn open(&mut self, name: &str) -> anyhow::Result<()>;
    fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Writes each session to `<dir>/<name>`.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file: None,
        }
    }
}

impl ByteSink for FileSink {
    fn open(&mut self, name: &str) -> anyhow::Result<()> {
        let path = self.dir.join(Path::new(name));
        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        self.file = Some(BufWriter::new(file));
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let file = self.file.as_mut().ok_or(anyhow!("No file open"))?;
        file.write_all(bytes)?;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}
