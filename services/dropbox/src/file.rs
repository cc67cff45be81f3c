use std::io;

use bytes::Bytes;
use log::debug;

use dropsign_core::{Error, ErrorKind, Result};

use crate::client::{Client, ErrorState};

/// How a [`DropboxFile`] is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Fetch the content, read it.
    Read,
    /// Fetch the content, append to it.
    Write,
    /// Fetch the content, read and append.
    ReadWrite,
    /// Start from an empty buffer without fetching.
    Truncate,
}

impl OpenMode {
    fn readable(&self) -> bool {
        !matches!(self, OpenMode::Write)
    }

    fn writable(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// DropboxFile is a buffered handle on the content of one remote file.
///
/// [`DropboxFile::open`] downloads the whole content, reads and writes only
/// touch the in memory buffer, and [`DropboxFile::commit`] uploads it back.
///
/// ```no_run
/// # async fn example(client: &mut dropsign_dropbox::Client) -> dropsign_core::Result<()> {
/// use std::io::Write;
/// use dropsign_dropbox::{DropboxFile, OpenMode};
///
/// let mut file = DropboxFile::new("dropbox/notes.txt");
/// file.open(client, OpenMode::Truncate).await?;
/// file.write_all(b"hello").map_err(|e| dropsign_core::Error::unexpected(e.to_string()))?;
/// file.commit(client).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct DropboxFile {
    filename: String,
    mode: Option<OpenMode>,
    buffer: Vec<u8>,
    last_error: Option<ErrorState>,
}

impl DropboxFile {
    /// Create a handle for `filename`, including its root like `dropbox/a.txt`.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }

    /// Remote path of the file.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Change the remote path, the buffer is kept.
    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = filename.into();
    }

    /// Mode the file is open in.
    pub fn mode(&self) -> Option<OpenMode> {
        self.mode
    }

    /// Bytes left in the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The last error this handle ran into.
    pub fn last_error(&self) -> Option<&ErrorState> {
        self.last_error.as_ref()
    }

    /// Open the file.
    ///
    /// Unless truncating, this waits for the download of the content.
    pub async fn open(&mut self, client: &mut Client, mode: OpenMode) -> Result<()> {
        self.mode = None;
        self.buffer.clear();

        if mode != OpenMode::Truncate {
            debug!("fetch content of {}", self.filename);
            let fetched = Self::fetch(client, &self.filename).await;
            let content = self.track(fetched)?;
            self.buffer.extend_from_slice(&content);
        }

        self.mode = Some(mode);
        Ok(())
    }

    /// Upload the buffer as the new content of the file.
    pub async fn commit(&mut self, client: &mut Client) -> Result<()> {
        if self.mode.is_none() {
            return self.track(Err(Error::unexpected(format!(
                "{} is not open",
                self.filename
            ))));
        }

        debug!("upload {} bytes to {}", self.buffer.len(), self.filename);
        let content = Bytes::copy_from_slice(&self.buffer);
        let result = match client.upload_file(&self.filename, content) {
            Ok(ticket) => client.wait(ticket).await.map(|_| ()),
            Err(err) => Err(err),
        };
        self.track(result)
    }

    /// Drop the buffer, the handle can be opened again.
    pub fn close(&mut self) {
        self.mode = None;
        self.buffer.clear();
    }

    async fn fetch(client: &mut Client, filename: &str) -> Result<Bytes> {
        let ticket = client.request_file(filename)?;
        client.wait(ticket).await
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.last_error = Some(ErrorState::from(err));
        }
        result
    }

    fn check(&self, allowed: bool, action: &str) -> io::Result<()> {
        match self.mode {
            Some(_) if allowed => Ok(()),
            _ => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is not open for {action}", self.filename),
            )),
        }
    }
}

impl io::Read for DropboxFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check(self.mode.is_some_and(|m| m.readable()), "reading")?;

        let n = buf.len().min(self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.buffer.drain(..n);
        Ok(n)
    }
}

impl io::Write for DropboxFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check(self.mode.is_some_and(|m| m.writable()), "writing")?;

        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Nothing to flush, [`DropboxFile::commit`] uploads the content.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl From<&ErrorState> for io::Error {
    fn from(state: &ErrorState) -> Self {
        let kind = match state.kind {
            ErrorKind::FileNotFound => io::ErrorKind::NotFound,
            ErrorKind::ExpiredToken | ErrorKind::BadOAuthRequest => {
                io::ErrorKind::PermissionDenied
            }
            ErrorKind::Timeout => io::ErrorKind::TimedOut,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, format!("{}: {}", state.kind, state.message))
    }
}
