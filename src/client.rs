use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::session::{Direction, Session};
use crate::transfer::{download, upload, Transfer};

/// TFTP client
///
/// Every call runs one session on a fresh socket.
///
/// ```rust,no_run
/// use std::path::Path;
/// use tftp_client::{Client, ClientConfig};
///
/// # async fn demo() -> tftp_client::Result<()> {
/// let client = Client::new(ClientConfig::new("192.168.1.100:69".parse().unwrap()));
/// client.get_file("remote.txt", Path::new("local.txt")).await?;
/// client.put_file(Path::new("local.txt"), "remote.txt").await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Download `remote` from the server into `writer` (RRQ).
    pub async fn get<W>(&self, remote: &str, writer: &mut W) -> Result<Transfer>
    where
        W: AsyncWrite + Unpin,
    {
        info!("Downloading {} from {}", remote, self.config.server);

        let mut session = Session::bind(self.config.clone()).await?;
        let (reply, tid) = session.initiate(Direction::Get, remote).await?;
        debug!("{remote}: server TID {tid}");
        let transfer = download(&mut session, reply, writer).await?;

        report(&transfer);
        Ok(transfer)
    }

    /// Upload everything `reader` yields to the server as `remote` (WRQ).
    pub async fn put<R>(&self, remote: &str, reader: &mut R) -> Result<Transfer>
    where
        R: AsyncRead + Unpin,
    {
        info!("Uploading {} to {}", remote, self.config.server);

        let mut session = Session::bind(self.config.clone()).await?;
        let (reply, tid) = session.initiate(Direction::Put, remote).await?;
        debug!("{remote}: server TID {tid}");
        let transfer = upload(&mut session, reply, reader).await?;

        report(&transfer);
        Ok(transfer)
    }

    /// Download into a local file.
    ///
    /// Data lands in a `.part` file next to `local`, which replaces `local`
    /// only once the transfer completes. A failed or cancelled download
    /// leaves an existing `local` untouched.
    pub async fn get_file(&self, remote: &str, local: &Path) -> Result<Transfer> {
        let part = PartFile::new(local);
        let mut file = File::create(&part.path).await?;
        let transfer = self.get(remote, &mut file).await?;
        drop(file);

        tokio::fs::rename(&part.path, local).await?;
        part.keep();
        Ok(transfer)
    }

    /// Upload a local file. A missing file fails before anything is sent.
    pub async fn put_file(&self, local: &Path, remote: &str) -> Result<Transfer> {
        let mut file = File::open(local).await?;
        self.put(remote, &mut file).await
    }
}

/// Removes the partial download on drop unless kept.
struct PartFile {
    path: PathBuf,
    keep: bool,
}

impl PartFile {
    fn new(local: &Path) -> Self {
        let mut name = OsString::from(local.as_os_str());
        name.push(".part");
        Self {
            path: PathBuf::from(name),
            keep: false,
        }
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove {}: {e}", self.path.display()),
        }
    }
}

fn report(transfer: &Transfer) {
    info!(
        "{} bytes in {} blocks, cost: {:.3}s, speed: {:.2} MB/s",
        transfer.bytes,
        transfer.blocks,
        transfer.elapsed.as_secs_f64(),
        transfer.rate() / 1024.0 / 1024.0
    );
}
