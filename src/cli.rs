use anstyle::AnsiColor;
use anyhow::anyhow;
use clap::builder::styling::Styles;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use crate::packet::Mode;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Cyan.on_default())
    .placeholder(AnsiColor::Red.on_default());

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Download a file from the server
    Get,
    /// Upload a file to the server
    Put,
}

#[derive(Parser, Debug)]
#[command(name = "tftp")]
#[command(about = "A simple TFTP client", long_about = None)]
#[command(styles = STYLES)]
pub struct Cli {
    /// Server host name or ip
    pub host: String,

    /// Transfer direction
    #[arg(value_enum, ignore_case = true)]
    pub operation: Operation,

    /// File name on the server
    pub filename: String,

    /// Server Port
    #[arg(short, long, default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Local file, defaults to the file name part of FILENAME
    #[arg(short, long)]
    pub local: Option<PathBuf>,

    /// Transfer mode
    #[arg(short, long, default_value = "octet")]
    pub mode: Mode,

    /// Timeout (ms)
    #[arg(short, long, default_value_t = crate::DEF_TIMEOUT_SEC * 1000)]
    pub timeout: u64,

    /// Max retries
    #[arg(short, long, default_value_t = crate::MAX_RETRY_COUNT)]
    pub retry: u8,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn local_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(local) = &self.local {
            return Ok(local.clone());
        }
        let path = Path::new(&self.filename);
        let name = path
            .file_name()
            .ok_or(anyhow!("no file name in {:?}", path))?;
        Ok(PathBuf::from(name))
    }
}
