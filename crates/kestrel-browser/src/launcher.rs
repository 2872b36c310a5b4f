use crate::{Error, Result};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tempfile::TempDir;

/// Manages the Chrome process lifecycle for a measurement run
pub struct ChromeLauncher {
    chrome_path: PathBuf,
    profile_dir: TempDir,
    debugging_port: u16,
    headless: bool,
    window_size: (u32, u32),
}

impl ChromeLauncher {
    /// Create a new launcher. A throwaway profile directory is created per
    /// run and removed when the launcher is dropped.
    pub fn new(chrome_path: PathBuf, debugging_port: u16, headless: bool) -> Result<Self> {
        let profile_dir = tempfile::tempdir().map_err(Error::Io)?;

        Ok(Self {
            chrome_path,
            profile_dir,
            debugging_port,
            headless,
            window_size: (1280, 720),
        })
    }

    /// Launch the Chrome process
    pub fn launch(&self) -> Result<Child> {
        let args = self.build_args();

        tracing::debug!("Launching Chrome with args: {:?}", args);

        Command::new(&self.chrome_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch Chrome: {}", e)))
    }

    /// Build Chrome command-line arguments
    fn build_args(&self) -> Vec<String> {
        let (width, height) = self.window_size;
        let mut args = vec![
            format!("--remote-debugging-port={}", self.debugging_port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            format!("--user-data-dir={}", self.profile_dir.path().display()),
            format!("--window-size={},{}", width, height),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-extensions".to_string(),
            "--ignore-certificate-errors".to_string(),
            "--mute-audio".to_string(),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }

        args.push("about:blank".to_string());

        args
    }

    /// Get the debugging port
    pub fn debugging_port(&self) -> u16 {
        self.debugging_port
    }
}
