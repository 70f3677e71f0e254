//! Checksum sidecar handling (`.sha1` / `.md5`).

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use sha1::Digest;
use tokio::io::AsyncReadExt;

use crate::error::Result;

/// `MD5 (foo-1.0.jar) = d41d8cd9...` as written by BSD tools.
static BSD_CHECKSUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:MD5|SHA1|SHA-1)\s*\((.*)\)\s*=\s*([0-9a-fA-F]+)$").expect("valid regex")
});

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha1,
    Md5,
}

impl ChecksumAlgorithm {
    pub const ALL: [ChecksumAlgorithm; 2] = [ChecksumAlgorithm::Sha1, ChecksumAlgorithm::Md5];

    /// Sidecar file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
        }
    }

    fn hex_len(&self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Md5 => 32,
        }
    }
}

/// Hex digests of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digests {
    pub sha1: String,
    pub md5: String,
}

impl Digests {
    pub fn get(&self, algorithm: ChecksumAlgorithm) -> &str {
        match algorithm {
            ChecksumAlgorithm::Sha1 => &self.sha1,
            ChecksumAlgorithm::Md5 => &self.md5,
        }
    }
}

/// Sidecar path for a file: `foo.jar` -> `foo.jar.sha1`.
pub fn checksum_path(path: &Path, algorithm: ChecksumAlgorithm) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(algorithm.extension());
    PathBuf::from(name)
}

/// Extract the hash from sidecar content. Accepts a bare hash,
/// `hash  filename`, and the BSD `ALG (filename) = hash` form.
pub fn parse_checksum(content: &str, algorithm: ChecksumAlgorithm) -> Option<String> {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    let hash = match BSD_CHECKSUM.captures(line) {
        Some(caps) => caps[2].to_string(),
        None => line.split_whitespace().next()?.to_string(),
    };
    if hash.len() == algorithm.hex_len() && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hash.to_lowercase())
    } else {
        None
    }
}

/// A file together with its checksum sidecars.
#[derive(Debug, Clone)]
pub struct ChecksummedFile {
    path: PathBuf,
}

impl ChecksummedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checksum_path(&self, algorithm: ChecksumAlgorithm) -> PathBuf {
        checksum_path(&self.path, algorithm)
    }

    /// Compute SHA-1 and MD5 in one pass over the file.
    pub async fn digests(&self) -> Result<Digests> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let mut sha1 = sha1::Sha1::new();
        let mut md5 = md5::Md5::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            sha1.update(&buf[..n]);
            md5.update(&buf[..n]);
        }
        Ok(Digests {
            sha1: hex::encode(sha1.finalize()),
            md5: hex::encode(md5.finalize()),
        })
    }

    /// Hash recorded in a sidecar, if the sidecar exists and is readable.
    pub async fn read_checksum(&self, algorithm: ChecksumAlgorithm) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.checksum_path(algorithm)).await {
            Ok(content) => Ok(parse_checksum(&content, algorithm)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a sidecar file exists for `algorithm`.
    pub async fn has_checksum(&self, algorithm: ChecksumAlgorithm) -> bool {
        tokio::fs::try_exists(self.checksum_path(algorithm))
            .await
            .unwrap_or(false)
    }

    /// True when at least one sidecar exists and every existing sidecar
    /// matches the file content.
    pub async fn is_valid(&self) -> Result<bool> {
        let digests = self.digests().await?;
        let mut checked = 0;
        for algorithm in ChecksumAlgorithm::ALL {
            if !self.has_checksum(algorithm).await {
                continue;
            }
            checked += 1;
            match self.read_checksum(algorithm).await? {
                Some(expected) if expected == digests.get(algorithm) => {}
                _ => return Ok(false),
            }
        }
        Ok(checked > 0)
    }

    /// Write a sidecar as `hash  filename`.
    pub async fn write_checksum(&self, algorithm: ChecksumAlgorithm, hash: &str) -> Result<()> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tokio::fs::write(
            self.checksum_path(algorithm),
            format!("{}  {}\n", hash, file_name),
        )
        .await?;
        Ok(())
    }

    /// Regenerate every missing or incorrect sidecar. Returns the number of
    /// sidecars written.
    pub async fn fix_checksums(&self) -> Result<usize> {
        let digests = self.digests().await?;
        let mut fixed = 0;
        for algorithm in ChecksumAlgorithm::ALL {
            let actual = digests.get(algorithm);
            if self.read_checksum(algorithm).await?.as_deref() != Some(actual) {
                self.write_checksum(algorithm, actual).await?;
                fixed += 1;
            }
        }
        Ok(fixed)
    }

    /// Delete the file and its sidecars, ignoring ones already absent.
    pub async fn remove_all(&self) -> Result<()> {
        let mut paths = vec![self.path.clone()];
        paths.extend(ChecksumAlgorithm::ALL.iter().map(|a| self.checksum_path(*a)));
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
