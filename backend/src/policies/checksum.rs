//! Post-download checksum policy.

use async_trait::async_trait;

use super::{check_option, PolicyRequest, PostDownloadPolicy};
use crate::error::Result;
use crate::services::checksum_service::ChecksummedFile;

pub const IGNORE: &str = "ignore";
pub const WARN: &str = "warn";
pub const FAIL: &str = "fail";
pub const FIX: &str = "fix";

const OPTIONS: &[&str] = &[IGNORE, WARN, FAIL, FIX];

/// Validates a transferred file against the sidecars fetched with it.
///
/// - `ignore`: accept without looking
/// - `warn`: log a mismatch and accept
/// - `fail`: reject a mismatch (or missing sidecars) and delete the file
///   with its sidecars
/// - `fix`: regenerate missing or bad sidecars from the file content
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumPolicy;

#[async_trait]
impl PostDownloadPolicy for ChecksumPolicy {
    fn id(&self) -> &'static str {
        "checksum"
    }

    fn options(&self) -> &'static [&'static str] {
        OPTIONS
    }

    fn default_option(&self) -> &'static str {
        FIX
    }

    async fn apply(&self, setting: &str, request: &PolicyRequest<'_>) -> Result<bool> {
        let setting = check_option(self.id(), OPTIONS, setting)?;
        if setting == IGNORE {
            return Ok(true);
        }

        let file = ChecksummedFile::new(request.local_file);
        if !tokio::fs::try_exists(file.path()).await.unwrap_or(false) {
            // Nothing was transferred; there is nothing to validate.
            return Ok(setting != FAIL);
        }

        match setting.as_str() {
            WARN => {
                if !file.is_valid().await? {
                    tracing::warn!(
                        url = %request.url,
                        "Checksum mismatch or missing checksum, accepting per warn policy"
                    );
                }
                Ok(true)
            }
            FAIL => {
                if file.is_valid().await? {
                    return Ok(true);
                }
                tracing::warn!(
                    url = %request.url,
                    "Checksum mismatch or missing checksum, removing transferred file"
                );
                file.remove_all().await?;
                Ok(false)
            }
            _ => {
                let fixed = file.fix_checksums().await?;
                if fixed > 0 {
                    tracing::debug!(url = %request.url, fixed, "Regenerated checksum files");
                }
                Ok(true)
            }
        }
    }
}
