use crate::driver::Driver;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name for a failure capture: `{page-slug}-{capability}.png`.
pub fn screenshot_path(dir: &Path, page: &str, capability: &str) -> PathBuf {
    dir.join(format!("{}-{}.png", page_slug(page), capability))
}

/// `/inventory/data` becomes `inventory_data`; the root page becomes `root`.
pub fn page_slug(page: &str) -> String {
    let slug: String = page
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if slug.is_empty() { "root".to_string() } else { slug }
}

/// Capture the page after a failing probe. Errors are logged and never
/// change a verdict.
pub async fn save_failure_screenshot<D: Driver + ?Sized>(
    driver: &mut D,
    dir: &Path,
    page: &str,
    capability: &str,
) {
    let bytes = match driver.screenshot().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Screenshot after {} failed: {}", capability, e);
            return;
        }
    };

    let path = screenshot_path(dir, page, capability);
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!("Cannot create screenshot dir {}: {}", dir.display(), e);
        return;
    }
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => info!("Screenshot saved: {}", path.display()),
        Err(e) => warn!("Cannot write screenshot {}: {}", path.display(), e),
    }
}
