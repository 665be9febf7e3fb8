use std::{fs, path::Path};

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Later calls are no-ops.
pub fn init() -> anyhow::Result<()> {
    PROM_HANDLE.get_or_try_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .context("failed to install Prometheus metrics recorder")
    })?;
    Ok(())
}

/// Current exposition, or `None` when no recorder was installed.
pub fn render() -> Option<String> {
    PROM_HANDLE.get().map(PrometheusHandle::render)
}

/// Write the exposition for a textfile collector. Replaces the file through
/// a rename so a scraper never reads a partial file.
pub fn write_textfile(path: &Path) -> anyhow::Result<()> {
    let Some(body) = render() else {
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = path.with_extension("prom.tmp");
    fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    tracing::info!(path = %path.display(), "metrics written");
    Ok(())
}

/// Write the textfile whether or not the run succeeded, then hand back the
/// run's outcome. A failed run keeps its own error; a textfile failure is
/// only returned after a successful run.
pub fn finish<T>(outcome: anyhow::Result<T>, textfile: Option<&Path>) -> anyhow::Result<T> {
    let Some(path) = textfile else {
        return outcome;
    };
    match (outcome, write_textfile(path)) {
        (Ok(value), written) => written.map(|()| value),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(write_err)) => {
            tracing::warn!(error = %write_err, "metrics textfile not written");
            Err(e)
        }
    }
}
