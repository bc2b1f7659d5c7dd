//! Out-of-process rasterization via Graphviz `dot`.
//!
//! The call is bounded: a hang or nonzero exit is reported as a recoverable
//! [`RasterError`] so the interactive session can keep its previous image.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const RASTER_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("failed to invoke `dot` (is Graphviz installed?): {0}")]
    Spawn(std::io::Error),

    #[error("`dot` exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("`dot` did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("I/O error during rasterization: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders a DOT document to image bytes of the requested type.
pub fn rasterize(dot_source: &str, image_type: &str) -> Result<Vec<u8>, RasterError> {
    let dir = tempfile::tempdir()?;
    let in_path = dir.path().join("statechart.dot");
    let out_path = dir.path().join(format!("statechart.{image_type}"));
    std::fs::write(&in_path, dot_source)?;

    run_dot(&in_path, &out_path, image_type)?;
    Ok(std::fs::read(&out_path)?)
}

/// Like [`rasterize`] but writes straight to `out` (batch mode).
pub fn rasterize_to_file(
    dot_source: &str,
    image_type: &str,
    out: &Path,
) -> Result<(), RasterError> {
    let bytes = rasterize(dot_source, image_type)?;
    std::fs::write(out, bytes)?;
    Ok(())
}

fn run_dot(in_path: &Path, out_path: &Path, image_type: &str) -> Result<(), RasterError> {
    let mut child = Command::new("dot")
        .arg(format!("-T{image_type}"))
        .arg(in_path)
        .arg("-o")
        .arg(out_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RasterError::Spawn)?;

    let deadline = Instant::now() + RASTER_TIMEOUT;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RasterError::TimedOut(RASTER_TIMEOUT));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    if !status.success() {
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        return Err(RasterError::Failed {
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(())
}
