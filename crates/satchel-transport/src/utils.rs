//! Shared helpers for transport implementations

use satchel_core::retry::{RetryExecutor, TracingObserver, TransientOnly};
use satchel_core::{Error, Result, RetryPolicy};
use std::future::Future;
use std::path::{Component, Path, PathBuf};

/// Run a remote operation under `policy`, retrying transient failures
pub(crate) async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryExecutor::new(policy.clone())
        .with_predicate(TransientOnly)
        .with_observer(TracingObserver::new(operation))
        .execute(op)
        .await
        .map_err(|e| e.into_error(operation))
}

/// Relative components of a remote path, rejecting anything that climbs out of the root
pub(crate) fn relative_segments(remote_path: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    for component in Path::new(remote_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(Error::transport(
                    remote_path,
                    "path escapes the remote root",
                ))
            }
        }
    }
    Ok(segments)
}

/// Join `remote_path` under a local root
pub(crate) fn join_under(root: &Path, remote_path: Option<&str>) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    if let Some(remote_path) = remote_path {
        path.extend(relative_segments(remote_path)?);
    }
    Ok(path)
}

/// Join `/`-separated key parts, dropping empty segments
pub(crate) fn join_key<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// File name of a local path as UTF-8
pub(crate) fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::transport(path.display().to_string(), "path has no file name"))
}
