// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local side of directory transfers.

use std::io;
use std::path::{Path, PathBuf};

use mpr_core::{ErrorCode, ErrorReport};

use crate::repl::{Tally, TreeItem};

fn local_error(action: &str, path: &Path, e: io::Error) -> ErrorReport {
    ErrorReport::new(ErrorCode::LocalIo, format!("cannot {action} {}: {e}", path.display()))
}

/// Everything under `root`, directories before their contents, each
/// directory's entries in name order.
pub(super) async fn read_tree(root: PathBuf) -> Result<Vec<TreeItem>, ErrorReport> {
    tokio::task::spawn_blocking(move || {
        let mut items = Vec::new();
        collect(&root, "", &mut items).map(|()| items)
    })
    .await
    .map_err(|e| ErrorReport::new(ErrorCode::AgentInternal, format!("reading tree failed: {e}")))?
}

fn collect(dir: &Path, prefix: &str, items: &mut Vec<TreeItem>) -> Result<(), ErrorReport> {
    let read = |e| local_error("read", dir, e);
    let mut entries =
        std::fs::read_dir(dir).map_err(read)?.collect::<Result<Vec<_>, _>>().map_err(read)?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
        let path = entry.path();
        if path.is_dir() {
            items.push(TreeItem { relative: relative.clone(), data: None });
            collect(&path, &relative, items)?;
        } else {
            let data = std::fs::read(&path).map_err(|e| local_error("read", &path, e))?;
            items.push(TreeItem { relative, data: Some(data) });
        }
    }
    Ok(())
}

/// Recreate `items` under `root`.
pub(super) async fn write_tree(root: &Path, items: Vec<TreeItem>) -> Result<Tally, ErrorReport> {
    tokio::fs::create_dir_all(root).await.map_err(|e| local_error("create", root, e))?;
    let mut tally = Tally::default();
    for item in items {
        let path = root.join(&item.relative);
        match item.data {
            None => {
                tokio::fs::create_dir_all(&path).await.map_err(|e| local_error("create", &path, e))?;
            }
            Some(data) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| local_error("create", parent, e))?;
                }
                tokio::fs::write(&path, &data).await.map_err(|e| local_error("write", &path, e))?;
                tally.files += 1;
                tally.bytes += data.len() as u64;
            }
        }
    }
    Ok(tally)
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
