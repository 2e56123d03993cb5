//! Recursive download planning.
//!
//! The walker lists a remote subtree depth-first, creates every local
//! directory as soon as it is discovered, and returns a flat, pre-ordered
//! task list: a directory task always precedes the tasks for its contents.
//! A branch that cannot be listed or created is recorded in
//! [`DownloadPlan::abandoned`] and planning carries on with its siblings.

use crate::ftpsync::error::FtpResult;
use crate::ftpsync::parser::ListingParser;
use crate::ftpsync::path;
use crate::ftpsync::transport::FtpTransport;
use crate::ftpsync::types::{
    AbandonedBranch, DownloadPlan, DownloadTask, ListingEntry, WalkerConfig,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// One directory whose children are still being visited.
struct Frame {
    remote: String,
    local: PathBuf,
    pending: VecDeque<ListingEntry>,
    depth: usize,
}

pub struct DirectoryWalker<'a> {
    transport: &'a mut dyn FtpTransport,
    parser: &'a ListingParser,
    config: &'a WalkerConfig,
}

impl<'a> DirectoryWalker<'a> {
    pub fn new(
        transport: &'a mut dyn FtpTransport,
        parser: &'a ListingParser,
        config: &'a WalkerConfig,
    ) -> Self {
        Self {
            transport,
            parser,
            config,
        }
    }

    /// Plan the download of `remote_path` into `local_root`.
    ///
    /// `local_root` itself becomes the first (directory) task. The traversal
    /// uses an explicit stack so arbitrarily deep trees cannot overflow.
    pub async fn plan_download(&mut self, remote_path: &str, local_root: &Path) -> DownloadPlan {
        let mut plan = DownloadPlan::default();
        let root_remote = path::normalize_dir(remote_path);

        if let Err(e) = tokio::fs::create_dir_all(local_root).await {
            abandon(&mut plan, &root_remote, local_root, format!("Cannot create local directory: {}", e));
            return plan;
        }
        plan.tasks.push(DownloadTask::directory(&root_remote, local_root));

        let entries = match self.list(&root_remote).await {
            Ok(entries) => entries,
            Err(e) => {
                abandon(&mut plan, &root_remote, local_root, e.to_string());
                return plan;
            }
        };

        let mut stack = vec![Frame {
            remote: root_remote,
            local: local_root.to_path_buf(),
            pending: entries.into(),
            depth: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(entry) = frame.pending.pop_front() else {
                stack.pop();
                continue;
            };

            if !path::is_safe_component(&entry.name) {
                let remote = format!("{}{}", frame.remote, entry.name);
                let reason = format!("Unsafe entry name '{}'", entry.name);
                abandon(&mut plan, &remote, &frame.local, reason);
                continue;
            }

            let local = frame.local.join(&entry.name);

            if !entry.is_directory {
                let remote = path::join(&frame.remote, &entry.name);
                plan.tasks
                    .push(DownloadTask::file(&remote, local, entry.size_bytes, Some(entry.name)));
                continue;
            }

            let remote = path::join_dir(&frame.remote, &entry.name);
            let depth = frame.depth + 1;

            if self.config.max_depth.map_or(false, |max| depth > max) {
                abandon(&mut plan, &remote, &local, "Depth limit reached".to_string());
                continue;
            }

            if let Err(e) = tokio::fs::create_dir_all(&local).await {
                abandon(&mut plan, &remote, &local, format!("Cannot create local directory: {}", e));
                continue;
            }
            plan.tasks.push(DownloadTask::directory(&remote, &local));

            match self.list(&remote).await {
                Ok(children) => stack.push(Frame {
                    remote,
                    local,
                    pending: children.into(),
                    depth,
                }),
                Err(e) => abandon(&mut plan, &remote, &local, e.to_string()),
            }
        }

        log::debug!(
            "planned {} tasks ({} files, {} bytes), {} abandoned",
            plan.tasks.len(),
            plan.file_count(),
            plan.total_bytes(),
            plan.abandoned.len()
        );
        plan
    }

    async fn list(&mut self, remote: &str) -> FtpResult<Vec<ListingEntry>> {
        let raw = self.transport.list_directory(remote).await?;
        Ok(self.parser.parse_text(&raw))
    }
}

fn abandon(plan: &mut DownloadPlan, remote: &str, local: &Path, reason: String) {
    log::warn!("skipping {}: {}", remote, reason);
    plan.abandoned.push(AbandonedBranch {
        remote_path: remote.to_string(),
        local_path: local.to_path_buf(),
        reason,
    });
}
