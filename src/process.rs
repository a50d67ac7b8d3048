use crate::error::{ExportError, Result};
use crate::exporter;
use crate::model::{Conversation, FlatRecord};
use crate::records;
use crate::service::{AuthSignal, ConversationService};
use crate::utils::{self, ExportConfig, SINGLE_FILE_NAME};
use crate::walker::{HistoryWalker, PAGE_SIZE};
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Establish the session, presenting a login code to the operator when
/// the service asks for interaction, then wait until it is usable.
pub async fn connect<F>(service: &dyn ConversationService, on_login_code: F) -> Result<()>
where
    F: FnOnce(&str),
{
    match service
        .authenticate()
        .await
        .map_err(ExportError::Authentication)?
    {
        AuthSignal::Ready => {
            debug!("Session ready");
            Ok(())
        }
        AuthSignal::NeedsInteraction { login_code } => {
            info!("Waiting for interactive login");
            on_login_code(&login_code);
            service
                .await_ready()
                .await
                .map_err(ExportError::Authentication)
        }
    }
}

/// What a run produced.
#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Conversations whose records were exported.
    pub exported: usize,
    /// Conversations that failed to fetch or write.
    pub failed: usize,
    pub messages: usize,
    pub artifacts: Vec<PathBuf>,
}

/// Drives walk → flatten → write for every conversation of a service.
pub struct Exporter<'a> {
    service: &'a dyn ConversationService,
    config: &'a ExportConfig,
    page_size: usize,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a dyn ConversationService, config: &'a ExportConfig) -> Self {
        Self {
            service,
            config,
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Export every conversation. A failing conversation is logged and
    /// counted; only failing to prepare the target directory, to enumerate
    /// conversations, or to write the combined file aborts the run.
    pub async fn run(&self) -> Result<ExportSummary> {
        let config = self.config;
        fs::create_dir_all(&config.target_dir).map_err(|source| ExportError::Write {
            path: config.target_dir.clone(),
            source,
        })?;

        let conversations = self
            .service
            .list_conversations()
            .await
            .map_err(|source| ExportError::Fetch {
                conversation: "<conversation list>".to_string(),
                source,
            })?;
        info!(count = conversations.len(), "Found conversations");
        if !config.quiet {
            eprintln!("Found {} conversations.", conversations.len());
        }

        let mut summary = ExportSummary::default();
        let mut registry: HashSet<String> = HashSet::new();
        let mut combined: Vec<FlatRecord> = Vec::new();

        for conversation in &conversations {
            let title = conversation.display_title();
            let pb = utils::spinner(config.quiet, format!("{}: fetching", title));

            let outcome = match self.collect(conversation, &title, &pb).await {
                Ok(rows) if config.single_file => {
                    let n = rows.len();
                    combined.extend(rows);
                    Ok((n, None))
                }
                Ok(rows) => {
                    let stem =
                        utils::allocate_filename(&utils::sanitize_filename(&title), &mut registry);
                    let path = config.target_dir.join(format!("{}.csv", stem));
                    debug!(conversation = %title, path = %path.display(), rows = rows.len(), "Writing artifact");
                    exporter::write_artifact(&path, &rows).map(|()| (rows.len(), Some(path)))
                }
                Err(e) => Err(e),
            };
            pb.finish_and_clear();

            match outcome {
                Ok((n, path)) => {
                    summary.exported += 1;
                    summary.messages += n;
                    match &path {
                        Some(p) => info!(conversation = %title, messages = n, path = %p.display(), "Exported conversation"),
                        None => info!(conversation = %title, messages = n, "Collected conversation"),
                    }
                    if config.verbose && !config.quiet {
                        match &path {
                            Some(p) => eprintln!("Exported: {} ({} messages)", p.display(), n),
                            None => eprintln!("Collected: {} ({} messages)", title, n),
                        }
                    }
                    summary.artifacts.extend(path);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(conversation = %title, stage = e.stage(), error = %e, "Conversation export failed");
                }
            }
        }

        if config.single_file {
            let path = config.target_dir.join(SINGLE_FILE_NAME);
            exporter::write_artifact(&path, &combined)?;
            info!(path = %path.display(), rows = combined.len(), "Wrote combined export");
            summary.artifacts.push(path);
        }

        if !config.quiet {
            let mut line = format!(
                "Done. {} exported, {} messages.",
                summary.exported, summary.messages
            );
            if summary.failed > 0 {
                line.push_str(&format!(" Completed with {} error(s).", summary.failed));
            }
            eprintln!("{}", line);
        }

        Ok(summary)
    }

    async fn collect(
        &self,
        conversation: &Conversation,
        title: &str,
        pb: &ProgressBar,
    ) -> Result<Vec<FlatRecord>> {
        let history = HistoryWalker::new(self.service)
            .with_page_size(self.page_size)
            .walk(conversation, pb)
            .await?;
        debug!(
            conversation = %title,
            fetches = history.fetches,
            messages = history.messages.len(),
            "History walked"
        );
        Ok(records::flatten(
            title,
            &history.messages,
            &self.config.timestamps,
        ))
    }
}
