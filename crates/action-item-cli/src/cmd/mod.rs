pub mod audit;
pub mod config;
pub mod init;
pub mod item;
pub mod reference;
pub mod registry;
pub mod subject;

use action_item_core::{
    config::Config,
    db::ActionDb,
    events::{EventReport, WorkflowEvent},
    notification::ActionItemNotifier,
    paths,
    registry::SiteActionItems,
    workflow::{EventLoop, Workflow},
};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Everything a command needs: config, the registry built from it, and the
/// open store.
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub site: SiteActionItems,
    pub db: ActionDb,
}

impl Project {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(root).context("failed to load config")?;
        let site = config
            .registry()
            .context("invalid action definitions in config")?;
        let db = ActionDb::open(&paths::db_path(root)).context("failed to open database")?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            site,
            db,
        })
    }

    pub fn workflow(&self) -> Workflow<'_> {
        Workflow::new(&self.db, &self.site)
    }

    /// Drain `events` through the event loop with the configured notifier.
    pub fn process(&self, events: Vec<WorkflowEvent>) -> anyhow::Result<EventReport> {
        let notifier = ActionItemNotifier::from_config(&self.config.notifications, &self.root);
        EventLoop::new(&self.db, &self.site)
            .with_notifier(notifier.as_ref())
            .run(events)
            .context("failed to process workflow events")
    }
}

/// Human summary of what an event loop run did.
pub fn print_report(report: &EventReport) {
    for id in report.created() {
        println!("  created: {id}");
    }
    for (id, from, to) in report.transitions() {
        println!("  {id}: {from} -> {to}");
    }
    for id in report.deleted() {
        println!("  deleted: {id}");
    }
    if report.notifications_sent > 0 {
        println!("  notifications sent: {}", report.notifications_sent);
    }
    if report.notification_failures > 0 {
        println!("  notifications failed: {}", report.notification_failures);
    }
}
