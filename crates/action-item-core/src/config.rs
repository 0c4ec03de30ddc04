use crate::definition::{ActionDefinition, Condition, NextAction};
use crate::error::{ActionError, Result};
use crate::{io, paths};
use crate::registry::SiteActionItems;
use crate::types::{ActionStatus, Priority};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: String) -> Self {
        Self {
            level: WarnLevel::Warning,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: WarnLevel::Error,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// MailTransport
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MailTransport {
    /// Write each message as a YAML file under `.action-items/outbox/`.
    #[default]
    Outbox,
    Smtp {
        host: String,
        #[serde(default = "default_smtp_port")]
        port: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl MailTransport {
    /// SMTP settings from `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER` and
    /// `SMTP_PASSWORD`. `None` if `SMTP_HOST` is unset.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        Some(MailTransport::Smtp {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            user: std::env::var("SMTP_USER").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// NotificationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Recipients for actions without an entry in `action_recipients`.
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub action_recipients: HashMap<String, Vec<String>>,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default)]
    pub transport: MailTransport,
}

fn default_from_address() -> String {
    "noreply@action-items.local".to_string()
}

fn default_subject_prefix() -> String {
    "[Action Item]".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            from_address: default_from_address(),
            recipients: Vec::new(),
            action_recipients: HashMap::new(),
            subject_prefix: default_subject_prefix(),
            transport: MailTransport::default(),
        }
    }
}

impl NotificationConfig {
    pub fn recipients_for(&self, action: &str) -> &[String] {
        self.action_recipients
            .get(action)
            .map(|v| v.as_slice())
            .unwrap_or(&self.recipients)
    }

    /// The configured transport, replaced by SMTP settings from the
    /// environment when `SMTP_HOST` is set.
    pub fn effective_transport(&self) -> MailTransport {
        MailTransport::from_env().unwrap_or_else(|| self.transport.clone())
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    /// A config carrying the default adverse-event / death-report catalog.
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            actions: default_actions(),
            notifications: NotificationConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ActionError::NotInitialized);
        }
        io::read_yaml(&path)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_yaml(&paths::config_path(root), self)
    }

    /// Build and validate the site registry from `actions`.
    pub fn registry(&self) -> Result<SiteActionItems> {
        SiteActionItems::from_definitions(self.actions.iter().cloned())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Err(e) = self.registry() {
            warnings.push(ConfigWarning::error(e.to_string()));
        }

        let names: BTreeSet<&str> = self.actions.iter().map(|a| a.name.as_str()).collect();

        for action in &self.actions {
            if action.reference_model.is_none() {
                warnings.push(ConfigWarning::warning(format!(
                    "action '{}' has no reference_model and can only be closed by hand",
                    action.name
                )));
            }
            if !action.create_by_user && action.parent_action_names.is_empty() {
                warnings.push(ConfigWarning::warning(format!(
                    "action '{}' cannot be created by a user and has no parent actions",
                    action.name
                )));
            }
            if !action.notify_on.is_empty() && !self.notifications.enabled {
                warnings.push(ConfigWarning::warning(format!(
                    "action '{}' sets notify_on but notifications are disabled",
                    action.name
                )));
            }
        }

        for key in self.notifications.action_recipients.keys() {
            if !names.contains(key.as_str()) {
                warnings.push(ConfigWarning::warning(format!(
                    "unknown action '{key}' in notifications.action_recipients"
                )));
            }
        }

        if self.notifications.enabled {
            let any_recipient = !self.notifications.recipients.is_empty()
                || self
                    .notifications
                    .action_recipients
                    .values()
                    .any(|v| !v.is_empty());
            if !any_recipient {
                warnings.push(ConfigWarning::warning(
                    "notifications are enabled but no recipients are configured".to_string(),
                ));
            }
            if let MailTransport::Smtp { host, .. } = &self.notifications.transport {
                if host.trim().is_empty() {
                    warnings.push(ConfigWarning::error(
                        "notifications.transport.host is empty".to_string(),
                    ));
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Default catalog
// ---------------------------------------------------------------------------

/// Adverse event follow-up and death report workflows, written to a fresh
/// config by `init`.
pub fn default_actions() -> Vec<ActionDefinition> {
    let mut ae_initial = ActionDefinition::new("ae_initial")
        .with_reference_model("adverse_event.ae_initial")
        .with_priority(Priority::High)
        .with_next(NextAction::named("ae_followup"))
        .with_next(NextAction::named("ae_tmg").when(Condition::Equals {
            field: "sae".to_string(),
            value: serde_json::Value::Bool(true),
        }));
    ae_initial.display_name = Some("Submit AE Initial Report".to_string());
    ae_initial.notify_on = vec![ActionStatus::New];

    let mut ae_followup = ActionDefinition::new("ae_followup")
        .with_reference_model("adverse_event.ae_followup")
        .with_related_reference_model("adverse_event.ae_initial")
        .with_parents(["ae_initial", "ae_followup"])
        .with_next(NextAction::current().when(Condition::NotEquals {
            field: "outcome".to_string(),
            value: serde_json::Value::String("resolved".to_string()),
        }));
    ae_followup.display_name = Some("Submit AE Followup Report".to_string());
    ae_followup.instructions =
        Some("Submit a follow-up until the event is resolved.".to_string());

    let mut ae_tmg = ActionDefinition::new("ae_tmg")
        .with_reference_model("adverse_event.ae_tmg")
        .with_related_reference_model("adverse_event.ae_initial")
        .with_parents(["ae_initial"])
        .with_priority(Priority::High);
    ae_tmg.display_name = Some("TMG AE Report pending".to_string());
    ae_tmg.create_by_user = false;

    let mut death_report = ActionDefinition::new("death_report")
        .with_reference_model("adverse_event.death_report")
        .with_priority(Priority::High)
        .with_next(NextAction::named("death_report_tmg"))
        .with_next(NextAction::named("offstudy"))
        .singleton();
    death_report.display_name = Some("Submit Death Report".to_string());

    let mut death_report_tmg = ActionDefinition::new("death_report_tmg")
        .with_reference_model("adverse_event.death_report_tmg")
        .with_related_reference_model("adverse_event.death_report")
        .with_parents(["death_report"])
        .with_priority(Priority::High);
    death_report_tmg.display_name = Some("TMG Death Report pending".to_string());

    let mut offstudy = ActionDefinition::new("offstudy")
        .with_reference_model("prn.offstudy")
        .with_parents(["death_report"])
        .singleton();
    offstudy.display_name = Some("Submit Off-study Report".to_string());

    vec![
        ae_initial,
        ae_followup,
        ae_tmg,
        death_report,
        death_report_tmg,
        offstudy,
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("test-project");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "test-project");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.actions, cfg.actions);
    }

    #[test]
    fn default_catalog_is_a_valid_registry() {
        let site = Config::new("p").registry().unwrap();
        assert_eq!(site.len(), 6);
        assert!(site.get("offstudy").unwrap().singleton);
    }

    #[test]
    fn minimal_yaml_uses_defaults() {
        let yaml = "version: 1\nproject:\n  name: my-project\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.actions.is_empty());
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.notifications.transport, MailTransport::Outbox);
    }

    #[test]
    fn actions_parse_from_yaml() {
        let yaml = r#"
version: 1
project:
  name: trial
actions:
  - name: ae_initial
    reference_model: adverse_event.ae_initial
    priority: high
    notify_on: [new]
    next_actions:
      - action: ae_tmg
        when: { op: equals, field: sae, value: true }
  - name: ae_tmg
    reference_model: adverse_event.ae_tmg
    parent_action_names: [ae_initial]
    create_by_user: false
notifications:
  enabled: true
  recipients: [safety@example.org]
  transport:
    type: smtp
    host: smtp.example.org
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let site = cfg.registry().unwrap();
        let initial = site.get("ae_initial").unwrap();
        assert_eq!(initial.priority, Priority::High);
        assert!(initial.notifies_on(ActionStatus::New));
        assert!(!site.get("ae_tmg").unwrap().create_by_user);
        assert_eq!(
            cfg.notifications.transport,
            MailTransport::Smtp {
                host: "smtp.example.org".to_string(),
                port: 587,
                user: None,
                password: None,
            }
        );
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn recipients_fall_back_to_default_list() {
        let mut n = NotificationConfig {
            recipients: vec!["all@example.org".to_string()],
            ..NotificationConfig::default()
        };
        n.action_recipients
            .insert("ae_tmg".to_string(), vec!["tmg@example.org".to_string()]);
        assert_eq!(n.recipients_for("ae_tmg"), ["tmg@example.org".to_string()]);
        assert_eq!(n.recipients_for("ae_initial"), ["all@example.org".to_string()]);
    }

    #[test]
    fn validate_reports_broken_registry_as_error() {
        let mut cfg = Config::new("p");
        cfg.actions.retain(|a| a.name != "ae_followup");
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("ae_followup")));
    }

    #[test]
    fn validate_warns_on_notify_without_notifications() {
        let cfg = Config::new("p");
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("notify_on but notifications are disabled")));
    }

    #[test]
    fn load_missing_config_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ActionError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new("trial");
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project.name, "trial");
        assert_eq!(loaded.actions.len(), 6);
    }
}
