use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{bash_command, static_regex};

/// System-changing commands; read-only queries (`dnf info`, `rpm -q`,
/// `systemctl status`, `gsettings get`) fall through
static FORBIDDEN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bdnf\s+(install|remove|erase|update|upgrade|downgrade|reinstall)\b",
        r"\byum\s+(install|remove|erase|update|upgrade)\b",
        r"\brpm\s+(-[iUeFh]*[iUeF][iUeFh]*|--install|--upgrade|--erase|--freshen)",
        r"\bpip3?\s+install\b",
        r"\bnpm\s+install\s+-g\b",
        r"\bflatpak\s+(install|remove|uninstall|update)\b",
        r"\bsnap\s+(install|remove)\b",
        r"\bsystemctl\s+(enable|disable|start|stop|restart|reload|mask|unmask)\b",
        r"\bgsettings\s+set\b",
        r"\bdconf\s+write\b",
        r"\bgconftool(-2)?\s+--set",
        r"\bfirewall-cmd\s+.*--(add|remove|zone)",
        r"\b(useradd|usermod|userdel|groupadd|groupmod|groupdel)\b",
    ]
    .into_iter()
    .map(|pattern| static_regex(&format!("(?i){pattern}")))
    .collect()
});

/// Quoted shell strings; text inside them is data, not a command
static QUOTED: Lazy<Regex> = Lazy::new(|| static_regex(r#"'[^']*'|"[^"]*""#));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Package,
    Service,
    Config,
    Account,
    Other,
}

impl CommandKind {
    fn of(command: &str) -> Self {
        let lower = command.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has_any(&["dnf", "yum", "rpm", "flatpak", "snap", "pip", "npm"]) {
            Self::Package
        } else if lower.contains("systemctl") {
            Self::Service
        } else if has_any(&["gsettings", "dconf", "gconftool", "firewall-cmd"]) {
            Self::Config
        } else if has_any(&["useradd", "usermod", "userdel", "groupadd", "groupmod", "groupdel"]) {
            Self::Account
        } else {
            Self::Other
        }
    }

    fn playbook_hint(self) -> &'static str {
        match self {
            Self::Package => {
                "Use the Ansible 'package' or 'dnf' module:\n     \
                 - name: Install package\n       \
                   package:\n         \
                     name: package-name\n         \
                     state: present"
            }
            Self::Service => {
                "Use the Ansible 'systemd' module:\n     \
                 - name: Enable and start service\n       \
                   systemd:\n         \
                     name: service-name\n         \
                     state: started\n         \
                     enabled: yes"
            }
            Self::Config => {
                "Use the Ansible 'dconf', 'command', or 'blockinfile' module:\n     \
                 - name: Configure GNOME setting\n       \
                   dconf:\n         \
                     key: /org/gnome/desktop/path\n         \
                     value: \"'value'\""
            }
            Self::Account => {
                "Use the Ansible 'user' or 'group' module:\n     \
                 - name: Create user\n       \
                   user:\n         \
                     name: username\n         \
                     state: present"
            }
            Self::Other => "Use the matching Ansible module, or 'command' with proper handlers",
        }
    }
}

/// Keeps system state under version control: package, service, desktop
/// setting and account changes must be made by an Ansible playbook
pub struct AnsibleEnforcementHandler;

impl AnsibleEnforcementHandler {
    fn is_forbidden(command: &str) -> bool {
        let unquoted = QUOTED.replace_all(command, "''");
        FORBIDDEN_PATTERNS
            .iter()
            .any(|pattern| pattern.is_match(&unquoted))
    }
}

#[async_trait]
impl Handler for AnsibleEnforcementHandler {
    fn name(&self) -> &str {
        "enforce-ansible-deployment"
    }

    fn priority(&self) -> u8 {
        10
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Safety
    }

    fn matches(&self, event: &Event) -> bool {
        bash_command(event).is_some_and(Self::is_forbidden)
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let command = bash_command(event).unwrap_or_default();
        let hint = CommandKind::of(command).playbook_hint();

        Ok(Decision::deny(format!(
            "❌ BLOCKED: Direct system management commands are not allowed.\n\n\
             Command: {command}\n\n\
             This command modifies system state outside of version control. \
             Manual changes drift and cannot be reproduced on a fresh install.\n\n\
             ✓ CORRECT APPROACH:\n\
             1. Create or update a playbook in playbooks/imports/\n\
             2. {hint}\n\
             3. Run the playbook:\n   \
                ansible-playbook playbooks/imports/[playbook-name].yml\n\n\
             ✓ ALLOWED (read-only queries):\n  \
               - dnf info/list/search, rpm -q\n  \
               - systemctl status, systemctl --user\n  \
               - gsettings get, dconf read\n  \
               - flatpak list"
        )))
    }
}
