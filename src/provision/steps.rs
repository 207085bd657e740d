// file: src/provision/steps.rs
// version: 1.0.0
// guid: c8f2a6d4-1e9b-4750-b3c8-76e0d5a92f18

//! The fixed remote step sequence
//!
//! Commands are defined as data so tests can assert the transcript an
//! install produces without a live host.

/// Provisioning steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connect,
    Preflight,
    IdempotencyCheck,
    Install,
    Verify,
    ExtractCredentials,
}

impl Step {
    /// Get the step as a string for structured events
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Connect => "connect",
            Step::Preflight => "preflight",
            Step::IdempotencyCheck => "idempotency_check",
            Step::Install => "install",
            Step::Verify => "verify",
            Step::ExtractCredentials => "extract_credentials",
        }
    }
}

/// Pre-flight: the installer pipe needs wget and a systemd target
pub const PREFLIGHT: &str = "command -v wget >/dev/null 2>&1 && command -v systemctl >/dev/null 2>&1";

/// Idempotency probe: exit 0 when the panel is already installed.
/// Checks the CLI binary, the install tree, and the service.
pub const ALREADY_INSTALLED: &str = "which fastpanel >/dev/null 2>&1 \
    || test -d /usr/local/fastpanel2 \
    || systemctl is-active --quiet fastpanel2";

/// Post-install verification: the panel service must be up, or at least the
/// CLI present for older installer versions that do not register a unit
pub const VERIFY: &str =
    "systemctl is-active --quiet fastpanel2 || which fastpanel >/dev/null 2>&1";

/// Panel version probe
pub const VERSION: &str = "fastpanel --version 2>/dev/null || echo unknown";

/// Known locations of the generated admin password on disk, tried in order
/// when the installer output carried no marker line
pub const PASSWORD_FILES: &[&str] = &[
    "/usr/local/fastpanel/conf/admin.passwd",
    "/root/.fastpanel_password",
    "/etc/fastpanel/admin.password",
];

/// Last-resort password recovery: rotates the admin password through the
/// panel CLI, which prints the new one. Only run when no password is on
/// file anywhere.
pub const RESET_ADMIN_PASSWORD: &str = "fastpanel admin password reset";

/// Services whose health is reported by a status check
pub const PANEL_SERVICES: &[&str] = &["nginx", "mysql", "php-fpm", "fastpanel"];

/// Build the installer pipe command
pub fn install_command(install_url: &str) -> String {
    format!("wget -qO - {} | bash -", install_url)
}

/// Build the read command for one password fallback location
pub fn read_password_file(path: &str) -> String {
    format!("cat {} 2>/dev/null", path)
}

/// Build the activity probe for one service
pub fn service_active(service: &str) -> String {
    format!("systemctl is-active --quiet {}", service)
}
