// file: src/provision/marker.rs
// version: 1.0.0
// guid: 0e7c4b92-6f3d-4a18-85c0-d94b2e6f7a31

//! Installer output parser
//!
//! The installer is expected to print a marker line carrying the admin URL
//! and admin password. The format has drifted between installer versions,
//! so the parser accepts the known shapes and reports a miss as absent
//! fields; install success and parse success are independent outcomes.

use regex::Regex;
use std::sync::OnceLock;

/// Credentials recovered from installer output
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedCredentials {
    pub admin_url: Option<String>,
    pub admin_password: Option<String>,
}

fn password_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "Password: xxx", "password:xxx", "Admin password - xxx"
    RE.get_or_init(|| Regex::new(r"(?i)password\s*[:\-]\s*(\S+)").unwrap())
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap())
}

/// Scan installer output for the admin URL and password marker lines
pub fn parse_output(output: &str) -> ParsedCredentials {
    let mut parsed = ParsedCredentials::default();

    for line in output.lines() {
        if parsed.admin_password.is_none() {
            if let Some(caps) = password_regex().captures(line) {
                let candidate = caps[1].trim_end_matches(['.', ',']);
                // Short matches are prose ("password: see docs"), not secrets
                if candidate.len() > 6 {
                    parsed.admin_password = Some(candidate.to_string());
                }
            }
        }
        if parsed.admin_url.is_none() {
            if let Some(m) = url_regex().find(line) {
                parsed.admin_url = Some(m.as_str().trim_end_matches(['.', ',']).to_string());
            }
        }
    }

    parsed
}
