use std::io::{self, Write};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::{ChatEntry, Role};

const SPINNER_MESSAGE: &str = "Getting response from AI...";

/// What the connection panel shows.
#[derive(Debug, Clone)]
pub struct ConnectionInfo<'a> {
    pub endpoint: &'a str,
    pub model: &'a str,
    pub has_credential: bool,
    pub via_gateway: bool,
    pub entity_id: Option<&'a str>,
}

/// Plain-text renderer for chat entries.
///
/// Shows a spinner between a user entry and the matching assistant entry.
pub struct TerminalRenderer<W: Write> {
    out: W,
    spinner_enabled: bool,
    spinner: Option<ProgressBar>,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            spinner_enabled: true,
            spinner: None,
        }
    }

    pub fn without_spinner(mut self) -> Self {
        self.spinner_enabled = false;
        self
    }

    pub fn into_inner(mut self) -> W {
        self.stop_spinner();
        self.out
    }

    /// Observer hook: print the entry and manage the spinner.
    pub fn on_entry(&mut self, entry: &ChatEntry) -> io::Result<()> {
        self.stop_spinner();
        write!(self.out, "{}", format_entry(entry))?;
        self.out.flush()?;
        if entry.role() == Role::User {
            self.start_spinner();
        }
        Ok(())
    }

    pub fn connection_info(&mut self, info: &ConnectionInfo<'_>) -> io::Result<()> {
        write!(self.out, "{}", format_connection_info(info))?;
        self.out.flush()
    }

    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    fn start_spinner(&mut self) {
        if !self.spinner_enabled {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(SPINNER_MESSAGE);
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

/// Render one entry, including error and threat details.
pub fn format_entry(entry: &ChatEntry) -> String {
    let mut header = format!("── {} · {}", entry.role(), entry.timestamp());
    if let Some(status) = entry.status_code() {
        header.push_str(&format!(" · HTTP {status}"));
    }
    if let Some(latency) = entry.latency_ms() {
        header.push_str(&format!(" · {latency:.0} ms"));
    }

    let mut out = format!("{header}\n{}\n", entry.content());

    if !entry.is_error() {
        out.push('\n');
        return out;
    }

    let threats = entry.threats();
    if !threats.is_empty() {
        out.push_str("  [blocked] Message blocked by security gateway\n");
        out.push_str("  Security threats detected:\n");
        for (idx, threat) in threats.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", idx + 1, threat.display_category()));
            out.push_str(&format!(
                "     Severity: {}   Method: {}\n",
                threat.display_severity(),
                threat.display_method()
            ));
            if let Some(reason) = threat.reason() {
                out.push_str(&format!("     {reason}\n"));
            }
        }
    } else {
        out.push_str(&format!(
            "  [error] {}\n",
            entry.error_message().unwrap_or("Unknown error")
        ));
        if let Some(raw) = entry.raw_data().filter(|raw| !is_empty_json(raw)) {
            let pretty = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
            for line in pretty.lines() {
                out.push_str(&format!("  | {line}\n"));
            }
        }
    }

    out.push('\n');
    out
}

pub fn format_connection_info(info: &ConnectionInfo<'_>) -> String {
    let mut out = String::from("Connection Info\n");
    out.push_str(&format!(
        "  Mode:      {}\n",
        if info.via_gateway { "gateway" } else { "direct" }
    ));
    out.push_str(&format!("  API URL:   {}\n", info.endpoint));
    out.push_str(&format!("  Model:     {}\n", info.model));
    if info.has_credential {
        out.push_str("  API key:   configured\n");
    } else {
        let var = if info.via_gateway {
            "RPROXY_AUTH_HEADER"
        } else {
            "OPENAI_API_KEY"
        };
        out.push_str(&format!("  API key:   not set (use --api-key or set {var})\n"));
    }
    if let Some(id) = info.entity_id {
        out.push_str(&format!("  Entity ID: {id}\n"));
    }
    out
}

fn is_empty_json(value: &serde_json::Value) -> bool {
    value.as_object().is_some_and(|map| map.is_empty())
}
