//! Terminal output in human or JSON form

use std::io::Write;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Writes command results in the selected format
///
/// Human output uses checkmarks and indented lines. JSON output prints one
/// document per command on stdout; messages go to stderr so that stdout
/// stays parseable.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("\u{2713} {}", message),
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({"success": true, "message": message})
            ),
        }
    }

    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("\u{2717} Error: {}", message),
            OutputFormat::Json => eprintln!(
                "{}",
                serde_json::json!({"success": false, "error": message})
            ),
        }
    }

    pub fn warn(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("\u{26a0} Warning: {}", message),
            OutputFormat::Json => eprintln!(
                "{}",
                serde_json::json!({"level": "warning", "message": message})
            ),
        }
    }

    /// Prints `value` as JSON, or `lines` indented for humans
    pub fn report<I>(&self, value: &serde_json::Value, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        match self.format {
            OutputFormat::Human => {
                for line in lines {
                    println!("  {}", line);
                }
            }
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_default()
            ),
        }
    }

    /// Rewrites the current stderr line with a percentage; humans only
    pub fn progress(&self, label: &str, fraction: f64) {
        if self.is_json() {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        // write errors are ignored
        let _ = write!(stderr, "\r  {} {:>3}%", label, (fraction * 100.0).round() as u32);
        if fraction >= 1.0 {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}
