//! Output formatting utilities

use crate::client::InvokeResponse;
use colored::Colorize;
use std::io::Write;

/// Write the raw response body to stdout
pub fn print_body(response: &InvokeResponse) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&response.body)?;
    if !response.body.ends_with(b"\n") {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message to stderr so stdout stays the response body
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

/// One-line summary of a response's metadata
pub fn describe(response: &InvokeResponse) -> String {
    let mut summary = format!(
        "{} ({})",
        response.status,
        response.content_type.as_deref().unwrap_or("no content type")
    );
    if let Some(trace) = &response.custom_attributes {
        summary.push_str(&format!(" trace={}", trace));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_describe() {
        let response = InvokeResponse {
            status: StatusCode::OK,
            content_type: Some("text/csv".to_string()),
            custom_attributes: Some("abc".to_string()),
            body: b"0.5\n".to_vec(),
        };
        assert_eq!(describe(&response), "200 OK (text/csv) trace=abc");
    }
}
