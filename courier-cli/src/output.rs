use colored::*;
use courier::{OutcomeKind, RunSummary};
use std::path::Path;

/// What `preview` would do with one contact.
pub enum PreviewRow {
    Send {
        position: usize,
        name: String,
        phone: String,
        message: String,
        link: String,
    },
    Skip {
        position: usize,
        name: String,
        reason: String,
    },
}

pub fn print_preview(rows: &[PreviewRow]) {
    println!("{}", "DELIVERY PREVIEW (nothing will be sent)".bold());
    println!("{}", "=".repeat(60));

    let mut sendable = 0;
    for row in rows {
        match row {
            PreviewRow::Send {
                position,
                name,
                phone,
                message,
                link,
            } => {
                sendable += 1;
                println!("\n{} {} {}", format!("#{position}").dimmed(), name.bold(), phone.cyan());
                for line in message.lines() {
                    println!("    {line}");
                }
                println!("    {} {}", "link:".dimmed(), link.dimmed());
            }
            PreviewRow::Skip {
                position,
                name,
                reason,
            } => {
                println!(
                    "\n{} {} {}",
                    format!("#{position}").dimmed(),
                    name.bold(),
                    format!("skipped: {reason}").yellow()
                );
            }
        }
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "{} to send, {} to skip",
        sendable.to_string().green().bold(),
        (rows.len() - sendable).to_string().yellow().bold()
    );
}

pub fn print_summary(summary: &RunSummary, audit_log: &Path) {
    println!("\n{}", "RUN SUMMARY".bold());
    println!("{}", "=".repeat(60));

    for record in &summary.records {
        let status = match record.status {
            OutcomeKind::Success => "SENT   ".green().bold(),
            OutcomeKind::Skipped => "SKIPPED".yellow().bold(),
            OutcomeKind::Failed => "FAILED ".red().bold(),
        };
        if record.reason.is_empty() {
            println!("{status} {}", record.phone);
        } else {
            println!("{status} {} {}", record.phone, record.reason.dimmed());
        }
    }

    println!("{}", "=".repeat(60));
    println!(
        "{} sent, {} skipped, {} failed",
        summary.sent().to_string().green().bold(),
        summary.skipped().to_string().yellow().bold(),
        summary.failed().to_string().red().bold()
    );
    if summary.cancelled {
        println!("{}", "Run was interrupted; remaining contacts were not attempted.".yellow());
    }
    if summary.halted {
        println!(
            "{}",
            "Run halted: the messaging interface appears to have changed. Update the locators.".red()
        );
    }
    println!("Audit log: {}", audit_log.display());
}

pub fn print_check(label: &str, target: &str, result: &Result<String, String>) {
    match result {
        Ok(detail) => println!("{} {label} ({target}) {}", "✓".green(), detail.dimmed()),
        Err(e) => println!("{} {label} ({target}) {}", "✗".red(), e.red()),
    }
}
