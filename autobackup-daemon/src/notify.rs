//! Operator notification over the Telegram Bot API.
//!
//! Strictly best-effort: missing credentials skip delivery, and transport or
//! API failures are logged and swallowed. Nothing here ever changes a run's
//! status or propagates to the orchestrator's callers.

use chrono::Local;

use autobackup_core::types::{BackupRun, RunStatus};
use autobackup_core::Config;

/// Render the fixed notification template for a finalized run.
pub fn format_message(run: &BackupRun) -> String {
    let (glyph, label) = match run.status {
        RunStatus::Success => ("\u{2705}", "succeeded"),
        _ => ("\u{274c}", "failed"),
    };

    let duration = if run.duration_ms > 0 {
        format!("{:.1}s", run.duration_ms as f64 / 1000.0)
    } else {
        "unknown".to_owned()
    };

    let mut text = format!("{glyph} <b>Scheduled backup {label}</b>\n\n");
    text.push_str(&format!("\u{23f1} Took: {duration}\n"));
    text.push_str(&format!("\u{1f4c1} Files changed: {}\n", run.files_changed));

    if !run.commit_hash.is_empty() {
        let short = if run.commit_hash.len() > 7 {
            &run.commit_hash[..7]
        } else {
            run.commit_hash.as_str()
        };
        text.push_str(&format!("\u{1f517} Commit: <code>{short}</code>\n"));
    }

    if run.status == RunStatus::Failed && !run.error_message.is_empty() {
        text.push_str(&format!("\n\u{26a0} Error: {}", run.error_message));
    }

    text.push_str(&format!(
        "\n\u{1f550} {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    text
}

/// Dispatch the run summary, if credentials are configured.
pub fn send_notification(config: &Config, run: &BackupRun) {
    let (Some(token), Some(chat_id)) = (
        config.telegram_bot_token.as_deref(),
        config.telegram_chat_id.as_deref(),
    ) else {
        tracing::info!("telegram notification skipped: no bot token or chat id configured");
        return;
    };

    let text = format_message(run);
    send_telegram(token, chat_id, &text);
}

fn send_telegram(token: &str, chat_id: &str, text: &str) {
    let url = format!("https://api.telegram.org/bot{token}/sendMessage");
    let result = ureq::post(&url).send_form(&[
        ("chat_id", chat_id),
        ("text", text),
        ("parse_mode", "HTML"),
    ]);

    match result {
        Ok(_) => tracing::info!("telegram notification sent"),
        Err(ureq::Error::Status(code, _)) => {
            tracing::warn!(status = code, "telegram notification returned non-success status");
        }
        Err(err) => {
            tracing::warn!(error = %err, "telegram notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn finalized(status: RunStatus) -> BackupRun {
        let mut run = BackupRun::started(Utc::now());
        run.status = status;
        run.finished_at = Some(Utc::now());
        run
    }

    #[test]
    fn success_message_has_glyph_duration_and_short_hash() {
        let mut run = finalized(RunStatus::Success);
        run.duration_ms = 2_340;
        run.files_changed = 5;
        run.commit_hash = "0123456789abcdef0123456789abcdef01234567".into();

        let text = format_message(&run);
        assert!(text.starts_with("\u{2705} <b>Scheduled backup succeeded</b>"));
        assert!(text.contains("Took: 2.3s"));
        assert!(text.contains("Files changed: 5"));
        assert!(text.contains("<code>0123456</code>"), "hash abbreviated to 7 chars");
        assert!(!text.contains("Error:"));
    }

    #[test]
    fn zero_duration_reads_unknown() {
        let run = finalized(RunStatus::Failed);
        let text = format_message(&run);
        assert!(text.contains("Took: unknown"));
    }

    #[test]
    fn failed_message_carries_the_error_detail() {
        let mut run = finalized(RunStatus::Failed);
        run.duration_ms = 500;
        run.error_message = "git push failed".into();

        let text = format_message(&run);
        assert!(text.starts_with("\u{274c} <b>Scheduled backup failed</b>"));
        assert!(text.contains("\u{26a0} Error: git push failed"));
        assert!(!text.contains("Commit:"), "no commit line without a hash");
    }

    #[test]
    fn short_hash_is_kept_verbatim() {
        let mut run = finalized(RunStatus::Success);
        run.commit_hash = "abc12".into();
        assert!(format_message(&run).contains("<code>abc12</code>"));
    }
}
