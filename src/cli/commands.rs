use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::app::{AppContext, CrawlerError, Result};
use crate::cli::LoginArgs;
use crate::domain::{Channel, Credentials, DepthPolicy};
use crate::progress::{EventKind, ProgressStream};
use crate::store::{download_filename, export_json};

/// Resolve the password without ever taking it as a plain argument.
pub fn credentials(login: &LoginArgs) -> Result<Credentials> {
    let password = if login.password_stdin {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        line.trim_end_matches(['\r', '\n']).to_string()
    } else {
        std::env::var(&login.password_env).map_err(|_| {
            CrawlerError::Config(format!(
                "Password not set: export {} or pass --password-stdin",
                login.password_env
            ))
        })?
    };

    if password.is_empty() {
        return Err(CrawlerError::Config("Password is empty".into()));
    }
    Ok(Credentials::new(&login.url, &login.username, password))
}

/// Write events as JSON lines until the stream ends. Returns how many
/// `error` events were seen.
pub async fn relay<W: Write>(mut stream: ProgressStream, out: &mut W) -> Result<usize> {
    let mut errors = 0;
    while let Some(event) = stream.next().await {
        if event.kind == EventKind::Error {
            errors += 1;
        }
        writeln!(out, "{}", event.to_json_line())?;
        out.flush()?;
    }
    Ok(errors)
}

async fn follow(ctx: &AppContext, task_id: &str) -> Result<()> {
    let stream = ctx.orchestrator.subscribe(task_id)?;
    let errors = relay(stream, &mut io::stdout()).await?;
    ctx.orchestrator.registry().wait(task_id).await?;
    ctx.orchestrator.registry().remove(task_id);

    if errors > 0 {
        return Err(CrawlerError::Other(format!(
            "Task {} reported {} error(s)",
            task_id, errors
        )));
    }
    Ok(())
}

pub async fn list_channels(ctx: &AppContext, login: &LoginArgs) -> Result<()> {
    let credentials = credentials(login)?;
    let task_id = ctx.orchestrator.start_enumeration(credentials);
    eprintln!("Task {}", task_id);
    follow(ctx, &task_id).await
}

pub async fn scrape(
    ctx: &AppContext,
    login: &LoginArgs,
    channels: Vec<Channel>,
    depth: DepthPolicy,
) -> Result<()> {
    let credentials = credentials(login)?;
    let task_id = ctx.orchestrator.start_scrape(credentials, channels, depth)?;
    eprintln!("Task {}", task_id);
    follow(ctx, &task_id).await
}

pub fn export(ctx: &AppContext, task_id: &str, output: Option<&Path>) -> Result<PathBuf> {
    let json = export_json(ctx.store.as_ref(), task_id)?;
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(download_filename(task_id)));
    std::fs::write(&path, json)?;
    println!("Wrote {}", path.display());
    Ok(path)
}

pub fn list_results(ctx: &AppContext) -> Result<()> {
    let tasks = ctx.store.list_tasks()?;

    if tasks.is_empty() {
        println!("No stored results");
        return Ok(());
    }

    println!("{:<36}  {:<20}  {:>8}  {:>8}", "TASK", "CREATED", "CHANNELS", "MESSAGES");
    for task in tasks {
        println!(
            "{:<36}  {:<20}  {:>8}  {:>8}",
            task.task_id,
            task.created_at.format("%Y-%m-%d %H:%M:%S"),
            task.channels,
            task.messages
        );
    }
    Ok(())
}

pub fn delete(ctx: &AppContext, task_id: &str) -> Result<()> {
    if !ctx.store.delete_task(task_id)? {
        return Err(CrawlerError::TaskNotFound(task_id.to_string()));
    }
    println!("Deleted results for {}", task_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeLauncher;
    use crate::browser::BrowserSession;
    use crate::config::Config;
    use crate::progress;
    use crate::scraper::ScrapeResult;

    fn context() -> AppContext {
        AppContext::in_memory(Config::default(), BrowserSession::new(FakeLauncher::new())).unwrap()
    }

    #[tokio::test]
    async fn test_relay_writes_json_lines() {
        let (reporter, stream) = progress::channel("t", 16);
        reporter.info("hello");
        reporter.error("boom");
        reporter.end_stream("bye");
        drop(reporter);

        let mut out = Vec::new();
        let errors = relay(stream, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(errors, 1);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"type":"info","content":"hello"}"#);
        assert_eq!(lines[2], r#"{"type":"end_stream","content":"bye"}"#);
    }

    #[test]
    fn test_password_from_environment() {
        let login = LoginArgs {
            url: "https://chat.example.com".into(),
            username: "alice".into(),
            password_env: "KUMO_TEST_PASSWORD_SET".into(),
            password_stdin: false,
        };
        std::env::set_var("KUMO_TEST_PASSWORD_SET", "s3cret");
        let creds = credentials(&login).unwrap();
        assert_eq!(creds.password, "s3cret");
        assert_eq!(creds.username, "alice");
    }

    #[test]
    fn test_missing_password_is_a_config_error() {
        let login = LoginArgs {
            url: "https://chat.example.com".into(),
            username: "alice".into(),
            password_env: "KUMO_TEST_PASSWORD_UNSET".into(),
            password_stdin: false,
        };
        assert!(matches!(credentials(&login), Err(CrawlerError::Config(_))));
    }

    #[tokio::test]
    async fn test_export_and_delete() {
        let ctx = context();
        ctx.store
            .save_results("0123456789abcdef", &[ScrapeResult::new("general")])
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");

        let written = export(&ctx, "0123456789abcdef", Some(&target)).unwrap();
        let body = std::fs::read_to_string(written).unwrap();
        assert!(body.contains("\"channel_name\": \"general\""));

        delete(&ctx, "0123456789abcdef").unwrap();
        assert!(matches!(
            delete(&ctx, "0123456789abcdef"),
            Err(CrawlerError::TaskNotFound(_))
        ));
        assert!(export(&ctx, "0123456789abcdef", Some(&target)).is_err());
    }
}
