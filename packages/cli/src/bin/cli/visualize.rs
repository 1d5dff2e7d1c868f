// ABOUTME: Visualization command: start a generation, follow its progress, save the image
// ABOUTME: Ctrl-C stops polling and cancels the task on the server

use std::path::Path;
use std::time::Duration;

use colored::*;
use droneguide_client::{cancel_pair, Channel, GenerationPoller, PollError, PollerConfig};
use indicatif::{ProgressBar, ProgressStyle};

use super::session::Session;

/// Percent bar for one generation
fn progress_bar() -> Result<ProgressBar, indicatif::style::TemplateError> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

pub async fn visualize(
    api_url: &str,
    prompt: &str,
    output: &Path,
    interval_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(api_url)?;
    let _guard = session.locks.try_acquire(Channel::Generation)?;

    let started = session
        .api
        .start_visualization(prompt, Some(session.user_id()), session.project_id())
        .await?;
    println!(
        "{} {}",
        "🎨 Generation started:".green(),
        started.task_id.cyan()
    );

    let (handle, token) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let poller = GenerationPoller::new(
        session.api.clone(),
        PollerConfig {
            interval: Duration::from_secs(interval_secs),
            ..PollerConfig::default()
        },
    );

    let pb = progress_bar()?;
    let outcome = poller
        .poll(&started.task_id, token, |progress, message| {
            pb.set_position(u64::from(progress));
            pb.set_message(message.to_string());
        })
        .await;
    interrupt.abort();
    pb.finish_and_clear();

    match outcome {
        Ok(image) => {
            std::fs::write(output, &image.data)?;
            println!(
                "{} {} ({} bytes)",
                "✅ Saved".green(),
                output.display(),
                image.data.len()
            );
            Ok(())
        }
        Err(PollError::Cancelled) => {
            if let Err(e) = session.api.cancel_visualization(&started.task_id).await {
                eprintln!("{} {}", "Could not cancel on server:".yellow(), e);
            }
            println!("{}", "Generation cancelled".yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_tracks_percent() {
        let pb = progress_bar().unwrap();
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        assert_eq!(pb.length(), Some(100));

        pb.set_position(40);
        assert_eq!(pb.position(), 40);

        pb.finish_and_clear();
        assert!(pb.is_finished());
    }
}
