// ABOUTME: One-shot assistant commands: health check, frame analysis and questions
// ABOUTME: Photos are read from disk and sent base64-encoded

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use colored::*;
use droneguide_ai::{AssemblyAnalysis, VoiceAnswer};
use droneguide_client::Channel;

use super::session::Session;

fn encode_image(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Cannot read image {}: {}", path.display(), e))?;
    if bytes.is_empty() {
        return Err(format!("Image {} is empty", path.display()).into());
    }
    Ok(STANDARD.encode(bytes))
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{}", title.bold());
    for item in items {
        println!("  • {}", item);
    }
}

pub async fn health(api_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(api_url)?;
    let body = session.api.health().await?;
    println!(
        "{} {} {}",
        "✅".green(),
        body["service"].as_str().unwrap_or("droneguide-api"),
        body["version"].as_str().unwrap_or_default().dimmed()
    );
    println!(
        "   active generations: {}",
        body["activeGenerations"].as_u64().unwrap_or(0)
    );
    Ok(())
}

pub async fn analyze(
    api_url: &str,
    image: &Path,
    step: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(api_url)?;
    let _guard = session.locks.try_acquire(Channel::Analysis)?;
    let encoded = encode_image(image)?;

    let body = session
        .api
        .validate(&encoded, step, Some(session.user_id()), session.project_id())
        .await?;
    let analysis: AssemblyAnalysis = serde_json::from_value(body["analysis"].clone())?;

    let headline = format!("Step {}: {}", step, analysis.status);
    if analysis.can_proceed {
        println!("{}", format!("✅ {}", headline).green().bold());
    } else {
        println!("{}", format!("🔧 {}", headline).yellow().bold());
    }
    if body["meta"]["cacheSource"] == "cache" {
        println!("{}", "(answered from cache)".dimmed());
    }

    println!();
    println!("{}", analysis.feedback);
    if !analysis.progress.is_empty() {
        println!("{} {}", "Progress:".cyan(), analysis.progress);
    }
    print_list("Warnings", &analysis.warnings);
    print_list("Misalignments", &analysis.misalignments);
    print_list("Next steps", &analysis.next_steps);

    if !analysis.identified_components.is_empty() {
        let names: Vec<String> = analysis
            .identified_components
            .iter()
            .map(|c| c.name.clone())
            .collect();
        print_list("Components seen", &names);
    }
    Ok(())
}

pub async fn ask(
    api_url: &str,
    query: &str,
    image: &Path,
    step: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(api_url)?;
    let _guard = session.locks.try_acquire(Channel::Voice)?;
    let encoded = encode_image(image)?;

    let body = session
        .api
        .voice_query(query, &encoded, step, Some(session.user_id()), session.project_id())
        .await?;
    let answer: VoiceAnswer = serde_json::from_value(body["analysis"].clone())?;

    println!("{}", answer.answer);
    if !answer.details.is_empty() {
        println!();
        println!("{}", answer.details.dimmed());
    }
    print_list("Recommendations", &answer.recommendations);
    print_list("Warnings", &answer.warnings);
    Ok(())
}
