use clap::Subcommand;
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use droneguide_core::{truncate, Project, ProjectContext};

use super::session::Session;

#[derive(Subcommand)]
pub enum ProjectsCommands {
    /// List your projects
    List,
    /// Start a new project and make it active
    Init {
        /// Kind of drone being built, e.g. "racing quadcopter"
        #[arg(short, long)]
        drone_type: Option<String>,
    },
    /// Switch the active project
    Use {
        /// Project ID to activate
        id: String,
    },
    /// Show what the assistant remembers about the active project
    Show,
}

pub async fn handle_projects_command(
    api_url: &str,
    command: ProjectsCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(api_url)?;
    match command {
        ProjectsCommands::List => list_projects(&session).await,
        ProjectsCommands::Init { drone_type } => init_project(&mut session, drone_type).await,
        ProjectsCommands::Use { id } => {
            session.identity.set_active_project(&id)?;
            println!("{} {}", "✅ Active project:".green(), id.cyan());
            Ok(())
        }
        ProjectsCommands::Show => show_project(&mut session).await,
    }
}

async fn list_projects(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let body = session.api.list_projects(session.user_id()).await?;
    let projects: Vec<Project> = serde_json::from_value(body["projects"].clone())?;

    if projects.is_empty() {
        println!("{}", "No projects found".yellow());
        println!(
            "{}",
            "Use 'droneguide projects init' to start your first build".dimmed()
        );
        return Ok(());
    }

    println!("{}", "🚁 DroneGuide Projects".blue().bold());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["", "ID", "Name", "Drone", "Step", "Parts", "Last active"]);

    let active = session.project_id();
    for project in &projects {
        let marker = if active == Some(project.project_id.as_str()) {
            "*"
        } else {
            ""
        };
        table.add_row(vec![
            marker.to_string(),
            project.project_id.clone(),
            truncate(&project.project_name, 30),
            project.drone_type.clone().unwrap_or_else(|| "-".to_string()),
            project.current_step.to_string(),
            project.components.len().to_string(),
            project
                .last_interaction
                .format("%Y-%m-%d %H:%M")
                .to_string(),
        ]);
    }

    println!("{}", table);
    println!("Total: {} projects", projects.len().to_string().cyan());
    Ok(())
}

async fn init_project(
    session: &mut Session,
    drone_type: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = session.user_id().to_string();
    let body = session
        .api
        .initialize_project(&user_id, drone_type.as_deref())
        .await?;
    let project: Project = serde_json::from_value(body["project"].clone())?;

    session.identity.set_active_project(&project.project_id)?;

    println!(
        "{} {} ({})",
        "✅ Created".green(),
        project.project_name.bold(),
        project.project_id.cyan()
    );
    if let Some(welcome) = body["welcomeMessage"].as_str() {
        println!();
        println!("{}", welcome);
    }
    Ok(())
}

async fn show_project(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
    let Some(project_id) = session.project_id().map(str::to_string) else {
        println!("{}", "No active project".yellow());
        println!(
            "{}",
            "Use 'droneguide projects init' or 'droneguide projects use <id>'".dimmed()
        );
        return Ok(());
    };

    let body = session
        .api
        .project_context(session.user_id(), &project_id)
        .await?;
    let context: ProjectContext = serde_json::from_value(body["context"].clone())?;
    session.identity.cache(&project_id, body["context"].clone())?;

    println!(
        "{}",
        format!("🚁 {} ({})", context.project_name, context.project_id)
            .blue()
            .bold()
    );
    if let Some(drone_type) = &context.drone_type {
        println!("{} {}", "Drone:".cyan(), drone_type);
    }
    println!("{} {}", "Current step:".cyan(), context.current_step);

    println!();
    println!("{}", "Components".bold());
    if context.components.is_empty() {
        println!("  {}", "none identified yet".dimmed());
    }
    for component in &context.components {
        match &component.purpose {
            Some(purpose) => println!("  • {} {}", component.name, format!("({})", purpose).dimmed()),
            None => println!("  • {}", component.name),
        }
    }

    println!();
    println!("{}", "Completed steps".bold());
    if context.completed_steps.is_empty() {
        println!("  {}", "none yet".dimmed());
    }
    for step in &context.completed_steps {
        println!("  ✓ Step {}: {}", step.step_number, step.title);
    }
    Ok(())
}
