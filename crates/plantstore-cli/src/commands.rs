use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use plantstore_core::auth::AuthState;
use plantstore_core::models::parse_frequency;
use plantstore_core::utils::truncate_string;
use plantstore_core::{ApiClient, ApiError, Config, Plant, Session};

/// Column width for descriptions in the plant table
const DESCRIPTION_WIDTH: usize = 40;

/// Column width for titles in the plant table
const TITLE_WIDTH: usize = 24;

#[derive(Debug, Parser)]
#[command(name = "plantstore", version, about = "Browse and manage garden plants")]
pub struct Cli {
    /// Server base address, e.g. http://localhost:3001/api/
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored access token
    Logout,
    /// Show whether a session is present
    Status,
    /// List all plants
    List,
    /// Create a plant
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Watering frequency (number)
        #[arg(long)]
        frequency: String,
    },
    /// Replace a plant's fields
    Update {
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        frequency: String,
    },
    /// Delete a plant
    Remove { id: String },
}

pub async fn execute(cli: Cli) -> Result<()> {
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    debug!(base_url = %config.base_url, backend = ?config.credential_backend, "Config loaded");

    let session = Arc::new(Session::from_config(&config)?);
    let client = ApiClient::new(Arc::clone(&session));

    match cli.command {
        Command::Login { email } => login(&mut config, &session, email).await,
        Command::Register { email } => register(&mut config, &session, email).await,
        Command::Logout => {
            let signed_out = session.logout()?;
            println!("Signed out. Continue at {}", signed_out.redirect_to);
            Ok(())
        }
        Command::Status => {
            match session.state() {
                AuthState::Authenticated => match config.last_email {
                    Some(ref email) => println!("Signed in as {}", email),
                    None => println!("Signed in"),
                },
                AuthState::Anonymous => println!("Not signed in"),
            }
            Ok(())
        }
        Command::List => {
            require_login(&session)?;
            let plants = client.list_plants().await?;
            print_plants(&plants);
            Ok(())
        }
        Command::Add {
            title,
            description,
            frequency,
        } => {
            require_login(&session)?;
            validate_plant_form(&title, &description, &frequency)?;
            let plant = client.add_plant(&title, &description, &frequency).await?;
            println!("Plant created successfully! ({})", plant.id().unwrap_or("no id"));
            Ok(())
        }
        Command::Update {
            id,
            title,
            description,
            frequency,
        } => {
            require_login(&session)?;
            validate_plant_form(&title, &description, &frequency)?;
            client
                .update_plant(&id, &title, &description, &frequency)
                .await?;
            println!("Plant {} updated", id);
            Ok(())
        }
        Command::Remove { id } => {
            require_login(&session)?;
            client.remove_plant(&id).await?;
            println!("Plant {} removed", id);
            Ok(())
        }
    }
}

async fn login(config: &mut Config, session: &Session, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ")?;
    if email.trim().is_empty() || password.is_empty() {
        bail!("Please enter all fields.");
    }

    println!("Authenticating...");
    session.login(email.trim(), &password).await?;
    remember_email(config, email.trim());
    println!("Login successful!");
    Ok(())
}

async fn register(config: &mut Config, session: &Session, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_email(None)?,
    };
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm Password: ")?;
    check_registration(&email, &password, &confirm)?;

    session.register(email.trim(), &password).await?;
    remember_email(config, email.trim());
    println!("Registration successful!");
    Ok(())
}

fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match default {
        Some(last) if input.is_empty() => last.to_string(),
        _ => input.to_string(),
    })
}

fn require_login(session: &Session) -> Result<()> {
    if !session.is_authenticated() {
        bail!("Not signed in. Run `plantstore login` first.");
    }
    Ok(())
}

fn check_registration(email: &str, password: &str, confirm: &str) -> Result<()> {
    if email.trim().is_empty() || password.is_empty() || confirm.is_empty() {
        bail!("Please enter all fields.");
    }
    if password != confirm {
        bail!("Passwords do not match.");
    }
    Ok(())
}

/// Form-level checks applied before the request is built
fn validate_plant_form(title: &str, description: &str, frequency: &str) -> Result<()> {
    let mut errors = Vec::new();
    if title.trim().is_empty() {
        errors.push("Title is required".to_string());
    }
    if description.trim().is_empty() {
        errors.push("Description is required".to_string());
    }
    if frequency.trim().is_empty() {
        errors.push("Watering frequency is required".to_string());
    } else {
        match parse_frequency(frequency) {
            Ok(value) if value >= 0.0 => {}
            _ => errors.push("Please enter a valid watering frequency".to_string()),
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors.join("; ")).into());
    }
    Ok(())
}

fn print_plants(plants: &[Plant]) {
    if plants.is_empty() {
        println!("No plants found.");
        return;
    }

    println!(
        "{:<26} {:<w$} {:>6}  {:<13} DESCRIPTION",
        "ID",
        "TITLE",
        "WATER",
        "CREATED",
        w = TITLE_WIDTH
    );
    for plant in plants {
        println!(
            "{:<26} {:<w$} {:>6}  {:<13} {}",
            plant.id().unwrap_or("-"),
            truncate_string(&plant.title, TITLE_WIDTH),
            plant.frequency_display(),
            plant.created_display(),
            truncate_string(&plant.description, DESCRIPTION_WIDTH),
            w = TITLE_WIDTH
        );
    }
}

/// Follow-up advice for errors the user can act on
pub fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<ApiError>()? {
        ApiError::Unauthorized(_) => {
            Some("Your session has expired. Run `plantstore login` to sign in again.")
        }
        ApiError::Network(_) => {
            Some("Unable to connect to server. Check --base-url or PLANTSTORE_BASE_URL.")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantstore_core::api::StatusCode;

    #[test]
    fn test_validate_plant_form() {
        assert!(validate_plant_form("Fern", "Shade", "3").is_ok());
        assert!(validate_plant_form("Fern", "Shade", "0.5").is_ok());

        let err = validate_plant_form("", " ", "-2").expect_err("all fields invalid");
        let msg = err.to_string();
        assert!(msg.contains("Title is required"));
        assert!(msg.contains("Description is required"));
        assert!(msg.contains("valid watering frequency"));

        let err = validate_plant_form("Fern", "Shade", "").expect_err("missing frequency");
        assert!(err.to_string().contains("Watering frequency is required"));
    }

    #[test]
    fn test_check_registration() {
        assert!(check_registration("a@b.com", "pw", "pw").is_ok());
        assert!(check_registration("", "pw", "pw").is_err());
        let err = check_registration("a@b.com", "pw", "other").expect_err("mismatch");
        assert_eq!(err.to_string(), "Passwords do not match.");
    }

    #[test]
    fn test_hint_for() {
        let err: anyhow::Error = ApiError::Unauthorized(String::new()).into();
        assert!(hint_for(&err).is_some_and(|h| h.contains("plantstore login")));

        let err: anyhow::Error = ApiError::Validation("bad".to_string()).into();
        assert_eq!(hint_for(&err), None);

        assert_eq!(hint_for(&anyhow::anyhow!("plain")), None);
    }

    #[test]
    fn test_error_line_shows_server_message() {
        let err: anyhow::Error =
            ApiError::from_status(StatusCode::NOT_FOUND, r#"{"message":"Plant not found"}"#).into();
        assert_eq!(format!("{:#}", err), "Resource not found: Plant not found");
        assert_eq!(hint_for(&err), None);
    }

    #[test]
    fn test_cli_parses_update() {
        let cli = Cli::try_parse_from([
            "plantstore",
            "update",
            "p1",
            "--title",
            "Fern",
            "--description",
            "Shade",
            "--frequency",
            "2",
        ])
        .expect("valid args");
        assert!(matches!(cli.command, Command::Update { ref id, .. } if id == "p1"));
    }
}
