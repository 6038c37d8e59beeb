use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use registry_core::{ApiError, ContactKind, Registry, RegistryConfig};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pet-registry")]
#[command(about = "Manage pets and tutors in the pet registry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the token pair
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Forget the stored tokens
    Logout,
    /// Show whether a session is stored
    Status,
    #[command(subcommand)]
    Pets(PetCommands),
    #[command(subcommand)]
    Tutors(TutorCommands),
}

#[derive(Subcommand)]
enum PetCommands {
    List {
        #[arg(long, default_value = "0")]
        page: u32,
        #[arg(long, default_value = "10")]
        size: u32,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        breed: Option<String>,
    },
    Show {
        id: i64,
    },
    Create(PetArgs),
    Update {
        id: i64,
        #[command(flatten)]
        pet: PetArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args)]
struct PetArgs {
    #[arg(short, long)]
    name: String,
    #[arg(short, long, default_value = "")]
    breed: String,
    #[arg(short, long)]
    age: Option<u32>,
    /// Image file uploaded after the pet is saved
    #[arg(long)]
    photo: Option<PathBuf>,
}

#[derive(Subcommand)]
enum TutorCommands {
    List {
        #[arg(long, default_value = "0")]
        page: u32,
        #[arg(long, default_value = "10")]
        size: u32,
        #[arg(short, long)]
        name: Option<String>,
    },
    Show {
        id: i64,
    },
    Create(TutorArgs),
    Update {
        id: i64,
        #[command(flatten)]
        tutor: TutorArgs,
    },
    Delete {
        id: i64,
    },
    /// Link a pet to a tutor
    Link {
        tutor_id: i64,
        pet_id: i64,
    },
    /// Remove the link between a pet and a tutor
    Unlink {
        tutor_id: i64,
        pet_id: i64,
    },
}

#[derive(Args)]
struct TutorArgs {
    #[arg(short, long)]
    name: String,
    #[arg(long)]
    cpf: String,
    #[arg(short, long)]
    email: String,
    /// telefone (8 digits) or celular (9 digits)
    #[arg(long, default_value = "celular")]
    contact_kind: ContactKind,
    #[arg(long)]
    phone: String,
    #[arg(short, long)]
    address: String,
    #[arg(long)]
    photo: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RegistryConfig::from_env();
    let registry = Registry::from_config(&config)?;

    match run(&registry, cli.command).await {
        Err(e) if e.downcast_ref::<ApiError>().is_some_and(ApiError::requires_login) => {
            eprintln!("Session expired or missing. Run `pet-registry login` first.");
            std::process::exit(2);
        }
        other => other,
    }
}

async fn run(registry: &Registry, command: Commands) -> Result<()> {
    match command {
        Commands::Login { username, password } => {
            commands::login(registry, &username, &password).await
        }
        Commands::Logout => commands::logout(registry),
        Commands::Status => commands::status(registry),
        Commands::Pets(PetCommands::List {
            page,
            size,
            name,
            breed,
        }) => commands::list_pets(registry, page, size, name, breed).await,
        Commands::Pets(PetCommands::Show { id }) => commands::show_pet(registry, id).await,
        Commands::Pets(PetCommands::Create(pet)) => commands::save_pet(registry, None, pet).await,
        Commands::Pets(PetCommands::Update { id, pet }) => {
            commands::save_pet(registry, Some(id), pet).await
        }
        Commands::Pets(PetCommands::Delete { id }) => {
            registry.pets.remove(id).await?;
            println!("Deleted pet {id}");
            Ok(())
        }
        Commands::Tutors(TutorCommands::List { page, size, name }) => {
            commands::list_tutors(registry, page, size, name).await
        }
        Commands::Tutors(TutorCommands::Show { id }) => commands::show_tutor(registry, id).await,
        Commands::Tutors(TutorCommands::Create(tutor)) => {
            commands::save_tutor(registry, None, tutor).await
        }
        Commands::Tutors(TutorCommands::Update { id, tutor }) => {
            commands::save_tutor(registry, Some(id), tutor).await
        }
        Commands::Tutors(TutorCommands::Delete { id }) => {
            registry.tutors.remove(id).await?;
            println!("Deleted tutor {id}");
            Ok(())
        }
        Commands::Tutors(TutorCommands::Link { tutor_id, pet_id }) => {
            registry.tutors.link_pet(tutor_id, pet_id).await?;
            println!("Linked pet {pet_id} to tutor {tutor_id}");
            Ok(())
        }
        Commands::Tutors(TutorCommands::Unlink { tutor_id, pet_id }) => {
            registry.tutors.unlink_pet(tutor_id, pet_id).await?;
            println!("Unlinked pet {pet_id} from tutor {tutor_id}");
            Ok(())
        }
    }
}
