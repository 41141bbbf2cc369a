use anyhow::Context;
use clap::{Parser, Subcommand};

use backoffice_authz::authz::{build_registry, catalog, ensure_permissions_exist, Gate};
use backoffice_authz::bootstrap::{init_tracing, load_env};
use backoffice_authz::config::AuthzConfig;
use backoffice_authz::db;
use backoffice_authz::seed;
use backoffice_authz::store::{RbacStore, SqliteStore};
use backoffice_authz::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "back-office authorization tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    Migrate,
    /// Seed catalog permissions and the reserved roles
    Seed,
    /// Create the five CRUD permissions of a resource if missing
    EnsureCrud {
        resource: String,
        #[arg(long)]
        guard: Option<String>,
    },
    /// Print the permission catalog
    Catalog,
    /// Create or update a super-admin account
    SetupAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    /// Evaluate an ability for a user
    Check {
        #[arg(long)]
        email: String,
        ability: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config = AuthzConfig::from_env().context("invalid authorization settings")?;

    match cli.command {
        Commands::Catalog => {
            for (group, entries) in catalog::list_groups() {
                println!("{group}");
                for (name, label) in entries.iter() {
                    println!("  {name:<28} {label}");
                }
            }
        }
        Commands::Migrate => {
            db::init().await?;
            println!("Migrations applied");
        }
        Commands::Seed => {
            let store = open_store().await?;
            seed::run(&store, &config.guard).await.context("seeding failed")?;
            println!("Seeded permissions and roles for guard `{}`", config.guard);
        }
        Commands::EnsureCrud { resource, guard } => {
            let store = open_store().await?;
            let guard = guard.unwrap_or_else(|| config.guard.clone());
            let permissions = ensure_permissions_exist(&store, &resource, &guard)
                .await
                .with_context(|| format!("could not ensure permissions for `{resource}`"))?;
            for permission in permissions {
                println!("{} ({})", permission.name, permission.guard);
            }
        }
        Commands::SetupAdmin { email, name, password } => {
            let store = open_store().await?;
            let password_hash = hash_password(&password)?;
            let user = seed::setup_super_admin(&store, &config.guard, &email, &name, password_hash)
                .await
                .context("could not set up super-admin")?;
            println!("Super-admin ready: {} <{}>", user.name, user.email);
        }
        Commands::Check { email, ability } => {
            let store = open_store().await?;
            let user = store
                .find_user_by_email(&email)
                .await?
                .with_context(|| format!("no user with email `{email}`"))?;
            let principal = store
                .load_principal(user.user.id, &config.guard)
                .await?
                .with_context(|| format!("user `{email}` disappeared"))?;

            let gate = Gate::new(build_registry(&config.guard, &config.resources)?);
            let decision = gate.check_str(&principal, &ability, None)?;
            match decision.reason() {
                None => println!("{ability}: allowed"),
                Some(reason) => println!("{ability}: denied ({reason})"),
            }
        }
    }

    Ok(())
}

async fn open_store() -> anyhow::Result<SqliteStore> {
    let pool = db::init().await?;
    Ok(SqliteStore::new(pool))
}
