use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use colab_roster::db::{Db, QueryBuilder};
use colab_roster::{
    AuthConfig, AuthExtractor, CallerContext, EnrollmentQuery, RosterSeed, ServiceConfig,
};

// rmcp imports for MCP stdio server mode
use rmcp::service::ServiceExt;
use rmcp::transport::stdio;

#[derive(Parser)]
#[command(name = "colab-roster")]
#[command(about = "Read-only course enrollment service (REST and MCP)")]
struct Cli {
    /// Service config file (colab.json)
    #[arg(long, global = true, env = "COLAB_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct DbArgs {
    /// Database URL; overrides the config file and SURREALDB_URL
    #[arg(long)]
    db_url: Option<String>,
    /// Roster JSON to import before serving (useful with `memory`)
    #[arg(long)]
    seed: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct AuthArgs {
    /// Allow unauthenticated callers. Defaults to true only when no API key
    /// source is configured.
    #[arg(long, action = clap::ArgAction::Set)]
    allow_anonymous: Option<bool>,
    /// Static API key
    #[arg(long, env = "COLAB_API_KEY")]
    api_key: Option<String>,
    /// Enable database-backed API key lookup
    #[arg(long, default_value_t = false)]
    enable_db_api_keys: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST server
    Server {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[command(flatten)]
        db: DbArgs,
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Run as an MCP stdio server (for use in mcp.json)
    McpStdio {
        #[command(flatten)]
        db: DbArgs,
    },
    /// Run as an MCP HTTP server
    McpHttp {
        /// Bind address, e.g. 0.0.0.0:3942
        #[arg(long, default_value = "0.0.0.0:3942")]
        bind: String,
        #[command(flatten)]
        db: DbArgs,
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Initialize the database
    Init {
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Import a roster JSON document
    Import {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        db_url: Option<String>,
    },
    /// List the users enrolled in a course
    ListUsers {
        course_id: i64,
        #[arg(long)]
        role: Option<String>,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Count the users enrolled in a course
    CountUsers {
        course_id: i64,
        #[arg(long)]
        role: Option<String>,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Create a new API key
    CreateApiKey {
        /// Human-readable name for this key
        #[arg(long)]
        name: Option<String>,
        /// Number of days until the key expires (omit for no expiration)
        #[arg(long)]
        expires_days: Option<u32>,
        /// Comma-separated capabilities for this key (default: course:view)
        #[arg(long)]
        scopes: Option<String>,
        #[arg(long)]
        db_url: Option<String>,
    },
    /// List all API keys
    ListApiKeys {
        #[arg(long)]
        db_url: Option<String>,
        /// Show only active keys
        #[arg(long, default_value_t = false)]
        active_only: bool,
    },
    /// Revoke an API key by its prefix
    RevokeApiKey {
        /// The key prefix to revoke (e.g., "cr_abc12345")
        key_prefix: String,
        #[arg(long)]
        db_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the MCP stdio transport
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("colab_roster=info".parse()?)
                .add_directive("rmcp=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Server { bind, db, auth } => {
            let db = open_db(&config, &db).await?;
            let service = colab_roster::create_service(db.clone(), &config);
            let auth = Arc::new(AuthExtractor::new(build_auth_config(&config, auth), db));

            let state = colab_roster::api::ApiState::new(service, auth);
            let app = colab_roster::api::create_router(Arc::new(state));

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("REST server listening on http://{}", bind);
            axum::serve(listener, app).await?;
        }
        Commands::McpStdio { db } => {
            let db = open_db(&config, &db).await?;
            let server = colab_roster::create_server(db, &config);

            // Run as an MCP stdio server. McpServer implements ServerHandler.
            let service = server
                .as_ref()
                .clone()
                .serve(stdio())
                .await
                .inspect_err(|e| tracing::error!("serving error: {:?}", e))?;

            // Block until the MCP session ends.
            service.waiting().await?;
            info!("MCP stdio server session ended");
        }
        Commands::McpHttp { bind, db, auth } => {
            let db = open_db(&config, &db).await?;
            let service = colab_roster::create_service(db.clone(), &config);
            let registry = colab_roster::create_tool_registry(service);
            let auth = Arc::new(AuthExtractor::new(build_auth_config(&config, auth), db));

            colab_roster::server::start_mcp_http(registry, auth, &bind).await?;
        }
        Commands::Init { db_url } => {
            info!("Initializing database...");
            connect(&config, db_url).await?;
            info!("Database initialized successfully");
        }
        Commands::Import { file, db_url } => {
            let db = connect(&config, db_url).await?;
            let seed = RosterSeed::from_file(&file)?;
            let summary = colab_roster::db::import(&db, &seed).await?;
            println!(
                "Imported {} courses, {} users, {} enrolments, {} role assignments, {} profile values",
                summary.courses,
                summary.users,
                summary.enrolments,
                summary.role_assignments,
                summary.profile_values
            );
        }
        Commands::ListUsers {
            course_id,
            role,
            db,
        } => {
            let db = open_db(&config, &db).await?;
            let service = colab_roster::create_service(db, &config);
            let query = EnrollmentQuery::new(course_id, role.as_deref());

            let users = service
                .list_enrolled_users(&CallerContext::local_operator(), &query)
                .await?;
            println!("{}", serde_json::to_string_pretty(&users)?);
        }
        Commands::CountUsers {
            course_id,
            role,
            db,
        } => {
            let db = open_db(&config, &db).await?;
            let service = colab_roster::create_service(db, &config);
            let query = EnrollmentQuery::new(course_id, role.as_deref());

            let count = service
                .count_enrolled_users(&CallerContext::local_operator(), &query)
                .await?;
            println!("{}", count);
        }
        Commands::CreateApiKey {
            name,
            expires_days,
            scopes,
            db_url,
        } => {
            let db = connect(&config, db_url).await?;

            // Generate a new API key
            let (full_key, prefix, key_hash) = colab_roster::generate_api_key();

            // Calculate expiration if specified
            let expires_at = expires_days.map(|days| {
                let duration = chrono::Duration::days(days as i64);
                chrono::Utc::now() + duration
            });

            let scopes_vec = scopes
                .map(|s| {
                    s.split(',')
                        .map(|scope| scope.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_else(|| vec![config.required_capability.as_str().to_string()]);

            let api_key_create = colab_roster::db::ApiKeyCreate {
                key_hash,
                key_prefix: prefix.clone(),
                name: name.clone(),
                expires_at: expires_at.map(surrealdb::sql::Datetime::from),
                scopes: Some(scopes_vec.clone()),
            };

            QueryBuilder::create_api_key(&db, &api_key_create).await?;

            println!("API Key created successfully!");
            println!();
            println!("  Key:     {}", full_key);
            println!("  Prefix:  {}", prefix);
            if let Some(n) = &name {
                println!("  Name:    {}", n);
            }
            println!("  Scopes:  {}", scopes_vec.join(", "));
            if let Some(exp) = expires_at {
                println!("  Expires: {}", exp.format("%Y-%m-%d %H:%M:%S UTC"));
            } else {
                println!("  Expires: Never");
            }
            println!();
            println!("IMPORTANT: Save this key now. It cannot be retrieved later.");
            println!("Use with: -H 'X-API-Key: {}'", full_key);
        }
        Commands::ListApiKeys {
            db_url,
            active_only,
        } => {
            let db = connect(&config, db_url).await?;

            let api_keys = if active_only {
                QueryBuilder::list_active_api_keys(&db).await?
            } else {
                QueryBuilder::list_api_keys(&db).await?
            };

            if api_keys.is_empty() {
                println!("No API keys found.");
                return Ok(());
            }

            println!(
                "{:<20} {:<20} {:<10} {:<25} {:<25}",
                "PREFIX", "NAME", "STATUS", "CREATED", "LAST USED"
            );
            println!("{}", "-".repeat(100));

            for key in api_keys {
                let status = if key.is_active { "Active" } else { "Revoked" };
                let name = key.name.unwrap_or_else(|| "-".to_string());
                let created = key
                    .created_at
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let last_used = key
                    .last_used_at
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "Never".to_string());

                println!(
                    "{:<20} {:<20} {:<10} {:<25} {:<25}",
                    key.key_prefix, name, status, created, last_used
                );
            }
        }
        Commands::RevokeApiKey { key_prefix, db_url } => {
            let db = connect(&config, db_url).await?;

            let revoked = QueryBuilder::deactivate_api_key_by_prefix(&db, &key_prefix).await?;

            if revoked {
                println!("API key '{}' has been revoked.", key_prefix);
            } else {
                println!("No API key found with prefix '{}'.", key_prefix);
            }
        }
    }

    Ok(())
}

/// Connect using the config file's database section, with `db_url`
/// taking precedence, and make sure the schema exists.
async fn connect(config: &ServiceConfig, db_url: Option<String>) -> Result<Db> {
    let mut db_config = config.database_config();
    if let Some(url) = db_url {
        db_config.url = url;
    }
    info!("Using database url: {}", db_config.url);

    let db = colab_roster::create_connection(db_config).await?;
    colab_roster::ensure_schema(&db).await?;
    Ok(db)
}

/// Connect and import the optional seed roster.
async fn open_db(config: &ServiceConfig, args: &DbArgs) -> Result<Db> {
    let db = connect(config, args.db_url.clone()).await?;
    if let Some(path) = &args.seed {
        let seed = RosterSeed::from_file(path)?;
        colab_roster::db::import(&db, &seed).await?;
    }
    Ok(db)
}

/// Build authentication configuration from CLI arguments.
fn build_auth_config(config: &ServiceConfig, args: AuthArgs) -> AuthConfig {
    let auth = config.network_auth(args.api_key, args.enable_db_api_keys, args.allow_anonymous);

    if auth.api_key.is_some() {
        info!("Static API key authentication enabled");
    }
    if auth.db_api_keys_enabled {
        info!("Database-backed API key authentication enabled");
    }
    if auth.allow_anonymous {
        info!("Anonymous access enabled");
    }

    if auth.api_key.is_none() && !auth.db_api_keys_enabled && !auth.allow_anonymous {
        tracing::warn!(
            "No authentication method configured and anonymous access disabled - all requests will be rejected"
        );
    }

    auth
}
