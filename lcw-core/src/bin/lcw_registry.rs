//! LCW Registry CLI - inspect and exercise the widget loader configuration
//!
//! Usage:
//!     lcw-registry show
//!     lcw-registry resolve --env uat --agent default
//!     lcw-registry simulate --env dev --agent specialist --fail-primary
//!     lcw-registry context --user-agent "Mozilla/5.0 (iPhone)" --query "?referrer='KHL2'"
//!     lcw-registry validate config/widgets.json
//!     lcw-registry --manifest my-widgets.json show --env dev

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lcw_core::port::RecordingScriptPort;
use lcw_core::{
    AgentType, ConfigRegistry, Environment, LoadRecovery, LoaderManifest, ScriptElement,
    ScriptSource, VisitorContext, VisitorState, WidgetLifecycleManager,
};

#[derive(Parser, Debug)]
#[command(name = "lcw-registry")]
#[command(about = "Inspect and simulate the live chat widget loader")]
#[command(version)]
struct Args {
    /// Path to a loader manifest (default: built-in manifest)
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the agent availability matrix
    Show {
        /// Only this environment
        #[arg(long)]
        env: Option<Environment>,
    },

    /// Print the script element a selection would inject
    Resolve {
        #[arg(long)]
        env: Environment,

        #[arg(long)]
        agent: String,

        /// Render the fallback source instead of the primary
        #[arg(long)]
        fallback: bool,
    },

    /// Run the lifecycle against a recording page and print the outcome
    Simulate {
        #[arg(long)]
        env: Environment,

        /// Agent to select after the environment switch
        #[arg(long)]
        agent: Option<String>,

        /// Report a load failure for the primary source
        #[arg(long)]
        fail_primary: bool,

        /// Report a load failure for the fallback source as well
        #[arg(long, requires = "fail_primary")]
        fail_fallback: bool,
    },

    /// Print the visitor context a page would register
    Context {
        #[arg(long)]
        user_agent: String,

        /// Page query string, e.g. "?referrer=KHL2"
        #[arg(long, default_value = "")]
        query: String,

        #[arg(long, default_value_t = 0)]
        touch_points: u32,

        /// Visitor IP, as the IP lookup would report it
        #[arg(long)]
        ip: Option<String>,
    },

    /// Load and validate a manifest file
    Validate { path: PathBuf },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lcw_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Command::Validate { path } = &args.command {
        match LoaderManifest::from_path(path) {
            Ok(manifest) => {
                let agents: usize = manifest.environments.iter().map(|e| e.agents.len()).sum();
                println!(
                    "{}: OK ({} environments, {} agent entries, default '{}')",
                    path.display(),
                    manifest.environments.len(),
                    agents,
                    manifest.default_environment
                );
                return;
            }
            Err(e) => fail(&format!("{}: {}", path.display(), e)),
        }
    }

    let manifest = match load_manifest(&args.manifest) {
        Ok(m) => m,
        Err(e) => fail(&format!("Error loading manifest: {}", e)),
    };
    let registry = match ConfigRegistry::from_manifest(&manifest) {
        Ok(r) => r,
        Err(e) => fail(&format!("Error building registry: {}", e)),
    };

    match args.command {
        Command::Show { env } => output_matrix(&registry, env),
        Command::Resolve { env, agent, fallback } => {
            let agent = AgentType::new(agent);
            match registry.require_config(env, &agent) {
                Ok(config) => {
                    let source = if fallback {
                        ScriptSource::Fallback
                    } else {
                        ScriptSource::Primary
                    };
                    if !registry.is_available(env, &agent) {
                        eprintln!("note: '{}' is not available in '{}'", agent, env);
                    }
                    println!("{}", ScriptElement::from_config(config, source).to_html());
                }
                Err(e) => fail(&e.to_string()),
            }
        }
        Command::Simulate {
            env,
            agent,
            fail_primary,
            fail_fallback,
        } => simulate(registry, env, agent, fail_primary, fail_fallback),
        Command::Context {
            user_agent,
            query,
            touch_points,
            ip,
        } => {
            let mut state = VisitorState::from_page(&user_agent, touch_points, &query, &manifest.visitor);
            state.set_ip(ip);
            match VisitorContext::from_state(&state).to_json() {
                Ok(json) => println!("{}", json),
                Err(e) => fail(&e.to_string()),
            }
        }
        Command::Validate { .. } => {}
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn load_manifest(path: &Option<PathBuf>) -> lcw_core::Result<LoaderManifest> {
    match path {
        Some(p) => LoaderManifest::from_path(p),
        None => LoaderManifest::builtin(),
    }
}

fn output_matrix(registry: &ConfigRegistry, only: Option<Environment>) {
    for env in registry.environments() {
        if only.is_some_and(|o| o != env) {
            continue;
        }
        let marker = if env == registry.default_environment() {
            " (default)"
        } else {
            ""
        };
        println!("{}{}", env, marker);
        for row in registry.availability(env) {
            println!(
                "  {:<12} {}",
                row.agent.as_str(),
                if row.available { "available" } else { "unavailable" }
            );
        }
    }
}

fn simulate(
    registry: ConfigRegistry,
    env: Environment,
    agent: Option<String>,
    fail_primary: bool,
    fail_fallback: bool,
) {
    let mut port = RecordingScriptPort::new();
    port.render_widget(&registry.teardown().sdk_namespace);
    let mut manager = WidgetLifecycleManager::new(Arc::new(registry), port);

    let mut ticket = match manager.select_environment(env) {
        Ok(selection) => selection.ticket,
        Err(e) => {
            eprintln!("select_environment: {}", e);
            None
        }
    };

    if let Some(agent) = agent {
        match manager.select_agent(&AgentType::new(agent)) {
            Ok(t) => ticket = Some(t),
            Err(e) => eprintln!("select_agent: {}", e),
        }
    }

    if fail_primary {
        if let Some(t) = ticket.take() {
            match manager.handle_load_failure(&t) {
                Ok(LoadRecovery::FallbackInjected(next)) => ticket = Some(next),
                Ok(LoadRecovery::Ignored) => {}
                Err(e) => eprintln!("primary failure: {}", e),
            }
        }
    }
    if fail_fallback {
        if let Some(t) = ticket.take() {
            if let Err(e) = manager.handle_load_failure(&t) {
                eprintln!("fallback failure: {}", e);
            }
        }
    }

    println!("environment: {}", manager.current_environment());
    println!(
        "agent: {}",
        manager.current_agent().map(|a| a.as_str()).unwrap_or("(none)")
    );
    println!("scripts:");
    for script in manager.port().scripts() {
        println!("  {}", script.to_html());
    }
    println!("diagnostics:");
    for entry in manager.diagnostics().entries() {
        println!(
            "  [{:?}] {:?}: {}",
            entry.level, entry.kind, entry.message
        );
    }
}
