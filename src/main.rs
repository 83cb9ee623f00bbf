//!
//! vybly_admin binary
//! ------------------
//! Command-line frontend for the Vybly admin dashboard: sign in, manage users and
//! circles, and watch the stored session. Settings come from `VYBLY_*` environment
//! variables, overridden by flags.

use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vybly_admin::api::{AdminClient, CircleDraft};
use vybly_admin::config::AdminConfig;
use vybly_admin::dashboard::{CircleBoard, ConfirmPrompt, Overview, UserAction, UserDirectory, DELETE_PROMPT};
use vybly_admin::error::{AppError, AppResult};
use vybly_admin::identity::{
    decode_expiry, GateDecision, RouteGate, SessionAccessor, SessionGuard, StoredProfile, SystemClock,
};
use vybly_admin::login::{LoginFlow, LoginForm};
use vybly_admin::navigation::History;
use vybly_admin::router::{AdminShell, Route, CIRCLES_PATH, DASHBOARD_PATH, USERS_PATH};
use vybly_admin::storage::file::FileStorage;

const USAGE: &str = "vybly_admin\n\nUSAGE:\n  vybly_admin [OPTIONS] <COMMAND>\n\nCOMMANDS:\n  login <email> <password>                 Sign in and store the session\n  logout                                   Clear the stored session\n  status                                   Show the stored session and whether it is usable\n  overview                                 Verified / unverified user counts\n  users                                    List users\n  users soft-delete|promote|demote <id>    Change a user (asks for confirmation)\n  circles                                  List circles\n  circles create <name> <description>\n  circles update <id> <name> <description>\n  circles delete <id>                      Delete a circle (asks for confirmation)\n  watch                                    Keep the session guarded until logout or Ctrl-C\n\nOPTIONS:\n  --api-url URL          Admin API base (env: VYBLY_API_BASE_URL, default http://localhost:5000/api/v1)\n  --session-file PATH    Session store (env: VYBLY_SESSION_FILE, default .vybly/session.json)\n  --interval-ms N        Guard re-check period (env: VYBLY_GUARD_INTERVAL_MS, default 5000)\n  --timeout-ms N         HTTP timeout (env: VYBLY_HTTP_TIMEOUT_MS, default 10000)\n  --yes, -y              Skip confirmation prompts\n  --help, -h             Show this help\n";

const VALUE_FLAGS: [&str; 4] = ["--api-url", "--session-file", "--interval-ms", "--timeout-ms"];

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

// Everything that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let a = args[i].as_str();
        if VALUE_FLAGS.contains(&a) {
            i += 2;
            continue;
        }
        if !a.starts_with('-') {
            out.push(a);
        }
        i += 1;
    }
    out
}

fn confirm(prompt: ConfirmPrompt, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    print!("{} {} [{}/cancel]: ", prompt.title, prompt.text, prompt.confirm_label.to_lowercase());
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    let answer = line.trim().to_lowercase();
    answer == "y" || answer == "yes" || answer == prompt.confirm_label.to_lowercase()
}

struct App {
    session: SessionAccessor,
    store: FileStorage,
    client: Arc<AdminClient>,
    shell: AdminShell,
    assume_yes: bool,
}

impl App {
    /// Route-gate a protected view before touching the API.
    fn enter(&self, path: &str) -> AppResult<Route> {
        match self.shell.open(path)? {
            Route::Login => {
                let reason = match RouteGate::new(self.session.clone()).evaluate() {
                    GateDecision::Deny(r) => r.as_str(),
                    GateDecision::Allow => "session_rejected",
                };
                Err(AppError::auth("not_signed_in".to_string(), format!("sign in as an admin first ({reason})")))
            }
            route => Ok(route),
        }
    }

    async fn login(&self, email: &str, password: &str) -> AppResult<()> {
        let flow = LoginFlow::new(self.client.clone(), self.session.clone());
        let message = flow.submit(&LoginForm::new(email, password)).await?;
        println!("{message}");
        if let Some(StoredProfile::Valid(p)) = self.session.profile() {
            println!("signed in as {} <{}> [{}]", p.name, p.email, p.role);
            if !p.role.is_admin() {
                println!("note: role {} cannot open the dashboard", p.role);
            }
        }
        Ok(())
    }

    fn status(&self) {
        let snap = self.session.snapshot();
        if snap.is_empty() {
            println!("no stored session ({})", self.store.path().display());
            return;
        }
        match snap.access.as_deref().map(decode_expiry) {
            None => println!("access token: missing"),
            Some(Ok(exp)) => {
                let when = chrono::DateTime::from_timestamp(exp as i64, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| exp.to_string());
                println!("access token: expires {when}");
            }
            Some(Err(e)) => println!("access token: unreadable ({e})"),
        }
        println!("refresh token: {}", if snap.refresh.is_some() { "present" } else { "missing" });
        match &snap.profile {
            Some(StoredProfile::Valid(p)) => println!("profile: {} <{}> [{}]", p.name, p.email, p.role),
            Some(StoredProfile::Invalid { error, .. }) => println!("profile: invalid ({error})"),
            None => println!("profile: missing"),
        }
        match RouteGate::new(self.session.clone()).evaluate() {
            GateDecision::Allow => println!("dashboard access: allowed"),
            GateDecision::Deny(r) => println!("dashboard access: denied ({})", r.as_str()),
        }
        // Read-only verdict; `status` never logs anyone out.
        match SessionGuard::new(self.session.clone()).check() {
            Ok(()) => println!("session integrity: ok"),
            Err(f) => println!("session integrity: failing ({f})"),
        }
    }

    async fn overview(&self) -> AppResult<()> {
        let route = self.enter(DASHBOARD_PATH)?;
        let o = Overview::load(self.client.as_ref()).await?;
        println!("{}", route.title());
        println!("  Total Users       {}", o.total);
        println!("  Verified Users    {}", Overview::card(o.verified));
        println!("  Unverified Users  {}", Overview::card(o.unverified));
        Ok(())
    }

    async fn users(&self, rest: &[&str]) -> AppResult<()> {
        self.enter(USERS_PATH)?;
        let actor = self.session.profile().and_then(|p| p.profile().cloned());
        let mut dir = UserDirectory::new(self.client.clone(), actor);
        dir.load().await?;
        match rest {
            [] => {
                println!("{:<26} {:<32} {:<12} {:<8} VERIFIED", "ID", "EMAIL", "ROLE", "ACTIVE");
                for u in dir.users() {
                    println!("{:<26} {:<32} {:<12} {:<8} {}", u.id, u.email, u.role, u.is_active, u.is_profile_verified);
                }
                Ok(())
            }
            [action, id] => {
                let action = UserAction::parse(action)
                    .ok_or_else(|| AppError::user("unknown_action".to_string(), format!("unknown user action '{action}'")))?;
                dir.can(action, id)?;
                if !confirm(action.prompt(), self.assume_yes) {
                    println!("cancelled");
                    return Ok(());
                }
                println!("{}", dir.apply(action, id).await?);
                Ok(())
            }
            _ => Err(AppError::user("usage", "users [soft-delete|promote|demote <id>]")),
        }
    }

    async fn circles(&self, rest: &[&str]) -> AppResult<()> {
        self.enter(CIRCLES_PATH)?;
        let mut board = CircleBoard::new(self.client.clone());
        board.load().await?;
        match rest {
            [] => {
                println!("{:<26} {:<24} DESCRIPTION", "ID", "NAME");
                for c in board.circles() {
                    println!("{:<26} {:<24} {}", c.id, c.name, c.description);
                }
            }
            ["create", name, description] => {
                board.open_create().draft = CircleDraft::new(*name, *description);
                println!("{}", board.submit().await?);
            }
            ["update", id, name, description] => {
                board.open_edit(id)?.draft = CircleDraft::new(*name, *description);
                println!("{}", board.submit().await?);
            }
            ["delete", id] => {
                if !confirm(DELETE_PROMPT, self.assume_yes) {
                    println!("cancelled");
                    return Ok(());
                }
                println!("{}", board.delete(id).await?);
            }
            _ => return Err(AppError::user("usage", "circles [create <name> <description> | update <id> <name> <description> | delete <id>]")),
        }
        Ok(())
    }

    async fn watch(&self) -> AppResult<()> {
        self.enter(DASHBOARD_PATH)?;
        let watcher = self.store.watch(Duration::from_millis(500));
        println!("guarding session in {} (Ctrl-C to stop)", self.store.path().display());
        let ended = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break false,
                _ = tokio::time::sleep(Duration::from_millis(250)) => {
                    if !self.shell.is_guarded() { break true; }
                }
            }
        };
        watcher.abort();
        self.shell.close();
        if ended {
            println!("session ended: forced logout after {} checks", self.shell.guard().checks_run());
        }
        Ok(())
    }
}

async fn run(app: &App, cmd: &[&str]) -> AppResult<()> {
    match cmd {
        ["login", email, password] => app.login(email, password).await,
        ["logout"] => {
            app.shell.logout();
            println!("You have been logged out");
            Ok(())
        }
        ["status"] | [] => {
            app.status();
            Ok(())
        }
        ["overview"] | ["dashboard"] => app.overview().await,
        ["users", rest @ ..] => app.users(rest).await,
        ["circles", rest @ ..] => app.circles(rest).await,
        ["watch"] => app.watch().await,
        _ => Err(AppError::user("usage".to_string(), format!("unknown command; see --help\n\n{USAGE}"))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();

    let args: Vec<String> = env::args().skip(1).collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    let config = AdminConfig::from_env().apply_args(&args);
    config.validate()?;
    info!(api = %config.api_base(), session_file = %config.session_file.display(), "vybly_admin starting");

    let store = FileStorage::open(&config.session_file)?;
    let history = Arc::new(History::starting_at("/"));
    let session = SessionAccessor::new(Arc::new(store.clone()), history).with_login_path(&config.login_path);
    let client = Arc::new(AdminClient::new(&config, session.clone())?);
    let shell = AdminShell::new(session.clone(), Arc::new(SystemClock), config.check_interval);
    let app = App { session, store, client, shell, assume_yes: has_flag(&args, "--yes") || has_flag(&args, "-y") };

    let cmd = positional(&args);
    if let Err(e) = run(&app, &cmd).await {
        eprintln!("error: {}", e.message());
        std::process::exit(if e.is_auth() { 2 } else { 1 });
    }
    Ok(())
}
