use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mail_harvest::auth::token_store;
use mail_harvest::config::{
    Config, ConfigOverrides, HarvestConfig, load_config, resolve_db_path,
};
use mail_harvest::mail::imap_client::ImapService;
use mail_harvest::output::JsonLinesWriter;
use mail_harvest::store::sqlite::SqliteCursorStore;
use mail_harvest::{ErrorKind, MailStore};

#[derive(Parser)]
#[command(name = "mail_harvest")]
#[command(about = "Incremental mailbox harvester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest new mail of every user and print it as JSON lines
    Harvest {
        /// User to harvest (repeatable); replaces the configured list
        #[arg(long = "user")]
        users: Vec<String>,

        /// File with one user per line
        #[arg(long)]
        users_file: Option<String>,

        #[arg(long)]
        server: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        admin_user: Option<String>,

        #[arg(long, allow_negative_numbers = true)]
        id_page_size: Option<i64>,

        #[arg(long, allow_negative_numbers = true)]
        item_page_size: Option<i64>,

        /// Cursor database
        #[arg(long)]
        db: Option<String>,

        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Store the admin password in keyring
    SetPassword {
        #[arg(long)]
        user: String,
    },

    /// List stored sync cursors
    Cursors {
        #[arg(long)]
        user: Option<String>,
    },

    /// Forget the cursors of a user so the next harvest starts over
    Reset {
        #[arg(long)]
        user: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetPassword { user } => {
            eprintln!("Paste password (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            token_store::save_admin_password(&user, secret)?;
            println!("Saved password for {}", user);
            Ok(())
        }

        Command::Cursors { user } => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let store = SqliteCursorStore::open(&resolve_db_path(&cfg)?)?;
            for c in store.list(user.as_deref())? {
                println!("{}\t{}\t{}\t{}", c.user, c.folder, c.token, c.updated_epoch);
            }
            Ok(())
        }

        Command::Reset { user } => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let store = SqliteCursorStore::open(&resolve_db_path(&cfg)?)?;
            let n = store.clear_user(&user)?;
            println!("Removed {} cursor(s) of {}", n, user);
            Ok(())
        }

        Command::Harvest {
            users,
            users_file,
            server,
            port,
            admin_user,
            id_page_size,
            item_page_size,
            db,
            limit,
        } => {
            let cfg = load_config()
                .map_err(|e| anyhow!("Configuration error: {e}"))?
                .merge(ConfigOverrides {
                    server,
                    port,
                    admin_user,
                    users,
                    users_file,
                    id_page_size,
                    item_page_size,
                    db_path: db,
                });
            run_harvest(&cfg, limit)
        }
    }
}

fn run_harvest(cfg: &Config, limit: Option<usize>) -> Result<()> {
    let principals = cfg.principals()?;
    if principals.is_empty() {
        bail!("no users to harvest: set `users` in the config or pass --user");
    }

    let cursors = Rc::new(SqliteCursorStore::open(&resolve_db_path(cfg)?)?);
    let password = token_store::resolve_admin_password(&cfg.admin_user)?;
    let service = ImapService::new(&cfg.server, cfg.port, &cfg.admin_user, password)
        .with_excluded_folders(cfg.folders_exclude.clone());

    // Ctrl-C only stops pulling; everything committed so far stays committed
    let running = Arc::new(AtomicBool::new(true));
    let r2 = running.clone();
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
    })?;

    let store = MailStore::new(Rc::new(service), HarvestConfig::from(cfg));
    let mut mail = store.get_mail(principals, cursors);
    let mut writer = JsonLinesWriter::new(std::io::stdout().lock());
    let mut fatal = None;

    while running.load(Ordering::SeqCst) && limit.is_none_or(|n| writer.written() < n) {
        match mail.next() {
            Some(Ok(record)) => writer.write(&record)?,
            Some(Err(e)) => {
                fatal = Some(e);
                break;
            }
            None => break,
        }
    }
    let written = writer.written();
    drop(writer.finish()?);

    let failures = mail.failures();
    eprintln!(
        "Harvested {} record(s); {} user(s) skipped",
        written,
        failures.len()
    );
    for f in &failures {
        eprintln!("  {} ({}): {}", f.user, f.kind, f.message);
    }

    match fatal {
        Some(e) if e.kind() == ErrorKind::Authentication => {
            Err(anyhow!("Authentication rejected: {}", e.detail()))
        }
        Some(e) => Err(anyhow!("Harvest aborted: {}", e.detail())),
        None => Ok(()),
    }
}
