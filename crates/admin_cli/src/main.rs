use std::{error::Error, io::Write, sync::Arc};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Amount, Engine, PoolConfig, RequestBridge};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait, Set};

mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub username: String,
        pub password: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[derive(Parser, Debug)]
#[command(name = "relief_admin")]
#[command(about = "Admin utilities for the relief fund (users, pool setup, recovery)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./relief.db?mode=rwc")]
    database_url: String,

    /// Funding requests database, when the server keeps them apart from the
    /// ledger (also read from `REQUESTS_DATABASE_URL`). Defaults to
    /// `--database-url`.
    #[arg(long, env = "REQUESTS_DATABASE_URL")]
    requests_database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn requests_database_url(&self) -> &str {
        self.requests_database_url
            .as_deref()
            .unwrap_or(&self.database_url)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Pool(PoolCmd),
    Requests(Requests),
    /// Replay the ledger logs and report counter mismatches.
    Audit,
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
}

#[derive(Args, Debug)]
struct PoolCmd {
    #[command(subcommand)]
    command: PoolCommand,
}

#[derive(Subcommand, Debug)]
enum PoolCommand {
    Init(PoolInitArgs),
    Show,
}

#[derive(Args, Debug)]
struct PoolInitArgs {
    #[arg(long)]
    admin: String,
    #[arg(long, value_parser = parse_amount)]
    min_donation: Amount,
    #[arg(long, value_parser = parse_amount)]
    withdrawal_limit: Amount,
    #[arg(long, value_parser = parse_amount)]
    auto_ceiling: Option<Amount>,
    /// Minimum seconds between two auto withdrawals of one recipient.
    #[arg(long)]
    auto_cooldown_secs: Option<i64>,
}

#[derive(Args, Debug)]
struct Requests {
    #[command(subcommand)]
    command: RequestsCommand,
}

#[derive(Subcommand, Debug)]
enum RequestsCommand {
    /// Repair requests whose status and ledger grant disagree.
    Reconcile,
}

fn parse_amount(raw: &str) -> Result<Amount, String> {
    raw.parse::<Amount>().map_err(|err| err.to_string())
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let requests_url = cli.requests_database_url().to_string();

    let db = connect_db(&cli.database_url).await?;
    let engine = Arc::new(Engine::builder().database(db.clone()).build().await?);

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let password = prompt_password_twice()?;

            if users::Entity::find_by_id(args.username.clone())
                .one(&db)
                .await?
                .is_some()
            {
                eprintln!("user already exists: {}", args.username);
                std::process::exit(1);
            }

            let user = users::ActiveModel {
                username: Set(args.username.clone()),
                password: Set(password),
            };
            users::Entity::insert(user).exec(&db).await?;

            println!("created user: {}", args.username);
        }
        Command::Pool(PoolCmd {
            command: PoolCommand::Init(args),
        }) => {
            let mut config = PoolConfig::new(args.admin, args.min_donation, args.withdrawal_limit);
            if let Some(ceiling) = args.auto_ceiling {
                config = config.auto_ceiling(ceiling);
            }
            if let Some(secs) = args.auto_cooldown_secs {
                config = config.auto_cooldown_secs(secs);
            }
            let pool = engine.init_pool(config).await?;
            println!("initialized pool, admin: {}", pool.admin);
        }
        Command::Pool(PoolCmd {
            command: PoolCommand::Show,
        }) => {
            let pool = engine.pool().await?;
            println!("admin:            {}", pool.admin);
            println!("balance:          {}", pool.total_balance);
            println!("donated:          {}", pool.total_donated);
            println!("withdrawn:        {}", pool.total_withdrawn);
            println!("min donation:     {}", pool.min_donation);
            println!("withdrawal limit: {}", pool.withdrawal_limit);
            println!("auto ceiling:     {}", pool.auto_ceiling);
            if let Some(cooldown) = pool.auto_cooldown {
                println!("auto cooldown:    {}s", cooldown.num_seconds());
            }
        }
        Command::Requests(Requests {
            command: RequestsCommand::Reconcile,
        }) => {
            let admin = engine.pool().await?.admin;
            let requests_db = if requests_url == cli.database_url {
                db.clone()
            } else {
                connect_db(&requests_url).await?
            };
            let bridge = RequestBridge::builder()
                .engine(engine.clone())
                .database(requests_db)
                .build()
                .await?;
            let report = bridge.reconcile(&admin).await?;
            println!(
                "checked {} requests, marked {} approved, re-granted {}",
                report.checked,
                report.approved.len(),
                report.regranted.len()
            );
        }
        Command::Audit => {
            let report = engine.audit().await?;
            println!(
                "balance {} (replayed {}), {} donors, {} recipients",
                report.total_balance, report.replayed_balance, report.donors, report.recipients
            );
            if report.is_consistent() {
                println!("ledger is consistent");
            } else {
                for mismatch in &report.mismatches {
                    println!("mismatch: {mismatch}");
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_database_defaults_to_ledger_database() {
        let cli = Cli::try_parse_from([
            "relief_admin",
            "--database-url",
            "sqlite:./ledger.db",
            "requests",
            "reconcile",
        ])
        .unwrap();
        assert_eq!(cli.requests_database_url(), "sqlite:./ledger.db");
    }

    #[test]
    fn requests_database_can_be_set_apart() {
        let cli = Cli::try_parse_from([
            "relief_admin",
            "--database-url",
            "sqlite:./ledger.db",
            "--requests-database-url",
            "sqlite:./requests.db",
            "requests",
            "reconcile",
        ])
        .unwrap();
        assert_eq!(cli.database_url, "sqlite:./ledger.db");
        assert_eq!(cli.requests_database_url(), "sqlite:./requests.db");
    }
}
