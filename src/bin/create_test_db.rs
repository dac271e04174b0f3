use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use balance_board::{
    Account, AccountId, DashboardMetric, NewUser, PasswordHash, ValidatedPassword, create_user,
    initialize_db, insert_account, insert_dashboard_metric,
};

/// A utility for creating a test database for the balance dashboard server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user test@example.com with the password 'test'...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("test"),
        PasswordHash::DEFAULT_COST,
    )?;
    let user = create_user(
        NewUser {
            name: "Test User".to_owned(),
            email: "test@example.com".to_owned(),
            image: None,
            password_hash,
        },
        &conn,
    )?;

    println!("Creating accounts...");

    let today = OffsetDateTime::now_utc().date();
    let accounts = [
        ("acct-everyday", "Everyday", 1_250.75, "NZD"),
        ("acct-savings", "savings", 12_000.0, "NZD"),
        ("acct-credit", "Credit Card", -420.1, "NZD"),
        ("acct-travel", "Travel", 830.0, "AUD"),
    ];

    for (offset, (id, name, balance, currency)) in accounts.into_iter().enumerate() {
        let account = Account {
            id: AccountId::new(id),
            owner_id: user.id,
            name: name.to_owned(),
            balance,
            currency: currency.to_owned(),
            date: today - Duration::days(offset as i64),
        };
        insert_account(&account, &conn)?;

        for (metric, value) in [
            ("monthly_income", balance.abs() * 0.3),
            ("monthly_spend", balance.abs() * 0.2),
        ] {
            insert_dashboard_metric(
                &account.id,
                &DashboardMetric {
                    name: metric.to_owned(),
                    value,
                },
                &conn,
            )?;
        }
    }

    println!("Success!");

    Ok(())
}
