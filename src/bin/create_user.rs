use std::{error::Error, io, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;

use balance_board::{NewUser, PasswordHash, ValidatedPassword, create_user, initialize_db};

/// A utility for registering a user who can log in to the dashboard.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The name shown on the dashboard.
    #[arg(long)]
    name: String,

    /// The email address the user logs in with.
    #[arg(long)]
    email: String,

    /// An optional URL to the user's avatar.
    #[arg(long)]
    image: Option<String>,
}

/// Prompt for a password and add the user to the database.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);
    validate_db_path(db_path);

    println!("Creating user {} <{}>", args.name, args.email);

    let Some(password_hash) = get_password_hash(&[args.name.as_str(), args.email.as_str()]) else {
        return Ok(());
    };

    let connection = Connection::open(db_path)?;
    initialize_db(&connection)?;

    let user = create_user(
        NewUser {
            name: args.name,
            email: args.email,
            image: args.image,
            password_hash,
        },
        &connection,
    )?;

    println!("Created user with ID {}.", user.id);

    Ok(())
}

fn validate_db_path(db_path: &Path) {
    match db_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            print_error("Database path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }
}

/// Ask for a password twice until a strong enough one is entered.
///
/// Returns `None` if stdin is closed or cannot be read.
fn get_password_hash(user_inputs: &[&str]) -> Option<PasswordHash> {
    loop {
        println!();

        let first_password = prompt("Enter a password: ")?;

        let validated_password = match ValidatedPassword::new(&first_password, user_inputs) {
            Ok(password) => password,
            Err(error) => {
                print_error(error);
                continue;
            }
        };

        let second_password = prompt("Enter the same password again: ")?;

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        match PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST) {
            Ok(password_hash) => return Some(password_hash),
            Err(error) => {
                print_error(format!("Could not hash password: {error}. Try again."));
            }
        }
    }
}

fn prompt(message: &str) -> Option<String> {
    match rpassword::prompt_password(message) {
        Ok(password) => Some(password),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

/// From https://crates.io/crates/capitalize
fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
