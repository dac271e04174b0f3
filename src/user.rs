//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash, auth::Principal};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name shown on the dashboard.
    pub name: String,
    /// The address the user logs in with.
    pub email: String,
    /// An optional URL to the user's avatar.
    pub image: Option<String>,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

impl User {
    /// The identity to seal into a session for this user.
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            image: self.image.clone(),
        }
    }
}

/// The details needed to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// The name shown on the dashboard.
    pub name: String,
    /// The address the user logs in with. Must be unique.
    pub email: String,
    /// An optional URL to the user's avatar.
    pub image: Option<String>,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                image TEXT,
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred, e.g. the email is taken.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (name, email, image, password) VALUES (?1, ?2, ?3, ?4)",
        (
            &new_user.name,
            &new_user.email,
            &new_user.image,
            new_user.password_hash.to_string(),
        ),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        name: new_user.name,
        email: new_user.email,
        image: new_user.image,
        password_hash: new_user.password_hash,
    })
}

fn map_row_to_user(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(4)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        image: row.get(3)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}

/// Get the user registered with `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the email, or [Error::SqlError]
/// if the query failed.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, name, email, image, password FROM user WHERE email = :email")?
        .query_row(&[(":email", email)], map_row_to_user)
        .map_err(|error| error.into())
}
