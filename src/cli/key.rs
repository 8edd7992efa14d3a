//! Keyring management commands

use std::error::Error;
use std::io::{self, Write};

use crate::core::secrets::{ApiKeyStore, API_KEY_ENV};

pub fn set_key(store: &ApiKeyStore) -> Result<(), Box<dyn Error>> {
    print!("Enter API key: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let key = input.trim();
    if key.is_empty() {
        eprintln!("❌ No key entered");
        std::process::exit(1);
    }

    store.set_key(key)?;
    println!("✅ API key stored in system keyring");
    if std::env::var_os(API_KEY_ENV).is_some() {
        println!("⚠️  {API_KEY_ENV} is set and takes precedence over the keyring");
    }
    Ok(())
}

pub fn clear_key(store: &ApiKeyStore) -> Result<(), Box<dyn Error>> {
    if store.remove_key()? {
        println!("✅ API key removed from system keyring");
    } else {
        println!("No API key was stored");
    }
    Ok(())
}
