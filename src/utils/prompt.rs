//! User prompt utilities using dialoguer

use crate::utils::error::{PartplanError, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Password, Select};

/// Prompt for an encryption passphrase (hidden input, confirmed)
pub fn prompt_passphrase(prompt: &str) -> Result<String> {
    let theme = ColorfulTheme::default();
    Password::with_theme(&theme)
        .with_prompt(prompt)
        .with_confirmation("Confirm passphrase", "Passphrases do not match")
        .interact()
        .map_err(|_| PartplanError::UserCancelled)
}

/// Prompt for yes/no confirmation
pub fn prompt_confirm(prompt: &str, default: bool) -> Result<bool> {
    let theme = ColorfulTheme::default();
    Confirm::with_theme(&theme)
        .with_prompt(prompt)
        .default(default)
        .interact_opt()
        .map_err(|e| PartplanError::Io(std::io::Error::other(e.to_string())))?
        .ok_or(PartplanError::UserCancelled)
}

/// Prompt for selection from a list
pub fn prompt_select<T: ToString>(prompt: &str, items: &[T], default: usize) -> Result<usize> {
    let theme = ColorfulTheme::default();
    Select::with_theme(&theme)
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact_opt()
        .map_err(|e| PartplanError::Io(std::io::Error::other(e.to_string())))?
        .ok_or(PartplanError::UserCancelled)
}

/// Display a warning and ask for confirmation
pub fn warn_confirm(warning: &str) -> Result<bool> {
    println!("\n⚠️  WARNING: {}\n", warning);
    prompt_confirm("Continue?", false)
}
