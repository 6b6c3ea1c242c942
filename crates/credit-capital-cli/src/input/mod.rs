pub mod file;

use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Read a command's input from `--input <file>`, falling back to piped stdin.
pub fn read_input<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_json(path);
    }
    let missing = || format!("--input <file.json> or stdin required for {}", what);
    if atty::is(atty::Stream::Stdin) {
        return Err(missing().into());
    }
    let mut piped = String::new();
    io::stdin().read_to_string(&mut piped)?;
    if piped.trim().is_empty() {
        return Err(missing().into());
    }
    serde_json::from_str(&piped).map_err(|e| format!("Invalid {} on stdin: {}", what, e).into())
}
