use std::io::{self, BufRead, Write};

pub mod config;
pub mod format;
pub mod fs;
pub mod preferences;
pub mod router;
pub mod storage;

pub fn read_input(prompt: Option<&str>) -> Result<String, io::Error> {
    if let Some(prompt) = prompt {
        print!("{}", prompt);
        io::stdout().flush()?;
    }

    // Obtain one line and leave off the \n
    io::stdin()
        .lock()
        .lines()
        .next()
        .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed")))
}
