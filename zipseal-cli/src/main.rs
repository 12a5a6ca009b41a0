//! ZipSeal CLI - ZIP archive password management.
//!
//! Detect encryption, verify passwords, and rotate (add/remove/change)
//! archive passwords with atomic replacement of the file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use zipseal_archive::{fs, query, rotate};
use zipseal_core::Result;

#[derive(Parser)]
#[command(name = "zipseal")]
#[command(author, version, about = "ZIP archive password management")]
#[command(long_about = "
ZipSeal inspects and rewrites password protection on ZIP archives.

Examples:
  zipseal show archive.zip
  zipseal verify archive.zip secret
  zipseal lock archive.zip secret
  zipseal unlock archive.zip secret
  zipseal zip notes.txt secret
  zipseal unzip archive.zip secret
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries and their encryption schemes
    Show {
        /// Archive to inspect
        zipfile: PathBuf,
    },

    /// Check a password against an archive, printing "success" or "fail"
    Verify {
        /// Archive to check
        zipfile: PathBuf,

        /// Candidate password
        password: String,
    },

    /// Add password protection to an archive
    Lock {
        /// Archive to protect
        zipfile: PathBuf,

        /// New password
        password: String,
    },

    /// Remove password protection from an archive
    Unlock {
        /// Archive to unprotect
        zipfile: PathBuf,

        /// Current password
        password: String,
    },

    /// Create an encrypted archive from a file or directory
    Zip {
        /// File or directory to archive
        file: PathBuf,

        /// Password for the new archive
        password: String,
    },

    /// Extract an archive beside itself
    Unzip {
        /// Archive to extract
        zipfile: PathBuf,

        /// Password of the archive
        password: String,
    },
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Show { zipfile } => {
            println!("{}", query::describe_encryption(&zipfile));
        }
        Commands::Verify { zipfile, password } => {
            if query::verify_password(&zipfile, &password) {
                println!("success");
            } else {
                println!("fail");
                return Ok(1);
            }
        }
        Commands::Lock { zipfile, password } => {
            rotate::add_password(&zipfile, &password)?;
        }
        Commands::Unlock { zipfile, password } => {
            rotate::remove_password(&zipfile, &password)?;
        }
        Commands::Zip { file, password } => {
            let archive = fs::compress_path(&file, None, &password)?;
            println!("{}", archive.display());
        }
        Commands::Unzip { zipfile, password } => {
            fs::extract_all(&zipfile, None, &password)?;
        }
    }
    Ok(0)
}
