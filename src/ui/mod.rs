// Wed Jan 15 2026 - Alex

pub mod cli;

pub use cli::{Args, Command, CommandHandler};

use colored::Colorize;

pub fn print_banner() {
    println!("{}", "Lua Deobfuscator".cyan().bold());
    println!("{}", "=".repeat(40).cyan());
}

pub fn print_info(message: &str) {
    println!("{} {}", "[INFO]".cyan(), message);
}

pub fn print_success(message: &str) {
    println!("{} {}", "[OK]".green(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "[WARN]".yellow(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red(), message);
}
