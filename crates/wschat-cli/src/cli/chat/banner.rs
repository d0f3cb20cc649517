//! Session banner shown before connecting.

use console::style;

use wschat_types::protocol::Dialect;

/// Print the endpoint, dialect, and key hints.
pub fn print_session_banner(endpoint: &str, dialect: Dialect) {
    println!();
    println!("  {}", style("wschat").cyan().bold());
    println!();
    println!("  {}  {}", style("Endpoint:").bold(), style(endpoint).dim());
    println!("  {}   {}", style("Dialect:").bold(), style(dialect).dim());
    println!();
    println!(
        "  {}",
        style("Ctrl+D to finish, Ctrl+C to disconnect").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
