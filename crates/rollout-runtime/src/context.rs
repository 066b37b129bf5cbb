//! Terminal helpers shared by the subcommands.

use std::io::IsTerminal;

/// Resolve --color flag to bool.
pub fn resolve_color(color: &str) -> bool {
    match color {
        "always" => true,
        "never" => false,
        _ => std::io::stdout().is_terminal(),
    }
}

/// Whether `watch` may redraw in place.
pub fn can_redraw() -> bool {
    std::io::stdout().is_terminal()
}
