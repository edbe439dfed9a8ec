/// Router Module Index
///
/// Routes are grouped by the access level the router layer enforces. Finer
/// rules (author ownership, moderator and admin rights) live in the handlers.

/// Anonymous access: reads, signup and token exchange.
pub mod public;

/// Requires a valid token; any role.
pub mod authenticated;

/// Requires a valid token; handlers additionally demand an admin.
pub mod admin;
