//! Identifiers of the built-in upstream providers.

/// Sansekai, path-style endpoints.
pub const PRIMARY: &str = "api_primary";

/// Gimita, `?action=` query-style endpoints.
pub const SECONDARY: &str = "api_secondary";

/// Dramabos, page-in-path endpoints.
pub const BACKUP1: &str = "api_backup1";

/// Paxsenix, `info.pagination` wrapped responses.
pub const BACKUP2: &str = "api_backup2";

/// Provider used when neither the caller nor the store names one.
pub const DEFAULT_PROVIDER: &str = SECONDARY;

/// All built-in provider ids in priority order.
pub const BUILTIN: [&str; 4] = [PRIMARY, SECONDARY, BACKUP1, BACKUP2];
