// ABOUTME: Command providers that plug into a boti session
// ABOUTME: Each provider owns its settings and talks to its service through a trait

pub mod ci;
pub mod fallback;
pub mod help;
pub mod repo;
pub mod social;

pub use ci::{CiJob, CiProvider, CiServer, CiSettings, CiView};
pub use fallback::{CannedReply, UNKNOWN_INPUT_REPLY};
pub use help::Help;
pub use repo::{Commit, CommitSource, RepoProvider, RepoSettings};
pub use social::{Account, Post, SocialProvider, SocialSettings, Timeline};

/// Display format for timestamps in replies
pub(crate) const DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Parse an optional count argument, falling back to `default` when it is
/// missing, not a number, or outside `1..=max`.
pub(crate) fn count_arg(arg: Option<&String>, default: usize, max: usize) -> usize {
    arg.and_then(|s| s.parse::<usize>().ok())
        .filter(|n| (1..=max).contains(n))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_arg_accepts_values_in_range() {
        assert_eq!(count_arg(Some(&"3".to_string()), 5, 10), 3);
        assert_eq!(count_arg(Some(&"10".to_string()), 5, 10), 10);
        assert_eq!(count_arg(Some(&"1".to_string()), 5, 10), 1);
    }

    #[test]
    fn test_count_arg_falls_back_to_default() {
        assert_eq!(count_arg(None, 5, 10), 5);
        assert_eq!(count_arg(Some(&"0".to_string()), 5, 10), 5);
        assert_eq!(count_arg(Some(&"11".to_string()), 5, 10), 5);
        assert_eq!(count_arg(Some(&"-2".to_string()), 5, 10), 5);
        assert_eq!(count_arg(Some(&"many".to_string()), 5, 10), 5);
    }
}
