use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{domain::UserId, errors::Error, Result};

/// Typed configuration, read from the environment (with optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    /// Telegram bot API token.
    pub bot_token: String,
    /// Moderators: may ban/unban, broadcast, and see search details.
    pub admin_ids: Vec<i64>,

    /// Accepted age range for verification, inclusive.
    pub age_min: u8,
    pub age_max: u8,

    /// Ring buffer size for per-user recent-message logs.
    pub chat_log_capacity: usize,

    /// Session snapshot file.
    pub backup_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admin_ids = parse_csv_i64(env_str("ADMIN_IDS"));
        if admin_ids.is_empty() {
            return Err(Error::Config(
                "ADMIN_IDS environment variable is required".to_string(),
            ));
        }

        let age_min = env_u8("AGE_MIN").unwrap_or(17);
        let age_max = env_u8("AGE_MAX").unwrap_or(30);
        if age_min > age_max {
            return Err(Error::Config(format!(
                "AGE_MIN ({age_min}) must not exceed AGE_MAX ({age_max})"
            )));
        }

        let chat_log_capacity = env_usize("CHAT_LOG_CAPACITY").unwrap_or(20).max(1);

        let backup_file = PathBuf::from(
            env_str("BACKUP_FILE").unwrap_or_else(|| "backup_anon_chat.json".to_string()),
        );

        Ok(Self {
            bot_token,
            admin_ids,
            age_min,
            age_max,
            chat_log_capacity,
            backup_file,
        })
    }

    pub fn is_admin(&self, id: UserId) -> bool {
        self.admin_ids.contains(&id.0)
    }

    pub fn age_in_range(&self, age: u8) -> bool {
        (self.age_min..=self.age_max).contains(&age)
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u8(key: &str) -> Option<u8> {
    env_str(key).and_then(|s| s.trim().parse::<u8>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_parsing_skips_blanks_and_junk() {
        let ids = parse_csv_i64(Some(" 12, ,34,abc, 56 ".to_string()));
        assert_eq!(ids, vec![12, 34, 56]);
        assert!(parse_csv_i64(None).is_empty());
    }

    #[test]
    fn age_range_is_inclusive() {
        let cfg = Config {
            bot_token: "x".to_string(),
            admin_ids: vec![1],
            age_min: 17,
            age_max: 30,
            chat_log_capacity: 20,
            backup_file: "/tmp/b.json".into(),
        };
        assert!(cfg.age_in_range(17));
        assert!(cfg.age_in_range(30));
        assert!(!cfg.age_in_range(16));
        assert!(!cfg.age_in_range(31));
        assert!(cfg.is_admin(UserId(1)));
        assert!(!cfg.is_admin(UserId(2)));
    }
}
