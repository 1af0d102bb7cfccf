use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::NaiveTime;
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::datetime::{
  parse_time_of_day,
  parse_timezone
};

const CONFIG_ENV_VAR: &str =
  "DAYBOARD_CONFIG";
const TIMEZONE_ENV_VAR: &str =
  "DAYBOARD_TIMEZONE";
const CONFIG_DIR_NAME: &str =
  "dayboard";
const MAX_UPCOMING_DAYS: i64 = 3650;
const CONFIG_FILE_NAME: &str =
  "config.toml";

pub const DEFAULT_BASE_URL: &str =
  "http://127.0.0.1:8080/api";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
  pub base_url: String
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
  /// Time given to a task dropped on a
  /// day when it had no due time yet.
  pub default_time:  NaiveTime,
  pub upcoming_days: i64
}

#[derive(Debug, Clone)]
pub struct TimeConfig {
  pub timezone: Tz
}

#[derive(Debug, Clone)]
pub struct UiConfig {
  pub color: bool
}

#[derive(Debug, Clone)]
pub struct Config {
  pub service:      ServiceConfig,
  pub calendar:     CalendarConfig,
  pub time:         TimeConfig,
  pub ui:           UiConfig,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      service:      ServiceConfig {
        base_url: DEFAULT_BASE_URL
          .to_string()
      },
      calendar:     CalendarConfig {
        default_time:  NaiveTime::from_hms_opt(
          9, 0, 0
        )
        .unwrap_or_default(),
        upcoming_days: 7
      },
      time:         TimeConfig {
        timezone: chrono_tz::UTC
      },
      ui:           UiConfig {
        color: true
      },
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let config_path =
      resolve_config_path(
        config_override
      );
    if let Some(path) = config_path {
      info!(config = %path.display(), "loading config");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no config file found; using \
         defaults"
      );
    }

    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && !raw.trim().is_empty()
    {
      debug!(timezone = %raw, "timezone from environment");
      cfg
        .set("time.timezone", &raw)
        .with_context(|| {
          format!(
            "invalid {TIMEZONE_ENV_VAR}"
          )
        })?;
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      debug!(key = %k, value = %v, "applying override");
      self.set(&k, &v).with_context(
        || {
          format!(
            "invalid override {k}={v}"
          )
        }
      )?;
    }
    Ok(())
  }

  /// Sets one dotted key. Unknown keys
  /// are ignored with a warning.
  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    let value = value.trim();
    match key.trim() {
      | "service.base_url" => {
        if value.is_empty() {
          return Err(anyhow!(
            "service.base_url cannot \
             be empty"
          ));
        }
        self.service.base_url =
          value.to_string();
      }
      | "calendar.default_time" => {
        self.calendar.default_time =
          parse_time_of_day(value)?;
      }
      | "calendar.upcoming_days" => {
        let days = value
          .parse::<i64>()
          .with_context(|| {
            format!(
              "not a day count: \
               {value}"
            )
          })?;
        if !(0..=MAX_UPCOMING_DAYS)
          .contains(&days)
        {
          return Err(anyhow!(
            "calendar.upcoming_days \
             must be between 0 and \
             {MAX_UPCOMING_DAYS}, got \
             {days}"
          ));
        }
        self.calendar.upcoming_days =
          days;
      }
      | "time.timezone" => {
        self.time.timezone =
          parse_timezone(value)?;
      }
      | "ui.color" => {
        self.ui.color =
          parse_bool(value);
      }
      | other => {
        warn!(key = %other, "unknown config key; ignoring");
      }
    }
    Ok(())
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let table = toml::from_str::<
      toml::Table
    >(&text)
    .with_context(|| {
      format!(
        "failed to parse {}",
        path.display()
      )
    })?;

    for (key, value) in
      flatten_table(&table)?
    {
      trace!(key = %key, value = %value, "loaded config key");
      self.set(&key, &value).with_context(
        || {
          format!(
            "invalid value for {key} \
             in {}",
            path.display()
          )
        }
      )?;
    }

    self.loaded_files.push(path);
    Ok(())
  }
}

/// `[section] key = value` becomes
/// `("section.key", "value")`.
fn flatten_table(
  table: &toml::Table
) -> anyhow::Result<Vec<(String, String)>>
{
  let mut out = Vec::new();
  for (section, value) in table {
    let toml::Value::Table(entries) =
      value
    else {
      return Err(anyhow!(
        "top-level key {section} must \
         be a table"
      ));
    };
    for (name, entry) in entries {
      let rendered = match entry {
        | toml::Value::String(s) => {
          s.clone()
        }
        | toml::Value::Integer(n) => {
          n.to_string()
        }
        | toml::Value::Boolean(b) => {
          b.to_string()
        }
        | other => {
          return Err(anyhow!(
            "unsupported value for \
             {section}.{name}: \
             {other}"
          ));
        }
      };
      out.push((
        format!("{section}.{name}"),
        rendered
      ));
    }
  }
  Ok(out)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if trimmed == "/dev/null" {
      return None;
    }
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  let candidate = dirs::config_dir()?
    .join(CONFIG_DIR_NAME)
    .join(CONFIG_FILE_NAME);
  candidate.exists().then_some(candidate)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
