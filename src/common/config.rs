use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::engine::sort::SortStrategyName;

pub fn data_dir() -> PathBuf { dirs::home_dir().unwrap_or_default().join(".vertical-tabs") }
pub fn config_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".config")
        .join("vertical-tabs")
        .join("config.toml")
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Keep focus locked onto the root tree.
    #[serde(default = "no")]
    pub focus_lock: bool,
    /// Close duplicates whenever a file is opened.
    #[serde(default = "no")]
    pub deduplicate_tabs: bool,
    #[serde(default = "no")]
    pub dedup_same_group_only: bool,
    /// Strategy to start with when nothing has been persisted yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_strategy: Option<String>,
    #[serde(default = "default_reconcile_debounce_ms")]
    pub reconcile_debounce_ms: u64,
    #[serde(default = "default_store_file")]
    pub store_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            focus_lock: no(),
            deduplicate_tabs: no(),
            dedup_same_group_only: no(),
            sort_strategy: None,
            reconcile_debounce_ms: default_reconcile_debounce_ms(),
            store_file: default_store_file(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if let Some(name) = &self.sort_strategy
            && name.parse::<SortStrategyName>().is_err()
        {
            match suggest_strategy(name) {
                Some(s) => {
                    issues.push(format!("unknown sort_strategy `{name}`, did you mean `{s}`?"))
                }
                None => issues.push(format!("unknown sort_strategy `{name}`")),
            }
        }
        if self.reconcile_debounce_ms == 0 {
            issues.push("reconcile_debounce_ms must be at least 1".to_string());
        }
        if self.store_file.trim().is_empty() {
            issues.push("store_file must not be empty".to_string());
        }
        issues
    }

    /// The configured strategy, if it names a known one.
    pub fn initial_sort_strategy(&self) -> Option<SortStrategyName> {
        self.sort_strategy.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn store_path(&self) -> PathBuf { data_dir().join(&self.store_file) }
}

fn no() -> bool { false }

fn default_reconcile_debounce_ms() -> u64 { 30 }

fn default_store_file() -> String { "state.json".to_string() }

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut row = vec![i; b.len() + 1];
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            row[j] = (prev[j] + 1).min(row[j - 1] + 1).min(prev[j - 1] + cost);
        }
        prev = row;
    }
    prev[b.len()]
}

fn suggest_strategy(unknown: &str) -> Option<SortStrategyName> {
    let unknown = unknown.to_lowercase();
    let (best, dist) = SortStrategyName::all()
        .map(|name| (name, levenshtein(&unknown, &name.to_string().to_lowercase())))
        .min_by_key(|(_, d)| *d)?;
    (dist <= 3.max(best.to_string().len() / 2)).then_some(best)
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&buf)
    }

    /// Reads `path`, or returns the defaults when it does not exist.
    pub fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Ok(Config::default()) }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml_string.as_bytes())
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> { self.settings.validate() }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<Config>(buf) {
            Ok(c) => Ok(c),
            Err(e) => bail!("{e}"),
        }
    }
}
