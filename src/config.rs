use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::store::repo::{CursorStore, MemoryCursorStore};

pub const DEFAULT_ID_PAGE_SIZE: i64 = 100;
pub const DEFAULT_ITEM_PAGE_SIZE: i64 = 25;

fn default_port() -> u16 {
    993
}

fn default_id_page_size() -> i64 {
    DEFAULT_ID_PAGE_SIZE
}

fn default_item_page_size() -> i64 {
    DEFAULT_ITEM_PAGE_SIZE
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub admin_user: String,
    #[serde(default)]
    pub users: Vec<String>,
    pub users_file: Option<String>,
    #[serde(default = "default_id_page_size")]
    pub id_page_size: i64,
    #[serde(default = "default_item_page_size")]
    pub item_page_size: i64,
    pub db_path: Option<String>,
    #[serde(default)]
    pub folders_exclude: Vec<String>,
}

/// Values given on the command line; `None`/empty means "keep the file's value".
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub admin_user: Option<String>,
    pub users: Vec<String>,
    pub users_file: Option<String>,
    pub id_page_size: Option<i64>,
    pub item_page_size: Option<i64>,
    pub db_path: Option<String>,
}

impl Config {
    pub fn merge(self, o: ConfigOverrides) -> Config {
        // explicit users replace the configured list
        let users_given = !o.users.is_empty() || o.users_file.is_some();
        Config {
            server: o.server.unwrap_or(self.server),
            port: o.port.unwrap_or(self.port),
            admin_user: o.admin_user.unwrap_or(self.admin_user),
            users: if users_given { o.users } else { self.users },
            users_file: if users_given {
                o.users_file
            } else {
                self.users_file
            },
            id_page_size: o.id_page_size.unwrap_or(self.id_page_size),
            item_page_size: o.item_page_size.unwrap_or(self.item_page_size),
            db_path: o.db_path.or(self.db_path),
            folders_exclude: self.folders_exclude,
        }
    }

    /// Every principal to harvest: the inline list, then the users file.
    pub fn principals(&self) -> Result<Vec<String>> {
        let mut out = self.users.clone();
        if let Some(path) = &self.users_file {
            out.extend(read_users_file(Path::new(path))?);
        }
        Ok(out)
    }
}

/// One principal per line; blank lines and `#` comments are skipped.
pub fn read_users_file(path: &Path) -> Result<Vec<String>> {
    let s = fs::read_to_string(path)
        .map_err(|e| anyhow!("cannot read users file {}: {e}", path.display()))?;
    Ok(s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("mail_harvest"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn default_db_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("cursors.db");
    Ok(p)
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            server: "imap.example.com".to_string(),
            port: default_port(),
            admin_user: "admin@example.com".to_string(),
            users: vec!["alice@example.com".to_string()],
            users_file: None,
            id_page_size: DEFAULT_ID_PAGE_SIZE,
            item_page_size: DEFAULT_ITEM_PAGE_SIZE,
            db_path: None,
            folders_exclude: vec!["Trash".to_string(), "Junk".to_string()],
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}, edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

pub fn resolve_db_path(cfg: &Config) -> Result<PathBuf> {
    if let Some(p) = &cfg.db_path {
        Ok(PathBuf::from(p))
    } else {
        default_db_path()
    }
}

/// Paging and checkpointing settings for one harvest.
///
/// Page sizes below 1 are raised to 1.
#[derive(Clone)]
pub struct HarvestConfig {
    id_page_size: usize,
    item_page_size: usize,
    cursor_store: Rc<dyn CursorStore>,
}

impl HarvestConfig {
    pub fn new(id_page_size: i64, item_page_size: i64, cursor_store: Rc<dyn CursorStore>) -> Self {
        Self {
            id_page_size: clamp_page_size(id_page_size),
            item_page_size: clamp_page_size(item_page_size),
            cursor_store,
        }
    }

    pub fn id_page_size(&self) -> usize {
        self.id_page_size
    }

    pub fn item_page_size(&self) -> usize {
        self.item_page_size
    }

    pub fn cursor_store(&self) -> &Rc<dyn CursorStore> {
        &self.cursor_store
    }

    /// Same page sizes, different cursor store.
    pub fn with_cursor_store(&self, cursor_store: Rc<dyn CursorStore>) -> Self {
        Self {
            id_page_size: self.id_page_size,
            item_page_size: self.item_page_size,
            cursor_store,
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_ID_PAGE_SIZE,
            DEFAULT_ITEM_PAGE_SIZE,
            Rc::new(MemoryCursorStore::new()),
        )
    }
}

impl From<&Config> for HarvestConfig {
    fn from(cfg: &Config) -> Self {
        Self::new(
            cfg.id_page_size,
            cfg.item_page_size,
            Rc::new(MemoryCursorStore::new()),
        )
    }
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("id_page_size", &self.id_page_size)
            .field("item_page_size", &self.item_page_size)
            .finish_non_exhaustive()
    }
}

fn clamp_page_size(n: i64) -> usize {
    n.max(1) as usize
}
