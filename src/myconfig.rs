//! Keeps a serde struct and an ini file in sync.
//!
//! Scalars and arrays of the top-level struct go into the default section (or the
//! root of the file when the section name is empty); every nested struct field gets
//! its own section named after the field. Keys are written lower-case and matched
//! case-insensitively. Arrays are `;`-joined.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

pub const EXT: &str = ".myconfig";

#[derive(Debug, Error)]
pub enum MyConfigError {
    #[error("myconfig: {0} must be a struct")]
    NotStruct(String),
    #[error("myconfig: unsupported field type for {section}.{key}")]
    Unsupported { section: String, key: String },
    #[error("myconfig: invalid value for {section}.{key}: {value:?}")]
    InvalidValue { section: String, key: String, value: String },
    #[error("myconfig: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

type Sections = HashMap<String, HashMap<String, String>>;

fn parse_ini(text: &str) -> Sections {
    let mut sections: Sections = HashMap::new();
    let mut current = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = name.trim().to_lowercase();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    sections
}

fn is_scalar(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_scalar(template: &Value, raw: &str) -> Option<Value> {
    match template {
        Value::String(_) => Some(Value::String(raw.to_string())),
        Value::Bool(_) => match raw.to_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) if n.is_f64() => raw.parse::<f64>().ok().map(Value::from),
        Value::Number(_) => raw
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| raw.parse::<u64>().map(Value::from))
            .ok(),
        _ => None,
    }
}

/// Merges one section: values found in the file win, scalars missing from the file
/// keep the struct's value and arrays missing from the file become empty.
fn merge_section(section: &str, fields: &mut Map<String, Value>, found: Option<&HashMap<String, String>>) -> Result<(), MyConfigError> {
    for (key, value) in fields.iter_mut() {
        let raw = found.and_then(|f| f.get(&key.to_lowercase()));
        let invalid = |raw: &str| MyConfigError::InvalidValue {
            section: section.to_string(),
            key: key.clone(),
            value: raw.to_string(),
        };
        match value {
            Value::Array(items) => {
                if !items.iter().all(is_scalar) {
                    return Err(MyConfigError::Unsupported { section: section.to_string(), key: key.clone() });
                }
                let template = items.first().cloned().unwrap_or(Value::String(String::new()));
                let mut parsed = Vec::new();
                if let Some(raw) = raw {
                    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                        parsed.push(parse_scalar(&template, part).ok_or_else(|| invalid(raw.as_str()))?);
                    }
                }
                *items = parsed;
            }
            v if is_scalar(v) => {
                if let Some(raw) = raw {
                    *v = parse_scalar(v, raw).ok_or_else(|| invalid(raw.as_str()))?;
                }
            }
            Value::Null => {}
            _ => return Err(MyConfigError::Unsupported { section: section.to_string(), key: key.clone() }),
        }
    }
    Ok(())
}

fn write_section(out: &mut String, name: &str, fields: &Map<String, Value>) {
    if !name.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("[{}]\n", name));
    }
    for (key, value) in fields {
        let text = match value {
            Value::Array(items) => items.iter().map(scalar_to_string).collect::<Vec<_>>().join(";"),
            Value::Null => continue,
            other => scalar_to_string(other),
        };
        out.push_str(&format!("{} = {}\n", key.to_lowercase(), text));
    }
}

/// Loads `path` into `target`, fills in whatever the file lacks from `target` and
/// writes the complete result back to `path`.
pub fn sync<T>(target: &mut T, path: impl AsRef<Path>, default_section: &str) -> Result<(), MyConfigError>
where
    T: Serialize + DeserializeOwned,
{
    let path = path.as_ref();
    let Value::Object(root) = serde_json::to_value(&*target)? else {
        return Err(MyConfigError::NotStruct(type_name::<T>().to_string()));
    };

    let found = match fs::read_to_string(path) {
        Ok(text) => parse_ini(&text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Sections::new(),
        Err(e) => return Err(e.into()),
    };
    let default_section = default_section.to_lowercase();

    let mut plain = Map::new();
    let mut nested = Vec::new();
    for (key, value) in root {
        match value {
            Value::Object(fields) => nested.push((key, fields)),
            other => {
                plain.insert(key, other);
            }
        }
    }

    merge_section(&default_section, &mut plain, found.get(&default_section))?;
    let mut text = String::new();
    write_section(&mut text, &default_section, &plain);
    for (name, fields) in nested.iter_mut() {
        let section = name.to_lowercase();
        merge_section(&section, fields, found.get(&section))?;
        write_section(&mut text, &section, fields);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)?;
    debug!("myconfig: wrote {}", path.display());

    let mut merged = plain;
    for (name, fields) in nested {
        merged.insert(name, Value::Object(fields));
    }
    *target = serde_json::from_value(Value::Object(merged))?;
    info!("Synced config {}", path.display());
    Ok(())
}

/// [`sync`] against `<dir>/<name>.myconfig`, where the name is derived from the
/// type: `RedisConfig` becomes `redis.myconfig`.
pub fn sync_in_dir<T>(target: &mut T, dir: impl AsRef<Path>, default_section: &str) -> Result<PathBuf, MyConfigError>
where
    T: Serialize + DeserializeOwned,
{
    let path = dir.as_ref().join(format!("{}{}", file_stem::<T>(), EXT));
    sync(target, &path, default_section)?;
    Ok(path)
}

fn type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn file_stem<T>() -> String {
    let name = type_name::<T>();
    snake_case(name.strip_suffix("Config").filter(|s| !s.is_empty()).unwrap_or(name))
}

fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Redis {
        host: String,
        port: u16,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct CacheServerConfig {
        #[serde(rename = "Name")]
        name: String,
        enabled: bool,
        ratio: f64,
        tags: Vec<String>,
        redis: Redis,
    }

    fn sample() -> CacheServerConfig {
        CacheServerConfig {
            name: "demo".to_string(),
            enabled: true,
            ratio: 0.5,
            tags: vec!["a".to_string(), "b".to_string()],
            redis: Redis { host: "localhost".to_string(), port: 6379 },
        }
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("CacheServer"), "cache_server");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("Db2Pool"), "db2_pool");
        assert_eq!(file_stem::<CacheServerConfig>(), "cache_server");
    }

    #[test]
    fn test_first_sync_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf/app.myconfig");
        let mut cfg = sample();
        sync(&mut cfg, &path, "main").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[main]\n"));
        assert!(text.contains("name = demo\n"));
        assert!(text.contains("ratio = 0.5\n"));
        assert!(text.contains("[redis]\nhost = localhost\nport = 6379\n"));
        // Arrays absent from the file come back empty.
        assert!(text.contains("tags = \n"));
        assert!(cfg.tags.is_empty());
        assert_eq!(cfg.redis.port, 6379);
    }

    #[test]
    fn test_file_values_win() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.myconfig");
        fs::write(&path, "; comment\nNAME = other\nTags = x; y ;z\nenabled=0\n\n[Redis]\nport = 7000\n").unwrap();

        let mut cfg = sample();
        sync(&mut cfg, &path, "").unwrap();
        assert_eq!(cfg.name, "other");
        assert!(!cfg.enabled);
        assert_eq!(cfg.tags, ["x", "y", "z"]);
        assert_eq!(cfg.redis, Redis { host: "localhost".to_string(), port: 7000 });
        assert_eq!(cfg.ratio, 0.5);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("tags = x;y;z\n"));
        assert!(text.contains("ratio = 0.5\n"));

        // A second sync reads back exactly what was written.
        let mut again = sample();
        sync(&mut again, &path, "").unwrap();
        assert_eq!(again, cfg);
    }

    #[test]
    fn test_invalid_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.myconfig");
        fs::write(&path, "[redis]\nport = many\n").unwrap();
        let err = sync(&mut sample(), &path, "").unwrap_err();
        assert!(matches!(err, MyConfigError::InvalidValue { ref key, .. } if key == "port"));
    }

    #[test]
    fn test_non_struct_rejected() {
        let dir = TempDir::new().unwrap();
        let mut value = vec![1, 2, 3];
        let err = sync(&mut value, dir.path().join("v.myconfig"), "").unwrap_err();
        assert!(matches!(err, MyConfigError::NotStruct(_)));
    }

    #[test]
    fn test_sync_in_dir_names_file() {
        let dir = TempDir::new().unwrap();
        let mut cfg = sample();
        let path = sync_in_dir(&mut cfg, dir.path(), "main").unwrap();
        assert_eq!(path, dir.path().join("cache_server.myconfig"));
        assert!(path.is_file());
    }
}
