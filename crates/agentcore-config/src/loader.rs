use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest
/// priority. Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/agentcore/config.yaml"));
    paths.push(PathBuf::from("/etc/agentcore/config.yml"));

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/agentcore/config.yaml"));
        paths.push(home.join(".config/agentcore/config.yml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("agentcore/config.yaml"));
        paths.push(cfg.join("agentcore/config.yml"));
    }

    paths.push(PathBuf::from(".agentcore/config.yaml"));
    paths.push(PathBuf::from(".agentcore/config.yml"));
    paths.push(PathBuf::from("agentcore.yaml"));
    paths.push(PathBuf::from("agentcore.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files. `extra` may
/// provide an explicit path (the `--config` CLI flag), applied last.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value =
                serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty()) {
        Config::default()
    } else {
        serde_yaml::from_value(merged).with_context(|| "deserializing merged config")?
    };
    Ok(config)
}

/// Deep-merge `src` into `dst`; `src` wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d.entry(k).or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        let src = val("x: 2");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst = val("a: 1\nb: 2");
        let src = val("b: 99");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["a"].as_i64(), Some(1));
        assert_eq!(dst["b"].as_i64(), Some(99));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val("server:\n  bind: 127.0.0.1:4096\n  cors_whitelist: []");
        let src = val("server:\n  bind: 0.0.0.0:9000");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["server"]["bind"].as_str(), Some("0.0.0.0:9000"));
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/agentcore_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_with_no_extra_path_returns_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:4096");
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "server:\n  bind: 0.0.0.0:7000\nmax_retries: 7\n").unwrap();
        let config = load(Some(f.path())).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:7000");
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn load_explicit_file_still_carries_default_agent() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "server:\n  bind: 0.0.0.0:7000\n").unwrap();
        let config = load(Some(f.path())).unwrap();
        assert!(config.agents.contains_key(crate::DEFAULT_AGENT_NAME));
    }
}
