//! Replay of table operations against a running stack.
//!
//! A script is a JSON array of steps:
//!
//! ```json
//! [
//!   {"op": "SET", "db": "CONFIG_DB", "table": "VLAN", "key": "Vlan2", "fields": {"vlanid": "2"}},
//!   {"op": "SET", "db": "APPL_DB", "table": "FDB_TABLE", "key": "Vlan2:52-54-00-25-06-E9",
//!    "fields": {"port": "Ethernet0", "type": "dynamic"}},
//!   {"op": "LEARN", "vlan": "Vlan2", "mac": "00:11:22:33:44:55", "port": "Ethernet0"},
//!   {"op": "AGE", "vlan": "Vlan2", "mac": "00:11:22:33:44:55"},
//!   {"op": "DEL", "db": "CONFIG_DB", "table": "VLAN_MEMBER", "key": "Vlan2|Ethernet0"},
//!   {"op": "TIMER"}
//! ]
//! ```
//!
//! `LEARN` and `AGE` stand in for the dataplane; `TIMER` fires the orch
//! timers without waiting for the period.

use crate::daemon::OrchStack;
use serde::{Deserialize, Serialize};
use sonic_orch_common::Database;
use sonic_sai::SaiError;
use sonic_types::{MacAddress, ParseError, VlanId};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid script: {0}")]
    Json(#[from] serde_json::Error),

    #[error("step {step}: {source}")]
    Parse {
        step: usize,
        #[source]
        source: ParseError,
    },

    #[error("step {step}: {source}")]
    Sai {
        step: usize,
        #[source]
        source: SaiError,
    },
}

pub type Result<T> = std::result::Result<T, ScriptError>;

/// Writable stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Store {
    #[serde(rename = "CONFIG_DB")]
    ConfigDb,
    #[serde(rename = "APPL_DB")]
    ApplDb,
}

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "UPPERCASE")]
pub enum Step {
    Set {
        db: Store,
        table: String,
        key: String,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
    Del {
        db: Store,
        table: String,
        key: String,
    },
    Learn {
        vlan: String,
        mac: String,
        port: String,
    },
    Age {
        vlan: String,
        mac: String,
    },
    Timer,
}

/// Reads a script file.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Step>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<Vec<Step>> {
    Ok(serde_json::from_str(content)?)
}

fn store<'a>(stack: &'a OrchStack, db: Store) -> &'a Database {
    match db {
        Store::ConfigDb => &stack.config_db,
        Store::ApplDb => &stack.appl_db,
    }
}

fn fdb_target(step: usize, vlan: &str, mac: &str) -> Result<(VlanId, MacAddress)> {
    let parse = |source| ScriptError::Parse { step, source };
    let vlan_id = VlanId::from_alias(vlan).map_err(parse)?;
    let mac = mac.parse::<MacAddress>().map_err(parse)?;
    Ok((vlan_id, mac))
}

/// Applies step number `index` without waiting for it to settle.
pub fn apply(stack: &OrchStack, index: usize, step: &Step) -> Result<()> {
    match step {
        Step::Set {
            db,
            table,
            key,
            fields,
        } => {
            debug!(step = index, ?db, table, key, "SET");
            let fvs = fields
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect();
            store(stack, *db).table(table).set(key, fvs);
        }
        Step::Del { db, table, key } => {
            debug!(step = index, ?db, table, key, "DEL");
            if !store(stack, *db).table(table).del(key) {
                warn!(step = index, table, key, "DEL of absent key");
            }
        }
        Step::Learn { vlan, mac, port } => {
            let (vlan_id, mac) = fdb_target(index, vlan, mac)?;
            let event = stack
                .switch
                .learn_fdb_entry(vlan_id, mac, port)
                .map_err(|source| ScriptError::Sai {
                    step: index,
                    source,
                })?;
            debug!(step = index, %vlan_id, %mac, port, ?event, "LEARN");
        }
        Step::Age { vlan, mac } => {
            let (vlan_id, mac) = fdb_target(index, vlan, mac)?;
            if !stack.switch.age_fdb_entry(vlan_id, mac) {
                warn!(step = index, %vlan_id, %mac, "no dynamic entry to age");
            }
        }
        Step::Timer => stack.fire_timers(),
    }
    Ok(())
}

/// Applies every step, waiting for the stack to settle after each.
pub async fn run(stack: &OrchStack, steps: &[Step]) -> Result<()> {
    for (index, step) in steps.iter().enumerate() {
        apply(stack, index, step)?;
        stack.settled().await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::L2OrchConfig;
    use pretty_assertions::assert_eq;
    use sonic_orch_common::schema::{appl_db, asic_db};
    use std::io::Write;

    const SCRIPT: &str = r#"[
        {"op": "SET", "db": "CONFIG_DB", "table": "VLAN", "key": "Vlan2", "fields": {"vlanid": "2"}},
        {"op": "SET", "db": "CONFIG_DB", "table": "VLAN_MEMBER", "key": "Vlan2|Ethernet0",
         "fields": {"tagging_mode": "untagged"}},
        {"op": "LEARN", "vlan": "Vlan2", "mac": "00:11:22:33:44:55", "port": "Ethernet0"}
    ]"#;

    #[test]
    fn test_parse_steps() {
        let steps = parse(SCRIPT).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(
            steps[2],
            Step::Learn {
                vlan: "Vlan2".to_string(),
                mac: "00:11:22:33:44:55".to_string(),
                port: "Ethernet0".to_string(),
            }
        );
        assert_eq!(parse(r#"[{"op": "TIMER"}]"#).unwrap(), vec![Step::Timer]);
    }

    #[test]
    fn test_parse_rejects_unknown_op() {
        assert!(matches!(
            parse(r#"[{"op": "FLUSH"}]"#),
            Err(ScriptError::Json(_))
        ));
        assert!(parse(r#"[{"op": "SET", "db": "STATE_DB", "table": "T", "key": "k"}]"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(dir.path().join("missing.json")),
            Err(ScriptError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_script_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCRIPT.as_bytes()).unwrap();
        let steps = load(file.path()).unwrap();

        let stack = OrchStack::build(&L2OrchConfig::default()).unwrap();
        run(&stack, &steps).await.unwrap();

        assert_eq!(stack.asic_db.table(asic_db::VLAN_MEMBER).len(), 1);
        assert_eq!(stack.asic_db.table(asic_db::FDB_ENTRY).len(), 1);
        assert_eq!(
            stack.appl_db.table(appl_db::FDB_TABLE).keys(),
            vec!["Vlan2:00-11-22-33-44-55".to_string()]
        );
        stack.shutdown().await;
    }

    #[tokio::test]
    async fn test_learn_on_non_member_fails() {
        let stack = OrchStack::build(&L2OrchConfig::default()).unwrap();
        let steps = parse(
            r#"[{"op": "LEARN", "vlan": "Vlan1", "mac": "00:11:22:33:44:55", "port": "Ethernet0"}]"#,
        )
        .unwrap();
        let err = run(&stack, &steps).await.unwrap_err();
        assert!(matches!(err, ScriptError::Sai { step: 0, .. }));

        let steps = parse(r#"[{"op": "AGE", "vlan": "Vlan5000", "mac": "00:11:22:33:44:55"}]"#)
            .unwrap();
        assert!(matches!(
            run(&stack, &steps).await,
            Err(ScriptError::Parse { step: 0, .. })
        ));
        stack.shutdown().await;
    }
}
