//! Property-based tests for config resolution and exit status mapping

use async_trait::async_trait;
use jig::cli::ValidatedOptions;
use jig::config::{get_configs, ConfigReader, GlobalConfig, ProjectConfig, ReadConfigResult};
use jig::engine::AggregatedResult;
use jig::{status_for, RunError};
use proptest::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Reader answering from a root → (config path, deprecated) table.
struct TableReader(HashMap<PathBuf, (Option<PathBuf>, bool)>);

#[async_trait]
impl ConfigReader for TableReader {
    async fn read_config(
        &self,
        _options: &ValidatedOptions,
        root: &Path,
        _project_index: usize,
        _multi_project: bool,
    ) -> Result<ReadConfigResult, RunError> {
        let (config_path, deprecated) = self.0.get(root).cloned().unwrap_or((None, false));
        Ok(ReadConfigResult {
            global_config: GlobalConfig::new(root),
            project_config: ProjectConfig::new(root.to_string_lossy(), root),
            has_deprecation_warnings: deprecated,
            config_path,
        })
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn roots(count: usize) -> Vec<PathBuf> {
    (0..count).map(|i| PathBuf::from(format!("/work/p{}", i))).collect()
}

/// N distinct roots with distinct config files yield N project configs and one global config
#[test]
fn test_distinct_roots_yield_one_config_each() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let rt = runtime();

    runner
        .run(&(2usize..8), |count| {
            let roots = roots(count);
            let reader = TableReader(
                roots
                    .iter()
                    .map(|r| (r.clone(), (Some(r.join("jig.toml")), false)))
                    .collect(),
            );
            let resolved = rt
                .block_on(get_configs(&reader, &roots, &ValidatedOptions::default()))
                .unwrap();

            prop_assert_eq!(resolved.project_configs.len(), count);
            prop_assert_eq!(resolved.config_paths.len(), count);
            prop_assert_eq!(&resolved.global_config.root_dir, &roots[0]);
            for (config, root) in resolved.project_configs.iter().zip(&roots) {
                prop_assert_eq!(&config.root_dir, root);
            }
            Ok(())
        })
        .unwrap();
}

/// The run-wide deprecation flag is the OR of every load's flag
#[test]
fn test_deprecation_flag_is_an_or() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let rt = runtime();

    runner
        .run(&prop::collection::vec(any::<bool>(), 2..8), |flags| {
            let roots = roots(flags.len());
            let reader = TableReader(
                roots
                    .iter()
                    .zip(&flags)
                    .map(|(r, deprecated)| (r.clone(), (Some(r.join("jig.toml")), *deprecated)))
                    .collect(),
            );
            let resolved = rt
                .block_on(get_configs(&reader, &roots, &ValidatedOptions::default()))
                .unwrap();

            prop_assert_eq!(
                resolved.has_deprecation_warnings,
                flags.iter().any(|f| *f)
            );
            Ok(())
        })
        .unwrap();
}

/// Any two roots resolving to the same config file fail resolution, naming both roots
#[test]
fn test_shared_config_path_always_fails() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let rt = runtime();

    let strategy = (2usize..8).prop_flat_map(|count| (Just(count), 0..count, 0..count));
    runner
        .run(&strategy, |(count, a, b)| {
            prop_assume!(a != b);
            let roots = roots(count);
            let mut table: HashMap<PathBuf, (Option<PathBuf>, bool)> = roots
                .iter()
                .map(|r| (r.clone(), (Some(r.join("jig.toml")), false)))
                .collect();
            let shared = PathBuf::from("/work/jig.toml");
            table.insert(roots[a].clone(), (Some(shared.clone()), false));
            table.insert(roots[b].clone(), (Some(shared), false));

            let err = rt
                .block_on(get_configs(&TableReader(table), &roots, &ValidatedOptions::default()))
                .unwrap_err();
            let message = err.to_string();
            prop_assert!(matches!(err, RunError::Configuration(_)));
            prop_assert!(message.contains(roots[a].to_str().unwrap()));
            prop_assert!(message.contains(roots[b].to_str().unwrap()));
            Ok(())
        })
        .unwrap();
}

/// Exit status: 0 without a result or on success, the configured code otherwise
#[test]
fn test_exit_status_mapping() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(prop::option::of(any::<bool>()), 1i32..=255),
            |(success, code)| {
                let mut global = GlobalConfig::new("/work");
                global.test_failure_exit_code = code;
                let result = success.map(|ok| {
                    if ok {
                        AggregatedResult::passed(3)
                    } else {
                        AggregatedResult::failed(3, 1)
                    }
                });

                let expected = match success {
                    Some(false) => code,
                    _ => 0,
                };
                prop_assert_eq!(status_for(result.as_ref(), &global), expected);
                Ok(())
            },
        )
        .unwrap();
}
