//! Shared fixtures: result schemas and a scripted fake worker.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tsbridge::{BridgeConfig, ResultRegistry, ResultSchema};

pub const SCRIPT_NAME: &str = "bridge.sh";

/// Shell worker answering by the request's `feature` field.
///
/// `pid` reports the worker's own process id, `crash` exits without
/// replying, `hang` never replies.
pub const WORKER_SCRIPT: &str = r#"#!/bin/sh
echo "fake worker $$ ready" >&2
while IFS= read -r line; do
  case "$line" in
    *'"feature":"complete"'*)
      echo '{"valid":true,"resultType":"AUTOCOMPLETE","completions":["foo","bar"]}' ;;
    *'"feature":"check"'*)
      echo '{"valid":true,"resultType":"CHECK_FILE","errors":[{"line":3,"message":"missing semicolon"}]}' ;;
    *'"feature":"reject"'*)
      echo '{"valid":false,"errorMessage":"parse error"}' ;;
    *'"feature":"reject-tagged"'*)
      echo '{"valid":false,"resultType":"MYSTERY","errorMessage":"unsupported file"}' ;;
    *'"feature":"mystery"'*)
      echo '{"valid":true,"resultType":"MYSTERY","anything":1}' ;;
    *'"feature":"extra-field"'*)
      echo '{"valid":true,"resultType":"AUTOCOMPLETE","completions":[],"rank":1}' ;;
    *'"feature":"garbage"'*)
      echo 'this is not json' ;;
    *'"feature":"not-utf8"'*)
      printf '{"valid":true,"resultType":"AUTOCOMPLETE","completions":["\377"]}\n' ;;
    *'"feature":"pid"'*)
      echo "{\"valid\":true,\"resultType\":\"PROCESS\",\"pid\":$$}" ;;
    *'"feature":"crash"'*)
      exit 1 ;;
    *'"feature":"hang"'*)
      exec sleep 30 ;;
    *)
      echo '{"valid":false,"errorMessage":"unknown feature"}' ;;
  esac
done
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoCompleteResult {
    pub completions: Vec<String>,
}

impl ResultSchema for AutoCompleteResult {
    const RESULT_TYPE: &'static str = "AUTOCOMPLETE";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Diagnostic {
    pub line: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckFileResult {
    pub errors: Vec<Diagnostic>,
}

impl ResultSchema for CheckFileResult {
    const RESULT_TYPE: &'static str = "CHECK_FILE";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessResult {
    pub pid: u32,
}

impl ResultSchema for ProcessResult {
    const RESULT_TYPE: &'static str = "PROCESS";
}

#[derive(Debug, Clone, PartialEq)]
pub enum LanguageResult {
    AutoComplete(AutoCompleteResult),
    CheckFile(CheckFileResult),
    Process(ProcessResult),
}

#[derive(Debug, Serialize)]
pub struct FeatureRequest {
    pub feature: &'static str,
    pub line: u32,
    pub col: u32,
}

pub fn request(feature: &'static str) -> FeatureRequest {
    FeatureRequest {
        feature,
        line: 10,
        col: 4,
    }
}

pub fn registry() -> Arc<ResultRegistry<LanguageResult>> {
    let registry = ResultRegistry::builder()
        .register::<AutoCompleteResult>(LanguageResult::AutoComplete)
        .unwrap()
        .register::<CheckFileResult>(LanguageResult::CheckFile)
        .unwrap()
        .register::<ProcessResult>(LanguageResult::Process)
        .unwrap()
        .build();
    Arc::new(registry)
}

/// The fake worker script in its own temp directory.
pub struct FakeWorker {
    dir: TempDir,
}

impl FakeWorker {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCRIPT_NAME), WORKER_SCRIPT).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn script(&self) -> PathBuf {
        self.dir.path().join(SCRIPT_NAME)
    }

    /// `/bin/sh <script>` with short shutdown grace.
    pub fn config(&self) -> BridgeConfig {
        BridgeConfig::new("/bin/sh", self.script()).with_shutdown_grace(Duration::from_millis(200))
    }
}
