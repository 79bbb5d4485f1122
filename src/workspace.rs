//! Workspace state: generated files, the explorer tree, and the editor.
//!
//! The workspace holds whatever application is currently loaded, either the
//! welcome scaffold or the last generation result. The tree is always derived
//! from the file list, never edited directly.

use crate::generate::{GeneratedFile, GenerationOutput};
use crate::tree::{self, FileTreeNode};
use serde::{Deserialize, Serialize};

const WELCOME_APP: &str = r#"import React from 'react';
import './styles.css';

export default function App() {
  return (
    <div style={{ padding: '20px', fontFamily: 'sans-serif' }}>
      <h1>Welcome to Agentic Studio</h1>
      <p>Use the chat on the left to tell me what you want to build.</p>
    </div>
  )
}
"#;

const WELCOME_INDEX: &str = r#"import React, { StrictMode } from "react";
import { createRoot } from "react-dom/client";
import App from "./App";

const root = createRoot(document.getElementById("root"));
root.render(
  <StrictMode>
    <App />
  </StrictMode>
);
"#;

const WELCOME_STYLES: &str = "body { margin: 0; }";

const WELCOME_PACKAGE_JSON: &str = r#"{ "name": "my-app", "dependencies": { "react": "18.2.0", "react-dom": "18.2.0", "react-scripts": "5.0.1" }, "main": "/src/index.js" }"#;

/// The welcome application shown before any generation has run.
pub fn scaffold_files() -> Vec<GeneratedFile> {
    let entries = [
        ("/src/App.jsx", WELCOME_APP),
        ("/src/index.js", WELCOME_INDEX),
        ("/src/styles.css", WELCOME_STYLES),
        ("/package.json", WELCOME_PACKAGE_JSON),
    ];
    entries
        .into_iter()
        .map(|(path, content)| GeneratedFile {
            path: path.to_string(),
            content: content.to_string(),
        })
        .collect()
}

/// In-memory view of the loaded application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceState {
    /// Files in generation order
    files: Vec<GeneratedFile>,
    /// Explorer tree derived from `files`
    tree: FileTreeNode,
    /// Path of the file open in the editor
    active_path: Option<String>,
}

impl WorkspaceState {
    /// Start from the welcome scaffold with the app component open.
    pub fn scaffold() -> Self {
        let files = scaffold_files();
        let tree = tree::build_tree(&files);
        Self {
            files,
            tree,
            active_path: Some("/src/App.jsx".to_string()),
        }
    }

    pub fn empty() -> Self {
        Self {
            files: Vec::new(),
            tree: tree::build_tree(&[]),
            active_path: None,
        }
    }

    /// Replace the workspace with a generation result.
    ///
    /// The file set is swapped wholesale, the tree rebuilt, and the editor
    /// pointed at the best-guess entry point. Returns the new active path.
    pub fn apply_generation(&mut self, output: &GenerationOutput) -> Option<String> {
        self.files = output.code_files.clone();
        self.tree = tree::build_tree(&self.files);
        self.active_path = output.entry_point().map(str::to_string);
        self.active_path.clone()
    }

    /// Open a file in the editor. Unknown paths are ignored.
    pub fn open_file(&mut self, path: &str) -> bool {
        if self.files.iter().any(|f| f.path == path) {
            self.active_path = Some(path.to_string());
            true
        } else {
            false
        }
    }

    /// Write editor content into the active file.
    pub fn edit_active(&mut self, content: &str) -> bool {
        let Some(path) = self.active_path.clone() else {
            return false;
        };
        self.edit_file(&path, content)
    }

    /// Write content into the named file. Unknown paths are ignored.
    pub fn edit_file(&mut self, path: &str, content: &str) -> bool {
        match self.files.iter_mut().find(|f| f.path == path) {
            Some(file) => {
                file.content = content.to_string();
                true
            }
            None => false,
        }
    }

    pub fn file_content(&self, path: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.content.as_str())
    }

    pub fn active_path(&self) -> Option<&str> {
        self.active_path.as_deref()
    }

    pub fn active_content(&self) -> Option<&str> {
        self.active_path
            .as_deref()
            .and_then(|path| self.file_content(path))
    }

    pub fn files(&self) -> &[GeneratedFile] {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn tree(&self) -> &FileTreeNode {
        &self.tree
    }
}
