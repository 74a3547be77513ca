//! On-disk state of an instance and the provisioning plan derived from it.
//!
//! Every one-shot operation leaves a marker behind: the option file, the
//! engine's own `mysql/` directory in the data dir, the wrapper script and the
//! schema directory. [`MarkerState::inspect`] reads them, and [`plan`] turns
//! (markers, options) into the ordered list of steps still to run. `plan` is
//! pure, so the whole decision table is testable without touching a server.

use std::fmt;

use serde::Serialize;

use crate::layout::Layout;
use crate::provision::ProvisionOptions;

/// Which one-shot operations have already happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MarkerState {
    pub config_exists: bool,
    pub data_initialized: bool,
    pub wrapper_exists: bool,
    /// `None` when no schema was asked about.
    pub schema_exists: Option<bool>,
}

impl MarkerState {
    /// Read the markers from disk.
    pub fn inspect(layout: &Layout, schema: Option<&str>) -> Self {
        Self {
            config_exists: layout.config_file().is_file(),
            data_initialized: layout.initialized_marker().is_dir(),
            wrapper_exists: layout.wrapper_path().exists(),
            schema_exists: schema.map(|name| layout.schema_marker(name).is_dir()),
        }
    }
}

/// One provisioning step, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    EnsureDirs,
    WriteConfig,
    InitializeData,
    WriteWrapper,
    CreateSchema { name: String, drop_first: bool },
    Connect { schema: Option<String> },
    Optimize { schema: Option<String> },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnsureDirs => write!(f, "ensure directories"),
            Self::WriteConfig => write!(f, "write option file"),
            Self::InitializeData => write!(f, "initialize data directory"),
            Self::WriteWrapper => write!(f, "write connect wrapper"),
            Self::CreateSchema { name, drop_first } => {
                if *drop_first {
                    write!(f, "recreate schema `{name}`")
                } else {
                    write!(f, "create schema `{name}`")
                }
            }
            Self::Connect { schema: Some(s) } => write!(f, "connect to `{s}`"),
            Self::Connect { schema: None } => write!(f, "connect"),
            Self::Optimize { schema: Some(s) } => write!(f, "optimize `{s}`"),
            Self::Optimize { schema: None } => write!(f, "optimize all schemas"),
        }
    }
}

/// Steps still needed to bring an instance in `state` to what `options` asks for.
pub fn plan(state: &MarkerState, options: &ProvisionOptions) -> Vec<Step> {
    let mut steps = vec![Step::EnsureDirs];

    if !state.config_exists {
        steps.push(Step::WriteConfig);
    }
    if !state.data_initialized {
        steps.push(Step::InitializeData);
    }
    if !state.wrapper_exists {
        steps.push(Step::WriteWrapper);
    }
    if let Some(name) = &options.schema {
        let exists = state.schema_exists.unwrap_or(false);
        if options.drop_first || !exists {
            steps.push(Step::CreateSchema {
                name: name.clone(),
                drop_first: options.drop_first,
            });
        }
    }
    if options.connect {
        steps.push(Step::Connect {
            schema: options.schema.clone(),
        });
    }
    if options.optimize {
        steps.push(Step::Optimize {
            schema: options.schema.clone(),
        });
    }

    steps
}
