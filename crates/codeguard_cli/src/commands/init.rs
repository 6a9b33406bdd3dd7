//! Init command implementation

use miette::{IntoDiagnostic, Result};
use tracing::info;
use codeguard_core::GuardConfig;

use crate::cli::Cli;
use crate::utils::project_root;

const DEFAULT_CONFIG: &str = r#"{
  // Zero tolerance: warnings and unsafe suppressions also block.
  "strict": false,
  "exclude": [],
  "tools": {
    "typeCheck": { "command": "npx", "args": ["tsc", "--noEmit", "--pretty", "false"] },
    "lint": { "command": "npx", "args": ["eslint", ".", "--format", "json"] }
  },
  "newProjectFileThreshold": 20,
  "expectedCompilerOptions": { "strict": true }
}
"#;

pub fn run_init(cli: &Cli, force: bool) -> Result<()> {
    let config_path = project_root(cli)?.join(GuardConfig::CONFIG_FILES[0]);

    loop {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.custom_flags(libc::O_NOFOLLOW);
        }

        match options.open(&config_path) {
            Ok(mut file) => {
                use std::io::Write;
                file.write_all(DEFAULT_CONFIG.as_bytes()).into_diagnostic()?;
                info!("Created {}", config_path.display());
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if !force {
                    return Err(miette::miette!(
                        "Config file already exists. Use --force to overwrite."
                    ));
                }

                match std::fs::remove_file(&config_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e).into_diagnostic(),
                }
            }
            Err(e) => return Err(e).into_diagnostic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GuardConfig::from_json(DEFAULT_CONFIG).unwrap();
        assert!(!config.strict);
        assert_eq!(config.new_project_file_threshold, 20);
    }
}
