use std::path::PathBuf;

mod common;
mod prompt;
mod run;
mod validate;

pub enum Command {
    Run {
        config: Option<PathBuf>,
        strategy: Option<String>,
        steps: Option<u64>,
        out: Option<PathBuf>,
        json: bool,
        metrics_addr: Option<String>,
    },
    Validate {
        config: Option<PathBuf>,
    },
    Prompt {
        config: Option<PathBuf>,
    },
}

pub fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Run {
            config,
            strategy,
            steps,
            out,
            json,
            metrics_addr,
        } => run::run_loop(run::RunArgs {
            config,
            strategy,
            steps,
            out,
            json,
            metrics_addr,
        }),
        Command::Validate { config } => validate::run_validate(config),
        Command::Prompt { config } => prompt::run_prompt(config),
    }
}

#[cfg(test)]
mod tests {
    use super::common::{load_run_config, LoadedConfig, CONFIG_ENV};
    use super::prompt::render_prompt;
    use super::run::apply_overrides;
    use super::validate::run_validate;
    use std::fs;
    use std::path::PathBuf;

    const SAMPLE_TOML: &str = "\
[run]\n\
run_id = \"cli_test\"\n\
strategy = \"simulated\"\n\
steps = 3\n\
initial_capital = 5000.0\n\
symbols = [\"MSFT\", \"AMZN\"]\n";

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("arbiter-cli-{name}-{nanos}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn write_config(dir: &PathBuf, contents: &str) -> PathBuf {
        let path = dir.join("config.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    fn sample_loaded() -> (PathBuf, LoadedConfig) {
        let dir = temp_dir("sample");
        let path = write_config(&dir, SAMPLE_TOML);
        let loaded = load_run_config(Some(path)).expect("sample config loads");
        (dir, loaded)
    }

    // The only test that reads or writes the config env var.
    #[test]
    fn config_path_falls_back_to_env_then_defaults() {
        let dir = temp_dir("env");
        let path = write_config(&dir, SAMPLE_TOML);

        std::env::set_var(CONFIG_ENV, &path);
        let from_env = load_run_config(None);
        let explicit_wins = load_run_config(Some(PathBuf::from("/nonexistent/arbiter.toml")));
        std::env::set_var(CONFIG_ENV, "   ");
        let blank_env = load_run_config(None);
        std::env::remove_var(CONFIG_ENV);
        let unset = load_run_config(None);

        let from_env = from_env.expect("env config loads");
        assert_eq!(from_env.config.run.run_id, "cli_test");
        assert_eq!(from_env.origin, path.display().to_string());
        assert_eq!(from_env.source, SAMPLE_TOML);

        assert!(explicit_wins
            .err()
            .expect("explicit path is used over the env var")
            .contains("/nonexistent/arbiter.toml"));

        for loaded in [blank_env, unset] {
            let loaded = loaded.expect("built-in defaults load");
            assert_eq!(loaded.origin, "built-in defaults");
            assert_eq!(loaded.config.run.run_id, "arbiter_demo");
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn overrides_rewrite_the_config_snapshot() {
        let (dir, mut loaded) = sample_loaded();
        let untouched = apply_overrides(&mut loaded, None, None).expect("no overrides");
        assert_eq!(untouched, SAMPLE_TOML);

        let snapshot =
            apply_overrides(&mut loaded, Some(" Simulated "), Some(7)).expect("valid overrides");
        assert_eq!(loaded.config.run.steps, 7);
        assert!(snapshot.contains("steps = 7"));
        assert!(snapshot.contains("run_id = \"cli_test\""));
        assert!(!snapshot.contains("steps = 3"));

        let err = apply_overrides(&mut loaded, Some("live"), None).expect_err("unknown strategy");
        assert!(err.contains("unknown strategy"));
        assert_eq!(loaded.config.run.steps, 7);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn run_validate_accepts_sample_and_rejects_zero_steps() {
        let dir = temp_dir("validate");
        let path = write_config(&dir, SAMPLE_TOML);
        run_validate(Some(path)).expect("sample config validates");

        let path = write_config(&dir, &SAMPLE_TOML.replace("steps = 3", "steps = 0"));
        let err = run_validate(Some(path)).expect_err("zero steps rejected");
        assert!(err.contains("run.steps"));

        let path = write_config(&dir, &format!("{SAMPLE_TOML}\n[generator]\nbackend = \"remote\"\n"));
        let err = run_validate(Some(path)).expect_err("remote without url rejected");
        assert!(err.contains("generator.url"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rendered_prompt_covers_configured_symbols() {
        let (dir, loaded) = sample_loaded();
        let prompt = render_prompt(&loaded).expect("prompt renders");

        for header in [
            "=== Current Market Data ===",
            "=== Technical Indicators Analysis ===",
            "=== Current Portfolio ===",
            "=== Decision Guidelines ===",
        ] {
            assert!(prompt.contains(header), "missing {header}");
        }
        assert!(prompt.contains("MSFT: Price="));
        assert!(prompt.contains("AMZN: Price="));
        assert!(!prompt.contains("AAPL: Price="));
        assert!(!prompt.contains("=== Recent Decision History ==="));

        let _ = fs::remove_dir_all(&dir);
    }
}
