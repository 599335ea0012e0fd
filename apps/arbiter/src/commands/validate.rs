use arbiter_application::meta::engine_name;
use arbiter_application::shared::validate_config;
use std::path::PathBuf;

pub(super) fn run_validate(config_path: Option<PathBuf>) -> Result<(), String> {
    let loaded = super::common::load_run_config(config_path)?;
    super::common::print_config_summary("validate", &loaded, None)?;

    validate_config(&loaded.config)?;
    crate::infra::build_generator(&loaded.config)?;
    crate::infra::build_market(&loaded.config)?;

    println!("{} cli: config ok", engine_name());
    Ok(())
}
