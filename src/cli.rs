use std::env;

use color_eyre::eyre::{OptionExt, Result};

pub struct CliArgs {
    pub config_file_path: String,
    pub orders_file_path: String,
}

impl CliArgs {
    pub fn load() -> Result<Self> {
        let args: Vec<String> = env::args().collect();

        let config_file_path = args.get(1).ok_or_eyre("Config file not passed")?.to_owned();
        let orders_file_path = args.get(2).ok_or_eyre("Orders file not passed")?.to_owned();

        Ok(CliArgs {
            config_file_path,
            orders_file_path,
        })
    }
}
