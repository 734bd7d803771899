mod config_file;
mod config_utils;

pub use config_file::{
    ConfigFile,
    SimbadConfig,
    NedConfig,
    IndexConfig,
    CONFIG_FILE_NAME,
};
pub use config_utils::{find_config_file, parse_config_file};
